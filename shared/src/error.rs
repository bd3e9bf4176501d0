//! Domain rule violations raised by the ledger and order state machine

use thiserror::Error;

/// Errors produced by the pure ledger and order rules
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum LedgerError {
    #[error("{0} not found")]
    NotFound(String),

    #[error("Insufficient stock for {product}: requested {requested}, available {available}")]
    InsufficientStock {
        product: String,
        requested: i64,
        available: i64,
    },

    #[error("No receipt transaction found to determine cedi conversion rate for {0}")]
    NoConversionRate(String),

    #[error("Cannot delete receipt transaction: would result in negative stock for {product}")]
    NegativeStockGuard { product: String },

    #[error("Order {0} is already marked as paid")]
    AlreadyPaid(String),

    #[error("Invalid state transition: {0}")]
    InvalidTransition(String),

    #[error("{field}: {message}")]
    Validation { field: String, message: String },
}

impl LedgerError {
    pub fn validation(field: &str, message: &str) -> Self {
        LedgerError::Validation {
            field: field.to_string(),
            message: message.to_string(),
        }
    }
}

pub type LedgerResult<T> = Result<T, LedgerError>;
