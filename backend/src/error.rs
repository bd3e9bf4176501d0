//! Error handling for the AgriStock backend
//!
//! Every failure surfaces as one `AppError`, rendered as
//! `{ "error": { "code", "message", "field"? } }` with a matching status.

use std::sync::atomic::{AtomicBool, Ordering};

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use shared::LedgerError;
use thiserror::Error;

static EXPOSE_INTERNAL: AtomicBool = AtomicBool::new(false);

/// Include internal error details in response bodies (development only)
pub fn expose_internal_errors(enabled: bool) {
    EXPOSE_INTERNAL.store(enabled, Ordering::Relaxed);
}

/// Application error types
#[derive(Error, Debug)]
pub enum AppError {
    // Lookup errors
    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Conflict: {message}")]
    Conflict { resource: String, message: String },

    // Ledger errors
    #[error("Insufficient stock for {product}: requested {requested}, available {available}")]
    InsufficientStock {
        product: String,
        requested: i64,
        available: i64,
    },

    #[error("No conversion rate for {0}")]
    NoConversionRate(String),

    #[error("Negative stock guard for {0}")]
    NegativeStockGuard(String),

    #[error("Order {0} already paid")]
    AlreadyPaid(String),

    #[error("Invalid state transition: {0}")]
    InvalidStateTransition(String),

    // Validation errors
    #[error("Validation error: {message}")]
    Validation { field: String, message: String },

    #[error("Validation error: {0}")]
    ValidationError(String),

    // Authentication errors
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Insufficient permissions")]
    InsufficientPermissions,

    // External collaborator errors
    #[error("Mail delivery failed: {0}")]
    Mail(String),

    #[error("Document rendering failed: {0}")]
    Render(String),

    // Database errors
    #[error("Database error: {0}")]
    DatabaseError(#[from] sqlx::Error),

    // Internal errors
    #[error("Internal server error: {0}")]
    Internal(String),

    #[error("Internal server error")]
    InternalError(#[from] anyhow::Error),
}

impl AppError {
    pub fn validation(field: &str, message: impl Into<String>) -> Self {
        AppError::Validation {
            field: field.to_string(),
            message: message.into(),
        }
    }

    pub fn conflict(resource: &str, message: impl Into<String>) -> Self {
        AppError::Conflict {
            resource: resource.to_string(),
            message: message.into(),
        }
    }

    /// Stable machine-readable code sent to clients
    pub fn code(&self) -> &'static str {
        match self {
            AppError::NotFound(_) => "NOT_FOUND",
            AppError::Conflict { .. } => "CONFLICT",
            AppError::InsufficientStock { .. } => "INSUFFICIENT_STOCK",
            AppError::NoConversionRate(_) => "NO_CONVERSION_RATE",
            AppError::NegativeStockGuard(_) => "NEGATIVE_STOCK_GUARD",
            AppError::AlreadyPaid(_) => "ALREADY_PAID",
            AppError::InvalidStateTransition(_) => "INVALID_STATE_TRANSITION",
            AppError::Validation { .. } | AppError::ValidationError(_) => "VALIDATION_ERROR",
            AppError::Unauthorized(_) => "UNAUTHORIZED",
            AppError::InsufficientPermissions => "FORBIDDEN",
            AppError::Mail(_)
            | AppError::Render(_)
            | AppError::DatabaseError(_)
            | AppError::Internal(_)
            | AppError::InternalError(_) => "INTERNAL_ERROR",
        }
    }

    fn status(&self) -> StatusCode {
        match self {
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict { .. } | AppError::AlreadyPaid(_) => StatusCode::CONFLICT,
            AppError::InsufficientStock { .. }
            | AppError::NoConversionRate(_)
            | AppError::NegativeStockGuard(_)
            | AppError::InvalidStateTransition(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::Validation { .. } | AppError::ValidationError(_) => StatusCode::BAD_REQUEST,
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::InsufficientPermissions => StatusCode::FORBIDDEN,
            AppError::Mail(_)
            | AppError::Render(_)
            | AppError::DatabaseError(_)
            | AppError::Internal(_)
            | AppError::InternalError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn is_internal(&self) -> bool {
        self.status() == StatusCode::INTERNAL_SERVER_ERROR
    }
}

impl From<LedgerError> for AppError {
    fn from(err: LedgerError) -> Self {
        match err {
            LedgerError::NotFound(what) => AppError::NotFound(what),
            LedgerError::InsufficientStock {
                product,
                requested,
                available,
            } => AppError::InsufficientStock {
                product,
                requested,
                available,
            },
            LedgerError::NoConversionRate(product) => AppError::NoConversionRate(product),
            LedgerError::NegativeStockGuard { product } => AppError::NegativeStockGuard(product),
            LedgerError::AlreadyPaid(order) => AppError::AlreadyPaid(order),
            LedgerError::InvalidTransition(msg) => AppError::InvalidStateTransition(msg),
            LedgerError::Validation { field, message } => AppError::Validation { field, message },
        }
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let first = errors.field_errors().into_iter().next().map(|(field, errs)| {
            let message = errs
                .first()
                .and_then(|e| e.message.as_ref().map(|m| m.to_string()))
                .unwrap_or_else(|| format!("{} is invalid", field));
            (field.to_string(), message)
        });
        match first {
            Some((field, message)) => AppError::Validation { field, message },
            None => AppError::ValidationError(errors.to_string()),
        }
    }
}

/// Error response structure
#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: ErrorDetail,
}

#[derive(Serialize)]
pub struct ErrorDetail {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
}

impl ErrorResponse {
    pub fn new(code: &str, message: impl Into<String>) -> Self {
        Self {
            error: ErrorDetail {
                code: code.to_string(),
                message: message.into(),
                field: None,
            },
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();

        let message = match &self {
            AppError::NotFound(resource) => format!("{} not found", resource),
            AppError::Conflict { message, .. } => message.clone(),
            AppError::InsufficientStock {
                product,
                requested,
                available,
            } => format!(
                "Insufficient stock for {}: requested {}, available {}",
                product, requested, available
            ),
            AppError::NoConversionRate(product) => format!(
                "No receipt transaction found to determine cedi conversion rate for {}",
                product
            ),
            AppError::NegativeStockGuard(product) => format!(
                "Cannot delete receipt transaction: would result in negative stock for {}",
                product
            ),
            AppError::AlreadyPaid(_) => "Order is already marked as paid".to_string(),
            AppError::InvalidStateTransition(msg) => msg.clone(),
            AppError::Validation { message, .. } => message.clone(),
            AppError::ValidationError(msg) => msg.clone(),
            AppError::Unauthorized(msg) => msg.clone(),
            AppError::InsufficientPermissions => {
                "You do not have permission to perform this action".to_string()
            }
            other if EXPOSE_INTERNAL.load(Ordering::Relaxed) => other.to_string(),
            _ => "An internal server error occurred".to_string(),
        };

        let field = match &self {
            AppError::Validation { field, .. } => Some(field.clone()),
            AppError::Conflict { resource, .. } => Some(resource.clone()),
            _ => None,
        };

        if self.is_internal() {
            tracing::error!("Error: {:?}", self);
        } else {
            tracing::warn!(code = self.code(), "Request rejected: {}", self);
        }

        let body = ErrorResponse {
            error: ErrorDetail {
                code: self.code().to_string(),
                message,
                field,
            },
        };

        (status, Json(body)).into_response()
    }
}

/// Result type alias for handlers
pub type AppResult<T> = Result<T, AppError>;
