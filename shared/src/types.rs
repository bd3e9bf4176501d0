//! Common types used across the platform

use serde::{Deserialize, Serialize};

/// Settlement state shared by orders, invoices and issue transactions
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum PaymentStatus {
    #[default]
    Pending,
    Paid,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "Pending",
            PaymentStatus::Paid => "Paid",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "Pending" => Some(PaymentStatus::Pending),
            "Paid" => Some(PaymentStatus::Paid),
            _ => None,
        }
    }
}

/// Currencies the ledger records values in
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum Currency {
    /// Purchase and invoice currency
    #[default]
    Euro,
    /// Local bookkeeping currency
    Cedi,
}

impl Currency {
    pub fn as_str(&self) -> &'static str {
        match self {
            Currency::Euro => "Euro",
            Currency::Cedi => "Cedi",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "Euro" => Some(Currency::Euro),
            "Cedi" => Some(Currency::Cedi),
            _ => None,
        }
    }

    pub fn symbol(&self) -> &'static str {
        match self {
            Currency::Euro => "€",
            Currency::Cedi => "GH₵",
        }
    }
}
