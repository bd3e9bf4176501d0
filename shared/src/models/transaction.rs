//! Stock ledger transaction models

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::types::PaymentStatus;

/// A ledger entry owned by exactly one product
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct StockTransaction {
    pub id: Uuid,
    pub product_id: Uuid,
    pub status: TransactionStatus,
    /// Supplier for a receipt, farmer for an issue
    pub received_from_issued_to: String,
    pub qty_received: i64,
    pub qty_issued: i64,
    pub cedi_conversion_rate: Decimal,
    /// Pro forma quantity on an issue
    pub pro_forma: i64,
    /// Invoiced Euro amount on an issue
    pub invoiced: Decimal,
    /// Quantity still owed to the farmer
    pub farmer_balance: i64,
    /// Product available stock right after this entry
    pub available_stock: i64,
    /// Product stock balance right after this entry
    pub stock_balance: i64,
    pub order_id: Option<Uuid>,
    pub invoice_status: Option<PaymentStatus>,
    pub pickup_confirmed: bool,
    pub value_in_euro: Decimal,
    pub value_in_cedi: Decimal,
    pub out_of_order_date: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl StockTransaction {
    /// Quantity this entry moved, regardless of direction
    pub fn quantity(&self) -> i64 {
        match self.status {
            TransactionStatus::Receipt => self.qty_received,
            TransactionStatus::Issue => self.qty_issued,
        }
    }

    pub fn is_receipt(&self) -> bool {
        self.status == TransactionStatus::Receipt
    }
}

/// Direction of a ledger entry; fixed at creation
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum TransactionStatus {
    /// Incoming stock from a supplier
    Receipt,
    /// Stock allocated to a farmer or order
    Issue,
}

impl TransactionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionStatus::Receipt => "Receipt",
            TransactionStatus::Issue => "Issue",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "Receipt" => Some(TransactionStatus::Receipt),
            "Issue" => Some(TransactionStatus::Issue),
            _ => None,
        }
    }
}
