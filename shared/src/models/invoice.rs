//! Invoice models

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::types::{Currency, PaymentStatus};

/// Billable record for exactly one order
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Invoice {
    pub id: Uuid,
    pub order_id: Uuid,
    pub farmer_id: Uuid,
    pub currency: Currency,
    pub farmer_name: String,
    /// Snapshot taken at creation; never recomputed
    pub total_amount: Decimal,
    pub status: PaymentStatus,
    pub pdf_download_link: String,
    pub email_sent: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Invoice {
    pub fn new(
        order_id: Uuid,
        farmer_id: Uuid,
        farmer_name: impl Into<String>,
        total_amount: Decimal,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            order_id,
            farmer_id,
            currency: Currency::Euro,
            farmer_name: farmer_name.into(),
            total_amount,
            status: PaymentStatus::Pending,
            pdf_download_link: String::new(),
            email_sent: false,
            created_at: now,
            updated_at: now,
        }
    }

    /// File name the rendered PDF is stored and served under
    pub fn file_name(&self) -> String {
        format!("invoice_{}.pdf", self.id)
    }

    /// Short reference printed on the document
    pub fn number(&self) -> String {
        self.id.simple().to_string()[..8].to_uppercase()
    }
}
