//! Farmer order models

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::types::PaymentStatus;

/// An order placed by a farmer
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub id: Uuid,
    pub farmer_id: Uuid,
    pub products: Vec<OrderLine>,
    /// Sum of the line costs
    pub total_cost: Decimal,
    pub order_status: OrderStatus,
    pub payment_status: PaymentStatus,
    pub awaiting_pickup: PickupStatus,
    pub reservation: ReservationState,
    pub invoice_id: Option<Uuid>,
    pub invoice_generated: bool,
    pub created_at: DateTime<Utc>,
}

/// A priced order line. Name and price are snapshots taken when the line was
/// priced, so later catalogue edits do not rewrite history.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct OrderLine {
    pub product_id: Uuid,
    pub product_name: String,
    pub quantity: i64,
    pub unit_price: Decimal,
    pub cost: Decimal,
}

/// Approval state. `Rejected` is accepted as a request value but never
/// stored: rejecting deletes the order.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum OrderStatus {
    #[default]
    Pending,
    Approved,
    Rejected,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "Pending",
            OrderStatus::Approved => "Approved",
            OrderStatus::Rejected => "Rejected",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "Pending" => Some(OrderStatus::Pending),
            "Approved" => Some(OrderStatus::Approved),
            "Rejected" => Some(OrderStatus::Rejected),
            _ => None,
        }
    }
}

/// Physical handover state
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum PickupStatus {
    #[default]
    #[serde(rename = "Awaiting Collection")]
    AwaitingCollection,
    Completed,
}

impl PickupStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PickupStatus::AwaitingCollection => "Awaiting Collection",
            PickupStatus::Completed => "Completed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "Awaiting Collection" => Some(PickupStatus::AwaitingCollection),
            "Completed" => Some(PickupStatus::Completed),
            _ => None,
        }
    }
}

/// Stock reservation held by an order
///
/// ```text
/// Requested --pay--> Committed --pickup--> Released
/// ```
///
/// `Requested`: stock was checked at pricing time but nothing is held.
/// `Committed`: available stock has been deducted.
/// `Released`: the goods left the warehouse and the stock balance was deducted.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum ReservationState {
    #[default]
    Requested,
    Committed,
    Released,
}

impl ReservationState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReservationState::Requested => "Requested",
            ReservationState::Committed => "Committed",
            ReservationState::Released => "Released",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "Requested" => Some(ReservationState::Requested),
            "Committed" => Some(ReservationState::Committed),
            "Released" => Some(ReservationState::Released),
            _ => None,
        }
    }
}

/// Query filter for order listings and counts
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderFilter {
    pub farmer_id: Option<Uuid>,
    pub order_status: Option<OrderStatus>,
    pub payment_status: Option<PaymentStatus>,
}

impl OrderFilter {
    pub fn pending() -> Self {
        Self {
            order_status: Some(OrderStatus::Pending),
            ..Self::default()
        }
    }

    pub fn for_farmer(farmer_id: Uuid) -> Self {
        Self {
            farmer_id: Some(farmer_id),
            ..Self::default()
        }
    }

    pub fn matches(&self, order: &Order) -> bool {
        self.farmer_id.map_or(true, |id| order.farmer_id == id)
            && self.order_status.map_or(true, |s| order.order_status == s)
            && self.payment_status.map_or(true, |s| order.payment_status == s)
    }
}
