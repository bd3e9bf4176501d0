//! Order pricing and the reservation state machine
//!
//! Pricing validates requested quantities against the ledger without moving
//! stock. Stock only moves at the reservation transitions (see
//! [`ReservationState`]), which the backend applies together with the
//! matching ledger calls in one unit of work.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;
use uuid::Uuid;

use crate::error::{LedgerError, LedgerResult};
use crate::models::{Order, OrderLine, OrderStatus, PickupStatus, Product, ReservationState};
use crate::money::{checked_total, line_cost};
use crate::types::PaymentStatus;
use crate::validation::validate_quantity;

/// A requested order line before pricing
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LineRequest {
    pub product_id: Uuid,
    pub quantity: i64,
}

/// Sum quantities per product. Ordered by id, which is also the lock order.
pub fn quantities_by_product<I>(lines: I) -> BTreeMap<Uuid, i64>
where
    I: IntoIterator<Item = (Uuid, i64)>,
{
    let mut totals = BTreeMap::new();
    for (product_id, quantity) in lines {
        let total = totals.entry(product_id).or_insert(0i64);
        *total = total.saturating_add(quantity);
    }
    totals
}

/// Quantities held by existing order lines
pub fn line_quantities(lines: &[OrderLine]) -> BTreeMap<Uuid, i64> {
    quantities_by_product(lines.iter().map(|l| (l.product_id, l.quantity)))
}

/// Price requested lines against the loaded products.
///
/// `held` is stock this order already has committed per product; it counts
/// as available when the order is re-priced. A product requested on several
/// lines is checked against its combined quantity.
pub fn price_lines(
    products: &BTreeMap<Uuid, Product>,
    requests: &[LineRequest],
    held: &BTreeMap<Uuid, i64>,
) -> LedgerResult<Vec<OrderLine>> {
    if requests.is_empty() {
        return Err(LedgerError::validation("products", "Order must contain at least one product"));
    }

    let mut lines = Vec::with_capacity(requests.len());
    for request in requests {
        validate_quantity(request.quantity).map_err(|msg| LedgerError::validation("quantity", msg))?;
        let product = products
            .get(&request.product_id)
            .ok_or_else(|| LedgerError::NotFound(format!("Product {}", request.product_id)))?;
        lines.push(OrderLine {
            product_id: product.id,
            product_name: product.product_name.clone(),
            quantity: request.quantity,
            unit_price: product.selling_price,
            cost: line_cost(request.quantity, product.selling_price)?,
        });
    }

    for (product_id, requested) in line_quantities(&lines) {
        let Some(product) = products.get(&product_id) else {
            continue;
        };
        let available = product
            .available_stock
            .saturating_add(held.get(&product_id).copied().unwrap_or(0));
        if requested > available {
            return Err(LedgerError::InsufficientStock {
                product: product.product_name.clone(),
                requested,
                available,
            });
        }
    }

    Ok(lines)
}

pub fn total_cost(lines: &[OrderLine]) -> LedgerResult<Decimal> {
    checked_total(lines.iter().map(|l| l.cost))
}

/// Per-product change in committed quantity when `old` lines become `new`.
/// Positive means more stock must be committed. Zero deltas are omitted.
pub fn line_deltas(old: &[OrderLine], new: &[OrderLine]) -> BTreeMap<Uuid, i64> {
    let mut deltas = line_quantities(new);
    for (product_id, quantity) in line_quantities(old) {
        *deltas.entry(product_id).or_insert(0) -= quantity;
    }
    deltas.retain(|_, delta| *delta != 0);
    deltas
}

impl Order {
    /// A new unpaid order awaiting collection
    pub fn new(farmer_id: Uuid, products: Vec<OrderLine>, now: DateTime<Utc>) -> LedgerResult<Self> {
        let total_cost = total_cost(&products)?;
        Ok(Self {
            id: Uuid::new_v4(),
            farmer_id,
            products,
            total_cost,
            order_status: OrderStatus::Pending,
            payment_status: PaymentStatus::Pending,
            awaiting_pickup: PickupStatus::AwaitingCollection,
            reservation: ReservationState::Requested,
            invoice_id: None,
            invoice_generated: false,
            created_at: now,
        })
    }

    /// Requested -> Committed. The caller deducts available stock per line.
    pub fn mark_paid(&mut self) -> LedgerResult<()> {
        if self.payment_status == PaymentStatus::Paid {
            return Err(LedgerError::AlreadyPaid(self.id.to_string()));
        }
        if self.reservation != ReservationState::Requested {
            return Err(LedgerError::InvalidTransition(format!(
                "cannot pay an order in reservation state {}",
                self.reservation.as_str()
            )));
        }
        self.payment_status = PaymentStatus::Paid;
        self.order_status = OrderStatus::Approved;
        self.reservation = ReservationState::Committed;
        Ok(())
    }

    /// Committed -> Released. The caller deducts the stock balance per line.
    pub fn complete_pickup(&mut self) -> LedgerResult<()> {
        match self.reservation {
            ReservationState::Committed => {
                self.reservation = ReservationState::Released;
                self.awaiting_pickup = PickupStatus::Completed;
                Ok(())
            }
            ReservationState::Requested => Err(LedgerError::validation(
                "awaitingPickup",
                "Order must be paid before pickup",
            )),
            ReservationState::Released => Err(LedgerError::validation(
                "awaitingPickup",
                "Order has already been collected",
            )),
        }
    }

    /// Swap in re-priced lines and recompute the total
    pub fn replace_lines(&mut self, lines: Vec<OrderLine>) -> LedgerResult<()> {
        if self.reservation == ReservationState::Released {
            return Err(LedgerError::InvalidTransition(
                "cannot change the lines of a collected order".to_string(),
            ));
        }
        self.total_cost = total_cost(&lines)?;
        self.products = lines;
        Ok(())
    }

    /// Approved -> Pending after the order's issue transaction was deleted
    pub fn revert_approval(&mut self) -> bool {
        if self.order_status == OrderStatus::Approved {
            self.order_status = OrderStatus::Pending;
            true
        } else {
            false
        }
    }

    pub fn is_committed(&self) -> bool {
        self.reservation == ReservationState::Committed
    }
}
