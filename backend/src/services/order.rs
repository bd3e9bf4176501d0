//! Order lifecycle service
//!
//! Stock moves only at reservation transitions: payment commits available
//! stock, pickup releases the balance, rejection hands committed stock back.
//! Every transition locks the order first, then its products in ascending id
//! order, and commits the order and the products in one unit of work.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use shared::ledger::{commit_quantity, release_quantity, uncommit_quantity};
use shared::orders::{line_deltas, line_quantities, price_lines, LineRequest};
use shared::{Order, OrderFilter, OrderStatus, PickupStatus, Product};
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::services::locks::LockRegistry;
use crate::store::{Change, Store, UnitOfWork};
use crate::AppState;

#[derive(Clone)]
pub struct OrderService {
    store: Arc<dyn Store>,
    locks: LockRegistry,
}

/// Partial order update. Absent fields are left alone.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateOrderInput {
    pub products: Option<Vec<LineRequest>>,
    pub order_status: Option<OrderStatus>,
    pub awaiting_pickup: Option<PickupStatus>,
}

/// Result of an order update
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "outcome", content = "order", rename_all = "camelCase")]
pub enum OrderUpdate {
    Updated(Order),
    Deleted,
}

impl OrderService {
    pub fn new(state: &AppState) -> Self {
        Self {
            store: state.store.clone(),
            locks: state.locks.clone(),
        }
    }

    async fn load_order(&self, order_id: Uuid) -> AppResult<Order> {
        self.store
            .get_order(order_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Order".to_string()))
    }

    async fn ensure_farmer(&self, farmer_id: Uuid) -> AppResult<()> {
        match self.store.get_user(farmer_id).await? {
            Some(_) => Ok(()),
            None => Err(AppError::NotFound("Farmer".to_string())),
        }
    }

    /// Load the products that exist among `ids`. Callers hold their locks.
    async fn load_products(&self, ids: &BTreeSet<Uuid>) -> AppResult<BTreeMap<Uuid, Product>> {
        let mut products = BTreeMap::new();
        for id in ids {
            if let Some(product) = self.store.get_product(*id).await? {
                products.insert(*id, product);
            }
        }
        Ok(products)
    }

    fn product_mut<'a>(products: &'a mut BTreeMap<Uuid, Product>, id: &Uuid) -> AppResult<&'a mut Product> {
        products
            .get_mut(id)
            .ok_or_else(|| AppError::NotFound(format!("Product {}", id)))
    }

    /// Price and store a new order. Stock is checked but not moved.
    pub async fn create(&self, farmer_id: Uuid, requests: Vec<LineRequest>) -> AppResult<Order> {
        self.ensure_farmer(farmer_id).await?;

        let ids: BTreeSet<Uuid> = requests.iter().map(|r| r.product_id).collect();
        let _locks = self.locks.lock_many(ids.iter().copied()).await;
        let products = self.load_products(&ids).await?;

        let lines = price_lines(&products, &requests, &BTreeMap::new()).map_err(|e| {
            tracing::warn!(%farmer_id, error = %e, "Order rejected");
            AppError::from(e)
        })?;

        let order = Order::new(farmer_id, lines, Utc::now())?;
        self.store.commit(Change::CreateOrder(order.clone()).into()).await?;

        tracing::info!(
            order_id = %order.id,
            %farmer_id,
            lines = order.products.len(),
            total_cost = %order.total_cost,
            "Order created"
        );
        Ok(order)
    }

    /// Record payment and commit the order's stock
    pub async fn mark_paid(&self, order_id: Uuid) -> AppResult<Order> {
        let _order_lock = self.locks.lock(order_id).await;
        let mut order = self.load_order(order_id).await?;

        let quantities = line_quantities(&order.products);
        let ids: BTreeSet<Uuid> = quantities.keys().copied().collect();
        let _product_locks = self.locks.lock_many(ids.iter().copied()).await;
        let mut products = self.load_products(&ids).await?;

        order.mark_paid().map_err(|e| {
            tracing::warn!(%order_id, error = %e, "Payment rejected");
            AppError::from(e)
        })?;

        let now = Utc::now();
        let mut work = UnitOfWork::new();
        for (product_id, quantity) in &quantities {
            let product = Self::product_mut(&mut products, product_id)?;
            commit_quantity(product, *quantity, now)?;
            work.push(Change::UpdateProduct(product.clone()));
        }
        work.push(Change::UpdateOrder(order.clone()));
        self.store.commit(work).await?;

        tracing::info!(%order_id, products = quantities.len(), "Order paid and stock committed");
        Ok(order)
    }

    /// Apply a partial update: rejection, line replacement, pickup completion.
    ///
    /// Rejection deletes the order and ignores the rest of the input. A paid
    /// order's committed stock goes back to `available_stock` in the same
    /// unit of work, so a rejected reservation never strands stock.
    pub async fn update(&self, order_id: Uuid, input: UpdateOrderInput) -> AppResult<OrderUpdate> {
        let _order_lock = self.locks.lock(order_id).await;
        let mut order = self.load_order(order_id).await?;
        self.ensure_farmer(order.farmer_id).await?;

        let mut ids: BTreeSet<Uuid> = order.products.iter().map(|l| l.product_id).collect();
        if let Some(requests) = &input.products {
            ids.extend(requests.iter().map(|r| r.product_id));
        }
        let _product_locks = self.locks.lock_many(ids.iter().copied()).await;
        let mut products = self.load_products(&ids).await?;
        let now = Utc::now();
        let mut touched = BTreeSet::new();

        if input.order_status == Some(OrderStatus::Rejected) {
            let mut work = UnitOfWork::new();
            if order.is_committed() {
                for (product_id, quantity) in line_quantities(&order.products) {
                    let product = Self::product_mut(&mut products, &product_id)?;
                    uncommit_quantity(product, quantity, now)?;
                    work.push(Change::UpdateProduct(product.clone()));
                }
            }
            work.push(Change::DeleteOrder(order_id));
            self.store.commit(work).await?;
            tracing::info!(%order_id, "Order rejected and deleted");
            return Ok(OrderUpdate::Deleted);
        }

        if let Some(requests) = &input.products {
            let held = if order.is_committed() {
                line_quantities(&order.products)
            } else {
                BTreeMap::new()
            };
            let lines = price_lines(&products, requests, &held).map_err(|e| {
                tracing::warn!(%order_id, error = %e, "Order lines rejected");
                AppError::from(e)
            })?;

            if order.is_committed() {
                for (product_id, delta) in line_deltas(&order.products, &lines) {
                    let product = Self::product_mut(&mut products, &product_id)?;
                    if delta > 0 {
                        commit_quantity(product, delta, now)?;
                    } else {
                        uncommit_quantity(product, -delta, now)?;
                    }
                    touched.insert(product_id);
                }
            }
            order.replace_lines(lines)?;
        }

        if input.awaiting_pickup == Some(PickupStatus::Completed) {
            order.complete_pickup().map_err(|e| {
                tracing::warn!(%order_id, error = %e, "Pickup rejected");
                AppError::from(e)
            })?;
            for (product_id, quantity) in line_quantities(&order.products) {
                let product = Self::product_mut(&mut products, &product_id)?;
                release_quantity(product, quantity, now)?;
                touched.insert(product_id);
            }
            tracing::info!(%order_id, "Order collected and stock released");
        }

        let mut work = UnitOfWork::new();
        for product_id in &touched {
            work.push(Change::UpdateProduct(Self::product_mut(&mut products, product_id)?.clone()));
        }
        work.push(Change::UpdateOrder(order.clone()));
        self.store.commit(work).await?;

        tracing::info!(%order_id, products_touched = touched.len(), "Order updated");
        Ok(OrderUpdate::Updated(order))
    }

    pub async fn pending_count(&self) -> AppResult<i64> {
        self.store.count_orders(&OrderFilter::pending()).await
    }

    /// Orders of one farmer; `NotFound` when there are none
    pub async fn by_farmer(&self, farmer_id: Uuid) -> AppResult<Vec<Order>> {
        let orders = self.store.list_orders(&OrderFilter::for_farmer(farmer_id)).await?;
        if orders.is_empty() {
            return Err(AppError::NotFound("Orders for farmer".to_string()));
        }
        Ok(orders)
    }

    pub async fn by_id(&self, order_id: Uuid) -> AppResult<Order> {
        self.load_order(order_id).await
    }

    pub async fn all(&self, filter: &OrderFilter) -> AppResult<Vec<Order>> {
        self.store.list_orders(filter).await
    }
}
