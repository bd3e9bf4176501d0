//! Stock ledger service: restock, issue, pickup confirmation, deletion
//!
//! Each operation locks the product, reloads it, applies the pure rules from
//! `shared::ledger` and commits the product, its transaction and any order
//! side effect in one unit of work.

use std::sync::Arc;

use chrono::Utc;
use shared::ledger::{self, IssueInput, RestockInput};
use shared::{StockTransaction, TransactionStatus};
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::services::locks::LockRegistry;
use crate::store::{Change, Store, UnitOfWork};
use crate::AppState;

#[derive(Clone)]
pub struct LedgerService {
    store: Arc<dyn Store>,
    locks: LockRegistry,
}

impl LedgerService {
    pub fn new(state: &AppState) -> Self {
        Self {
            store: state.store.clone(),
            locks: state.locks.clone(),
        }
    }

    /// Record a receipt of stock
    pub async fn restock(&self, product_id: Uuid, input: RestockInput) -> AppResult<StockTransaction> {
        let _lock = self.locks.lock(product_id).await;
        let mut product = self
            .store
            .get_product(product_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Product".to_string()))?;

        let transaction = ledger::restock(&mut product, input, Utc::now()).map_err(|e| {
            tracing::warn!(%product_id, error = %e, "Restock rejected");
            AppError::from(e)
        })?;

        let mut work = UnitOfWork::new();
        work.push(Change::UpdateProduct(product.clone()))
            .push(Change::InsertTransaction(transaction.clone()));
        self.store.commit(work).await?;

        tracing::info!(
            %product_id,
            qty_received = transaction.qty_received,
            available_stock = product.available_stock,
            stock_balance = product.stock_balance,
            "Product restocked"
        );
        Ok(transaction)
    }

    /// Allocate stock to a farmer at the latest receipt's conversion rate
    pub async fn issue(&self, product_id: Uuid, input: IssueInput) -> AppResult<StockTransaction> {
        let _lock = self.locks.lock(product_id).await;
        let mut product = self
            .store
            .get_product(product_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Product".to_string()))?;

        let transaction = ledger::issue(&mut product, input, Utc::now()).map_err(|e| {
            tracing::warn!(%product_id, error = %e, "Issue rejected");
            AppError::from(e)
        })?;

        let mut work = UnitOfWork::new();
        work.push(Change::UpdateProduct(product.clone()))
            .push(Change::InsertTransaction(transaction.clone()));
        self.store.commit(work).await?;

        tracing::info!(
            %product_id,
            qty_issued = transaction.qty_issued,
            rate = %transaction.cedi_conversion_rate,
            available_stock = product.available_stock,
            "Product issued"
        );
        Ok(transaction)
    }

    /// Mark the transaction tied to an order as collected
    pub async fn confirm_pickup(&self, order_id: Uuid) -> AppResult<StockTransaction> {
        let transaction = self
            .store
            .find_transaction_by_order(order_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Transaction for order".to_string()))?;

        let _lock = self.locks.lock(transaction.product_id).await;
        self.store
            .commit(Change::ConfirmPickup(transaction.id).into())
            .await?;

        tracing::info!(%order_id, transaction_id = %transaction.id, "Pickup confirmed");
        Ok(StockTransaction {
            pickup_confirmed: true,
            ..transaction
        })
    }

    /// Delete a transaction and reverse its stock effect. Deleting the issue of
    /// an approved order sends the order back to Pending.
    pub async fn delete_transaction(&self, product_id: Uuid, transaction_id: Uuid) -> AppResult<StockTransaction> {
        let order_id = self
            .store
            .get_product(product_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Product".to_string()))?
            .transaction(transaction_id)
            .ok_or_else(|| AppError::NotFound("Transaction".to_string()))?
            .order_id;

        let _order_lock = match order_id {
            Some(id) => Some(self.locks.lock(id).await),
            None => None,
        };
        let _product_lock = self.locks.lock(product_id).await;

        let mut product = self
            .store
            .get_product(product_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Product".to_string()))?;

        let removed = ledger::delete_transaction(&mut product, transaction_id, Utc::now()).map_err(|e| {
            tracing::warn!(%product_id, %transaction_id, error = %e, "Transaction deletion rejected");
            AppError::from(e)
        })?;

        let mut work = UnitOfWork::new();
        work.push(Change::UpdateProduct(product.clone()))
            .push(Change::DeleteTransaction(removed.id));

        if let (TransactionStatus::Issue, Some(order_id)) = (removed.status, removed.order_id) {
            if let Some(mut order) = self.store.get_order(order_id).await? {
                if order.revert_approval() {
                    tracing::info!(%order_id, "Order reverted to Pending");
                    work.push(Change::UpdateOrder(order));
                }
            }
        }

        self.store.commit(work).await?;

        tracing::info!(
            %product_id,
            %transaction_id,
            status = removed.status.as_str(),
            quantity = removed.quantity(),
            available_stock = product.available_stock,
            stock_balance = product.stock_balance,
            "Transaction deleted"
        );
        Ok(removed)
    }

    pub async fn list_transactions(&self, product_id: Uuid) -> AppResult<Vec<StockTransaction>> {
        if self.store.get_product(product_id).await?.is_none() {
            return Err(AppError::NotFound("Product".to_string()));
        }
        self.store.list_transactions(product_id).await
    }
}
