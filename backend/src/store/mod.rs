//! Record store abstraction
//!
//! Services read through the query methods and write exclusively through
//! [`Store::commit`], which applies a whole unit of work or nothing. Two
//! implementations exist: [`PgStore`] for deployments and [`MemoryStore`]
//! for tests and database-less runs.

use async_trait::async_trait;
use shared::{Invoice, Order, OrderFilter, Product, StockTransaction, User};
use uuid::Uuid;

use crate::error::AppResult;

pub mod memory;
pub mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

/// One write inside a unit of work
#[derive(Debug, Clone)]
pub enum Change {
    /// Insert a catalogue entry. Its transaction list is ignored.
    CreateProduct(Product),
    /// Overwrite catalogue and stock fields. Its transaction list is ignored.
    UpdateProduct(Product),
    /// Refused with `Conflict` while order lines reference the product
    DeleteProduct(Uuid),
    InsertTransaction(StockTransaction),
    DeleteTransaction(Uuid),
    ConfirmPickup(Uuid),
    CreateOrder(Order),
    UpdateOrder(Order),
    DeleteOrder(Uuid),
    CreateInvoice(Invoice),
    UpdateInvoice(Invoice),
    DeleteInvoice(Uuid),
    CreateUser(User),
    UpdateUser(User),
    DeleteUser(Uuid),
}

/// A list of changes applied atomically
#[derive(Debug, Default)]
pub struct UnitOfWork {
    changes: Vec<Change>,
}

impl UnitOfWork {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, change: Change) -> &mut Self {
        self.changes.push(change);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    pub fn len(&self) -> usize {
        self.changes.len()
    }

    pub fn into_changes(self) -> Vec<Change> {
        self.changes
    }
}

impl From<Change> for UnitOfWork {
    fn from(change: Change) -> Self {
        Self {
            changes: vec![change],
        }
    }
}

/// Transactional record store
#[async_trait]
pub trait Store: Send + Sync {
    // Products

    /// Product with its full transaction history in insertion order
    async fn get_product(&self, id: Uuid) -> AppResult<Option<Product>>;
    async fn find_product_by_name(&self, name: &str) -> AppResult<Option<Product>>;
    async fn list_products(&self) -> AppResult<Vec<Product>>;
    async fn list_transactions(&self, product_id: Uuid) -> AppResult<Vec<StockTransaction>>;
    /// Most recently inserted transaction tied to the order
    async fn find_transaction_by_order(&self, order_id: Uuid) -> AppResult<Option<StockTransaction>>;

    // Orders

    async fn get_order(&self, id: Uuid) -> AppResult<Option<Order>>;
    /// Matching orders, newest first
    async fn list_orders(&self, filter: &OrderFilter) -> AppResult<Vec<Order>>;
    async fn count_orders(&self, filter: &OrderFilter) -> AppResult<i64>;

    // Invoices

    async fn get_invoice(&self, id: Uuid) -> AppResult<Option<Invoice>>;
    async fn get_invoice_by_order(&self, order_id: Uuid) -> AppResult<Option<Invoice>>;
    /// All invoices, newest first
    async fn list_invoices(&self) -> AppResult<Vec<Invoice>>;

    // Users

    async fn get_user(&self, id: Uuid) -> AppResult<Option<User>>;
    async fn find_user_by_email(&self, email: &str) -> AppResult<Option<User>>;
    async fn find_user_by_verify_token(&self, token: &str) -> AppResult<Option<User>>;
    async fn find_user_by_reset_token(&self, token: &str) -> AppResult<Option<User>>;
    async fn list_users(&self) -> AppResult<Vec<User>>;

    /// Apply every change or none of them
    async fn commit(&self, work: UnitOfWork) -> AppResult<()>;

    /// Liveness probe for the health endpoint
    async fn ping(&self) -> bool;

    /// Short backend name reported by the health endpoint
    fn kind(&self) -> &'static str;
}
