//! In-process record store
//!
//! Commits stage every change on a copy of the tables and swap it in only
//! when all of them applied, so a failed unit of work leaves no trace.

use std::collections::HashMap;

use async_trait::async_trait;
use shared::{Invoice, Order, OrderFilter, Product, StockTransaction, User};
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{Change, Store, UnitOfWork};
use crate::error::{AppError, AppResult};

#[derive(Debug, Clone, Default)]
struct Tables {
    /// Products keep their transactions inline, in insertion order
    products: HashMap<Uuid, Product>,
    orders: HashMap<Uuid, Order>,
    invoices: HashMap<Uuid, Invoice>,
    users: HashMap<Uuid, User>,
}

impl Tables {
    fn apply(&mut self, change: Change) -> AppResult<()> {
        match change {
            Change::CreateProduct(mut product) => {
                self.ensure_unique_product_name(product.id, &product.product_name)?;
                product.transactions.clear();
                self.products.insert(product.id, product);
            }
            Change::UpdateProduct(product) => {
                self.ensure_unique_product_name(product.id, &product.product_name)?;
                let stored = self
                    .products
                    .get_mut(&product.id)
                    .ok_or_else(|| AppError::NotFound("Product".to_string()))?;
                let transactions = std::mem::take(&mut stored.transactions);
                *stored = Product {
                    transactions,
                    ..product
                };
            }
            Change::DeleteProduct(id) => {
                let referenced = self
                    .orders
                    .values()
                    .any(|o| o.products.iter().any(|l| l.product_id == id));
                if referenced {
                    return Err(AppError::conflict(
                        "product",
                        "Product is referenced by existing orders",
                    ));
                }
                self.products
                    .remove(&id)
                    .ok_or_else(|| AppError::NotFound("Product".to_string()))?;
            }
            Change::InsertTransaction(transaction) => {
                let product = self
                    .products
                    .get_mut(&transaction.product_id)
                    .ok_or_else(|| AppError::NotFound("Product".to_string()))?;
                product.transactions.push(transaction);
            }
            Change::DeleteTransaction(id) => {
                let product = self
                    .products
                    .values_mut()
                    .find(|p| p.transactions.iter().any(|t| t.id == id))
                    .ok_or_else(|| AppError::NotFound("Transaction".to_string()))?;
                product.transactions.retain(|t| t.id != id);
            }
            Change::ConfirmPickup(id) => {
                let transaction = self
                    .products
                    .values_mut()
                    .flat_map(|p| p.transactions.iter_mut())
                    .find(|t| t.id == id)
                    .ok_or_else(|| AppError::NotFound("Transaction".to_string()))?;
                transaction.pickup_confirmed = true;
            }
            Change::CreateOrder(order) => {
                self.ensure_lines_reference_products(&order)?;
                self.orders.insert(order.id, order);
            }
            Change::UpdateOrder(order) => {
                self.ensure_lines_reference_products(&order)?;
                if !self.orders.contains_key(&order.id) {
                    return Err(AppError::NotFound("Order".to_string()));
                }
                self.orders.insert(order.id, order);
            }
            Change::DeleteOrder(id) => {
                self.orders
                    .remove(&id)
                    .ok_or_else(|| AppError::NotFound("Order".to_string()))?;
                self.invoices.retain(|_, i| i.order_id != id);
            }
            Change::CreateInvoice(invoice) => {
                if !self.orders.contains_key(&invoice.order_id) {
                    return Err(AppError::NotFound("Order".to_string()));
                }
                if self.invoices.values().any(|i| i.order_id == invoice.order_id) {
                    return Err(AppError::conflict("invoice", "Order already has an invoice"));
                }
                self.invoices.insert(invoice.id, invoice);
            }
            Change::UpdateInvoice(invoice) => {
                if !self.invoices.contains_key(&invoice.id) {
                    return Err(AppError::NotFound("Invoice".to_string()));
                }
                self.invoices.insert(invoice.id, invoice);
            }
            Change::DeleteInvoice(id) => {
                self.invoices
                    .remove(&id)
                    .ok_or_else(|| AppError::NotFound("Invoice".to_string()))?;
            }
            Change::CreateUser(user) => {
                self.ensure_unique_email(user.id, &user.email)?;
                self.users.insert(user.id, user);
            }
            Change::UpdateUser(user) => {
                self.ensure_unique_email(user.id, &user.email)?;
                if !self.users.contains_key(&user.id) {
                    return Err(AppError::NotFound("User".to_string()));
                }
                self.users.insert(user.id, user);
            }
            Change::DeleteUser(id) => {
                self.users
                    .remove(&id)
                    .ok_or_else(|| AppError::NotFound("User".to_string()))?;
            }
        }
        Ok(())
    }

    fn ensure_unique_product_name(&self, id: Uuid, name: &str) -> AppResult<()> {
        if self
            .products
            .values()
            .any(|p| p.id != id && p.product_name == name)
        {
            return Err(AppError::conflict("productName", "Product already exists"));
        }
        Ok(())
    }

    fn ensure_unique_email(&self, id: Uuid, email: &str) -> AppResult<()> {
        if self.users.values().any(|u| u.id != id && u.email == email) {
            return Err(AppError::conflict("email", "Email is already registered"));
        }
        Ok(())
    }

    fn ensure_lines_reference_products(&self, order: &Order) -> AppResult<()> {
        match order
            .products
            .iter()
            .find(|l| !self.products.contains_key(&l.product_id))
        {
            Some(line) => Err(AppError::NotFound(format!("Product {}", line.product_id))),
            None => Ok(()),
        }
    }
}

/// Record store held in process memory
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn get_product(&self, id: Uuid) -> AppResult<Option<Product>> {
        Ok(self.tables.read().await.products.get(&id).cloned())
    }

    async fn find_product_by_name(&self, name: &str) -> AppResult<Option<Product>> {
        let tables = self.tables.read().await;
        Ok(tables
            .products
            .values()
            .find(|p| p.product_name == name)
            .cloned())
    }

    async fn list_products(&self) -> AppResult<Vec<Product>> {
        let tables = self.tables.read().await;
        let mut products: Vec<Product> = tables.products.values().cloned().collect();
        products.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.product_name.cmp(&b.product_name)));
        Ok(products)
    }

    async fn list_transactions(&self, product_id: Uuid) -> AppResult<Vec<StockTransaction>> {
        let tables = self.tables.read().await;
        Ok(tables
            .products
            .get(&product_id)
            .map(|p| p.transactions.clone())
            .unwrap_or_default())
    }

    async fn find_transaction_by_order(&self, order_id: Uuid) -> AppResult<Option<StockTransaction>> {
        let tables = self.tables.read().await;
        Ok(tables
            .products
            .values()
            .flat_map(|p| p.transactions.iter())
            .filter(|t| t.order_id == Some(order_id))
            .max_by_key(|t| t.created_at)
            .cloned())
    }

    async fn get_order(&self, id: Uuid) -> AppResult<Option<Order>> {
        Ok(self.tables.read().await.orders.get(&id).cloned())
    }

    async fn list_orders(&self, filter: &OrderFilter) -> AppResult<Vec<Order>> {
        let tables = self.tables.read().await;
        let mut orders: Vec<Order> = tables
            .orders
            .values()
            .filter(|o| filter.matches(o))
            .cloned()
            .collect();
        orders.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(orders)
    }

    async fn count_orders(&self, filter: &OrderFilter) -> AppResult<i64> {
        let tables = self.tables.read().await;
        Ok(tables.orders.values().filter(|o| filter.matches(o)).count() as i64)
    }

    async fn get_invoice(&self, id: Uuid) -> AppResult<Option<Invoice>> {
        Ok(self.tables.read().await.invoices.get(&id).cloned())
    }

    async fn get_invoice_by_order(&self, order_id: Uuid) -> AppResult<Option<Invoice>> {
        let tables = self.tables.read().await;
        Ok(tables
            .invoices
            .values()
            .find(|i| i.order_id == order_id)
            .cloned())
    }

    async fn list_invoices(&self) -> AppResult<Vec<Invoice>> {
        let tables = self.tables.read().await;
        let mut invoices: Vec<Invoice> = tables.invoices.values().cloned().collect();
        invoices.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(invoices)
    }

    async fn get_user(&self, id: Uuid) -> AppResult<Option<User>> {
        Ok(self.tables.read().await.users.get(&id).cloned())
    }

    async fn find_user_by_email(&self, email: &str) -> AppResult<Option<User>> {
        let tables = self.tables.read().await;
        Ok(tables.users.values().find(|u| u.email == email).cloned())
    }

    async fn find_user_by_verify_token(&self, token: &str) -> AppResult<Option<User>> {
        let tables = self.tables.read().await;
        Ok(tables
            .users
            .values()
            .find(|u| u.verify_token.as_deref() == Some(token))
            .cloned())
    }

    async fn find_user_by_reset_token(&self, token: &str) -> AppResult<Option<User>> {
        let tables = self.tables.read().await;
        Ok(tables
            .users
            .values()
            .find(|u| u.forgot_password_token.as_deref() == Some(token))
            .cloned())
    }

    async fn list_users(&self) -> AppResult<Vec<User>> {
        let tables = self.tables.read().await;
        let mut users: Vec<User> = tables.users.values().cloned().collect();
        users.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(users)
    }

    async fn commit(&self, work: UnitOfWork) -> AppResult<()> {
        let mut tables = self.tables.write().await;
        let mut staged = tables.clone();
        for change in work.into_changes() {
            staged.apply(change)?;
        }
        *tables = staged;
        Ok(())
    }

    async fn ping(&self) -> bool {
        true
    }

    fn kind(&self) -> &'static str {
        "memory"
    }
}
