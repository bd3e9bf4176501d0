//! PostgreSQL record store
//!
//! Runtime-checked queries mapped through `FromRow` rows. Status enums are
//! stored as TEXT and parsed on the way out. Every unit of work runs in one
//! SQL transaction.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use shared::{
    Currency, Invoice, Order, OrderFilter, OrderLine, OrderStatus, PaymentStatus, PickupStatus, Product,
    ReservationState, Role, StockTransaction, TransactionStatus, User,
};
use sqlx::{FromRow, PgPool, Postgres, QueryBuilder, Transaction};
use uuid::Uuid;

use super::{Change, Store, UnitOfWork};
use crate::error::{AppError, AppResult};

/// Record store backed by a PostgreSQL pool
#[derive(Clone)]
pub struct PgStore {
    db: PgPool,
}

impl PgStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    pub fn pool(&self) -> &PgPool {
        &self.db
    }
}

fn parse_column<T>(value: &str, column: &str, parse: impl Fn(&str) -> Option<T>) -> AppResult<T> {
    parse(value).ok_or_else(|| AppError::Internal(format!("Unexpected {} value '{}'", column, value)))
}

fn map_write_error(err: sqlx::Error, resource: &str, message: &str) -> AppError {
    match &err {
        sqlx::Error::Database(db) if db.is_unique_violation() => AppError::conflict(resource, message),
        sqlx::Error::Database(db) if db.is_foreign_key_violation() => {
            AppError::conflict(resource, "Record is referenced by or references a missing record")
        }
        sqlx::Error::Database(db) if db.is_check_violation() => {
            AppError::validation(resource, "Write would break a stock constraint")
        }
        _ => AppError::DatabaseError(err),
    }
}

fn ensure_affected(rows: u64, resource: &str) -> AppResult<()> {
    if rows == 0 {
        return Err(AppError::NotFound(resource.to_string()));
    }
    Ok(())
}

// ============================================================================
// Rows
// ============================================================================

const PRODUCT_COLUMNS: &str = "id, product_name, stock_keeping_unit, unit_price, selling_price, \
     available_stock, stock_balance, re_order_level, created_at, updated_at";

#[derive(Debug, FromRow)]
struct ProductRow {
    id: Uuid,
    product_name: String,
    stock_keeping_unit: String,
    unit_price: Decimal,
    selling_price: Decimal,
    available_stock: i64,
    stock_balance: i64,
    re_order_level: i64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl ProductRow {
    fn into_model(self, transactions: Vec<StockTransaction>) -> Product {
        Product {
            id: self.id,
            product_name: self.product_name,
            stock_keeping_unit: self.stock_keeping_unit,
            unit_price: self.unit_price,
            selling_price: self.selling_price,
            available_stock: self.available_stock,
            stock_balance: self.stock_balance,
            re_order_level: self.re_order_level,
            transactions,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

const TRANSACTION_COLUMNS: &str = "id, product_id, status, received_from_issued_to, qty_received, \
     qty_issued, cedi_conversion_rate, pro_forma, invoiced, farmer_balance, available_stock, \
     stock_balance, order_id, invoice_status, pickup_confirmed, value_in_euro, value_in_cedi, \
     out_of_order_date, created_at";

#[derive(Debug, FromRow)]
struct TransactionRow {
    id: Uuid,
    product_id: Uuid,
    status: String,
    received_from_issued_to: String,
    qty_received: i64,
    qty_issued: i64,
    cedi_conversion_rate: Decimal,
    pro_forma: i64,
    invoiced: Decimal,
    farmer_balance: i64,
    available_stock: i64,
    stock_balance: i64,
    order_id: Option<Uuid>,
    invoice_status: Option<String>,
    pickup_confirmed: bool,
    value_in_euro: Decimal,
    value_in_cedi: Decimal,
    out_of_order_date: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
}

impl TryFrom<TransactionRow> for StockTransaction {
    type Error = AppError;

    fn try_from(row: TransactionRow) -> AppResult<Self> {
        let invoice_status = row
            .invoice_status
            .as_deref()
            .map(|s| parse_column(s, "invoice_status", PaymentStatus::parse))
            .transpose()?;
        Ok(StockTransaction {
            id: row.id,
            product_id: row.product_id,
            status: parse_column(&row.status, "status", TransactionStatus::parse)?,
            received_from_issued_to: row.received_from_issued_to,
            qty_received: row.qty_received,
            qty_issued: row.qty_issued,
            cedi_conversion_rate: row.cedi_conversion_rate,
            pro_forma: row.pro_forma,
            invoiced: row.invoiced,
            farmer_balance: row.farmer_balance,
            available_stock: row.available_stock,
            stock_balance: row.stock_balance,
            order_id: row.order_id,
            invoice_status,
            pickup_confirmed: row.pickup_confirmed,
            value_in_euro: row.value_in_euro,
            value_in_cedi: row.value_in_cedi,
            out_of_order_date: row.out_of_order_date,
            created_at: row.created_at,
        })
    }
}

const ORDER_COLUMNS: &str = "id, farmer_id, total_cost, order_status, payment_status, awaiting_pickup, \
     reservation, invoice_id, invoice_generated, created_at";

#[derive(Debug, FromRow)]
struct OrderRow {
    id: Uuid,
    farmer_id: Uuid,
    total_cost: Decimal,
    order_status: String,
    payment_status: String,
    awaiting_pickup: String,
    reservation: String,
    invoice_id: Option<Uuid>,
    invoice_generated: bool,
    created_at: DateTime<Utc>,
}

impl OrderRow {
    fn into_model(self, products: Vec<OrderLine>) -> AppResult<Order> {
        Ok(Order {
            id: self.id,
            farmer_id: self.farmer_id,
            products,
            total_cost: self.total_cost,
            order_status: parse_column(&self.order_status, "order_status", OrderStatus::parse)?,
            payment_status: parse_column(&self.payment_status, "payment_status", PaymentStatus::parse)?,
            awaiting_pickup: parse_column(&self.awaiting_pickup, "awaiting_pickup", PickupStatus::parse)?,
            reservation: parse_column(&self.reservation, "reservation", ReservationState::parse)?,
            invoice_id: self.invoice_id,
            invoice_generated: self.invoice_generated,
            created_at: self.created_at,
        })
    }
}

#[derive(Debug, FromRow)]
struct OrderLineRow {
    order_id: Uuid,
    product_id: Uuid,
    product_name: String,
    quantity: i64,
    unit_price: Decimal,
    cost: Decimal,
}

impl From<OrderLineRow> for OrderLine {
    fn from(row: OrderLineRow) -> Self {
        OrderLine {
            product_id: row.product_id,
            product_name: row.product_name,
            quantity: row.quantity,
            unit_price: row.unit_price,
            cost: row.cost,
        }
    }
}

const INVOICE_COLUMNS: &str = "id, order_id, farmer_id, currency, farmer_name, total_amount, status, \
     pdf_download_link, email_sent, created_at, updated_at";

#[derive(Debug, FromRow)]
struct InvoiceRow {
    id: Uuid,
    order_id: Uuid,
    farmer_id: Uuid,
    currency: String,
    farmer_name: String,
    total_amount: Decimal,
    status: String,
    pdf_download_link: String,
    email_sent: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<InvoiceRow> for Invoice {
    type Error = AppError;

    fn try_from(row: InvoiceRow) -> AppResult<Self> {
        Ok(Invoice {
            id: row.id,
            order_id: row.order_id,
            farmer_id: row.farmer_id,
            currency: parse_column(&row.currency, "currency", Currency::parse)?,
            farmer_name: row.farmer_name,
            total_amount: row.total_amount,
            status: parse_column(&row.status, "status", PaymentStatus::parse)?,
            pdf_download_link: row.pdf_download_link,
            email_sent: row.email_sent,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

const USER_COLUMNS: &str = "id, first_name, last_name, email, password_hash, farm_name, farm_location, \
     tel_number, role, email_verified, admin_verified, refresh_token_hash, tokens_revoked_at, \
     verify_token, verify_token_expiry, forgot_password_token, forgot_password_token_expiry, \
     created_at, updated_at";

#[derive(Debug, FromRow)]
struct UserRow {
    id: Uuid,
    first_name: Option<String>,
    last_name: Option<String>,
    email: String,
    password_hash: String,
    farm_name: Option<String>,
    farm_location: Option<String>,
    tel_number: Option<String>,
    role: String,
    email_verified: bool,
    admin_verified: bool,
    refresh_token_hash: Option<String>,
    tokens_revoked_at: Option<DateTime<Utc>>,
    verify_token: Option<String>,
    verify_token_expiry: Option<DateTime<Utc>>,
    forgot_password_token: Option<String>,
    forgot_password_token_expiry: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<UserRow> for User {
    type Error = AppError;

    fn try_from(row: UserRow) -> AppResult<Self> {
        Ok(User {
            id: row.id,
            first_name: row.first_name,
            last_name: row.last_name,
            email: row.email,
            password_hash: row.password_hash,
            farm_name: row.farm_name,
            farm_location: row.farm_location,
            tel_number: row.tel_number,
            role: parse_column(&row.role, "role", Role::parse)?,
            email_verified: row.email_verified,
            admin_verified: row.admin_verified,
            refresh_token_hash: row.refresh_token_hash,
            tokens_revoked_at: row.tokens_revoked_at,
            verify_token: row.verify_token,
            verify_token_expiry: row.verify_token_expiry,
            forgot_password_token: row.forgot_password_token,
            forgot_password_token_expiry: row.forgot_password_token_expiry,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

// ============================================================================
// Reads
// ============================================================================

impl PgStore {
    async fn transactions_for(&self, product_ids: &[Uuid]) -> AppResult<HashMap<Uuid, Vec<StockTransaction>>> {
        let rows = sqlx::query_as::<_, TransactionRow>(&format!(
            "SELECT {} FROM stock_transactions WHERE product_id = ANY($1) ORDER BY seq",
            TRANSACTION_COLUMNS
        ))
        .bind(product_ids)
        .fetch_all(&self.db)
        .await?;

        let mut grouped: HashMap<Uuid, Vec<StockTransaction>> = HashMap::new();
        for row in rows {
            let transaction = StockTransaction::try_from(row)?;
            grouped.entry(transaction.product_id).or_default().push(transaction);
        }
        Ok(grouped)
    }

    async fn attach_transactions(&self, rows: Vec<ProductRow>) -> AppResult<Vec<Product>> {
        let ids: Vec<Uuid> = rows.iter().map(|r| r.id).collect();
        let mut transactions = self.transactions_for(&ids).await?;
        Ok(rows
            .into_iter()
            .map(|row| {
                let history = transactions.remove(&row.id).unwrap_or_default();
                row.into_model(history)
            })
            .collect())
    }

    async fn attach_lines(&self, rows: Vec<OrderRow>) -> AppResult<Vec<Order>> {
        let ids: Vec<Uuid> = rows.iter().map(|r| r.id).collect();
        let line_rows = sqlx::query_as::<_, OrderLineRow>(
            r#"
            SELECT order_id, product_id, product_name, quantity, unit_price, cost
            FROM order_lines
            WHERE order_id = ANY($1)
            ORDER BY order_id, line_no
            "#,
        )
        .bind(&ids)
        .fetch_all(&self.db)
        .await?;

        let mut lines: HashMap<Uuid, Vec<OrderLine>> = HashMap::new();
        for row in line_rows {
            lines.entry(row.order_id).or_default().push(row.into());
        }

        rows.into_iter()
            .map(|row| {
                let order_lines = lines.remove(&row.id).unwrap_or_default();
                row.into_model(order_lines)
            })
            .collect()
    }

    async fn find_user_where(&self, column: &str, value: &str) -> AppResult<Option<User>> {
        sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {} FROM users WHERE {} = $1",
            USER_COLUMNS, column
        ))
        .bind(value)
        .fetch_optional(&self.db)
        .await?
        .map(User::try_from)
        .transpose()
    }
}

fn push_order_filter(builder: &mut QueryBuilder<'_, Postgres>, filter: &OrderFilter) {
    builder.push(" WHERE TRUE");
    if let Some(farmer_id) = filter.farmer_id {
        builder.push(" AND farmer_id = ").push_bind(farmer_id);
    }
    if let Some(status) = filter.order_status {
        builder.push(" AND order_status = ").push_bind(status.as_str());
    }
    if let Some(status) = filter.payment_status {
        builder.push(" AND payment_status = ").push_bind(status.as_str());
    }
}

// ============================================================================
// Writes
// ============================================================================

async fn insert_order_lines(tx: &mut Transaction<'_, Postgres>, order: &Order) -> AppResult<()> {
    for (line_no, line) in order.products.iter().enumerate() {
        sqlx::query(
            r#"
            INSERT INTO order_lines (order_id, line_no, product_id, product_name, quantity, unit_price, cost)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(order.id)
        .bind(line_no as i32)
        .bind(line.product_id)
        .bind(&line.product_name)
        .bind(line.quantity)
        .bind(line.unit_price)
        .bind(line.cost)
        .execute(&mut **tx)
        .await
        .map_err(|e| match &e {
            sqlx::Error::Database(db) if db.is_foreign_key_violation() => {
                AppError::NotFound(format!("Product {}", line.product_id))
            }
            _ => AppError::DatabaseError(e),
        })?;
    }
    Ok(())
}

async fn apply(tx: &mut Transaction<'_, Postgres>, change: Change) -> AppResult<()> {
    match change {
        Change::CreateProduct(product) => {
            sqlx::query(
                r#"
                INSERT INTO products (id, product_name, stock_keeping_unit, unit_price, selling_price,
                                      available_stock, stock_balance, re_order_level, created_at, updated_at)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
                "#,
            )
            .bind(product.id)
            .bind(&product.product_name)
            .bind(&product.stock_keeping_unit)
            .bind(product.unit_price)
            .bind(product.selling_price)
            .bind(product.available_stock)
            .bind(product.stock_balance)
            .bind(product.re_order_level)
            .bind(product.created_at)
            .bind(product.updated_at)
            .execute(&mut **tx)
            .await
            .map_err(|e| map_write_error(e, "productName", "Product already exists"))?;
        }
        Change::UpdateProduct(product) => {
            let result = sqlx::query(
                r#"
                UPDATE products
                SET product_name = $2, stock_keeping_unit = $3, unit_price = $4, selling_price = $5,
                    available_stock = $6, stock_balance = $7, re_order_level = $8, updated_at = $9
                WHERE id = $1
                "#,
            )
            .bind(product.id)
            .bind(&product.product_name)
            .bind(&product.stock_keeping_unit)
            .bind(product.unit_price)
            .bind(product.selling_price)
            .bind(product.available_stock)
            .bind(product.stock_balance)
            .bind(product.re_order_level)
            .bind(product.updated_at)
            .execute(&mut **tx)
            .await
            .map_err(|e| map_write_error(e, "productName", "Product already exists"))?;
            ensure_affected(result.rows_affected(), "Product")?;
        }
        Change::DeleteProduct(id) => {
            let referenced = sqlx::query_scalar::<_, bool>(
                "SELECT EXISTS(SELECT 1 FROM order_lines WHERE product_id = $1)",
            )
            .bind(id)
            .fetch_one(&mut **tx)
            .await?;
            if referenced {
                return Err(AppError::conflict("product", "Product is referenced by existing orders"));
            }
            let result = sqlx::query("DELETE FROM products WHERE id = $1")
                .bind(id)
                .execute(&mut **tx)
                .await?;
            ensure_affected(result.rows_affected(), "Product")?;
        }
        Change::InsertTransaction(t) => {
            sqlx::query(
                r#"
                INSERT INTO stock_transactions (
                    id, product_id, status, received_from_issued_to, qty_received, qty_issued,
                    cedi_conversion_rate, pro_forma, invoiced, farmer_balance, available_stock,
                    stock_balance, order_id, invoice_status, pickup_confirmed, value_in_euro,
                    value_in_cedi, out_of_order_date, created_at
                )
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18, $19)
                "#,
            )
            .bind(t.id)
            .bind(t.product_id)
            .bind(t.status.as_str())
            .bind(&t.received_from_issued_to)
            .bind(t.qty_received)
            .bind(t.qty_issued)
            .bind(t.cedi_conversion_rate)
            .bind(t.pro_forma)
            .bind(t.invoiced)
            .bind(t.farmer_balance)
            .bind(t.available_stock)
            .bind(t.stock_balance)
            .bind(t.order_id)
            .bind(t.invoice_status.map(|s| s.as_str()))
            .bind(t.pickup_confirmed)
            .bind(t.value_in_euro)
            .bind(t.value_in_cedi)
            .bind(t.out_of_order_date)
            .bind(t.created_at)
            .execute(&mut **tx)
            .await?;
        }
        Change::DeleteTransaction(id) => {
            let result = sqlx::query("DELETE FROM stock_transactions WHERE id = $1")
                .bind(id)
                .execute(&mut **tx)
                .await?;
            ensure_affected(result.rows_affected(), "Transaction")?;
        }
        Change::ConfirmPickup(id) => {
            let result = sqlx::query("UPDATE stock_transactions SET pickup_confirmed = TRUE WHERE id = $1")
                .bind(id)
                .execute(&mut **tx)
                .await?;
            ensure_affected(result.rows_affected(), "Transaction")?;
        }
        Change::CreateOrder(order) => {
            sqlx::query(
                r#"
                INSERT INTO orders (id, farmer_id, total_cost, order_status, payment_status,
                                    awaiting_pickup, reservation, invoice_id, invoice_generated, created_at)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
                "#,
            )
            .bind(order.id)
            .bind(order.farmer_id)
            .bind(order.total_cost)
            .bind(order.order_status.as_str())
            .bind(order.payment_status.as_str())
            .bind(order.awaiting_pickup.as_str())
            .bind(order.reservation.as_str())
            .bind(order.invoice_id)
            .bind(order.invoice_generated)
            .bind(order.created_at)
            .execute(&mut **tx)
            .await?;
            insert_order_lines(tx, &order).await?;
        }
        Change::UpdateOrder(order) => {
            let result = sqlx::query(
                r#"
                UPDATE orders
                SET total_cost = $2, order_status = $3, payment_status = $4, awaiting_pickup = $5,
                    reservation = $6, invoice_id = $7, invoice_generated = $8
                WHERE id = $1
                "#,
            )
            .bind(order.id)
            .bind(order.total_cost)
            .bind(order.order_status.as_str())
            .bind(order.payment_status.as_str())
            .bind(order.awaiting_pickup.as_str())
            .bind(order.reservation.as_str())
            .bind(order.invoice_id)
            .bind(order.invoice_generated)
            .execute(&mut **tx)
            .await?;
            ensure_affected(result.rows_affected(), "Order")?;

            sqlx::query("DELETE FROM order_lines WHERE order_id = $1")
                .bind(order.id)
                .execute(&mut **tx)
                .await?;
            insert_order_lines(tx, &order).await?;
        }
        Change::DeleteOrder(id) => {
            let result = sqlx::query("DELETE FROM orders WHERE id = $1")
                .bind(id)
                .execute(&mut **tx)
                .await?;
            ensure_affected(result.rows_affected(), "Order")?;
        }
        Change::CreateInvoice(invoice) => {
            sqlx::query(
                r#"
                INSERT INTO invoices (id, order_id, farmer_id, currency, farmer_name, total_amount,
                                      status, pdf_download_link, email_sent, created_at, updated_at)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
                "#,
            )
            .bind(invoice.id)
            .bind(invoice.order_id)
            .bind(invoice.farmer_id)
            .bind(invoice.currency.as_str())
            .bind(&invoice.farmer_name)
            .bind(invoice.total_amount)
            .bind(invoice.status.as_str())
            .bind(&invoice.pdf_download_link)
            .bind(invoice.email_sent)
            .bind(invoice.created_at)
            .bind(invoice.updated_at)
            .execute(&mut **tx)
            .await
            .map_err(|e| map_write_error(e, "invoice", "Order already has an invoice"))?;
        }
        Change::UpdateInvoice(invoice) => {
            let result = sqlx::query(
                r#"
                UPDATE invoices
                SET status = $2, pdf_download_link = $3, email_sent = $4, updated_at = $5
                WHERE id = $1
                "#,
            )
            .bind(invoice.id)
            .bind(invoice.status.as_str())
            .bind(&invoice.pdf_download_link)
            .bind(invoice.email_sent)
            .bind(invoice.updated_at)
            .execute(&mut **tx)
            .await?;
            ensure_affected(result.rows_affected(), "Invoice")?;
        }
        Change::DeleteInvoice(id) => {
            let result = sqlx::query("DELETE FROM invoices WHERE id = $1")
                .bind(id)
                .execute(&mut **tx)
                .await?;
            ensure_affected(result.rows_affected(), "Invoice")?;
        }
        Change::CreateUser(user) => {
            sqlx::query(&format!(
                "INSERT INTO users ({}) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, \
                 $14, $15, $16, $17, $18, $19)",
                USER_COLUMNS
            ))
            .bind(user.id)
            .bind(&user.first_name)
            .bind(&user.last_name)
            .bind(&user.email)
            .bind(&user.password_hash)
            .bind(&user.farm_name)
            .bind(&user.farm_location)
            .bind(&user.tel_number)
            .bind(user.role.as_str())
            .bind(user.email_verified)
            .bind(user.admin_verified)
            .bind(&user.refresh_token_hash)
            .bind(user.tokens_revoked_at)
            .bind(&user.verify_token)
            .bind(user.verify_token_expiry)
            .bind(&user.forgot_password_token)
            .bind(user.forgot_password_token_expiry)
            .bind(user.created_at)
            .bind(user.updated_at)
            .execute(&mut **tx)
            .await
            .map_err(|e| map_write_error(e, "email", "Email is already registered"))?;
        }
        Change::UpdateUser(user) => {
            let result = sqlx::query(
                r#"
                UPDATE users
                SET first_name = $2, last_name = $3, email = $4, password_hash = $5, farm_name = $6,
                    farm_location = $7, tel_number = $8, role = $9, email_verified = $10,
                    admin_verified = $11, refresh_token_hash = $12, tokens_revoked_at = $13,
                    verify_token = $14, verify_token_expiry = $15, forgot_password_token = $16,
                    forgot_password_token_expiry = $17, updated_at = $18
                WHERE id = $1
                "#,
            )
            .bind(user.id)
            .bind(&user.first_name)
            .bind(&user.last_name)
            .bind(&user.email)
            .bind(&user.password_hash)
            .bind(&user.farm_name)
            .bind(&user.farm_location)
            .bind(&user.tel_number)
            .bind(user.role.as_str())
            .bind(user.email_verified)
            .bind(user.admin_verified)
            .bind(&user.refresh_token_hash)
            .bind(user.tokens_revoked_at)
            .bind(&user.verify_token)
            .bind(user.verify_token_expiry)
            .bind(&user.forgot_password_token)
            .bind(user.forgot_password_token_expiry)
            .bind(user.updated_at)
            .execute(&mut **tx)
            .await
            .map_err(|e| map_write_error(e, "email", "Email is already registered"))?;
            ensure_affected(result.rows_affected(), "User")?;
        }
        Change::DeleteUser(id) => {
            let result = sqlx::query("DELETE FROM users WHERE id = $1")
                .bind(id)
                .execute(&mut **tx)
                .await?;
            ensure_affected(result.rows_affected(), "User")?;
        }
    }
    Ok(())
}

#[async_trait]
impl Store for PgStore {
    async fn get_product(&self, id: Uuid) -> AppResult<Option<Product>> {
        let row = sqlx::query_as::<_, ProductRow>(&format!(
            "SELECT {} FROM products WHERE id = $1",
            PRODUCT_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.db)
        .await?;

        match row {
            Some(row) => Ok(self.attach_transactions(vec![row]).await?.pop()),
            None => Ok(None),
        }
    }

    async fn find_product_by_name(&self, name: &str) -> AppResult<Option<Product>> {
        let row = sqlx::query_as::<_, ProductRow>(&format!(
            "SELECT {} FROM products WHERE product_name = $1",
            PRODUCT_COLUMNS
        ))
        .bind(name)
        .fetch_optional(&self.db)
        .await?;

        match row {
            Some(row) => Ok(self.attach_transactions(vec![row]).await?.pop()),
            None => Ok(None),
        }
    }

    async fn list_products(&self) -> AppResult<Vec<Product>> {
        let rows = sqlx::query_as::<_, ProductRow>(&format!(
            "SELECT {} FROM products ORDER BY created_at, product_name",
            PRODUCT_COLUMNS
        ))
        .fetch_all(&self.db)
        .await?;

        self.attach_transactions(rows).await
    }

    async fn list_transactions(&self, product_id: Uuid) -> AppResult<Vec<StockTransaction>> {
        Ok(self
            .transactions_for(&[product_id])
            .await?
            .remove(&product_id)
            .unwrap_or_default())
    }

    async fn find_transaction_by_order(&self, order_id: Uuid) -> AppResult<Option<StockTransaction>> {
        sqlx::query_as::<_, TransactionRow>(&format!(
            "SELECT {} FROM stock_transactions WHERE order_id = $1 ORDER BY created_at DESC, seq DESC LIMIT 1",
            TRANSACTION_COLUMNS
        ))
        .bind(order_id)
        .fetch_optional(&self.db)
        .await?
        .map(StockTransaction::try_from)
        .transpose()
    }

    async fn get_order(&self, id: Uuid) -> AppResult<Option<Order>> {
        let row = sqlx::query_as::<_, OrderRow>(&format!("SELECT {} FROM orders WHERE id = $1", ORDER_COLUMNS))
            .bind(id)
            .fetch_optional(&self.db)
            .await?;

        match row {
            Some(row) => Ok(self.attach_lines(vec![row]).await?.pop()),
            None => Ok(None),
        }
    }

    async fn list_orders(&self, filter: &OrderFilter) -> AppResult<Vec<Order>> {
        let mut builder = QueryBuilder::<Postgres>::new(format!("SELECT {} FROM orders", ORDER_COLUMNS));
        push_order_filter(&mut builder, filter);
        builder.push(" ORDER BY created_at DESC");

        let rows = builder.build_query_as::<OrderRow>().fetch_all(&self.db).await?;
        self.attach_lines(rows).await
    }

    async fn count_orders(&self, filter: &OrderFilter) -> AppResult<i64> {
        let mut builder = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM orders");
        push_order_filter(&mut builder, filter);

        let count = builder.build_query_scalar::<i64>().fetch_one(&self.db).await?;
        Ok(count)
    }

    async fn get_invoice(&self, id: Uuid) -> AppResult<Option<Invoice>> {
        sqlx::query_as::<_, InvoiceRow>(&format!("SELECT {} FROM invoices WHERE id = $1", INVOICE_COLUMNS))
            .bind(id)
            .fetch_optional(&self.db)
            .await?
            .map(Invoice::try_from)
            .transpose()
    }

    async fn get_invoice_by_order(&self, order_id: Uuid) -> AppResult<Option<Invoice>> {
        sqlx::query_as::<_, InvoiceRow>(&format!(
            "SELECT {} FROM invoices WHERE order_id = $1",
            INVOICE_COLUMNS
        ))
        .bind(order_id)
        .fetch_optional(&self.db)
        .await?
        .map(Invoice::try_from)
        .transpose()
    }

    async fn list_invoices(&self) -> AppResult<Vec<Invoice>> {
        sqlx::query_as::<_, InvoiceRow>(&format!(
            "SELECT {} FROM invoices ORDER BY created_at DESC",
            INVOICE_COLUMNS
        ))
        .fetch_all(&self.db)
        .await?
        .into_iter()
        .map(Invoice::try_from)
        .collect()
    }

    async fn get_user(&self, id: Uuid) -> AppResult<Option<User>> {
        sqlx::query_as::<_, UserRow>(&format!("SELECT {} FROM users WHERE id = $1", USER_COLUMNS))
            .bind(id)
            .fetch_optional(&self.db)
            .await?
            .map(User::try_from)
            .transpose()
    }

    async fn find_user_by_email(&self, email: &str) -> AppResult<Option<User>> {
        self.find_user_where("email", email).await
    }

    async fn find_user_by_verify_token(&self, token: &str) -> AppResult<Option<User>> {
        self.find_user_where("verify_token", token).await
    }

    async fn find_user_by_reset_token(&self, token: &str) -> AppResult<Option<User>> {
        self.find_user_where("forgot_password_token", token).await
    }

    async fn list_users(&self) -> AppResult<Vec<User>> {
        sqlx::query_as::<_, UserRow>(&format!("SELECT {} FROM users ORDER BY created_at", USER_COLUMNS))
            .fetch_all(&self.db)
            .await?
            .into_iter()
            .map(User::try_from)
            .collect()
    }

    async fn commit(&self, work: UnitOfWork) -> AppResult<()> {
        let mut tx = self.db.begin().await?;
        for change in work.into_changes() {
            apply(&mut tx, change).await?;
        }
        tx.commit().await?;
        Ok(())
    }

    async fn ping(&self) -> bool {
        sqlx::query("SELECT 1").execute(&self.db).await.is_ok()
    }

    fn kind(&self) -> &'static str {
        "postgres"
    }
}
