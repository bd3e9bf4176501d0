//! Stock ledger rules
//!
//! Pure operations over a loaded [`Product`] and its transaction history.
//! Every function validates before it mutates, so an `Err` leaves the product
//! exactly as it was. Persistence and locking are the caller's concern.
//!
//! Stock fields:
//! - `available_stock` moves on restock, issue, payment and transaction deletion
//! - `stock_balance` moves on restock, transaction deletion and pickup

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;
use uuid::Uuid;

use crate::error::{LedgerError, LedgerResult};
use crate::models::{Product, StockTransaction, TransactionStatus};
use crate::money::euro_to_cedi;
use crate::types::PaymentStatus;
use crate::validation::{validate_amount, validate_quantity};

/// Input for a receipt of new stock
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RestockInput {
    pub qty_received: i64,
    pub received_from: String,
    pub value_in_euro: Decimal,
    pub selling_price: Decimal,
    pub cedi_conversion_rate: Decimal,
    pub out_of_order_date: Option<DateTime<Utc>>,
}

/// Input for an issue of stock to a farmer
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IssueInput {
    pub qty_issued: i64,
    pub received_from_issued_to: String,
    pub invoiced_amount: Decimal,
    pub order_id: Option<Uuid>,
}

fn check_quantity(field: &str, quantity: i64) -> LedgerResult<()> {
    validate_quantity(quantity).map_err(|msg| LedgerError::validation(field, msg))
}

fn check_amount(field: &str, amount: Decimal) -> LedgerResult<()> {
    validate_amount(amount).map_err(|msg| LedgerError::validation(field, msg))
}

fn add_stock(product: &Product, delta: i64) -> LedgerResult<(i64, i64)> {
    let available = product.available_stock.checked_add(delta);
    let balance = product.stock_balance.checked_add(delta);
    match (available, balance) {
        (Some(available), Some(balance)) => Ok((available, balance)),
        _ => Err(LedgerError::validation("quantity", "Stock level out of range")),
    }
}

/// Record incoming stock. The restock selling price becomes the product's
/// quoted price.
pub fn restock(
    product: &mut Product,
    input: RestockInput,
    now: DateTime<Utc>,
) -> LedgerResult<StockTransaction> {
    check_quantity("qtyReceived", input.qty_received)?;
    check_amount("valueInEuro", input.value_in_euro)?;
    check_amount("sellingPrice", input.selling_price)?;
    check_amount("cediConversionRate", input.cedi_conversion_rate)?;

    let (available, balance) = add_stock(product, input.qty_received)?;
    let value_in_cedi = euro_to_cedi("valueInEuro", input.value_in_euro, input.cedi_conversion_rate)?;

    let transaction = StockTransaction {
        id: Uuid::new_v4(),
        product_id: product.id,
        status: TransactionStatus::Receipt,
        received_from_issued_to: input.received_from,
        qty_received: input.qty_received,
        qty_issued: 0,
        cedi_conversion_rate: input.cedi_conversion_rate,
        pro_forma: 0,
        invoiced: Decimal::ZERO,
        farmer_balance: 0,
        available_stock: available,
        stock_balance: balance,
        order_id: None,
        invoice_status: None,
        pickup_confirmed: false,
        value_in_euro: input.value_in_euro,
        value_in_cedi,
        out_of_order_date: input.out_of_order_date,
        created_at: now,
    };

    product.available_stock = available;
    product.stock_balance = balance;
    product.selling_price = input.selling_price;
    product.updated_at = now;
    product.transactions.push(transaction.clone());

    Ok(transaction)
}

/// Most recent receipt on the product. Equal timestamps resolve to the entry
/// inserted last.
pub fn latest_receipt(product: &Product) -> Option<&StockTransaction> {
    product
        .transactions
        .iter()
        .filter(|t| t.is_receipt())
        .fold(None, |latest, t| match latest {
            Some(l) if l.created_at > t.created_at => Some(l),
            _ => Some(t),
        })
}

/// Allocate stock to a farmer. Only `available_stock` moves; the goods stay
/// in the gross balance until pickup.
pub fn issue(
    product: &mut Product,
    input: IssueInput,
    now: DateTime<Utc>,
) -> LedgerResult<StockTransaction> {
    check_quantity("qtyIssued", input.qty_issued)?;
    check_amount("invoicedAmount", input.invoiced_amount)?;

    if input.qty_issued > product.available_stock {
        return Err(LedgerError::InsufficientStock {
            product: product.product_name.clone(),
            requested: input.qty_issued,
            available: product.available_stock,
        });
    }

    let rate = latest_receipt(product)
        .map(|t| t.cedi_conversion_rate)
        .ok_or_else(|| LedgerError::NoConversionRate(product.product_name.clone()))?;

    let available = product.available_stock - input.qty_issued;
    let value_in_cedi = euro_to_cedi("invoicedAmount", input.invoiced_amount, rate)?;

    let transaction = StockTransaction {
        id: Uuid::new_v4(),
        product_id: product.id,
        status: TransactionStatus::Issue,
        received_from_issued_to: input.received_from_issued_to,
        qty_received: 0,
        qty_issued: input.qty_issued,
        cedi_conversion_rate: rate,
        pro_forma: input.qty_issued,
        invoiced: input.invoiced_amount,
        farmer_balance: input.qty_issued,
        available_stock: available,
        stock_balance: product.stock_balance,
        order_id: input.order_id,
        invoice_status: Some(PaymentStatus::Paid),
        pickup_confirmed: false,
        value_in_euro: input.invoiced_amount,
        value_in_cedi,
        out_of_order_date: Some(now),
        created_at: now,
    };

    product.available_stock = available;
    product.updated_at = now;
    product.transactions.push(transaction.clone());

    Ok(transaction)
}

/// Remove a transaction and reverse its stock effect. Returns the removed
/// entry.
pub fn delete_transaction(
    product: &mut Product,
    transaction_id: Uuid,
    now: DateTime<Utc>,
) -> LedgerResult<StockTransaction> {
    let index = product
        .transactions
        .iter()
        .position(|t| t.id == transaction_id)
        .ok_or_else(|| LedgerError::NotFound("Transaction".to_string()))?;

    let transaction = &product.transactions[index];
    let (available, balance) = match transaction.status {
        TransactionStatus::Receipt => {
            if product.available_stock < transaction.qty_received {
                return Err(LedgerError::NegativeStockGuard {
                    product: product.product_name.clone(),
                });
            }
            add_stock(product, -transaction.qty_received)?
        }
        TransactionStatus::Issue => add_stock(product, transaction.qty_issued)?,
    };

    product.available_stock = available;
    product.stock_balance = balance;
    product.updated_at = now;
    Ok(product.transactions.remove(index))
}

/// Deduct available stock for a paid order line
pub fn commit_quantity(product: &mut Product, quantity: i64, now: DateTime<Utc>) -> LedgerResult<()> {
    check_quantity("quantity", quantity)?;
    if quantity > product.available_stock {
        return Err(LedgerError::InsufficientStock {
            product: product.product_name.clone(),
            requested: quantity,
            available: product.available_stock,
        });
    }
    product.available_stock -= quantity;
    product.updated_at = now;
    Ok(())
}

/// Return previously committed stock to availability (used when a committed
/// order's lines are re-priced)
pub fn uncommit_quantity(product: &mut Product, quantity: i64, now: DateTime<Utc>) -> LedgerResult<()> {
    check_quantity("quantity", quantity)?;
    let available = product
        .available_stock
        .checked_add(quantity)
        .filter(|a| *a <= product.stock_balance)
        .ok_or_else(|| LedgerError::validation("quantity", "Returned quantity exceeds stock balance"))?;
    product.available_stock = available;
    product.updated_at = now;
    Ok(())
}

/// Deduct gross stock for goods handed over at pickup. The balance may not
/// drop below what is still available for sale.
pub fn release_quantity(product: &mut Product, quantity: i64, now: DateTime<Utc>) -> LedgerResult<()> {
    check_quantity("quantity", quantity)?;
    let releasable = product.stock_balance - product.available_stock;
    if quantity > releasable {
        return Err(LedgerError::InsufficientStock {
            product: product.product_name.clone(),
            requested: quantity,
            available: releasable,
        });
    }
    product.stock_balance -= quantity;
    product.updated_at = now;
    Ok(())
}
