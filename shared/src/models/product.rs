//! Product catalogue models

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::StockTransaction;

/// A stocked product (fertiliser, agro-chemical, packaging...)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id: Uuid,
    /// Unique across the catalogue
    pub product_name: String,
    pub stock_keeping_unit: String,
    /// Purchase price per unit in Euro
    pub unit_price: Decimal,
    /// Quoted price per unit, overwritten by every restock
    pub selling_price: Decimal,
    /// Units immediately allocatable to new orders
    pub available_stock: i64,
    /// Gross physical stock, reduced only when goods leave the warehouse
    pub stock_balance: i64,
    pub re_order_level: i64,
    /// Ledger history in insertion order
    #[serde(default)]
    pub transactions: Vec<StockTransaction>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Product {
    pub fn new(
        product_name: impl Into<String>,
        stock_keeping_unit: impl Into<String>,
        re_order_level: i64,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            product_name: product_name.into(),
            stock_keeping_unit: stock_keeping_unit.into(),
            unit_price: Decimal::ZERO,
            selling_price: Decimal::ZERO,
            available_stock: 0,
            stock_balance: 0,
            re_order_level,
            transactions: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// True when available stock has fallen to the re-order level
    pub fn needs_reorder(&self) -> bool {
        self.available_stock <= self.re_order_level
    }

    /// `0 <= availableStock <= stockBalance`
    pub fn stock_is_consistent(&self) -> bool {
        self.available_stock >= 0 && self.stock_balance >= 0 && self.available_stock <= self.stock_balance
    }

    pub fn transaction(&self, transaction_id: Uuid) -> Option<&StockTransaction> {
        self.transactions.iter().find(|t| t.id == transaction_id)
    }

    /// Apply a catalogue patch. Stock fields belong to the ledger and are not
    /// patchable.
    pub fn apply_patch(&mut self, patch: &ProductPatch, now: DateTime<Utc>) {
        if let Some(name) = &patch.product_name {
            self.product_name = name.clone();
        }
        if let Some(sku) = &patch.stock_keeping_unit {
            self.stock_keeping_unit = sku.clone();
        }
        if let Some(price) = patch.unit_price {
            self.unit_price = price;
        }
        if let Some(price) = patch.selling_price {
            self.selling_price = price;
        }
        if let Some(level) = patch.re_order_level {
            self.re_order_level = level;
        }
        self.updated_at = now;
    }
}

/// Editable catalogue fields
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductPatch {
    pub product_name: Option<String>,
    pub stock_keeping_unit: Option<String>,
    pub unit_price: Option<Decimal>,
    pub selling_price: Option<Decimal>,
    pub re_order_level: Option<i64>,
}

impl ProductPatch {
    pub fn is_empty(&self) -> bool {
        self.product_name.is_none()
            && self.stock_keeping_unit.is_none()
            && self.unit_price.is_none()
            && self.selling_price.is_none()
            && self.re_order_level.is_none()
    }
}
