//! Product catalogue service

use std::sync::Arc;

use chrono::Utc;
use rust_decimal::Decimal;
use serde::Deserialize;
use shared::{
    validate_amount, validate_product_name, validate_re_order_level, validate_sku, Product, ProductPatch,
};
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::services::locks::LockRegistry;
use crate::store::{Change, Store};
use crate::AppState;

#[derive(Clone)]
pub struct ProductService {
    store: Arc<dyn Store>,
    locks: LockRegistry,
}

/// Input for adding a product to the catalogue
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddProductInput {
    pub product_name: String,
    pub stock_keeping_unit: String,
    #[serde(default)]
    pub re_order_level: i64,
    pub unit_price: Option<Decimal>,
    pub selling_price: Option<Decimal>,
}

fn check(field: &str, result: Result<(), &'static str>) -> AppResult<()> {
    result.map_err(|msg| AppError::validation(field, msg))
}

fn validate_patch(patch: &ProductPatch) -> AppResult<()> {
    if patch.is_empty() {
        return Err(AppError::ValidationError("No updatable fields supplied".to_string()));
    }
    if let Some(name) = &patch.product_name {
        check("productName", validate_product_name(name))?;
    }
    if let Some(sku) = &patch.stock_keeping_unit {
        check("stockKeepingUnit", validate_sku(sku))?;
    }
    if let Some(price) = patch.unit_price {
        check("unitPrice", validate_amount(price))?;
    }
    if let Some(price) = patch.selling_price {
        check("sellingPrice", validate_amount(price))?;
    }
    if let Some(level) = patch.re_order_level {
        check("reOrderLevel", validate_re_order_level(level))?;
    }
    Ok(())
}

impl ProductService {
    pub fn new(state: &AppState) -> Self {
        Self {
            store: state.store.clone(),
            locks: state.locks.clone(),
        }
    }

    /// Add a product with zero stock
    pub async fn add(&self, input: AddProductInput) -> AppResult<Product> {
        check("productName", validate_product_name(&input.product_name))?;
        check("stockKeepingUnit", validate_sku(&input.stock_keeping_unit))?;
        check("reOrderLevel", validate_re_order_level(input.re_order_level))?;

        let name = input.product_name.trim();
        if self.store.find_product_by_name(name).await?.is_some() {
            return Err(AppError::conflict("productName", "Product already exists"));
        }

        let mut product = Product::new(name, input.stock_keeping_unit.trim(), input.re_order_level, Utc::now());
        if let Some(price) = input.unit_price {
            check("unitPrice", validate_amount(price))?;
            product.unit_price = price;
        }
        if let Some(price) = input.selling_price {
            check("sellingPrice", validate_amount(price))?;
            product.selling_price = price;
        }

        self.store.commit(Change::CreateProduct(product.clone()).into()).await?;
        tracing::info!(product_id = %product.id, name = %product.product_name, "Product added");
        Ok(product)
    }

    pub async fn list(&self) -> AppResult<Vec<Product>> {
        self.store.list_products().await
    }

    pub async fn get(&self, id: Uuid) -> AppResult<Product> {
        self.store
            .get_product(id)
            .await?
            .ok_or_else(|| AppError::NotFound("Product".to_string()))
    }

    /// Patch catalogue fields; stock levels are untouched
    pub async fn update(&self, id: Uuid, mut patch: ProductPatch) -> AppResult<Product> {
        validate_patch(&patch)?;
        patch.product_name = patch.product_name.map(|n| n.trim().to_string());

        let _lock = self.locks.lock(id).await;
        let mut product = self.get(id).await?;

        if let Some(name) = &patch.product_name {
            if let Some(existing) = self.store.find_product_by_name(name).await? {
                if existing.id != id {
                    return Err(AppError::conflict("productName", "Product already exists"));
                }
            }
        }

        product.apply_patch(&patch, Utc::now());
        self.store.commit(Change::UpdateProduct(product.clone()).into()).await?;
        tracing::info!(product_id = %id, "Product updated");
        Ok(product)
    }

    /// Delete a product unless order lines reference it
    pub async fn delete(&self, id: Uuid) -> AppResult<()> {
        let _lock = self.locks.lock(id).await;
        self.get(id).await?;
        self.store.commit(Change::DeleteProduct(id).into()).await?;
        tracing::info!(product_id = %id, "Product deleted");
        Ok(())
    }
}
