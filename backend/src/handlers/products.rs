//! HTTP handlers for the product catalogue

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use shared::{Product, ProductPatch};
use uuid::Uuid;

use crate::error::AppResult;
use crate::middleware::{require_admin, CurrentUser};
use crate::services::product::{AddProductInput, ProductService};
use crate::AppState;

/// Add a product (admin)
pub async fn add_product(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(input): Json<AddProductInput>,
) -> AppResult<(StatusCode, Json<Product>)> {
    require_admin(&current_user.0)?;
    let product = ProductService::new(&state).add(input).await?;
    Ok((StatusCode::CREATED, Json(product)))
}

/// List all products with their transactions
pub async fn list_products(
    State(state): State<AppState>,
    _current_user: CurrentUser,
) -> AppResult<Json<Vec<Product>>> {
    let products = ProductService::new(&state).list().await?;
    Ok(Json(products))
}

pub async fn get_product(
    State(state): State<AppState>,
    _current_user: CurrentUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<Product>> {
    let product = ProductService::new(&state).get(id).await?;
    Ok(Json(product))
}

/// Patch catalogue fields (admin)
pub async fn update_product(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(id): Path<Uuid>,
    Json(patch): Json<ProductPatch>,
) -> AppResult<Json<Product>> {
    require_admin(&current_user.0)?;
    let product = ProductService::new(&state).update(id, patch).await?;
    Ok(Json(product))
}

/// Delete a product (admin)
pub async fn delete_product(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(id): Path<Uuid>,
) -> AppResult<StatusCode> {
    require_admin(&current_user.0)?;
    ProductService::new(&state).delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}
