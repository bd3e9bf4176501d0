//! HTTP handlers for stock ledger endpoints

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use shared::ledger::{IssueInput, RestockInput};
use shared::StockTransaction;
use uuid::Uuid;

use crate::error::AppResult;
use crate::middleware::{require_admin, CurrentUser};
use crate::services::LedgerService;
use crate::AppState;

/// Record a receipt of stock for a product
pub async fn restock_product(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(product_id): Path<Uuid>,
    Json(input): Json<RestockInput>,
) -> AppResult<(StatusCode, Json<StockTransaction>)> {
    require_admin(&current_user.0)?;
    let transaction = LedgerService::new(&state).restock(product_id, input).await?;
    Ok((StatusCode::CREATED, Json(transaction)))
}

/// Issue stock of a product to a farmer
pub async fn issue_product(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(product_id): Path<Uuid>,
    Json(input): Json<IssueInput>,
) -> AppResult<(StatusCode, Json<StockTransaction>)> {
    require_admin(&current_user.0)?;
    let transaction = LedgerService::new(&state).issue(product_id, input).await?;
    Ok((StatusCode::CREATED, Json(transaction)))
}

/// Confirm pickup of the transaction tied to an order
pub async fn confirm_pickup(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(order_id): Path<Uuid>,
) -> AppResult<Json<StockTransaction>> {
    require_admin(&current_user.0)?;
    let transaction = LedgerService::new(&state).confirm_pickup(order_id).await?;
    Ok(Json(transaction))
}

/// Delete a transaction and reverse its stock effect
pub async fn delete_transaction(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path((transaction_id, product_id)): Path<(Uuid, Uuid)>,
) -> AppResult<Json<StockTransaction>> {
    require_admin(&current_user.0)?;
    let transaction = LedgerService::new(&state)
        .delete_transaction(product_id, transaction_id)
        .await?;
    Ok(Json(transaction))
}

/// List a product's transactions
pub async fn list_transactions(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(product_id): Path<Uuid>,
) -> AppResult<Json<Vec<StockTransaction>>> {
    require_admin(&current_user.0)?;
    let transactions = LedgerService::new(&state).list_transactions(product_id).await?;
    Ok(Json(transactions))
}
