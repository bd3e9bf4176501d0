//! HTTP handlers for farmer orders

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use shared::orders::LineRequest;
use shared::{Order, OrderFilter};
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::middleware::{require_admin, require_self_or_admin, CurrentUser};
use crate::services::order::{OrderService, OrderUpdate, UpdateOrderInput};
use crate::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateOrderRequest {
    /// Defaults to the caller; only admins may order for someone else
    pub farmer_id: Option<Uuid>,
    pub products: Vec<LineRequest>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingCount {
    pub pending_orders: i64,
}

/// Place an order
pub async fn create_order(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(input): Json<CreateOrderRequest>,
) -> AppResult<(StatusCode, Json<Order>)> {
    let farmer_id = input.farmer_id.unwrap_or(current_user.0.user_id);
    require_self_or_admin(&current_user.0, farmer_id)?;
    let order = OrderService::new(&state).create(farmer_id, input.products).await?;
    Ok((StatusCode::CREATED, Json(order)))
}

/// Record payment for an order (admin)
pub async fn mark_order_paid(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(order_id): Path<Uuid>,
) -> AppResult<Json<Order>> {
    require_admin(&current_user.0)?;
    let order = OrderService::new(&state).mark_paid(order_id).await?;
    Ok(Json(order))
}

/// Reject, re-price or complete an order (admin)
pub async fn update_order(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(order_id): Path<Uuid>,
    Json(input): Json<UpdateOrderInput>,
) -> AppResult<Json<OrderUpdate>> {
    require_admin(&current_user.0)?;
    let outcome = OrderService::new(&state).update(order_id, input).await?;
    Ok(Json(outcome))
}

pub async fn pending_orders_count(
    State(state): State<AppState>,
    current_user: CurrentUser,
) -> AppResult<Json<PendingCount>> {
    require_admin(&current_user.0)?;
    let pending_orders = OrderService::new(&state).pending_count().await?;
    Ok(Json(PendingCount { pending_orders }))
}

/// List orders, optionally filtered (admin)
pub async fn list_orders(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Query(filter): Query<OrderFilter>,
) -> AppResult<Json<Vec<Order>>> {
    require_admin(&current_user.0)?;
    let orders = OrderService::new(&state).all(&filter).await?;
    Ok(Json(orders))
}

pub async fn farmer_orders(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(farmer_id): Path<Uuid>,
) -> AppResult<Json<Vec<Order>>> {
    require_self_or_admin(&current_user.0, farmer_id)?;
    let orders = OrderService::new(&state).by_farmer(farmer_id).await?;
    Ok(Json(orders))
}

pub async fn get_order(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(order_id): Path<Uuid>,
) -> AppResult<Json<Order>> {
    let order = OrderService::new(&state).by_id(order_id).await?;
    if !current_user.0.can_act_for(order.farmer_id) {
        // farmers cannot probe other farmers' order ids
        return Err(AppError::NotFound("Order".to_string()));
    }
    Ok(Json(order))
}
