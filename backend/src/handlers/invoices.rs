//! HTTP handlers for invoices

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use shared::{Invoice, PaymentStatus};
use uuid::Uuid;

use crate::error::AppResult;
use crate::middleware::{require_admin, CurrentUser};
use crate::services::invoice::{CreateInvoiceInput, InvoiceService};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct UpdateInvoiceStatusRequest {
    pub status: PaymentStatus,
}

/// Generate, store and email an invoice for an order (admin)
pub async fn create_invoice(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(input): Json<CreateInvoiceInput>,
) -> AppResult<(StatusCode, Json<Invoice>)> {
    require_admin(&current_user.0)?;
    let invoice = InvoiceService::new(&state).create(input).await?;
    Ok((StatusCode::CREATED, Json(invoice)))
}

pub async fn update_invoice_status(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(invoice_id): Path<Uuid>,
    Json(input): Json<UpdateInvoiceStatusRequest>,
) -> AppResult<Json<Invoice>> {
    require_admin(&current_user.0)?;
    let invoice = InvoiceService::new(&state)
        .update_status(invoice_id, input.status)
        .await?;
    Ok(Json(invoice))
}

pub async fn list_invoices(
    State(state): State<AppState>,
    current_user: CurrentUser,
) -> AppResult<Json<Vec<Invoice>>> {
    require_admin(&current_user.0)?;
    let invoices = InvoiceService::new(&state).list().await?;
    Ok(Json(invoices))
}

pub async fn get_invoice(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(invoice_id): Path<Uuid>,
) -> AppResult<Json<Invoice>> {
    require_admin(&current_user.0)?;
    let invoice = InvoiceService::new(&state).get(invoice_id).await?;
    Ok(Json(invoice))
}

pub async fn delete_invoice(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(invoice_id): Path<Uuid>,
) -> AppResult<StatusCode> {
    require_admin(&current_user.0)?;
    InvoiceService::new(&state).delete(invoice_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
