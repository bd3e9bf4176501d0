//! Invoice creation saga
//!
//! ```text
//! reserve   CreateInvoice + Order.invoiceId        undo: DeleteInvoice + clear Order.invoiceId
//! render    PDF written to the output directory    undo: remove the file
//! email     PDF sent to the contact address        (last external step, nothing to undo)
//! finalize  Invoice link/emailSent + Order.invoiceGenerated
//! ```
//!
//! The order lock is held for the whole saga so a concurrent request for the
//! same order sees the reservation and gets `Conflict`.

use std::path::PathBuf;
use std::sync::Arc;

use chrono::Utc;
use rust_decimal::Decimal;
use serde::Deserialize;
use shared::{validate_amount, validate_email, Invoice, Order, PaymentStatus};
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::external::{InvoiceDocument, InvoiceRenderer, Mailer};
use crate::services::locks::LockRegistry;
use crate::store::{Change, Store, UnitOfWork};
use crate::AppState;

#[derive(Clone)]
pub struct InvoiceService {
    store: Arc<dyn Store>,
    locks: LockRegistry,
    mailer: Arc<dyn Mailer>,
    renderer: Arc<dyn InvoiceRenderer>,
    public_base_url: String,
}

/// Invoice request body; every field is required
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateInvoiceInput {
    pub order_id: Option<Uuid>,
    pub farmer_id: Option<Uuid>,
    pub total_amount: Option<Decimal>,
    pub farmer_name: Option<String>,
    #[serde(alias = "email")]
    pub contact_email: Option<String>,
}

/// Checked invoice request
struct InvoiceRequest {
    order_id: Uuid,
    farmer_id: Uuid,
    total_amount: Decimal,
    farmer_name: String,
    contact_email: String,
}

fn required<T>(value: Option<T>, field: &str) -> AppResult<T> {
    value.ok_or_else(|| AppError::validation(field, format!("{} is required", field)))
}

fn required_text(value: Option<String>, field: &str) -> AppResult<String> {
    let value = required(value, field)?;
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(AppError::validation(field, format!("{} is required", field)));
    }
    Ok(trimmed.to_string())
}

impl CreateInvoiceInput {
    fn check(self) -> AppResult<InvoiceRequest> {
        let request = InvoiceRequest {
            order_id: required(self.order_id, "orderId")?,
            farmer_id: required(self.farmer_id, "farmerId")?,
            total_amount: required(self.total_amount, "totalAmount")?,
            farmer_name: required_text(self.farmer_name, "farmerName")?,
            contact_email: required_text(self.contact_email, "email")?,
        };
        validate_amount(request.total_amount).map_err(|msg| AppError::validation("totalAmount", msg))?;
        validate_email(&request.contact_email).map_err(|msg| AppError::validation("email", msg))?;
        Ok(request)
    }
}

impl InvoiceService {
    pub fn new(state: &AppState) -> Self {
        Self {
            store: state.store.clone(),
            locks: state.locks.clone(),
            mailer: state.mailer.clone(),
            renderer: state.renderer.clone(),
            public_base_url: state.config.invoice.public_base_url.clone(),
        }
    }

    fn download_link(&self, invoice: &Invoice) -> String {
        format!(
            "{}/api/invoices/files/{}",
            self.public_base_url.trim_end_matches('/'),
            invoice.file_name()
        )
    }

    async fn load_invoice(&self, invoice_id: Uuid) -> AppResult<Invoice> {
        self.store
            .get_invoice(invoice_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Invoice".to_string()))
    }

    /// Create, render and email an invoice for an order
    pub async fn create(&self, input: CreateInvoiceInput) -> AppResult<Invoice> {
        let request = input.check()?;
        let order_id = request.order_id;

        let _order_lock = self.locks.lock(order_id).await;
        let mut order = self
            .store
            .get_order(order_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Order".to_string()))?;

        if order.invoice_id.is_some() || self.store.get_invoice_by_order(order_id).await?.is_some() {
            tracing::warn!(%order_id, "Invoice already exists for order");
            return Err(AppError::conflict("invoice", "An invoice already exists for this order"));
        }

        let mut invoice = Invoice::new(
            order_id,
            request.farmer_id,
            request.farmer_name,
            request.total_amount,
            Utc::now(),
        );
        invoice.pdf_download_link = self.download_link(&invoice);

        order.invoice_id = Some(invoice.id);
        let mut work = UnitOfWork::new();
        work.push(Change::CreateInvoice(invoice.clone()))
            .push(Change::UpdateOrder(order.clone()));
        self.store.commit(work).await?;
        tracing::info!(%order_id, invoice_id = %invoice.id, "Invoice reserved");

        let document = InvoiceDocument {
            invoice: invoice.clone(),
            order: order.clone(),
            contact_email: request.contact_email.clone(),
        };

        match self.deliver(&document).await {
            Ok(path) => {
                invoice.email_sent = true;
                invoice.updated_at = Utc::now();
                order.invoice_generated = true;

                let mut work = UnitOfWork::new();
                work.push(Change::UpdateInvoice(invoice.clone()))
                    .push(Change::UpdateOrder(order));
                if let Err(e) = self.store.commit(work).await {
                    self.compensate(&invoice, order_id).await;
                    return Err(e);
                }

                tracing::info!(
                    %order_id,
                    invoice_id = %invoice.id,
                    path = %path.display(),
                    "Invoice generated and emailed"
                );
                Ok(invoice)
            }
            Err(e) => {
                tracing::error!(%order_id, invoice_id = %invoice.id, error = %e, "Invoice delivery failed");
                self.compensate(&invoice, order_id).await;
                Err(AppError::Internal(format!("Invoice generation failed: {}", e)))
            }
        }
    }

    async fn deliver(&self, document: &InvoiceDocument) -> AppResult<PathBuf> {
        let path = self.renderer.render(document).await?;
        self.mailer
            .send_invoice(&document.contact_email, &path, &document.invoice)
            .await?;
        Ok(path)
    }

    /// Undo the reservation step. Failures are logged; the original error wins.
    async fn compensate(&self, invoice: &Invoice, order_id: Uuid) {
        let mut work = UnitOfWork::new();
        work.push(Change::DeleteInvoice(invoice.id));
        match self.store.get_order(order_id).await {
            Ok(Some(mut order)) => {
                order.invoice_id = None;
                order.invoice_generated = false;
                work.push(Change::UpdateOrder(order));
            }
            Ok(None) => {}
            Err(e) => tracing::error!(%order_id, error = %e, "Cannot reload order during compensation"),
        }

        match self.store.commit(work).await {
            Ok(()) => tracing::warn!(%order_id, invoice_id = %invoice.id, "Invoice reservation rolled back"),
            Err(e) => tracing::error!(%order_id, invoice_id = %invoice.id, error = %e, "Invoice rollback failed"),
        }

        if let Err(e) = self.renderer.discard(invoice).await {
            tracing::warn!(invoice_id = %invoice.id, error = %e, "Cannot remove invoice document");
        }
    }

    pub async fn update_status(&self, invoice_id: Uuid, status: PaymentStatus) -> AppResult<Invoice> {
        let mut invoice = self.load_invoice(invoice_id).await?;
        let _order_lock = self.locks.lock(invoice.order_id).await;

        invoice.status = status;
        invoice.updated_at = Utc::now();
        self.store.commit(Change::UpdateInvoice(invoice.clone()).into()).await?;

        tracing::info!(%invoice_id, status = status.as_str(), "Invoice status updated");
        Ok(invoice)
    }

    pub async fn list(&self) -> AppResult<Vec<Invoice>> {
        self.store.list_invoices().await
    }

    pub async fn get(&self, invoice_id: Uuid) -> AppResult<Invoice> {
        self.load_invoice(invoice_id).await
    }

    /// Delete an invoice and free its order for invoicing again
    pub async fn delete(&self, invoice_id: Uuid) -> AppResult<()> {
        let invoice = self.load_invoice(invoice_id).await?;
        let _order_lock = self.locks.lock(invoice.order_id).await;

        let mut work = UnitOfWork::new();
        work.push(Change::DeleteInvoice(invoice_id));
        if let Some(order) = self.store.get_order(invoice.order_id).await? {
            work.push(Change::UpdateOrder(Order {
                invoice_id: None,
                invoice_generated: false,
                ..order
            }));
        }
        self.store.commit(work).await?;

        if let Err(e) = self.renderer.discard(&invoice).await {
            tracing::warn!(%invoice_id, error = %e, "Cannot remove invoice document");
        }
        tracing::info!(%invoice_id, order_id = %invoice.order_id, "Invoice deleted");
        Ok(())
    }
}
