//! Shared fixtures for integration tests: an in-memory application state with
//! recording fakes for mail and invoice documents

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::Utc;
use rust_decimal::Decimal;
use uuid::Uuid;

use agristock::error::{AppError, AppResult};
use agristock::external::{InvoiceDocument, InvoiceRenderer, Mailer};
use agristock::services::product::AddProductInput;
use agristock::services::{LedgerService, ProductService};
use agristock::store::{Change, MemoryStore, Store};
use agristock::{AppState, Config};
use shared::ledger::RestockInput;
use shared::{AccountEmailKind, Invoice, Product, Role, User};

pub fn dec(s: &str) -> Decimal {
    Decimal::from_str(s).unwrap()
}

/// Mailer that records what it was asked to send
#[derive(Default)]
pub struct RecordingMailer {
    pub fail_invoices: AtomicBool,
    pub invoices: Mutex<Vec<(String, Uuid)>>,
    pub account_emails: Mutex<Vec<(String, AccountEmailKind, String)>>,
}

impl RecordingMailer {
    /// Token at the end of the last link mailed to `to`
    pub fn last_token(&self, to: &str, kind: AccountEmailKind) -> Option<String> {
        self.account_emails
            .lock()
            .unwrap()
            .iter()
            .rev()
            .find(|(addr, k, _)| addr == to && *k == kind)
            .and_then(|(_, _, link)| link.rsplit('/').next().map(str::to_string))
    }

    pub fn invoice_count(&self) -> usize {
        self.invoices.lock().unwrap().len()
    }
}

#[async_trait]
impl Mailer for RecordingMailer {
    async fn send_invoice(&self, to: &str, _pdf_path: &Path, invoice: &Invoice) -> AppResult<()> {
        if self.fail_invoices.load(Ordering::SeqCst) {
            return Err(AppError::Mail("relay refused the message".to_string()));
        }
        self.invoices.lock().unwrap().push((to.to_string(), invoice.id));
        Ok(())
    }

    async fn send_account_email(&self, to: &str, kind: AccountEmailKind, link: &str) -> AppResult<()> {
        self.account_emails
            .lock()
            .unwrap()
            .push((to.to_string(), kind, link.to_string()));
        Ok(())
    }
}

/// Renderer that only counts calls
#[derive(Default)]
pub struct FakeRenderer {
    pub fail: AtomicBool,
    pub rendered: AtomicUsize,
    pub discarded: AtomicUsize,
}

#[async_trait]
impl InvoiceRenderer for FakeRenderer {
    async fn render(&self, document: &InvoiceDocument) -> AppResult<PathBuf> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(AppError::Render("font missing".to_string()));
        }
        self.rendered.fetch_add(1, Ordering::SeqCst);
        Ok(PathBuf::from("/tmp").join(document.invoice.file_name()))
    }

    async fn discard(&self, _invoice: &Invoice) -> AppResult<()> {
        self.discarded.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

pub struct TestApp {
    pub state: AppState,
    pub mailer: Arc<RecordingMailer>,
    pub renderer: Arc<FakeRenderer>,
}

pub fn test_app() -> TestApp {
    let mailer = Arc::new(RecordingMailer::default());
    let renderer = Arc::new(FakeRenderer::default());
    let state = AppState::new(
        Arc::new(MemoryStore::new()),
        Config::for_tests(),
        mailer.clone(),
        renderer.clone(),
    );
    TestApp {
        state,
        mailer,
        renderer,
    }
}

/// Store a verified account directly, skipping password hashing
pub async fn seed_user(state: &AppState, role: Role, email: &str) -> User {
    let now = Utc::now();
    let user = User {
        id: Uuid::new_v4(),
        first_name: Some("Kofi".to_string()),
        last_name: Some("Mensah".to_string()),
        email: email.to_string(),
        password_hash: String::new(),
        farm_name: Some("Mensah Cocoa".to_string()),
        farm_location: Some("Kumasi".to_string()),
        tel_number: Some("0244123456".to_string()),
        role,
        email_verified: true,
        admin_verified: true,
        refresh_token_hash: None,
        tokens_revoked_at: None,
        verify_token: None,
        verify_token_expiry: None,
        forgot_password_token: None,
        forgot_password_token_expiry: None,
        created_at: now,
        updated_at: now,
    };
    state
        .store
        .commit(Change::CreateUser(user.clone()).into())
        .await
        .unwrap();
    user
}

pub async fn seed_farmer(state: &AppState) -> User {
    seed_user(state, Role::Farmer, &format!("farmer-{}@example.com", Uuid::new_v4().simple())).await
}

/// Add a product and restock it once
pub async fn seed_product(state: &AppState, name: &str, quantity: i64, selling_price: &str) -> Product {
    let product = ProductService::new(state)
        .add(AddProductInput {
            product_name: name.to_string(),
            stock_keeping_unit: name.to_uppercase().replace(' ', "-"),
            re_order_level: 5,
            unit_price: None,
            selling_price: None,
        })
        .await
        .unwrap();

    if quantity > 0 {
        LedgerService::new(state)
            .restock(product.id, restock_input(quantity, "10.00", selling_price, "15"))
            .await
            .unwrap();
    }

    ProductService::new(state).get(product.id).await.unwrap()
}

pub fn restock_input(quantity: i64, value_in_euro: &str, selling_price: &str, rate: &str) -> RestockInput {
    RestockInput {
        qty_received: quantity,
        received_from: "Yara Ghana".to_string(),
        value_in_euro: dec(value_in_euro),
        selling_price: dec(selling_price),
        cedi_conversion_rate: dec(rate),
        out_of_order_date: None,
    }
}

pub async fn stock_of(state: &AppState, product_id: Uuid) -> (i64, i64) {
    let product = ProductService::new(state).get(product_id).await.unwrap();
    (product.available_stock, product.stock_balance)
}
