//! AgriStock - agricultural export inventory backend
//!
//! Stock ledger, farmer order lifecycle, invoice generation and account
//! management behind a JSON HTTP API.

use std::sync::Arc;

use axum::{routing::get, Router};
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    services::ServeDir,
    trace::TraceLayer,
};

pub mod config;
pub mod error;
pub mod external;
pub mod handlers;
pub mod middleware;
pub mod routes;
pub mod services;
pub mod store;

pub use config::Config;

use external::{InvoiceRenderer, Mailer};
use services::LockRegistry;
use store::Store;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn Store>,
    pub config: Arc<Config>,
    pub locks: LockRegistry,
    pub mailer: Arc<dyn Mailer>,
    pub renderer: Arc<dyn InvoiceRenderer>,
}

impl AppState {
    pub fn new(
        store: Arc<dyn Store>,
        config: Config,
        mailer: Arc<dyn Mailer>,
        renderer: Arc<dyn InvoiceRenderer>,
    ) -> Self {
        Self {
            store,
            config: Arc::new(config),
            locks: LockRegistry::new(),
            mailer,
            renderer,
        }
    }
}

/// Create the application router with all routes and middleware
pub fn create_app(state: AppState) -> Router {
    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let invoice_files = ServeDir::new(&state.config.invoice.output_dir);

    Router::new()
        .route("/", get(root))
        .route("/health", get(handlers::health_check))
        .nest_service("/api/invoices/files", invoice_files)
        .nest("/api", routes::api_routes(state.clone()))
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Root endpoint
async fn root() -> &'static str {
    "AgriStock API v1.0"
}
