//! AgriStock - Backend Server

use std::{net::SocketAddr, sync::Arc, time::Duration};

use sqlx::postgres::PgPoolOptions;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use agristock::external::{InvoiceRenderer, LogMailer, Mailer, PdfInvoiceRenderer, SmtpMailer};
use agristock::store::{MemoryStore, PgStore, Store};
use agristock::{create_app, error, AppState, Config};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "agristock=debug,agristock_server=debug,tower_http=debug,sqlx=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    dotenvy::dotenv().ok();
    let config = Config::load()?;
    error::expose_internal_errors(config.is_development());

    tracing::info!("Starting AgriStock Server");
    tracing::info!("Environment: {}", config.environment);

    let store: Arc<dyn Store> = match &config.database.url {
        Some(url) => {
            tracing::info!("Connecting to database...");
            let db_pool = PgPoolOptions::new()
                .max_connections(config.database.max_connections)
                .min_connections(config.database.min_connections)
                .acquire_timeout(Duration::from_secs(30))
                .connect(url)
                .await?;
            tracing::info!("Database connection established");

            tracing::info!("Running database migrations...");
            sqlx::migrate!("./migrations").run(&db_pool).await?;
            tracing::info!("Migrations completed");

            Arc::new(PgStore::new(db_pool))
        }
        None => {
            tracing::warn!("No database url configured; records are kept in memory and lost on exit");
            Arc::new(MemoryStore::new())
        }
    };

    let mailer: Arc<dyn Mailer> = if config.mail.smtp_host.is_empty() {
        tracing::warn!("No SMTP relay configured; outgoing mail is only logged");
        Arc::new(LogMailer)
    } else {
        Arc::new(SmtpMailer::new(config.mail.clone()))
    };
    let renderer: Arc<dyn InvoiceRenderer> = Arc::new(PdfInvoiceRenderer::new(&config.invoice.output_dir));

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;
    let state = AppState::new(store, config, mailer, renderer);

    // Build application
    let app = create_app(state);

    // Start server
    tracing::info!("Listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
