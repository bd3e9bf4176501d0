//! Configuration management for the AgriStock backend
//!
//! Supports hierarchical configuration loading:
//! 1. Default values in code
//! 2. Configuration files (config/development.toml, config/production.toml)
//! 3. Environment variable overrides with AGS__ prefix

use config::{ConfigError, Environment, File};
use serde::Deserialize;

/// Main application configuration
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    /// Current environment (development, production)
    pub environment: String,

    /// Server configuration
    pub server: ServerConfig,

    /// Database configuration
    pub database: DatabaseConfig,

    /// JWT authentication configuration
    pub jwt: JwtConfig,

    /// Outgoing mail configuration
    pub mail: MailConfig,

    /// Invoice document configuration
    pub invoice: InvoiceConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    /// Server port
    pub port: u16,

    /// Server host
    pub host: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    /// PostgreSQL connection URL. Without one the server keeps its records in
    /// process memory.
    pub url: Option<String>,

    /// Maximum number of connections in the pool
    pub max_connections: u32,

    /// Minimum number of connections in the pool
    pub min_connections: u32,
}

#[derive(Debug, Deserialize, Clone)]
pub struct JwtConfig {
    /// Secret for signing access tokens
    pub access_secret: String,

    /// Secret for signing refresh tokens
    pub refresh_secret: String,

    /// Access token expiration in seconds
    pub access_token_expiry: i64,

    /// Refresh token expiration in seconds
    pub refresh_token_expiry: i64,

    /// Verification and password reset token lifetime in seconds
    pub email_token_expiry: i64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct MailConfig {
    /// SMTP relay host. Empty logs outgoing mail instead of sending it.
    pub smtp_host: String,
    pub smtp_port: u16,
    pub username: String,
    pub password: String,
    /// Sender mailbox, e.g. `AgriStock <no-reply@agristock.example>`
    pub from_address: String,
    /// Front-end base URL used in verification and reset links
    pub site_url: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct InvoiceConfig {
    /// Directory rendered PDFs are written to and served from
    pub output_dir: String,

    /// Public base URL download links are built on
    pub public_base_url: String,
}

impl Config {
    /// Load configuration from files and environment variables
    pub fn load() -> Result<Self, ConfigError> {
        let environment = std::env::var("AGS_ENVIRONMENT").unwrap_or_else(|_| "development".into());

        let config = config::Config::builder()
            // Start with default values
            .set_default("environment", environment.clone())?
            .set_default("server.port", 3000)?
            .set_default("server.host", "0.0.0.0")?
            .set_default("database.max_connections", 10)?
            .set_default("database.min_connections", 2)?
            .set_default("jwt.access_secret", "development-access-secret")?
            .set_default("jwt.refresh_secret", "development-refresh-secret")?
            .set_default("jwt.access_token_expiry", 3600)?
            .set_default("jwt.refresh_token_expiry", 2_592_000)?
            .set_default("jwt.email_token_expiry", 3600)?
            .set_default("mail.smtp_host", "")?
            .set_default("mail.smtp_port", 587)?
            .set_default("mail.username", "")?
            .set_default("mail.password", "")?
            .set_default("mail.from_address", "AgriStock <no-reply@agristock.local>")?
            .set_default("mail.site_url", "http://localhost:5173")?
            .set_default("invoice.output_dir", "invoices")?
            .set_default("invoice.public_base_url", "http://localhost:3000")?
            // Load environment-specific config file
            .add_source(File::with_name(&format!("config/{}", environment)).required(false))
            // Override with environment variables (AGS__ prefix)
            .add_source(
                Environment::with_prefix("AGS")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }

    pub fn is_development(&self) -> bool {
        self.environment == "development"
    }

    /// Development defaults without touching files or the environment
    pub fn for_tests() -> Self {
        Self {
            environment: "test".to_string(),
            server: ServerConfig::default(),
            database: DatabaseConfig {
                url: None,
                max_connections: 1,
                min_connections: 1,
            },
            jwt: JwtConfig {
                access_secret: "test-access-secret".to_string(),
                refresh_secret: "test-refresh-secret".to_string(),
                access_token_expiry: 3600,
                refresh_token_expiry: 2_592_000,
                email_token_expiry: 3600,
            },
            mail: MailConfig {
                smtp_host: String::new(),
                smtp_port: 2525,
                username: String::new(),
                password: String::new(),
                from_address: "AgriStock <no-reply@agristock.local>".to_string(),
                site_url: "http://localhost:5173".to_string(),
            },
            invoice: InvoiceConfig {
                output_dir: std::env::temp_dir()
                    .join("agristock-invoices")
                    .to_string_lossy()
                    .into_owned(),
                public_base_url: "http://localhost:3000".to_string(),
            },
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 3000,
            host: "0.0.0.0".to_string(),
        }
    }
}
