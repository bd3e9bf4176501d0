//! Shared types and domain rules for the AgriStock inventory platform
//!
//! This crate holds the storage-agnostic core: the product/order/invoice
//! models, the stock ledger rules and order pricing. The backend wraps these
//! with persistence, locking and HTTP.

pub mod error;
pub mod ledger;
pub mod models;
pub mod money;
pub mod orders;
pub mod types;
pub mod validation;

pub use error::*;
pub use models::*;
pub use types::*;
pub use validation::*;
