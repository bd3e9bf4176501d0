//! Business logic services for the AgriStock backend

pub mod auth;
pub mod invoice;
pub mod ledger;
pub mod locks;
pub mod order;
pub mod product;

pub use auth::AuthService;
pub use invoice::InvoiceService;
pub use ledger::LedgerService;
pub use locks::LockRegistry;
pub use order::OrderService;
pub use product::ProductService;
