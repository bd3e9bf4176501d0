//! HTTP request handlers

pub mod health;
pub mod invoices;
pub mod orders;
pub mod products;
pub mod transactions;
pub mod users;

pub use health::*;
pub use invoices::*;
pub use orders::*;
pub use products::*;
pub use transactions::*;
pub use users::*;
