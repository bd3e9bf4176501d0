//! Domain models for the AgriStock platform

mod invoice;
mod order;
mod product;
mod transaction;
mod user;

pub use invoice::*;
pub use order::*;
pub use product::*;
pub use transaction::*;
pub use user::*;
