//! Identifiers shared by every crate in the order placement system.

pub mod types;

pub use types::{OrderId, OrderNumber, UserId};
