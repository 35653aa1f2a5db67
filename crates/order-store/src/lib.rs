//! Order persistence.
//!
//! An order and its line items are stored as one atomic unit. Two
//! implementations share the [`OrderRepository`] contract: an in-memory
//! store for tests and local runs, and a PostgreSQL store for production.

pub mod error;
pub mod memory;
pub mod postgres;
pub mod store;

pub use error::{Result, StoreError};
pub use memory::InMemoryOrderRepository;
pub use postgres::PostgresOrderRepository;
pub use store::{OrderRepository, OrderRepositoryExt};
