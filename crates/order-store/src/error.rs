use common::{OrderId, OrderNumber};
use domain::{ParseStatusError, ValidationError};
use thiserror::Error;

/// Errors that can occur when interacting with the order store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// An order with the same order number is already stored.
    #[error("Order number {0} already exists")]
    DuplicateOrderNumber(OrderNumber),

    /// The order was not found in the store.
    #[error("Order not found: {0}")]
    OrderNotFound(OrderId),

    /// The store was told to fail (in-memory test double).
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    /// A stored row no longer satisfies the order invariants.
    #[error("Corrupt order row: {0}")]
    CorruptRow(String),

    /// A database error occurred.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A database migration error occurred.
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
}

impl From<ValidationError> for StoreError {
    fn from(err: ValidationError) -> Self {
        StoreError::CorruptRow(err.to_string())
    }
}

impl From<ParseStatusError> for StoreError {
    fn from(err: ParseStatusError) -> Self {
        StoreError::CorruptRow(err.to_string())
    }
}

/// Result type for order store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
