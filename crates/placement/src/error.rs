//! Placement error types.

use domain::ValidationError;
use order_store::StoreError;
use thiserror::Error;

/// Message returned to callers whenever the inventory dependency could not
/// give an answer. The underlying cause is only logged.
pub const FALLBACK_MESSAGE: &str = "Oops! Something went wrong, please order after some time!";

/// Outcome of a placement that did not produce an order.
#[derive(Debug, Error)]
pub enum PlacementError {
    /// The request failed validation; nothing left the process.
    #[error("Invalid order: {0}")]
    Validation(#[from] ValidationError),

    /// At least one requested sku is not confirmed in stock.
    #[error("Product is not in stock, please try again later: {}", skus.join(", "))]
    OutOfStock { skus: Vec<String> },

    /// The inventory dependency was unavailable and the fallback answered.
    #[error("{message}")]
    DependencyUnavailable { message: String },

    /// The accepted order could not be stored.
    #[error("Failed to persist order: {0}")]
    Persistence(#[from] StoreError),

    /// Every worker was busy and the wait queue was full.
    #[error("Too many orders in flight, please try again shortly")]
    Overloaded,

    /// The worker running the placement panicked or was cancelled.
    #[error("Placement worker failed: {0}")]
    WorkerFailed(String),
}

impl PlacementError {
    /// The fallback outcome.
    pub fn dependency_unavailable() -> Self {
        PlacementError::DependencyUnavailable {
            message: FALLBACK_MESSAGE.to_string(),
        }
    }

    /// Short label used for metrics.
    pub fn outcome(&self) -> &'static str {
        match self {
            PlacementError::Validation(_) => "invalid",
            PlacementError::OutOfStock { .. } => "out_of_stock",
            PlacementError::DependencyUnavailable { .. } => "fallback",
            PlacementError::Persistence(_) => "persistence_failed",
            PlacementError::Overloaded => "overloaded",
            PlacementError::WorkerFailed(_) => "worker_failed",
        }
    }
}

/// Convenience type alias for placement results.
pub type Result<T> = std::result::Result<T, PlacementError>;
