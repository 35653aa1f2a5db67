//! Inventory client trait and in-memory implementation.

use std::collections::{BTreeSet, HashMap, VecDeque};
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use domain::Sku;
use resilience::IsTransient;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Stock answer for one sku.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StockAvailability {
    pub sku: Sku,
    pub in_stock: bool,
}

impl StockAvailability {
    pub fn new(sku: impl Into<Sku>, in_stock: bool) -> Self {
        Self {
            sku: sku.into(),
            in_stock,
        }
    }
}

/// Failures of a single inventory lookup.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InventoryError {
    /// Connection, DNS or server-side failure.
    #[error("Inventory transport error: {0}")]
    Transport(String),

    /// The lookup did not finish before its deadline.
    #[error("Inventory request timed out")]
    Timeout,

    /// The service refused the request.
    #[error("Inventory rejected the request with status {0}")]
    Rejected(u16),

    /// The response body could not be understood.
    #[error("Malformed inventory response: {0}")]
    Decode(String),
}

impl IsTransient for InventoryError {
    fn is_transient(&self) -> bool {
        matches!(self, InventoryError::Transport(_) | InventoryError::Timeout)
    }
}

/// Looks up stock for a set of skus in one round-trip.
///
/// Implementations must not retry internally; the caller owns the retry
/// policy. Skus missing from the answer are treated as not in stock.
#[async_trait]
pub trait InventoryClient: Send + Sync {
    async fn check_stock(
        &self,
        skus: &BTreeSet<Sku>,
        deadline: Duration,
    ) -> Result<Vec<StockAvailability>, InventoryError>;
}

#[derive(Debug, Default)]
struct InMemoryInventoryState {
    stock: HashMap<Sku, bool>,
    scripted_failures: VecDeque<InventoryError>,
    unavailable: bool,
    latency: Option<Duration>,
    calls: usize,
}

/// In-memory inventory for testing and local runs.
///
/// Only skus that were given a stock level appear in answers. Failures can be
/// scripted one call at a time or switched on for every call.
#[derive(Debug, Clone, Default)]
pub struct InMemoryInventoryClient {
    state: Arc<RwLock<InMemoryInventoryState>>,
}

impl InMemoryInventoryClient {
    /// Creates an inventory that knows no skus.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an inventory with the given stock levels.
    pub fn with_stock<S: Into<Sku>>(levels: impl IntoIterator<Item = (S, bool)>) -> Self {
        let client = Self::new();
        for (sku, in_stock) in levels {
            client.set_in_stock(sku, in_stock);
        }
        client
    }

    pub fn set_in_stock(&self, sku: impl Into<Sku>, in_stock: bool) {
        self.write().stock.insert(sku.into(), in_stock);
    }

    /// Makes the next call fail with `error`. Calls queue up in order.
    pub fn fail_next(&self, error: InventoryError) {
        self.write().scripted_failures.push_back(error);
    }

    /// Makes every call fail with a transport error until switched off.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.write().unavailable = unavailable;
    }

    /// Delays every answer; a delay past the deadline yields `Timeout`.
    pub fn set_latency(&self, latency: Option<Duration>) {
        self.write().latency = latency;
    }

    /// Returns how many lookups reached this client.
    pub fn call_count(&self) -> usize {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .calls
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, InMemoryInventoryState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl InventoryClient for InMemoryInventoryClient {
    async fn check_stock(
        &self,
        skus: &BTreeSet<Sku>,
        deadline: Duration,
    ) -> Result<Vec<StockAvailability>, InventoryError> {
        let latency = {
            let mut state = self.write();
            state.calls += 1;

            if let Some(error) = state.scripted_failures.pop_front() {
                return Err(error);
            }
            if state.unavailable {
                return Err(InventoryError::Transport("connection refused".to_string()));
            }
            state.latency
        };

        if let Some(latency) = latency {
            if latency >= deadline {
                tokio::time::sleep(deadline).await;
                return Err(InventoryError::Timeout);
            }
            tokio::time::sleep(latency).await;
        }

        let state = self.state.read().unwrap_or_else(PoisonError::into_inner);
        Ok(skus
            .iter()
            .filter_map(|sku| {
                state
                    .stock
                    .get(sku)
                    .map(|in_stock| StockAvailability::new(sku.clone(), *in_stock))
            })
            .collect())
    }
}
