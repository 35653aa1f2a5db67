//! Inventory lookups guarded by the resilience policy.

use std::collections::BTreeSet;

use domain::Sku;
use resilience::{CircuitBreakerRegistry, ResilienceConfig, ResilienceError, ResiliencePolicy};

use crate::error::{PlacementError, Result};
use crate::services::{InventoryClient, InventoryError, StockAvailability};

/// Registry name of the inventory circuit breaker.
pub const INVENTORY_BREAKER: &str = "inventory";

/// Wraps an [`InventoryClient`] with breaker, timeout, retry and fallback.
///
/// Any failure the policy gives up on turns into
/// [`PlacementError::DependencyUnavailable`]; the cause is logged and counted
/// but never returned.
pub struct ResilientInventory<I> {
    client: I,
    policy: ResiliencePolicy,
}

impl<I: InventoryClient> ResilientInventory<I> {
    pub fn new(client: I, policy: ResiliencePolicy) -> Self {
        Self { client, policy }
    }

    /// Guards `client` with the shared `inventory` breaker from `registry`.
    pub fn from_registry(
        client: I,
        registry: &CircuitBreakerRegistry,
        config: ResilienceConfig,
    ) -> Self {
        let breaker = registry.get_or_create(INVENTORY_BREAKER);
        Self::new(client, ResiliencePolicy::new(breaker, config))
    }

    pub fn client(&self) -> &I {
        &self.client
    }

    pub fn policy(&self) -> &ResiliencePolicy {
        &self.policy
    }

    pub async fn check_stock(&self, skus: &BTreeSet<Sku>) -> Result<Vec<StockAvailability>> {
        let client = &self.client;
        self.policy
            .call_with_fallback(
                |attempt, deadline| {
                    tracing::debug!(attempt, skus = skus.len(), "Checking stock");
                    client.check_stock(skus, deadline)
                },
                fallback,
            )
            .await
    }
}

fn fallback(err: ResilienceError<InventoryError>) -> Result<Vec<StockAvailability>> {
    let reason = err.reason();
    tracing::warn!(reason, error = %err, "Inventory unavailable, answering with fallback");
    metrics::counter!("inventory_fallbacks_total", "reason" => reason).increment(1);
    Err(PlacementError::dependency_unavailable())
}
