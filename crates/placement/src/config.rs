use std::time::Duration;

use resilience::ResilienceConfig;

/// Settings for the placement pipeline and its worker pool.
#[derive(Debug, Clone)]
pub struct PlacementConfig {
    /// Timeout and retry applied to every inventory check
    pub inventory: ResilienceConfig,
    /// Placements allowed to run at the same time
    pub worker_pool_size: usize,
    /// Placements allowed to wait for a free worker
    pub queue_capacity: usize,
    /// Upper bound on a single notification publish
    pub publish_timeout: Duration,
}

impl Default for PlacementConfig {
    fn default() -> Self {
        Self {
            inventory: ResilienceConfig::default(),
            worker_pool_size: 16,
            queue_capacity: crate::dispatcher::DEFAULT_QUEUE_CAPACITY,
            publish_timeout: Duration::from_secs(1),
        }
    }
}
