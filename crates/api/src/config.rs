//! Application configuration loaded from environment variables.

use std::str::FromStr;
use std::time::Duration;

use placement::PlacementConfig;
use resilience::{CircuitBreakerConfig, ResilienceConfig, RetryConfig};

/// Server configuration with sensible defaults.
///
/// Reads from environment variables:
/// - `HOST`: bind address (default: `"0.0.0.0"`)
/// - `PORT`: listen port (default: `3000`)
/// - `RUST_LOG`: tracing filter directive (default: `"info"`)
/// - `DATABASE_URL`: PostgreSQL connection string; unset keeps orders in memory
/// - `INVENTORY_URL`: inventory service base URL (default: `"http://localhost:8082"`)
/// - `INVENTORY_FAILURE_RATE_THRESHOLD`: breaker failure percentage (default: `50`)
/// - `INVENTORY_SLIDING_WINDOW_SIZE`: breaker window length (default: `5`)
/// - `INVENTORY_MINIMUM_CALLS`: outcomes needed before the breaker may open (default: `5`)
/// - `INVENTORY_COOLDOWN_MS`: time the breaker stays open (default: `5000`)
/// - `INVENTORY_TIMEOUT_MS`: per-attempt deadline (default: `3000`)
/// - `INVENTORY_RETRY_MAX_ATTEMPTS`: total attempts per check (default: `3`)
/// - `INVENTORY_RETRY_BACKOFF_MS`: delay between attempts (default: `500`)
/// - `WORKER_POOL_SIZE`: concurrent placements (default: `16`)
/// - `WORKER_QUEUE_CAPACITY`: placements allowed to wait for a worker (default: `256`)
/// - `PUBLISH_TIMEOUT_MS`: bound on one notification publish (default: `1000`)
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub log_level: String,
    pub database_url: Option<String>,
    pub inventory_url: String,
    pub inventory_failure_rate_threshold: f64,
    pub inventory_sliding_window_size: usize,
    pub inventory_minimum_calls: usize,
    pub inventory_cooldown: Duration,
    pub inventory_timeout: Duration,
    pub inventory_retry_max_attempts: u32,
    pub inventory_retry_backoff: Duration,
    pub worker_pool_size: usize,
    pub worker_queue_capacity: usize,
    pub publish_timeout: Duration,
}

impl Config {
    /// Loads configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Loads configuration from an arbitrary key lookup.
    ///
    /// Unparsable values fall back to their defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let parsed = |key: &str| lookup(key).and_then(|v| v.trim().parse().ok());
        let millis = |key: &str, default: Duration| {
            parsed(key).map(Duration::from_millis).unwrap_or(default)
        };

        Self {
            host: lookup("HOST").unwrap_or(defaults.host),
            port: parse_or(&lookup, "PORT", defaults.port),
            log_level: lookup("RUST_LOG").unwrap_or(defaults.log_level),
            database_url: lookup("DATABASE_URL").filter(|url| !url.trim().is_empty()),
            inventory_url: lookup("INVENTORY_URL").unwrap_or(defaults.inventory_url),
            inventory_failure_rate_threshold: parse_or(
                &lookup,
                "INVENTORY_FAILURE_RATE_THRESHOLD",
                defaults.inventory_failure_rate_threshold,
            ),
            inventory_sliding_window_size: parse_or(
                &lookup,
                "INVENTORY_SLIDING_WINDOW_SIZE",
                defaults.inventory_sliding_window_size,
            ),
            inventory_minimum_calls: parse_or(
                &lookup,
                "INVENTORY_MINIMUM_CALLS",
                defaults.inventory_minimum_calls,
            ),
            inventory_cooldown: millis("INVENTORY_COOLDOWN_MS", defaults.inventory_cooldown),
            inventory_timeout: millis("INVENTORY_TIMEOUT_MS", defaults.inventory_timeout),
            inventory_retry_max_attempts: parse_or(
                &lookup,
                "INVENTORY_RETRY_MAX_ATTEMPTS",
                defaults.inventory_retry_max_attempts,
            ),
            inventory_retry_backoff: millis(
                "INVENTORY_RETRY_BACKOFF_MS",
                defaults.inventory_retry_backoff,
            ),
            worker_pool_size: parse_or(&lookup, "WORKER_POOL_SIZE", defaults.worker_pool_size),
            worker_queue_capacity: parse_or(
                &lookup,
                "WORKER_QUEUE_CAPACITY",
                defaults.worker_queue_capacity,
            ),
            publish_timeout: millis("PUBLISH_TIMEOUT_MS", defaults.publish_timeout),
        }
    }

    /// Returns the `"host:port"` bind address string.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Default settings for every circuit breaker in the registry.
    pub fn breaker_config(&self) -> CircuitBreakerConfig {
        CircuitBreakerConfig {
            failure_rate_threshold: self.inventory_failure_rate_threshold,
            sliding_window_size: self.inventory_sliding_window_size.max(1),
            minimum_calls: self.inventory_minimum_calls.max(1),
            cooldown: self.inventory_cooldown,
        }
    }

    pub fn placement_config(&self) -> PlacementConfig {
        PlacementConfig {
            inventory: ResilienceConfig {
                timeout: self.inventory_timeout,
                retry: RetryConfig::fixed(
                    self.inventory_retry_max_attempts.max(1),
                    self.inventory_retry_backoff,
                ),
            },
            worker_pool_size: self.worker_pool_size.max(1),
            queue_capacity: self.worker_queue_capacity,
            publish_timeout: self.publish_timeout,
        }
    }
}

fn parse_or<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> T {
    lookup(key)
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            log_level: "info".to_string(),
            database_url: None,
            inventory_url: "http://localhost:8082".to_string(),
            inventory_failure_rate_threshold: 50.0,
            inventory_sliding_window_size: 5,
            inventory_minimum_calls: 5,
            inventory_cooldown: Duration::from_millis(5000),
            inventory_timeout: Duration::from_millis(3000),
            inventory_retry_max_attempts: 3,
            inventory_retry_backoff: Duration::from_millis(500),
            worker_pool_size: 16,
            worker_queue_capacity: 256,
            publish_timeout: Duration::from_millis(1000),
        }
    }
}
