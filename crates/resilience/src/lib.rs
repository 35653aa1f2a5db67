//! Resilience primitives for calls to unreliable dependencies.
//!
//! A [`ResiliencePolicy`] composes, per attempt and in this order, a
//! [`CircuitBreaker`] permit, a deadline, and a retry with backoff for
//! transient failures. Callers turn the final [`ResilienceError`] into a
//! fallback with [`ResiliencePolicy::call_with_fallback`].

pub mod circuit_breaker;
pub mod error;
pub mod policy;
pub mod registry;
pub mod retry;

pub use circuit_breaker::{
    BreakerOpen, CallPermit, CircuitBreaker, CircuitBreakerConfig, CircuitState,
};
pub use error::{AttemptFailure, ResilienceError};
pub use policy::{ResilienceConfig, ResiliencePolicy};
pub use registry::CircuitBreakerRegistry;
pub use retry::{IsTransient, RetryConfig};
