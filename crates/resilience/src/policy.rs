use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use crate::{AttemptFailure, CircuitBreaker, IsTransient, ResilienceError, RetryConfig};

/// Per-dependency settings applied around every attempt.
#[derive(Debug, Clone)]
pub struct ResilienceConfig {
    /// Deadline for a single attempt
    pub timeout: Duration,
    pub retry: RetryConfig,
}

impl Default for ResilienceConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(3),
            retry: RetryConfig::default(),
        }
    }
}

/// Circuit breaker, timeout and retry composed around one dependency.
///
/// Every attempt asks the breaker for a permit first, runs under the
/// per-attempt deadline, and reports its outcome back to the breaker.
/// Transient failures are retried after a backoff delay; the breaker is
/// consulted again before each retry.
#[derive(Debug, Clone)]
pub struct ResiliencePolicy {
    breaker: Arc<CircuitBreaker>,
    config: ResilienceConfig,
}

impl ResiliencePolicy {
    pub fn new(breaker: Arc<CircuitBreaker>, config: ResilienceConfig) -> Self {
        Self { breaker, config }
    }

    pub fn breaker(&self) -> &Arc<CircuitBreaker> {
        &self.breaker
    }

    pub fn config(&self) -> &ResilienceConfig {
        &self.config
    }

    /// Runs `operation` under the policy.
    ///
    /// `operation` receives the 1-based attempt number and the per-attempt
    /// deadline. A timed-out attempt is abandoned and counted as a failure.
    pub async fn call<T, E, F, Fut>(&self, mut operation: F) -> Result<T, ResilienceError<E>>
    where
        F: FnMut(u32, Duration) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: IsTransient + std::fmt::Display,
    {
        let name = self.breaker.name();
        let timeout = self.config.timeout;
        let max_attempts = self.config.retry.max_attempts.max(1);
        let mut attempt = 0;

        loop {
            let permit = match self.breaker.try_acquire() {
                Ok(permit) => permit,
                Err(_) => {
                    tracing::warn!(breaker = name, attempts = attempt, "Call short-circuited");
                    return Err(ResilienceError::CircuitOpen {
                        name: name.to_string(),
                        attempts: attempt,
                    });
                }
            };
            attempt += 1;

            tracing::debug!(breaker = name, attempt, max_attempts, "Attempting call");

            let failure = match tokio::time::timeout(timeout, operation(attempt, timeout)).await {
                Ok(Ok(value)) => {
                    permit.record_success();
                    if attempt > 1 {
                        tracing::info!(breaker = name, attempt, "Call succeeded after retry");
                    }
                    return Ok(value);
                }
                Ok(Err(error)) => {
                    permit.record_failure();
                    if !error.is_transient() {
                        tracing::error!(
                            breaker = name,
                            attempt,
                            error = %error,
                            "Permanent failure detected, not retrying"
                        );
                        return Err(ResilienceError::Permanent(error));
                    }
                    AttemptFailure::Failed(error)
                }
                Err(_) => {
                    permit.record_failure();
                    AttemptFailure::TimedOut(timeout)
                }
            };

            if attempt >= max_attempts {
                tracing::error!(
                    breaker = name,
                    attempt,
                    error = %failure,
                    "Call failed after all retries"
                );
                return Err(ResilienceError::RetriesExhausted {
                    attempts: attempt,
                    last: failure,
                });
            }

            let delay = self.config.retry.delay_after(attempt);
            tracing::warn!(
                breaker = name,
                attempt,
                error = %failure,
                delay_ms = delay.as_millis() as u64,
                "Transient failure, retrying after delay"
            );
            metrics::counter!("retry_attempts_total", "name" => name.to_string()).increment(1);

            tokio::time::sleep(delay).await;
        }
    }

    /// Runs `operation` under the policy and hands any failure to `fallback`.
    ///
    /// The fallback runs for an open breaker, exhausted retries and
    /// non-recoverable errors alike.
    pub async fn call_with_fallback<T, E, R, F, Fut, G>(
        &self,
        operation: F,
        fallback: G,
    ) -> Result<T, R>
    where
        F: FnMut(u32, Duration) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: IsTransient + std::fmt::Display,
        G: FnOnce(ResilienceError<E>) -> Result<T, R>,
    {
        match self.call(operation).await {
            Ok(value) => Ok(value),
            Err(error) => fallback(error),
        }
    }
}
