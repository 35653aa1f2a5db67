use std::time::Duration;

use thiserror::Error;

/// Why a single attempt failed.
#[derive(Debug, Error)]
pub enum AttemptFailure<E> {
    #[error("attempt timed out after {0:?}")]
    TimedOut(Duration),

    #[error("{0}")]
    Failed(E),
}

/// Final outcome of a protected call that did not succeed.
#[derive(Debug, Error)]
pub enum ResilienceError<E> {
    /// The breaker rejected the call before (or between) attempts.
    #[error("circuit breaker '{name}' is open after {attempts} attempt(s)")]
    CircuitOpen { name: String, attempts: u32 },

    /// Every allowed attempt failed transiently.
    #[error("gave up after {attempts} attempt(s): {last}")]
    RetriesExhausted {
        attempts: u32,
        last: AttemptFailure<E>,
    },

    /// The operation failed in a way retrying cannot fix.
    #[error("non-recoverable failure: {0}")]
    Permanent(E),
}

impl<E> ResilienceError<E> {
    /// Short label for metrics and logs.
    pub fn reason(&self) -> &'static str {
        match self {
            ResilienceError::CircuitOpen { .. } => "circuit_open",
            ResilienceError::RetriesExhausted {
                last: AttemptFailure::TimedOut(_),
                ..
            } => "timeout",
            ResilienceError::RetriesExhausted { .. } => "retries_exhausted",
            ResilienceError::Permanent(_) => "permanent",
        }
    }
}
