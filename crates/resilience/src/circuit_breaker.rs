//! Count-based circuit breaker.
//!
//! States:
//! - Closed: calls pass through and their outcomes fill a sliding window
//! - Open: calls are rejected without touching the dependency
//! - HalfOpen: a single trial call decides whether to close or reopen

use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use thiserror::Error;
use tokio::time::Instant;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

impl CircuitState {
    pub fn as_str(&self) -> &'static str {
        match self {
            CircuitState::Closed => "closed",
            CircuitState::Open => "open",
            CircuitState::HalfOpen => "half_open",
        }
    }

    fn gauge_value(&self) -> f64 {
        match self {
            CircuitState::Closed => 0.0,
            CircuitState::Open => 1.0,
            CircuitState::HalfOpen => 2.0,
        }
    }
}

impl std::fmt::Display for CircuitState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone)]
pub struct CircuitBreakerConfig {
    /// Failure percentage (0-100) that must be strictly exceeded to open
    pub failure_rate_threshold: f64,
    /// Number of most recent outcomes kept in the window
    pub sliding_window_size: usize,
    /// Outcomes required in the window before the rate is evaluated
    pub minimum_calls: usize,
    /// Time spent open before a trial call is admitted
    pub cooldown: Duration,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_rate_threshold: 50.0,
            sliding_window_size: 5,
            minimum_calls: 5,
            cooldown: Duration::from_secs(5),
        }
    }
}

/// Returned when the breaker refuses a call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Circuit breaker '{name}' is open")]
pub struct BreakerOpen {
    pub name: String,
}

struct BreakerState {
    state: CircuitState,
    /// `true` marks a failed call
    window: VecDeque<bool>,
    opened_at: Option<Instant>,
    trial_in_flight: bool,
    /// Bumped on every transition and reset; permits from an older
    /// generation no longer count.
    generation: u64,
}

/// A named circuit breaker.
///
/// All state sits behind one mutex that is never held across an await.
pub struct CircuitBreaker {
    name: String,
    config: CircuitBreakerConfig,
    state: Mutex<BreakerState>,
}

impl CircuitBreaker {
    /// Creates a closed breaker. A zero-sized window is treated as one.
    pub fn new(name: impl Into<String>, mut config: CircuitBreakerConfig) -> Self {
        config.sliding_window_size = config.sliding_window_size.max(1);
        let breaker = Self {
            name: name.into(),
            state: Mutex::new(BreakerState {
                state: CircuitState::Closed,
                window: VecDeque::with_capacity(config.sliding_window_size),
                opened_at: None,
                trial_in_flight: false,
                generation: 0,
            }),
            config,
        };
        breaker.publish_state(CircuitState::Closed);
        breaker
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn config(&self) -> &CircuitBreakerConfig {
        &self.config
    }

    fn lock(&self) -> MutexGuard<'_, BreakerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Asks for permission to make one call.
    ///
    /// An open breaker whose cool-down has elapsed moves to half-open here and
    /// hands out the trial permit. While the trial is in flight every other
    /// caller is rejected.
    pub fn try_acquire(&self) -> Result<CallPermit<'_>, BreakerOpen> {
        let mut state = self.lock();

        match state.state {
            CircuitState::Closed => Ok(CallPermit::new(self, false, state.generation)),
            CircuitState::Open => {
                let cooled_down = state
                    .opened_at
                    .is_none_or(|at| at.elapsed() >= self.config.cooldown);
                if !cooled_down {
                    return Err(self.rejection());
                }
                self.transition(&mut state, CircuitState::HalfOpen);
                state.trial_in_flight = true;
                Ok(CallPermit::new(self, true, state.generation))
            }
            CircuitState::HalfOpen => {
                if state.trial_in_flight {
                    return Err(self.rejection());
                }
                state.trial_in_flight = true;
                Ok(CallPermit::new(self, true, state.generation))
            }
        }
    }

    /// Current state, without evaluating the cool-down.
    pub fn state(&self) -> CircuitState {
        self.lock().state
    }

    /// Failure percentage over the current window, if any outcome is recorded.
    pub fn failure_rate(&self) -> Option<f64> {
        let state = self.lock();
        Self::rate(&state.window)
    }

    /// Forces the breaker back to closed with an empty window.
    pub fn reset(&self) {
        let mut state = self.lock();
        state.window.clear();
        state.opened_at = None;
        state.trial_in_flight = false;
        if state.state != CircuitState::Closed {
            self.transition(&mut state, CircuitState::Closed);
        } else {
            state.generation += 1;
        }
        tracing::info!(breaker = %self.name, "Circuit breaker manually reset");
    }

    fn rejection(&self) -> BreakerOpen {
        BreakerOpen {
            name: self.name.clone(),
        }
    }

    fn rate(window: &VecDeque<bool>) -> Option<f64> {
        if window.is_empty() {
            return None;
        }
        let failures = window.iter().filter(|failed| **failed).count();
        Some(failures as f64 * 100.0 / window.len() as f64)
    }

    fn record(&self, trial: bool, generation: u64, failed: bool) {
        let mut state = self.lock();

        // Outcomes of calls admitted before the last transition or reset are
        // ignored, even if the breaker has since come back to the same state
        if generation != state.generation {
            return;
        }

        if trial {
            if state.state != CircuitState::HalfOpen || !state.trial_in_flight {
                return;
            }
            state.trial_in_flight = false;
            if failed {
                tracing::warn!(breaker = %self.name, "Trial call failed, reopening circuit");
                self.open(&mut state);
            } else {
                tracing::info!(breaker = %self.name, "Trial call succeeded, closing circuit");
                state.window.clear();
                state.opened_at = None;
                self.transition(&mut state, CircuitState::Closed);
            }
            return;
        }

        if state.state != CircuitState::Closed {
            return;
        }

        if state.window.len() == self.config.sliding_window_size {
            state.window.pop_front();
        }
        state.window.push_back(failed);

        if !failed {
            return;
        }

        let minimum = self
            .config
            .minimum_calls
            .min(self.config.sliding_window_size);
        if state.window.len() < minimum {
            return;
        }

        if let Some(rate) = Self::rate(&state.window)
            && rate > self.config.failure_rate_threshold
        {
            tracing::warn!(
                breaker = %self.name,
                failure_rate = rate,
                threshold = self.config.failure_rate_threshold,
                calls = state.window.len(),
                "Failure rate exceeded, opening circuit"
            );
            self.open(&mut state);
        }
    }

    fn release_trial(&self, generation: u64) {
        let mut state = self.lock();
        if state.state == CircuitState::HalfOpen && state.generation == generation {
            state.trial_in_flight = false;
        }
    }

    fn open(&self, state: &mut BreakerState) {
        state.window.clear();
        state.opened_at = Some(Instant::now());
        state.trial_in_flight = false;
        self.transition(state, CircuitState::Open);
    }

    fn transition(&self, state: &mut BreakerState, to: CircuitState) {
        let from = state.state;
        state.state = to;
        state.generation += 1;

        tracing::info!(breaker = %self.name, %from, %to, "Circuit breaker state change");
        metrics::counter!(
            "circuit_breaker_transitions_total",
            "name" => self.name.clone(),
            "to" => to.as_str()
        )
        .increment(1);
        self.publish_state(to);
    }

    fn publish_state(&self, state: CircuitState) {
        metrics::gauge!("circuit_breaker_state", "name" => self.name.clone())
            .set(state.gauge_value());
    }
}

impl std::fmt::Debug for CircuitBreaker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CircuitBreaker")
            .field("name", &self.name)
            .field("state", &self.state())
            .finish()
    }
}

/// Permission to make one call through a breaker.
///
/// Report the outcome with [`record_success`](Self::record_success) or
/// [`record_failure`](Self::record_failure). Dropping a trial permit without
/// an outcome frees the half-open trial slot.
#[must_use = "the call outcome must be recorded on the permit"]
pub struct CallPermit<'a> {
    breaker: &'a CircuitBreaker,
    trial: bool,
    generation: u64,
    settled: bool,
}

impl<'a> CallPermit<'a> {
    fn new(breaker: &'a CircuitBreaker, trial: bool, generation: u64) -> Self {
        Self {
            breaker,
            trial,
            generation,
            settled: false,
        }
    }

    /// Whether this permit is the half-open trial call.
    pub fn is_trial(&self) -> bool {
        self.trial
    }

    pub fn record_success(mut self) {
        self.settled = true;
        self.breaker.record(self.trial, self.generation, false);
    }

    pub fn record_failure(mut self) {
        self.settled = true;
        self.breaker.record(self.trial, self.generation, true);
    }
}

impl Drop for CallPermit<'_> {
    fn drop(&mut self) {
        if self.trial && !self.settled {
            self.breaker.release_trial(self.generation);
        }
    }
}
