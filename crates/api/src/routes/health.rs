//! Health check endpoint.

use std::collections::BTreeMap;
use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use resilience::CircuitBreakerRegistry;
use serde::Serialize;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    /// State of every circuit breaker created so far, by name.
    pub circuit_breakers: BTreeMap<String, &'static str>,
}

/// GET /health: Returns process health and breaker states.
///
/// An open breaker does not make the service unhealthy: placements still
/// answer with the fallback.
pub async fn check(State(breakers): State<Arc<CircuitBreakerRegistry>>) -> Json<HealthResponse> {
    let circuit_breakers = breakers
        .names()
        .into_iter()
        .filter_map(|name| {
            let state = breakers.get(&name)?.state();
            Some((name, state.as_str()))
        })
        .collect();

    Json(HealthResponse {
        status: "ok",
        circuit_breakers,
    })
}
