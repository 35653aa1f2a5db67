//! HTTP API server for order placement.
//!
//! Exposes the placement dispatcher and the order store over REST, with
//! structured logging (tracing) and Prometheus metrics.

pub mod config;
pub mod error;
pub mod notifications;
pub mod routes;

use std::sync::Arc;

use axum::Router;
use axum::routing::get;
use metrics_exporter_prometheus::PrometheusHandle;
use order_store::OrderRepository;
use placement::{EventPublisher, InventoryClient, OrderDispatcher, OrderPlacementService};
use resilience::CircuitBreakerRegistry;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use config::Config;
use routes::orders::AppState;

/// Creates the Axum application router with all routes and shared state.
pub fn create_app<R, I, P>(state: Arc<AppState<R, I, P>>, metrics_handle: PrometheusHandle) -> Router
where
    R: OrderRepository + 'static,
    I: InventoryClient + 'static,
    P: EventPublisher + 'static,
{
    let metrics_router = Router::new()
        .route("/metrics", get(routes::metrics::get))
        .with_state(metrics_handle);

    let health_router = Router::new()
        .route("/health", get(routes::health::check))
        .with_state(Arc::clone(&state.breakers));

    Router::new()
        .route(
            "/order",
            get(routes::orders::list::<R, I, P>).post(routes::orders::create::<R, I, P>),
        )
        .route(
            "/order/{id}",
            get(routes::orders::get::<R, I, P>)
                .put(routes::orders::update::<R, I, P>)
                .delete(routes::orders::delete::<R, I, P>),
        )
        .route(
            "/order/number/{order_number}",
            get(routes::orders::by_number::<R, I, P>),
        )
        .route(
            "/order/user/{user_id}",
            get(routes::orders::by_user::<R, I, P>),
        )
        .with_state(state)
        .merge(health_router)
        .merge(metrics_router)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
}

/// Wires the placement pipeline over the given adapters.
///
/// The breaker registry is built from `config` and shared between the
/// placement service and the health endpoint.
pub fn create_state<R, I, P>(
    repository: R,
    inventory: I,
    publisher: P,
    config: &Config,
) -> Arc<AppState<R, I, P>>
where
    R: OrderRepository + 'static,
    I: InventoryClient + 'static,
    P: EventPublisher + 'static,
{
    let breakers = Arc::new(CircuitBreakerRegistry::new(config.breaker_config()));
    let placement_config = config.placement_config();

    let service = OrderPlacementService::new(
        repository,
        inventory,
        publisher,
        &breakers,
        &placement_config,
    );
    let dispatcher = OrderDispatcher::new(Arc::new(service), placement_config.worker_pool_size)
        .with_queue_capacity(placement_config.queue_capacity);

    Arc::new(AppState {
        dispatcher,
        breakers,
    })
}
