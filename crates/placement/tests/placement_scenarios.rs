//! End-to-end placement scenarios through the dispatcher.

use std::collections::{BTreeSet, HashSet};
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use domain::{OrderLineRequest, OrderRequest, OrderStatus, Sku};
use order_store::{InMemoryOrderRepository, OrderRepository};
use placement::{
    FALLBACK_MESSAGE, INVENTORY_BREAKER, InMemoryEventPublisher, InMemoryInventoryClient,
    InventoryClient, InventoryError, OrderDispatcher, OrderPlacementService, PlacementConfig,
    PlacementError, StockAvailability,
};
use resilience::{
    CircuitBreakerConfig, CircuitBreakerRegistry, CircuitState, ResilienceConfig, RetryConfig,
};
use rust_decimal::Decimal;

type TestDispatcher =
    OrderDispatcher<InMemoryOrderRepository, InMemoryInventoryClient, InMemoryEventPublisher>;

struct TestHarness {
    dispatcher: TestDispatcher,
    registry: CircuitBreakerRegistry,
    repository: InMemoryOrderRepository,
    inventory: InMemoryInventoryClient,
    publisher: InMemoryEventPublisher,
}

impl TestHarness {
    fn new() -> Self {
        let registry = CircuitBreakerRegistry::new(CircuitBreakerConfig {
            failure_rate_threshold: 50.0,
            sliding_window_size: 5,
            minimum_calls: 5,
            cooldown: Duration::from_secs(5),
        });
        let config = PlacementConfig {
            inventory: ResilienceConfig {
                timeout: Duration::from_millis(500),
                retry: RetryConfig::fixed(3, Duration::from_millis(100)),
            },
            worker_pool_size: 4,
            queue_capacity: 64,
            publish_timeout: Duration::from_millis(100),
        };

        let repository = InMemoryOrderRepository::new();
        let inventory = InMemoryInventoryClient::with_stock([("A1", true), ("B2", false)]);
        let publisher = InMemoryEventPublisher::new();

        let service = OrderPlacementService::new(
            repository.clone(),
            inventory.clone(),
            publisher.clone(),
            &registry,
            &config,
        );
        let dispatcher = OrderDispatcher::new(Arc::new(service), config.worker_pool_size)
            .with_queue_capacity(config.queue_capacity);

        Self {
            dispatcher,
            registry,
            repository,
            inventory,
            publisher,
        }
    }
}

fn dec(s: &str) -> Decimal {
    Decimal::from_str(s).unwrap()
}

fn single_line(sku: &str, price: &str, quantity: i64) -> OrderRequest {
    OrderRequest::new(vec![OrderLineRequest::new(1, sku, dec(price), quantity)])
}

#[tokio::test]
async fn scenario_in_stock_order_is_committed_and_announced() {
    let h = TestHarness::new();

    let confirmation = h
        .dispatcher
        .place_order(single_line("A1", "10.00", 2))
        .await
        .unwrap();

    assert_eq!(confirmation.total_amount.amount(), dec("20.00"));

    let stored = h
        .repository
        .find_by_order_number(confirmation.order_number)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.status(), OrderStatus::Created);
    assert_eq!(stored.total_amount().amount(), dec("20.00"));

    let published = h.publisher.published();
    assert_eq!(published.len(), 1);
    assert_eq!(published[0].event.order_number, confirmation.order_number);
}

#[tokio::test]
async fn scenario_out_of_stock_is_rejected_without_side_effects() {
    let h = TestHarness::new();

    let result = h
        .dispatcher
        .place_order(single_line("B2", "5.00", 1))
        .await;

    match result {
        Err(PlacementError::OutOfStock { skus }) => assert_eq!(skus, vec!["B2"]),
        other => panic!("expected out of stock, got {other:?}"),
    }
    assert_eq!(h.repository.create_calls(), 0);
    assert_eq!(h.publisher.published_count(), 0);
}

#[tokio::test]
async fn unknown_sku_is_rejected() {
    let h = TestHarness::new();

    let request = OrderRequest::new(vec![
        OrderLineRequest::new(1, "A1", dec("10.00"), 1),
        OrderLineRequest::new(2, "Z9", dec("1.00"), 1),
    ]);
    let result = h.dispatcher.place_order(request).await;

    assert!(matches!(result, Err(PlacementError::OutOfStock { skus }) if skus == vec!["Z9"]));
    assert_eq!(h.repository.create_calls(), 0);
}

#[tokio::test(start_paused = true)]
async fn scenario_slow_inventory_answers_with_fallback() {
    let h = TestHarness::new();
    h.inventory.set_latency(Some(Duration::from_secs(10)));

    let result = h
        .dispatcher
        .place_order(single_line("A1", "10.00", 2))
        .await;

    match result {
        Err(PlacementError::DependencyUnavailable { message }) => {
            assert_eq!(message, FALLBACK_MESSAGE)
        }
        other => panic!("expected fallback, got {other:?}"),
    }
    assert_eq!(h.repository.create_calls(), 0);
    assert_eq!(h.publisher.published_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn scenario_transient_failures_then_success_matches_first_try() {
    let h = TestHarness::new();
    h.inventory
        .fail_next(InventoryError::Transport("connection reset".to_string()));
    h.inventory
        .fail_next(InventoryError::Transport("connection reset".to_string()));

    let retried = h
        .dispatcher
        .place_order(single_line("A1", "10.00", 2))
        .await
        .unwrap();
    let first_try = h
        .dispatcher
        .place_order(single_line("A1", "10.00", 2))
        .await
        .unwrap();

    assert_eq!(h.inventory.call_count(), 4);
    assert_eq!(retried.message, first_try.message);
    assert_eq!(retried.total_amount, first_try.total_amount);
    assert_eq!(h.repository.create_calls(), 2);
    assert_eq!(h.publisher.published_count(), 2);
}

#[tokio::test(start_paused = true)]
async fn scenario_open_breaker_skips_inventory_entirely() {
    let h = TestHarness::new();
    h.inventory.set_unavailable(true);

    // Two placements with three attempts each fill the window with failures
    for _ in 0..2 {
        let result = h
            .dispatcher
            .place_order(single_line("A1", "10.00", 1))
            .await;
        assert!(matches!(
            result,
            Err(PlacementError::DependencyUnavailable { .. })
        ));
    }
    let breaker = h.registry.get(INVENTORY_BREAKER).unwrap();
    assert_eq!(breaker.state(), CircuitState::Open);

    h.inventory.set_unavailable(false);
    let calls_before = h.inventory.call_count();

    let result = h
        .dispatcher
        .place_order(single_line("A1", "10.00", 1))
        .await;

    assert!(matches!(
        result,
        Err(PlacementError::DependencyUnavailable { .. })
    ));
    assert_eq!(h.inventory.call_count(), calls_before);
    assert_eq!(h.repository.create_calls(), 0);

    // Once the cool-down passes a trial call closes the breaker again
    tokio::time::advance(Duration::from_secs(5)).await;
    assert!(
        h.dispatcher
            .place_order(single_line("A1", "10.00", 1))
            .await
            .is_ok()
    );
    assert_eq!(breaker.state(), CircuitState::Closed);
}

#[tokio::test]
async fn concurrent_placements_get_distinct_order_numbers() {
    let h = TestHarness::new();

    let handles: Vec<_> = (0..50)
        .map(|i| {
            h.dispatcher
                .place_order(single_line("A1", "1.00", i % 5 + 1))
        })
        .collect();

    let mut numbers = HashSet::new();
    for handle in handles {
        let confirmation = handle.await.unwrap();
        assert!(numbers.insert(confirmation.order_number));
    }

    assert_eq!(numbers.len(), 50);
    assert_eq!(h.repository.find_all().await.unwrap().len(), 50);
    assert_eq!(h.publisher.published_count(), 50);
    assert_eq!(h.dispatcher.idle_workers(), h.dispatcher.pool_size());
}

#[tokio::test(start_paused = true)]
async fn full_queue_rejects_placements_without_calling_inventory() {
    let registry = CircuitBreakerRegistry::default();
    let inventory = InMemoryInventoryClient::with_stock([("A1", true)]);
    inventory.set_latency(Some(Duration::from_millis(200)));
    let service = OrderPlacementService::new(
        InMemoryOrderRepository::new(),
        inventory.clone(),
        InMemoryEventPublisher::new(),
        &registry,
        &PlacementConfig::default(),
    );
    let dispatcher = OrderDispatcher::new(Arc::new(service), 1).with_queue_capacity(1);

    let running = dispatcher.place_order(single_line("A1", "10.00", 1));
    let queued = dispatcher.place_order(single_line("A1", "10.00", 1));
    let rejected = dispatcher.place_order(single_line("A1", "10.00", 1));

    assert!(matches!(rejected.await, Err(PlacementError::Overloaded)));
    assert!(running.await.is_ok());
    assert!(queued.await.is_ok());
    assert_eq!(inventory.call_count(), 2);

    // Finished placements give their queue slots back
    assert!(
        dispatcher
            .place_order(single_line("A1", "10.00", 1))
            .await
            .is_ok()
    );
}

#[tokio::test]
async fn invalid_request_is_rejected_before_any_call() {
    let h = TestHarness::new();

    let result = h
        .dispatcher
        .place_order(OrderRequest::new(Vec::new()))
        .await;

    assert!(matches!(result, Err(PlacementError::Validation(_))));
    assert_eq!(h.inventory.call_count(), 0);
}

#[tokio::test]
async fn closed_pool_fails_placements() {
    let h = TestHarness::new();
    h.dispatcher.close();

    let result = h
        .dispatcher
        .place_order(single_line("A1", "10.00", 1))
        .await;

    assert!(matches!(result, Err(PlacementError::WorkerFailed(_))));
}

/// Inventory that brings the worker down.
struct PanickingInventory;

#[async_trait]
impl InventoryClient for PanickingInventory {
    async fn check_stock(
        &self,
        _skus: &BTreeSet<Sku>,
        _deadline: Duration,
    ) -> Result<Vec<StockAvailability>, InventoryError> {
        panic!("inventory client crashed");
    }
}

#[tokio::test]
async fn panicking_worker_resolves_as_worker_failed() {
    let registry = CircuitBreakerRegistry::default();
    let service = OrderPlacementService::new(
        InMemoryOrderRepository::new(),
        PanickingInventory,
        InMemoryEventPublisher::new(),
        &registry,
        &PlacementConfig::default(),
    );
    let dispatcher = OrderDispatcher::new(Arc::new(service), 2);

    let result = dispatcher
        .place_order(single_line("A1", "10.00", 1))
        .await;

    assert!(matches!(result, Err(PlacementError::WorkerFailed(_))));
    // The worker slot is given back even though the task panicked
    assert_eq!(dispatcher.idle_workers(), 2);
}
