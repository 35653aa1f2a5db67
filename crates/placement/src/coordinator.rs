//! The placement pipeline: assemble, check stock, decide, commit, notify.

use std::time::Duration;

use common::OrderNumber;
use domain::{
    Money, ORDER_NOTIFICATIONS_TOPIC, Order, OrderAssembler, OrderPlacedEvent, OrderRequest,
};
use order_store::OrderRepository;
use resilience::CircuitBreakerRegistry;
use serde::Serialize;

use crate::config::PlacementConfig;
use crate::error::Result;
use crate::gate;
use crate::resilient::ResilientInventory;
use crate::services::{EventPublisher, InventoryClient, PublishError};

/// Message returned with every placed order.
pub const PLACED_MESSAGE: &str = "Order Placed successfully";

/// What the caller learns about a placed order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Confirmation {
    pub message: String,
    pub order_number: OrderNumber,
    pub total_amount: Money,
}

impl Confirmation {
    fn placed(order: &Order) -> Self {
        Self {
            message: PLACED_MESSAGE.to_string(),
            order_number: order.order_number(),
            total_amount: order.total_amount(),
        }
    }
}

/// Runs one order placement from request to notification.
///
/// Steps run strictly in order: assembly and validation, a resilient stock
/// check, the accept/reject decision, the atomic commit, and finally the
/// notification. A rejected or failed placement never reaches the store; a
/// failed notification never undoes a commit.
pub struct OrderPlacementService<R, I, P>
where
    R: OrderRepository,
    I: InventoryClient,
    P: EventPublisher,
{
    assembler: OrderAssembler,
    inventory: ResilientInventory<I>,
    repository: R,
    publisher: P,
    publish_timeout: Duration,
}

impl<R, I, P> OrderPlacementService<R, I, P>
where
    R: OrderRepository,
    I: InventoryClient,
    P: EventPublisher,
{
    /// Creates a placement service whose inventory calls share the
    /// `inventory` breaker of `registry`.
    pub fn new(
        repository: R,
        inventory: I,
        publisher: P,
        registry: &CircuitBreakerRegistry,
        config: &PlacementConfig,
    ) -> Self {
        Self {
            assembler: OrderAssembler::new(),
            inventory: ResilientInventory::from_registry(
                inventory,
                registry,
                config.inventory.clone(),
            ),
            repository,
            publisher,
            publish_timeout: config.publish_timeout,
        }
    }

    pub fn repository(&self) -> &R {
        &self.repository
    }

    pub fn inventory(&self) -> &ResilientInventory<I> {
        &self.inventory
    }

    pub fn publisher(&self) -> &P {
        &self.publisher
    }

    /// Places an order.
    #[tracing::instrument(skip(self, request), fields(items = request.items.len()))]
    pub async fn place(&self, request: OrderRequest) -> Result<Confirmation> {
        metrics::counter!("order_placements_total").increment(1);
        let started = std::time::Instant::now();

        let result = self.run(request).await;

        let outcome = match &result {
            Ok(_) => "placed",
            Err(err) => err.outcome(),
        };
        metrics::counter!("order_placements_by_outcome_total", "outcome" => outcome).increment(1);
        metrics::histogram!("order_placement_duration_seconds")
            .record(started.elapsed().as_secs_f64());

        match &result {
            Ok(confirmation) => tracing::info!(
                order_number = %confirmation.order_number,
                total_amount = %confirmation.total_amount,
                "Order placed"
            ),
            Err(err) => tracing::info!(outcome, error = %err, "Order not placed"),
        }

        result
    }

    async fn run(&self, request: OrderRequest) -> Result<Confirmation> {
        let order = self.assembler.assemble(request)?;
        let order_number = order.order_number();
        let skus = order.skus();
        tracing::debug!(%order_number, skus = skus.len(), "Order assembled");

        let availability = self.inventory.check_stock(&skus).await?;
        gate::decide(&skus, &availability)?;

        let stored = gate::commit(&self.repository, order).await?;
        self.notify(order_number).await;

        Ok(Confirmation::placed(&stored))
    }

    /// Publishes the placed-order notification. Failures are logged and
    /// counted only.
    async fn notify(&self, order_number: OrderNumber) {
        let event = OrderPlacedEvent::new(order_number);
        let published = tokio::time::timeout(
            self.publish_timeout,
            self.publisher.publish(ORDER_NOTIFICATIONS_TOPIC, event),
        )
        .await
        .unwrap_or(Err(PublishError::Timeout));

        match published {
            Ok(()) => tracing::debug!(
                %order_number,
                topic = ORDER_NOTIFICATIONS_TOPIC,
                "Order notification published"
            ),
            Err(err) => {
                metrics::counter!("order_notifications_failed_total").increment(1);
                tracing::warn!(
                    %order_number,
                    topic = ORDER_NOTIFICATIONS_TOPIC,
                    error = %err,
                    "Failed to publish order notification"
                );
            }
        }
    }
}
