//! Notifications emitted by order placement.

use common::OrderNumber;
use serde::{Deserialize, Serialize};

/// Topic that carries [`OrderPlacedEvent`]s to downstream consumers.
pub const ORDER_NOTIFICATIONS_TOPIC: &str = "order-notifications";

/// Emitted once for every committed order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderPlacedEvent {
    pub order_number: OrderNumber,
}

impl OrderPlacedEvent {
    pub fn new(order_number: OrderNumber) -> Self {
        Self { order_number }
    }

    /// Returns the event type name.
    pub fn event_type(&self) -> &'static str {
        "OrderPlaced"
    }
}
