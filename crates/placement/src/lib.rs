//! Order placement orchestration.
//!
//! A placement runs these steps, strictly in order:
//! 1. Assemble and validate the order (no network before this succeeds)
//! 2. Check stock through the resilient inventory wrapper
//! 3. Accept only if every sku is confirmed in stock
//! 4. Commit the order and its line items atomically
//! 5. Publish an `OrderPlacedEvent`; failures here never undo step 4
//!
//! The [`OrderDispatcher`] runs placements on a bounded pool of spawned
//! workers and hands back a [`PlacementHandle`] right away.

pub mod config;
pub mod coordinator;
pub mod dispatcher;
pub mod error;
pub mod gate;
pub mod resilient;
pub mod services;

pub use config::PlacementConfig;
pub use coordinator::{Confirmation, OrderPlacementService, PLACED_MESSAGE};
pub use dispatcher::{DEFAULT_QUEUE_CAPACITY, OrderDispatcher, PlacementHandle};
pub use error::{FALLBACK_MESSAGE, PlacementError, Result};
pub use resilient::{INVENTORY_BREAKER, ResilientInventory};
pub use services::{
    BroadcastEventPublisher, EventPublisher, HttpInventoryClient, InMemoryEventPublisher,
    InMemoryInventoryClient, InventoryClient, InventoryError, PublishError, PublishedEvent,
    StockAvailability,
};
