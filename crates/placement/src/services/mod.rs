//! Collaborators of the placement pipeline: inventory lookup and notification publishing.

pub mod http_inventory;
pub mod inventory;
pub mod publisher;

pub use http_inventory::HttpInventoryClient;
pub use inventory::{InMemoryInventoryClient, InventoryClient, InventoryError, StockAvailability};
pub use publisher::{
    BroadcastEventPublisher, EventPublisher, InMemoryEventPublisher, PublishError, PublishedEvent,
};
