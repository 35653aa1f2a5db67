//! Order aggregate and related types.

mod aggregate;
mod assembler;
mod events;
mod state;
mod value_objects;

pub use aggregate::{Order, OrderLineItem, OrderUpdate};
pub use assembler::{OrderAssembler, OrderLineRequest, OrderRequest};
pub use events::{ORDER_NOTIFICATIONS_TOPIC, OrderPlacedEvent};
pub use state::{OrderStatus, PaymentMethod, PaymentStatus};
pub use value_objects::{LineItemFields, Money, ProductId, Sku};
