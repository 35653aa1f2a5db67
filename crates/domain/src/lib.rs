//! Domain layer for order placement.
//!
//! This crate provides:
//! - The `Order` aggregate with its priced line items
//! - The `OrderAssembler` that validates and prices incoming requests
//! - The shared line-item schema used by orders and carts
//! - The `OrderPlacedEvent` notification

pub mod cart;
pub mod error;
pub mod order;

pub use cart::{Cart, CartItem, CartStatus};
pub use error::{ParseStatusError, ValidationError};
pub use order::{
    LineItemFields, Money, ORDER_NOTIFICATIONS_TOPIC, Order, OrderAssembler, OrderLineItem,
    OrderLineRequest, OrderPlacedEvent, OrderRequest, OrderStatus, OrderUpdate, PaymentMethod,
    PaymentStatus, ProductId, Sku,
};
