//! Domain error types.

use rust_decimal::Decimal;
use thiserror::Error;

/// Reasons an order (or cart) is rejected before any external call is made.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// The order has no line items.
    #[error("Order has no items")]
    NoItems,

    /// A line has a non-positive or out-of-range quantity.
    #[error("Invalid quantity {quantity} for sku {sku} (must be greater than 0)")]
    InvalidQuantity { sku: String, quantity: i64 },

    /// A line has a non-positive unit price.
    #[error("Invalid price {price} for sku {sku} (must be greater than 0)")]
    InvalidPrice { sku: String, price: Decimal },

    /// A line is missing its sku code.
    #[error("Missing sku for product {product_id}")]
    BlankSku { product_id: i64 },

    /// Pricing exceeded the representable decimal range.
    #[error("Order amount is too large")]
    AmountOverflow,

    /// The cart was already turned into an order.
    #[error("Cart has already been checked out")]
    CartCheckedOut,
}

/// A stored status string did not name a known variant.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Unknown {kind}: {value}")]
pub struct ParseStatusError {
    pub kind: &'static str,
    pub value: String,
}
