use async_trait::async_trait;
use common::{OrderId, OrderNumber, UserId};
use domain::{Order, OrderUpdate};

use crate::Result;

/// Core trait for order storage implementations.
///
/// An order and its line items are always written as one unit: `create`
/// either stores everything or nothing. All implementations must be
/// thread-safe (Send + Sync).
#[async_trait]
pub trait OrderRepository: Send + Sync {
    /// Persists a new order with all of its line items atomically.
    ///
    /// Returns the stored order with its store-assigned id. Fails with
    /// `DuplicateOrderNumber` if the order number is already taken.
    async fn create(&self, order: Order) -> Result<Order>;

    /// Finds an order by its store-assigned id.
    async fn find_by_id(&self, id: OrderId) -> Result<Option<Order>>;

    /// Finds an order by its order number.
    async fn find_by_order_number(&self, order_number: OrderNumber) -> Result<Option<Order>>;

    /// Returns a user's orders, newest first.
    async fn find_by_user(&self, user_id: UserId) -> Result<Vec<Order>>;

    /// Returns every order in id order.
    async fn find_all(&self) -> Result<Vec<Order>>;

    /// Applies a partial update and returns the updated order.
    ///
    /// Fails with `OrderNotFound` if no order has the given id.
    async fn update(&self, id: OrderId, update: OrderUpdate) -> Result<Order>;

    /// Deletes an order and its line items.
    ///
    /// Fails with `OrderNotFound` if no order has the given id.
    async fn delete(&self, id: OrderId) -> Result<()>;
}

/// Extension trait providing convenience methods for order repositories.
#[async_trait]
pub trait OrderRepositoryExt: OrderRepository {
    /// Checks if an order number is already stored.
    async fn order_number_exists(&self, order_number: OrderNumber) -> Result<bool> {
        Ok(self.find_by_order_number(order_number).await?.is_some())
    }
}

// Blanket implementation for all OrderRepository implementations
impl<T: OrderRepository + ?Sized> OrderRepositoryExt for T {}
