use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use common::{OrderId, OrderNumber, UserId};
use domain::{Order, OrderUpdate};
use tokio::sync::RwLock;

use crate::{OrderRepository, Result, StoreError};

#[derive(Default)]
struct InMemoryState {
    orders: BTreeMap<OrderId, Order>,
    by_number: HashMap<OrderNumber, OrderId>,
    next_id: i64,
}

/// In-memory order store for testing and local runs.
///
/// Provides the same interface and uniqueness guarantees as the PostgreSQL
/// implementation. Can be told to fail writes to exercise error paths.
#[derive(Clone, Default)]
pub struct InMemoryOrderRepository {
    state: Arc<RwLock<InMemoryState>>,
    fail_on_create: Arc<AtomicBool>,
    create_calls: Arc<AtomicUsize>,
}

impl InMemoryOrderRepository {
    /// Creates a new empty in-memory order store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Configures the store to fail every `create` call.
    pub fn set_fail_on_create(&self, fail: bool) {
        self.fail_on_create.store(fail, Ordering::SeqCst);
    }

    /// Returns how many times `create` was invoked, successful or not.
    pub fn create_calls(&self) -> usize {
        self.create_calls.load(Ordering::SeqCst)
    }

    /// Returns the number of stored orders.
    pub async fn order_count(&self) -> usize {
        self.state.read().await.orders.len()
    }

    /// Removes every stored order.
    pub async fn clear(&self) {
        let mut state = self.state.write().await;
        state.orders.clear();
        state.by_number.clear();
    }
}

#[async_trait]
impl OrderRepository for InMemoryOrderRepository {
    async fn create(&self, order: Order) -> Result<Order> {
        self.create_calls.fetch_add(1, Ordering::SeqCst);

        if self.fail_on_create.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("configured to fail".to_string()));
        }

        let mut state = self.state.write().await;

        // Unique constraint simulation
        if state.by_number.contains_key(&order.order_number()) {
            return Err(StoreError::DuplicateOrderNumber(order.order_number()));
        }

        state.next_id += 1;
        let id = OrderId::new(state.next_id);
        let stored = order.with_id(id);

        state.by_number.insert(stored.order_number(), id);
        state.orders.insert(id, stored.clone());

        Ok(stored)
    }

    async fn find_by_id(&self, id: OrderId) -> Result<Option<Order>> {
        Ok(self.state.read().await.orders.get(&id).cloned())
    }

    async fn find_by_order_number(&self, order_number: OrderNumber) -> Result<Option<Order>> {
        let state = self.state.read().await;
        Ok(state
            .by_number
            .get(&order_number)
            .and_then(|id| state.orders.get(id))
            .cloned())
    }

    async fn find_by_user(&self, user_id: UserId) -> Result<Vec<Order>> {
        let state = self.state.read().await;
        let mut orders: Vec<_> = state
            .orders
            .values()
            .filter(|o| o.user_id() == Some(user_id))
            .cloned()
            .collect();

        // Newest first, ties broken by id so the order is stable
        orders.sort_by(|a, b| {
            b.created_at()
                .cmp(&a.created_at())
                .then(b.id().cmp(&a.id()))
        });
        Ok(orders)
    }

    async fn find_all(&self) -> Result<Vec<Order>> {
        Ok(self.state.read().await.orders.values().cloned().collect())
    }

    async fn update(&self, id: OrderId, update: OrderUpdate) -> Result<Order> {
        let mut state = self.state.write().await;
        let order = state
            .orders
            .get_mut(&id)
            .ok_or(StoreError::OrderNotFound(id))?;

        order.apply_update(&update, Utc::now());
        Ok(order.clone())
    }

    async fn delete(&self, id: OrderId) -> Result<()> {
        let mut state = self.state.write().await;
        let order = state
            .orders
            .remove(&id)
            .ok_or(StoreError::OrderNotFound(id))?;
        state.by_number.remove(&order.order_number());
        Ok(())
    }
}
