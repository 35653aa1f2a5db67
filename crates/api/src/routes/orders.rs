//! Order placement and order management endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use chrono::{DateTime, Utc};
use common::{OrderId, OrderNumber, UserId};
use domain::{
    Money, Order, OrderLineItem, OrderRequest, OrderStatus, OrderUpdate, PaymentMethod,
    PaymentStatus,
};
use order_store::OrderRepository;
use placement::{Confirmation, EventPublisher, InventoryClient, OrderDispatcher};
use resilience::CircuitBreakerRegistry;
use serde::Serialize;

use crate::error::ApiError;

/// Shared application state accessible from all handlers.
pub struct AppState<R, I, P>
where
    R: OrderRepository,
    I: InventoryClient,
    P: EventPublisher,
{
    pub dispatcher: OrderDispatcher<R, I, P>,
    pub breakers: Arc<CircuitBreakerRegistry>,
}

impl<R, I, P> AppState<R, I, P>
where
    R: OrderRepository + 'static,
    I: InventoryClient + 'static,
    P: EventPublisher + 'static,
{
    pub fn repository(&self) -> &R {
        self.dispatcher.service().repository()
    }
}

// -- Response types --

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderResponse {
    pub id: Option<OrderId>,
    pub order_number: OrderNumber,
    pub user_id: Option<UserId>,
    pub status: OrderStatus,
    pub total_amount: Money,
    pub payment_method: Option<PaymentMethod>,
    pub payment_status: PaymentStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub items: Vec<OrderLineItem>,
}

impl From<&Order> for OrderResponse {
    fn from(order: &Order) -> Self {
        Self {
            id: order.id(),
            order_number: order.order_number(),
            user_id: order.user_id(),
            status: order.status(),
            total_amount: order.total_amount(),
            payment_method: order.payment_method(),
            payment_status: order.payment_status(),
            created_at: order.created_at(),
            updated_at: order.updated_at(),
            items: order.items().to_vec(),
        }
    }
}

fn to_responses(orders: &[Order]) -> Vec<OrderResponse> {
    orders.iter().map(OrderResponse::from).collect()
}

// -- Handlers --

/// POST /order: Place an order.
///
/// The placement runs on the dispatcher's worker pool; the handler only
/// waits for its outcome.
#[tracing::instrument(skip(state, request), fields(items = request.items.len()))]
pub async fn create<R, I, P>(
    State(state): State<Arc<AppState<R, I, P>>>,
    Json(request): Json<OrderRequest>,
) -> Result<(StatusCode, Json<Confirmation>), ApiError>
where
    R: OrderRepository + 'static,
    I: InventoryClient + 'static,
    P: EventPublisher + 'static,
{
    let confirmation = state.dispatcher.place_order(request).await?;
    Ok((StatusCode::CREATED, Json(confirmation)))
}

/// GET /order: Every stored order.
#[tracing::instrument(skip(state))]
pub async fn list<R, I, P>(
    State(state): State<Arc<AppState<R, I, P>>>,
) -> Result<Json<Vec<OrderResponse>>, ApiError>
where
    R: OrderRepository + 'static,
    I: InventoryClient + 'static,
    P: EventPublisher + 'static,
{
    let orders = state.repository().find_all().await?;
    Ok(Json(to_responses(&orders)))
}

/// GET /order/{id}
#[tracing::instrument(skip(state))]
pub async fn get<R, I, P>(
    State(state): State<Arc<AppState<R, I, P>>>,
    Path(id): Path<i64>,
) -> Result<Json<OrderResponse>, ApiError>
where
    R: OrderRepository + 'static,
    I: InventoryClient + 'static,
    P: EventPublisher + 'static,
{
    let order = state
        .repository()
        .find_by_id(OrderId::new(id))
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Order {id} not found")))?;

    Ok(Json(OrderResponse::from(&order)))
}

/// GET /order/number/{order_number}
#[tracing::instrument(skip(state))]
pub async fn by_number<R, I, P>(
    State(state): State<Arc<AppState<R, I, P>>>,
    Path(order_number): Path<String>,
) -> Result<Json<OrderResponse>, ApiError>
where
    R: OrderRepository + 'static,
    I: InventoryClient + 'static,
    P: EventPublisher + 'static,
{
    let number: OrderNumber = order_number
        .parse()
        .map_err(|e| ApiError::BadRequest(format!("Invalid order number: {e}")))?;

    let order = state
        .repository()
        .find_by_order_number(number)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Order {number} not found")))?;

    Ok(Json(OrderResponse::from(&order)))
}

/// GET /order/user/{user_id}: A user's orders, newest first. Empty if none.
#[tracing::instrument(skip(state))]
pub async fn by_user<R, I, P>(
    State(state): State<Arc<AppState<R, I, P>>>,
    Path(user_id): Path<i64>,
) -> Result<Json<Vec<OrderResponse>>, ApiError>
where
    R: OrderRepository + 'static,
    I: InventoryClient + 'static,
    P: EventPublisher + 'static,
{
    let orders = state.repository().find_by_user(UserId::new(user_id)).await?;
    Ok(Json(to_responses(&orders)))
}

/// PUT /order/{id}: Change status or payment details.
#[tracing::instrument(skip(state, update))]
pub async fn update<R, I, P>(
    State(state): State<Arc<AppState<R, I, P>>>,
    Path(id): Path<i64>,
    Json(update): Json<OrderUpdate>,
) -> Result<Json<OrderResponse>, ApiError>
where
    R: OrderRepository + 'static,
    I: InventoryClient + 'static,
    P: EventPublisher + 'static,
{
    let order = state.repository().update(OrderId::new(id), update).await?;
    tracing::info!(order_id = id, status = %order.status(), "Order updated");

    Ok(Json(OrderResponse::from(&order)))
}

/// DELETE /order/{id}
#[tracing::instrument(skip(state))]
pub async fn delete<R, I, P>(
    State(state): State<Arc<AppState<R, I, P>>>,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError>
where
    R: OrderRepository + 'static,
    I: InventoryClient + 'static,
    P: EventPublisher + 'static,
{
    state.repository().delete(OrderId::new(id)).await?;
    tracing::info!(order_id = id, "Order deleted");

    Ok(StatusCode::NO_CONTENT)
}
