//! Turns an incoming order request into a priced, validated order.

use chrono::{DateTime, Utc};
use common::{OrderNumber, UserId};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

use super::{LineItemFields, Money, Order, OrderLineItem, ProductId, Sku};

/// One requested line, as received from the client.
///
/// Quantity is kept signed so that negative input is reported as a validation
/// error instead of a decoding failure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderLineRequest {
    pub product_id: i64,
    pub sku: String,
    pub unit_price: Decimal,
    pub quantity: i64,
}

impl OrderLineRequest {
    pub fn new(
        product_id: i64,
        sku: impl Into<String>,
        unit_price: Decimal,
        quantity: i64,
    ) -> Self {
        Self {
            product_id,
            sku: sku.into(),
            unit_price,
            quantity,
        }
    }
}

/// An order submission.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderRequest {
    #[serde(default)]
    pub user_id: Option<UserId>,
    pub items: Vec<OrderLineRequest>,
}

impl OrderRequest {
    pub fn new(items: Vec<OrderLineRequest>) -> Self {
        Self {
            user_id: None,
            items,
        }
    }

    pub fn for_user(user_id: UserId, items: Vec<OrderLineRequest>) -> Self {
        Self {
            user_id: Some(user_id),
            items,
        }
    }
}

/// Validates and prices order requests.
///
/// Assembly is pure: no I/O happens here, so every rejection it produces is
/// raised before the inventory service is contacted. Each assembled order
/// gets a fresh order number, even if it is later rejected.
#[derive(Debug, Clone, Copy, Default)]
pub struct OrderAssembler;

impl OrderAssembler {
    pub fn new() -> Self {
        Self
    }

    /// Assembles an order stamped with the current time.
    pub fn assemble(&self, request: OrderRequest) -> Result<Order, ValidationError> {
        self.assemble_at(request, Utc::now())
    }

    /// Assembles an order stamped with the given time.
    pub fn assemble_at(
        &self,
        request: OrderRequest,
        now: DateTime<Utc>,
    ) -> Result<Order, ValidationError> {
        if request.items.is_empty() {
            return Err(ValidationError::NoItems);
        }

        let items = request
            .items
            .into_iter()
            .map(|line| {
                let quantity = u32::try_from(line.quantity)
                    .ok()
                    .filter(|q| *q > 0)
                    .ok_or_else(|| ValidationError::InvalidQuantity {
                        sku: line.sku.clone(),
                        quantity: line.quantity,
                    })?;

                OrderLineItem::price(LineItemFields {
                    product_id: ProductId::new(line.product_id),
                    sku: Sku::new(line.sku),
                    unit_price: Money::new(line.unit_price),
                    quantity,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Order::place(OrderNumber::generate(), request.user_id, items, now)
    }
}
