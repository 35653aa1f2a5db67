//! Order aggregate implementation.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use common::{OrderId, OrderNumber, UserId};
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

use super::{LineItemFields, Money, OrderStatus, PaymentMethod, PaymentStatus, Sku};

/// A priced line of an order.
///
/// Immutable once the order exists; only the order that owns it can build one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderLineItem {
    #[serde(flatten)]
    fields: LineItemFields,
    line_total: Money,
}

impl OrderLineItem {
    /// Validates and prices a line.
    pub(crate) fn price(fields: LineItemFields) -> Result<Self, ValidationError> {
        fields.validate()?;
        let line_total = fields.total()?;
        Ok(Self { fields, line_total })
    }

    pub fn fields(&self) -> &LineItemFields {
        &self.fields
    }

    pub fn sku(&self) -> &Sku {
        &self.fields.sku
    }

    pub fn quantity(&self) -> u32 {
        self.fields.quantity
    }

    pub fn unit_price(&self) -> Money {
        self.fields.unit_price
    }

    /// Returns `unit_price × quantity`.
    pub fn line_total(&self) -> Money {
        self.line_total
    }
}

/// Partial update of the mutable order attributes.
///
/// Totals and line items are deliberately absent: they are fixed at placement.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderUpdate {
    pub status: Option<OrderStatus>,
    pub payment_method: Option<PaymentMethod>,
    pub payment_status: Option<PaymentStatus>,
}

impl OrderUpdate {
    /// Returns true if the update changes nothing.
    pub fn is_empty(&self) -> bool {
        self.status.is_none() && self.payment_method.is_none() && self.payment_status.is_none()
    }
}

/// Order aggregate root.
///
/// The order and its line items form one consistency unit: they are built
/// together, priced together and persisted together. `total_amount` is always
/// the exact sum of the line totals.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Order {
    /// Store-assigned key, absent until the order is committed.
    id: Option<OrderId>,
    order_number: OrderNumber,
    user_id: Option<UserId>,
    status: OrderStatus,
    total_amount: Money,
    payment_method: Option<PaymentMethod>,
    payment_status: PaymentStatus,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    items: Vec<OrderLineItem>,
}

impl Order {
    /// Builds a freshly placed order in `Created` / `Pending` state.
    pub(crate) fn place(
        order_number: OrderNumber,
        user_id: Option<UserId>,
        items: Vec<OrderLineItem>,
        now: DateTime<Utc>,
    ) -> Result<Self, ValidationError> {
        let total_amount = sum_line_totals(&items)?;

        Ok(Self {
            id: None,
            order_number,
            user_id,
            status: OrderStatus::Created,
            total_amount,
            payment_method: None,
            payment_status: PaymentStatus::Pending,
            created_at: now,
            updated_at: now,
            items,
        })
    }

    /// Rebuilds a committed order from storage.
    ///
    /// Line totals and the order total are recomputed from the stored fields,
    /// so a restored order always satisfies the pricing invariant.
    #[allow(clippy::too_many_arguments)]
    pub fn restore(
        id: OrderId,
        order_number: OrderNumber,
        user_id: Option<UserId>,
        status: OrderStatus,
        payment_method: Option<PaymentMethod>,
        payment_status: PaymentStatus,
        created_at: DateTime<Utc>,
        updated_at: DateTime<Utc>,
        lines: Vec<LineItemFields>,
    ) -> Result<Self, ValidationError> {
        let items = lines
            .into_iter()
            .map(OrderLineItem::price)
            .collect::<Result<Vec<_>, _>>()?;
        let total_amount = sum_line_totals(&items)?;

        Ok(Self {
            id: Some(id),
            order_number,
            user_id,
            status,
            total_amount,
            payment_method,
            payment_status,
            created_at,
            updated_at,
            items,
        })
    }

    /// Returns the order with its store-assigned key set.
    pub fn with_id(mut self, id: OrderId) -> Self {
        self.id = Some(id);
        self
    }

    /// Applies a partial update, touching `updated_at` when anything changed.
    pub fn apply_update(&mut self, update: &OrderUpdate, now: DateTime<Utc>) {
        if update.is_empty() {
            return;
        }
        if let Some(status) = update.status {
            self.status = status;
        }
        if let Some(method) = update.payment_method {
            self.payment_method = Some(method);
        }
        if let Some(payment_status) = update.payment_status {
            self.payment_status = payment_status;
        }
        self.updated_at = now;
    }
}

// Query methods
impl Order {
    pub fn id(&self) -> Option<OrderId> {
        self.id
    }

    pub fn order_number(&self) -> OrderNumber {
        self.order_number
    }

    pub fn user_id(&self) -> Option<UserId> {
        self.user_id
    }

    pub fn status(&self) -> OrderStatus {
        self.status
    }

    pub fn total_amount(&self) -> Money {
        self.total_amount
    }

    pub fn payment_method(&self) -> Option<PaymentMethod> {
        self.payment_method
    }

    pub fn payment_status(&self) -> PaymentStatus {
        self.payment_status
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    /// Returns the line items in request order.
    pub fn items(&self) -> &[OrderLineItem] {
        &self.items
    }

    pub fn item_count(&self) -> usize {
        self.items.len()
    }

    /// Returns the distinct skus the order needs confirmed in stock.
    pub fn skus(&self) -> BTreeSet<Sku> {
        self.items.iter().map(|item| item.sku().clone()).collect()
    }
}

fn sum_line_totals(items: &[OrderLineItem]) -> Result<Money, ValidationError> {
    if items.is_empty() {
        return Err(ValidationError::NoItems);
    }

    items.iter().try_fold(Money::zero(), |total, item| {
        total
            .checked_add(item.line_total())
            .ok_or(ValidationError::AmountOverflow)
    })
}
