//! Shopping cart that feeds order placement at checkout.

use chrono::{DateTime, Utc};
use common::UserId;
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::order::{LineItemFields, Money, OrderLineRequest, OrderRequest, Sku};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CartStatus {
    #[default]
    Active,
    CheckedOut,
}

/// A line in a cart. Shares its base fields with order lines.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartItem {
    #[serde(flatten)]
    pub fields: LineItemFields,
    pub total_price: Money,
}

/// A user's cart. One active cart per user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Cart {
    user_id: UserId,
    status: CartStatus,
    items: Vec<CartItem>,
    total_price: Money,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl Cart {
    pub fn new(user_id: UserId) -> Self {
        let now = Utc::now();
        Self {
            user_id,
            status: CartStatus::Active,
            items: Vec::new(),
            total_price: Money::zero(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn user_id(&self) -> UserId {
        self.user_id
    }

    pub fn status(&self) -> CartStatus {
        self.status
    }

    pub fn items(&self) -> &[CartItem] {
        &self.items
    }

    pub fn total_price(&self) -> Money {
        self.total_price
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    /// Adds a line, merging quantities when the sku is already in the cart.
    pub fn add_item(&mut self, fields: LineItemFields) -> Result<(), ValidationError> {
        self.ensure_active()?;
        fields.validate()?;

        if let Some(existing) = self.items.iter_mut().find(|i| i.fields.sku == fields.sku) {
            let mut merged = existing.fields.clone();
            merged.quantity = merged
                .quantity
                .checked_add(fields.quantity)
                .ok_or(ValidationError::AmountOverflow)?;
            merged.unit_price = fields.unit_price;
            existing.total_price = merged.total()?;
            existing.fields = merged;
        } else {
            let total_price = fields.total()?;
            self.items.push(CartItem {
                fields,
                total_price,
            });
        }

        self.recalculate()
    }

    /// Removes every line with the given sku. Returns true if one was removed.
    pub fn remove_item(&mut self, sku: &Sku) -> Result<bool, ValidationError> {
        self.ensure_active()?;
        let before = self.items.len();
        self.items.retain(|item| &item.fields.sku != sku);
        let removed = self.items.len() != before;
        if removed {
            self.recalculate()?;
        }
        Ok(removed)
    }

    /// Closes the cart and produces the order request to place.
    pub fn checkout(&mut self) -> Result<OrderRequest, ValidationError> {
        self.ensure_active()?;
        if self.items.is_empty() {
            return Err(ValidationError::NoItems);
        }

        let lines = self
            .items
            .iter()
            .map(|item| {
                OrderLineRequest::new(
                    item.fields.product_id.as_i64(),
                    item.fields.sku.as_str(),
                    item.fields.unit_price.amount(),
                    i64::from(item.fields.quantity),
                )
            })
            .collect();

        self.status = CartStatus::CheckedOut;
        self.updated_at = Utc::now();
        Ok(OrderRequest::for_user(self.user_id, lines))
    }

    fn ensure_active(&self) -> Result<(), ValidationError> {
        match self.status {
            CartStatus::Active => Ok(()),
            CartStatus::CheckedOut => Err(ValidationError::CartCheckedOut),
        }
    }

    fn recalculate(&mut self) -> Result<(), ValidationError> {
        self.total_price = self.items.iter().try_fold(Money::zero(), |total, item| {
            total
                .checked_add(item.total_price)
                .ok_or(ValidationError::AmountOverflow)
        })?;
        self.updated_at = Utc::now();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fields(sku: &str, cents: i64, quantity: u32) -> LineItemFields {
        LineItemFields::new(1, sku, Money::from_cents(cents), quantity)
    }

    #[test]
    fn test_add_items_updates_total() {
        let mut cart = Cart::new(UserId::new(1));
        cart.add_item(fields("A1", 1000, 2)).unwrap();
        cart.add_item(fields("B2", 250, 1)).unwrap();

        assert_eq!(cart.items().len(), 2);
        assert_eq!(cart.total_price(), Money::from_cents(2250));
    }

    #[test]
    fn test_same_sku_merges_quantity() {
        let mut cart = Cart::new(UserId::new(1));
        cart.add_item(fields("A1", 1000, 2)).unwrap();
        cart.add_item(fields("A1", 1000, 3)).unwrap();

        assert_eq!(cart.items().len(), 1);
        assert_eq!(cart.items()[0].fields.quantity, 5);
        assert_eq!(cart.total_price(), Money::from_cents(5000));
    }

    #[test]
    fn test_invalid_line_is_rejected() {
        let mut cart = Cart::new(UserId::new(1));
        assert!(cart.add_item(fields("A1", 1000, 0)).is_err());
        assert!(cart.items().is_empty());
    }

    #[test]
    fn test_remove_item() {
        let mut cart = Cart::new(UserId::new(1));
        cart.add_item(fields("A1", 1000, 2)).unwrap();
        assert!(cart.remove_item(&Sku::new("A1")).unwrap());
        assert!(!cart.remove_item(&Sku::new("A1")).unwrap());
        assert!(cart.total_price().is_zero());
    }

    #[test]
    fn test_checkout_produces_order_request_and_closes_cart() {
        let mut cart = Cart::new(UserId::new(9));
        cart.add_item(fields("A1", 1000, 2)).unwrap();

        let request = cart.checkout().unwrap();

        assert_eq!(request.user_id, Some(UserId::new(9)));
        assert_eq!(request.items.len(), 1);
        assert_eq!(request.items[0].sku, "A1");
        assert_eq!(request.items[0].quantity, 2);
        assert_eq!(cart.status(), CartStatus::CheckedOut);
        assert_eq!(
            cart.add_item(fields("B2", 100, 1)),
            Err(ValidationError::CartCheckedOut)
        );
    }

    #[test]
    fn test_empty_cart_cannot_check_out() {
        let mut cart = Cart::new(UserId::new(9));
        assert_eq!(cart.checkout().unwrap_err(), ValidationError::NoItems);
        assert_eq!(cart.status(), CartStatus::Active);
    }
}
