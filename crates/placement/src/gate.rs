//! Accept/reject decision and the atomic commit that follows it.

use std::collections::{BTreeSet, HashMap};

use domain::{Order, Sku};
use order_store::OrderRepository;

use crate::error::{PlacementError, Result};
use crate::services::StockAvailability;

/// Accepts only if every requested sku is confirmed in stock.
///
/// A sku is confirmed when the inventory answered for it and no entry for it
/// says out of stock. Rejections list the offending skus in sorted order.
pub fn decide(requested: &BTreeSet<Sku>, availability: &[StockAvailability]) -> Result<()> {
    let mut answers: HashMap<&Sku, bool> = HashMap::with_capacity(availability.len());
    for entry in availability {
        answers
            .entry(&entry.sku)
            .and_modify(|in_stock| *in_stock &= entry.in_stock)
            .or_insert(entry.in_stock);
    }

    let missing: Vec<String> = requested
        .iter()
        .filter(|sku| answers.get(sku) != Some(&true))
        .map(|sku| sku.as_str().to_string())
        .collect();

    if missing.is_empty() {
        Ok(())
    } else {
        Err(PlacementError::OutOfStock { skus: missing })
    }
}

/// Persists an accepted order with all of its line items. Never retried.
pub async fn commit<R>(repository: &R, order: Order) -> Result<Order>
where
    R: OrderRepository + ?Sized,
{
    let order_number = order.order_number();
    repository.create(order).await.map_err(|err| {
        tracing::error!(%order_number, error = %err, "Failed to persist order");
        PlacementError::Persistence(err)
    })
}
