//! Cart Aggregate
//!
//! A cart is a mapping from [`ItemKey`] to line item, persisted as one
//! document per session. Mutators never fail: unknown keys degrade to
//! no-ops so stale client state cannot poison the session.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

use crate::domain::value_objects::{ItemKey, Quantity};

/// One line in the cart: a product, the chosen variants in selection
/// order, and the concrete configuration when the product is sold through
/// configurations.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CartItem {
    pub product_id: Uuid,
    #[serde(default)]
    pub variant_ids: Vec<Uuid>,
    #[serde(default)]
    pub configurable_id: Option<Uuid>,
    pub quantity: u32,
    /// Unit price captured when the line was added.
    pub unit_price: Decimal,
}

impl CartItem {
    pub fn key(&self) -> ItemKey {
        ItemKey::for_selection(self.product_id, &self.variant_ids, self.configurable_id)
    }

    pub fn line_total(&self) -> Decimal {
        self.unit_price * Decimal::from(self.quantity)
    }
}

/// Session cart: item key to line item.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Cart {
    items: BTreeMap<ItemKey, CartItem>,
}

impl Cart {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn items(&self) -> impl Iterator<Item = (&ItemKey, &CartItem)> {
        self.items.iter()
    }

    pub fn get(&self, key: &ItemKey) -> Option<&CartItem> {
        self.items.get(key)
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Number of distinct lines, not the summed quantity. Kept this way on
    /// purpose: the header badge shows "3 items" for three lines regardless
    /// of their quantities.
    pub fn count_items(&self) -> usize {
        self.items.len()
    }

    /// Add a line. A line with the same product/variants/configuration
    /// already in the cart gains one unit; the incoming quantity is ignored
    /// in that case. No stock or catalog validation happens here.
    pub fn add(&mut self, item: CartItem) -> ItemKey {
        let key = item.key();
        match self.items.get_mut(&key) {
            Some(existing) => existing.quantity = existing.quantity.saturating_add(1),
            None => {
                self.items.insert(key.clone(), item);
            }
        }
        key
    }

    /// Remove a line. Absent keys are a no-op.
    pub fn remove(&mut self, key: &ItemKey) {
        self.items.remove(key);
    }

    /// Set new quantities. Values below one land at one; keys that are not
    /// in the cart are ignored.
    pub fn recount(&mut self, updates: &[(ItemKey, i64)]) {
        for (key, quantity) in updates {
            if let Some(item) = self.items.get_mut(key) {
                item.quantity = Quantity::at_least_one(*quantity).value();
            }
        }
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }

    /// Sum of line totals at their captured unit prices.
    pub fn subtotal(&self) -> Decimal {
        self.items.values().map(CartItem::line_total).sum()
    }
}
