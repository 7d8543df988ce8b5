//! Value objects for the cart and catalog

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Composite index of a cart line.
///
/// Two lines are the same purchasable selection when product, chosen
/// variants and configuration all match. The key is the stable string form
/// of that triple and doubles as the map key in the persisted session
/// document.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ItemKey(String);

impl ItemKey {
    pub fn for_selection(
        product_id: Uuid,
        variant_ids: &[Uuid],
        configurable_id: Option<Uuid>,
    ) -> Self {
        let variants = variant_ids
            .iter()
            .map(Uuid::to_string)
            .collect::<Vec<_>>()
            .join("_");
        let configurable = configurable_id.map(|id| id.to_string()).unwrap_or_default();
        Self(format!("{product_id}:{variants}:{configurable}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for ItemKey {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl fmt::Display for ItemKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Order quantity, never below one.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Quantity(u32);

impl Quantity {
    /// Clamp arbitrary client input to a usable quantity. Anything that is
    /// not a positive number counts as one.
    pub fn at_least_one(raw: i64) -> Self {
        if raw < 1 {
            Self(1)
        } else {
            Self(u32::try_from(raw).unwrap_or(u32::MAX))
        }
    }

    pub fn value(self) -> u32 {
        self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_item_key_deterministic() {
        let product = Uuid::new_v4();
        let variants = vec![Uuid::new_v4(), Uuid::new_v4()];
        let a = ItemKey::for_selection(product, &variants, None);
        let b = ItemKey::for_selection(product, &variants, None);
        assert_eq!(a, b);
    }

    #[test]
    fn test_item_key_distinguishes_configuration() {
        let product = Uuid::new_v4();
        let config = Uuid::new_v4();
        let a = ItemKey::for_selection(product, &[], None);
        let b = ItemKey::for_selection(product, &[], Some(config));
        assert_ne!(a, b);
    }

    #[test]
    fn test_item_key_order_sensitive_variants() {
        let product = Uuid::new_v4();
        let v1 = Uuid::new_v4();
        let v2 = Uuid::new_v4();
        let a = ItemKey::for_selection(product, &[v1, v2], None);
        let b = ItemKey::for_selection(product, &[v2, v1], None);
        assert_ne!(a, b);
    }

    #[test]
    fn test_quantity_clamps() {
        assert_eq!(Quantity::at_least_one(0).value(), 1);
        assert_eq!(Quantity::at_least_one(-3).value(), 1);
        assert_eq!(Quantity::at_least_one(5).value(), 5);
    }
}
