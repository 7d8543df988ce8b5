//! Product Aggregate

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::currency::{format_amount, CurrencyConverter};

/// Catalog entry. Either a concrete purchasable product or, when
/// `use_configurations` is set, an abstract parent whose price fields are
/// derived from its child configurations.
#[derive(Clone, Debug, Serialize, Deserialize, sqlx::FromRow)]
pub struct Product {
    pub id: Uuid,
    pub sku: String,
    pub name: String,
    /// Own price for concrete products, min of the children for
    /// configurable ones.
    pub price: Decimal,
    /// Max of the children prices. Only maintained for configurable
    /// products.
    pub max_price: Option<Decimal>,
    pub use_configurations: bool,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Product {
    pub fn new(
        sku: impl Into<String>,
        name: impl Into<String>,
        price: Decimal,
        use_configurations: bool,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::now_v7(),
            sku: sku.into(),
            name: name.into(),
            // A configurable parent has no price of its own until
            // propagation derives one from its children.
            price: if use_configurations { Decimal::ZERO } else { price },
            max_price: None,
            use_configurations,
            is_active: true,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }

    /// Converted, formatted price for listings. A configurable product with
    /// a known max price renders as a range.
    pub fn price_range(&self, currency: &dyn CurrencyConverter) -> String {
        let symbol = currency.symbol();
        let price = format_amount(currency.convert(self.price));
        match self.max_price {
            Some(max) if self.use_configurations && max > Decimal::ZERO => {
                let max = format_amount(currency.convert(max));
                format!("{price} {symbol} - {max} {symbol}")
            }
            _ => format!("{price} {symbol}"),
        }
    }
}

/// How a variant's amount applies to the running price.
///
/// Stored as a smallint: 0 = flat, 1 = percent.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[repr(i16)]
#[serde(rename_all = "snake_case")]
pub enum PriceType {
    /// Added to the running price as-is.
    Flat = 0,
    /// Percent of the running price, compounding with earlier modifiers.
    Percent = 1,
}

/// A price-altering selection (e.g. a color or material option) applied on
/// top of a base product.
#[derive(Clone, Debug, Serialize, Deserialize, sqlx::FromRow)]
pub struct VariantModifier {
    pub id: Uuid,
    pub product_id: Uuid,
    pub attribute: String,
    pub option_name: String,
    pub price_type: PriceType,
    pub amount: Decimal,
    pub position: i32,
}

impl VariantModifier {
    /// Apply this modifier to a running price.
    pub fn apply(&self, price: Decimal) -> Decimal {
        match self.price_type {
            PriceType::Percent => price + price / Decimal::ONE_HUNDRED * self.amount,
            PriceType::Flat => price + self.amount,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::currency::FixedRateCurrency;

    fn modifier(price_type: PriceType, amount: Decimal) -> VariantModifier {
        VariantModifier {
            id: Uuid::new_v4(),
            product_id: Uuid::new_v4(),
            attribute: "Color".into(),
            option_name: "Red".into(),
            price_type,
            amount,
            position: 0,
        }
    }

    #[test]
    fn test_configurable_product_starts_at_zero() {
        let p = Product::new("SHIRT-001", "Shirt", Decimal::from(50), true);
        assert_eq!(p.price, Decimal::ZERO);
        let q = Product::new("MUG-001", "Mug", Decimal::from(50), false);
        assert_eq!(q.price, Decimal::from(50));
    }

    #[test]
    fn test_flat_and_percent_application() {
        assert_eq!(
            modifier(PriceType::Flat, Decimal::from(10)).apply(Decimal::from(100)),
            Decimal::from(110)
        );
        assert_eq!(
            modifier(PriceType::Percent, Decimal::from(10)).apply(Decimal::from(110)),
            Decimal::from(121)
        );
    }

    #[test]
    fn test_price_range_span_for_configurable() {
        let currency = FixedRateCurrency::base("$");
        let mut p = Product::new("SHIRT-001", "Shirt", Decimal::ZERO, true);
        p.price = Decimal::from(80);
        p.max_price = Some(Decimal::from(120));
        assert_eq!(p.price_range(&currency), "80.00 $ - 120.00 $");
    }

    #[test]
    fn test_price_range_plain_for_concrete() {
        let currency = FixedRateCurrency::base("$");
        let p = Product::new("MUG-001", "Mug", Decimal::new(1999, 2), false);
        assert_eq!(p.price_range(&currency), "19.99 $");
    }
}
