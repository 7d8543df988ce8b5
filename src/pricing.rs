//! Configurable product pricing
//!
//! The price of a selection is its base price (the chosen configuration's,
//! falling back to the product's own) folded through the selected variant
//! modifiers in selection order. Percent modifiers compound on the running
//! total, so order matters.

use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

use crate::domain::aggregates::{Product, VariantModifier};
use crate::repository::CatalogRepository;
use crate::{Result, StoreError};

/// Result of one parent recompute, surfaced so callers can emit events.
#[derive(Clone, Debug)]
pub struct PriceRange {
    pub product_id: Uuid,
    pub price: Decimal,
    pub max_price: Decimal,
}

pub struct PricingResolver {
    catalog: Arc<dyn CatalogRepository>,
}

impl PricingResolver {
    pub fn new(catalog: Arc<dyn CatalogRepository>) -> Self {
        Self { catalog }
    }

    /// Final unit price for a selection.
    ///
    /// The configuration, when given and still in the catalog, supplies
    /// the base price; a dangling configuration id falls back to the
    /// product's own price. The base product and every variant id must
    /// resolve.
    pub async fn calculate(
        &self,
        product_id: Uuid,
        variant_ids: &[Uuid],
        configuration_id: Option<Uuid>,
    ) -> Result<Decimal> {
        let product = self
            .catalog
            .product(product_id)
            .await?
            .ok_or(StoreError::ProductNotFound)?;
        let configuration = match configuration_id {
            Some(id) => self.catalog.product(id).await?,
            None => None,
        };
        let variants = self.resolve_variants(variant_ids).await?;
        Ok(Self::price_selection(&product, &variants, configuration.as_ref()))
    }

    /// Pure pricing rule, separated so callers already holding live
    /// entities can price without another catalog round-trip.
    pub fn price_selection(
        product: &Product,
        variants: &[VariantModifier],
        configuration: Option<&Product>,
    ) -> Decimal {
        let base = configuration.map_or(product.price, |c| c.price);
        variants.iter().fold(base, |price, v| v.apply(price))
    }

    async fn resolve_variants(&self, ids: &[Uuid]) -> Result<Vec<VariantModifier>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let fetched: HashMap<Uuid, VariantModifier> = self
            .catalog
            .variants(ids)
            .await?
            .into_iter()
            .map(|v| (v.id, v))
            .collect();
        // Selection order decides how percent modifiers compound, so the
        // batch result is re-sequenced to the caller's order.
        ids.iter()
            .map(|id| fetched.get(id).cloned().ok_or(StoreError::VariantNotFound))
            .collect()
    }

    /// Refresh derived min/max prices after a product write.
    ///
    /// A configurable parent recomputes itself from its children; a
    /// concrete product refreshes every parent it is a configuration of.
    /// Runs inside the triggering request, O(children) per parent.
    pub async fn propagate_prices(&self, product: &Product) -> Result<Vec<PriceRange>> {
        if product.use_configurations {
            Ok(self.recompute(product.id).await?.into_iter().collect())
        } else {
            let mut updated = Vec::new();
            for parent_id in self.catalog.parents_of(product.id).await? {
                updated.extend(self.recompute(parent_id).await?);
            }
            Ok(updated)
        }
    }

    async fn recompute(&self, parent_id: Uuid) -> Result<Option<PriceRange>> {
        let children = self.catalog.configurations_of(parent_id).await?;
        let prices: Vec<Decimal> = self
            .catalog
            .products(&children)
            .await?
            .into_iter()
            .map(|p| p.price)
            .collect();
        // A parent with no live configurations keeps its stored prices.
        let (Some(price), Some(max_price)) =
            (prices.iter().min().copied(), prices.iter().max().copied())
        else {
            return Ok(None);
        };
        self.catalog
            .write_price_range(parent_id, price, max_price)
            .await?;
        info!(parent = %parent_id, %price, %max_price, "propagated configuration prices");
        Ok(Some(PriceRange {
            product_id: parent_id,
            price,
            max_price,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::aggregates::PriceType;
    use crate::repository::memory::MemoryCatalog;

    async fn seed_product(catalog: &MemoryCatalog, price: i64, configurable: bool) -> Product {
        let product = Product::new(
            format!("SKU-{price}"),
            format!("Product {price}"),
            Decimal::from(price),
            configurable,
        );
        catalog.save_product(&product).await.unwrap();
        product
    }

    async fn seed_variant(
        catalog: &MemoryCatalog,
        product_id: Uuid,
        price_type: PriceType,
        amount: i64,
    ) -> VariantModifier {
        let variant = VariantModifier {
            id: Uuid::new_v4(),
            product_id,
            attribute: "Size".into(),
            option_name: format!("{amount}"),
            price_type,
            amount: Decimal::from(amount),
            position: 0,
        };
        catalog.save_variant(&variant).await.unwrap();
        variant
    }

    #[tokio::test]
    async fn test_modifier_order_changes_the_result() {
        let catalog = Arc::new(MemoryCatalog::new());
        let product = seed_product(&catalog, 100, false).await;
        let flat = seed_variant(&catalog, product.id, PriceType::Flat, 10).await;
        let percent = seed_variant(&catalog, product.id, PriceType::Percent, 10).await;
        let pricing = PricingResolver::new(catalog);

        let flat_first = pricing
            .calculate(product.id, &[flat.id, percent.id], None)
            .await
            .unwrap();
        assert_eq!(flat_first, Decimal::from(121)); // (100 + 10) * 1.10

        let percent_first = pricing
            .calculate(product.id, &[percent.id, flat.id], None)
            .await
            .unwrap();
        assert_eq!(percent_first, Decimal::from(120)); // 100 * 1.10 + 10
    }

    #[tokio::test]
    async fn test_configuration_supplies_the_base_price() {
        let catalog = Arc::new(MemoryCatalog::new());
        let parent = seed_product(&catalog, 0, true).await;
        let child = seed_product(&catalog, 95, false).await;
        let pricing = PricingResolver::new(catalog);

        let price = pricing
            .calculate(parent.id, &[], Some(child.id))
            .await
            .unwrap();
        assert_eq!(price, Decimal::from(95));
    }

    #[tokio::test]
    async fn test_dangling_configuration_falls_back_to_product_price() {
        let catalog = Arc::new(MemoryCatalog::new());
        let product = seed_product(&catalog, 42, false).await;
        let pricing = PricingResolver::new(catalog);

        let price = pricing
            .calculate(product.id, &[], Some(Uuid::new_v4()))
            .await
            .unwrap();
        assert_eq!(price, Decimal::from(42));
    }

    #[tokio::test]
    async fn test_missing_product_is_a_hard_error() {
        let pricing = PricingResolver::new(Arc::new(MemoryCatalog::new()));
        let err = pricing.calculate(Uuid::new_v4(), &[], None).await.unwrap_err();
        assert!(matches!(err, StoreError::ProductNotFound));
    }

    #[tokio::test]
    async fn test_missing_variant_is_a_hard_error() {
        let catalog = Arc::new(MemoryCatalog::new());
        let product = seed_product(&catalog, 10, false).await;
        let pricing = PricingResolver::new(catalog);

        let err = pricing
            .calculate(product.id, &[Uuid::new_v4()], None)
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::VariantNotFound));
    }

    #[tokio::test]
    async fn test_child_save_refreshes_parent_range() {
        let catalog = Arc::new(MemoryCatalog::new());
        let parent = seed_product(&catalog, 0, true).await;
        let a = seed_product(&catalog, 80, false).await;
        let b = seed_product(&catalog, 95, false).await;
        let c = seed_product(&catalog, 120, false).await;
        catalog
            .set_configurations(parent.id, &[a.id, b.id, c.id])
            .await
            .unwrap();
        let pricing = PricingResolver::new(catalog.clone());

        // Saving any one child triggers the parent recompute.
        let updated = pricing.propagate_prices(&b).await.unwrap();
        assert_eq!(updated.len(), 1);
        assert_eq!(updated[0].price, Decimal::from(80));
        assert_eq!(updated[0].max_price, Decimal::from(120));

        let parent = catalog.product(parent.id).await.unwrap().unwrap();
        assert_eq!(parent.price, Decimal::from(80));
        assert_eq!(parent.max_price, Some(Decimal::from(120)));
    }

    #[tokio::test]
    async fn test_parent_save_recomputes_itself() {
        let catalog = Arc::new(MemoryCatalog::new());
        let parent = seed_product(&catalog, 0, true).await;
        let a = seed_product(&catalog, 30, false).await;
        let b = seed_product(&catalog, 50, false).await;
        catalog
            .set_configurations(parent.id, &[a.id, b.id])
            .await
            .unwrap();
        let pricing = PricingResolver::new(catalog.clone());

        pricing.propagate_prices(&parent).await.unwrap();
        let parent = catalog.product(parent.id).await.unwrap().unwrap();
        assert_eq!(parent.price, Decimal::from(30));
        assert_eq!(parent.max_price, Some(Decimal::from(50)));
    }

    #[tokio::test]
    async fn test_childless_parent_keeps_stored_prices() {
        let catalog = Arc::new(MemoryCatalog::new());
        let mut parent = seed_product(&catalog, 0, true).await;
        parent.price = Decimal::from(15);
        parent.max_price = Some(Decimal::from(25));
        catalog.save_product(&parent).await.unwrap();
        let pricing = PricingResolver::new(catalog.clone());

        let updated = pricing.propagate_prices(&parent).await.unwrap();
        assert!(updated.is_empty());
        let parent = catalog.product(parent.id).await.unwrap().unwrap();
        assert_eq!(parent.price, Decimal::from(15));
        assert_eq!(parent.max_price, Some(Decimal::from(25)));
    }
}
