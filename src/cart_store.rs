//! Session-backed cart store
//!
//! Every operation loads the session's cart document, applies the change
//! and writes the whole document back before returning. There is no
//! locking; concurrent requests on one session resolve last-writer-wins.

use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

use crate::domain::aggregates::{Cart, CartItem, Product, VariantModifier};
use crate::domain::value_objects::ItemKey;
use crate::repository::{CatalogRepository, SessionCartStore};
use crate::Result;

/// A cart line joined with the live catalog records it references.
#[derive(Clone, Debug)]
pub struct DetailedItem {
    pub key: ItemKey,
    pub item: CartItem,
    pub product: Product,
    /// The chosen configuration, when it is still in the catalog.
    pub configurable: Option<Product>,
    pub variants: Vec<VariantModifier>,
}

pub struct CartStore {
    sessions: Arc<dyn SessionCartStore>,
    catalog: Arc<dyn CatalogRepository>,
}

impl CartStore {
    pub fn new(sessions: Arc<dyn SessionCartStore>, catalog: Arc<dyn CatalogRepository>) -> Self {
        Self { sessions, catalog }
    }

    pub async fn add(&self, session_id: &str, item: CartItem) -> Result<ItemKey> {
        let mut cart = self.sessions.load(session_id).await?;
        let key = cart.add(item);
        self.sessions.save(session_id, &cart).await?;
        debug!(session = session_id, key = %key, "cart line added");
        Ok(key)
    }

    pub async fn remove(&self, session_id: &str, key: &ItemKey) -> Result<()> {
        let mut cart = self.sessions.load(session_id).await?;
        cart.remove(key);
        self.sessions.save(session_id, &cart).await
    }

    pub async fn recount(&self, session_id: &str, updates: &[(ItemKey, i64)]) -> Result<()> {
        if updates.is_empty() {
            return Ok(());
        }
        let mut cart = self.sessions.load(session_id).await?;
        cart.recount(updates);
        self.sessions.save(session_id, &cart).await
    }

    pub async fn clear(&self, session_id: &str) -> Result<()> {
        let mut cart = self.sessions.load(session_id).await?;
        cart.clear();
        self.sessions.save(session_id, &cart).await
    }

    /// Distinct lines in the session's cart.
    pub async fn count_items(&self, session_id: &str) -> Result<usize> {
        Ok(self.sessions.load(session_id).await?.count_items())
    }

    /// The raw session document.
    pub async fn cart(&self, session_id: &str) -> Result<Cart> {
        self.sessions.load(session_id).await
    }

    /// Cart lines joined with live catalog data.
    ///
    /// Products (including configurations) and variants are batch-fetched
    /// in one round-trip each. Lines whose product has left the catalog
    /// are dropped from the projection; unresolved variant references are
    /// omitted silently. The stored document is never mutated here.
    pub async fn items_with_details(&self, session_id: &str) -> Result<Vec<DetailedItem>> {
        let cart = self.sessions.load(session_id).await?;
        if cart.is_empty() {
            return Ok(Vec::new());
        }

        let mut product_ids: Vec<Uuid> = Vec::new();
        let mut variant_ids: Vec<Uuid> = Vec::new();
        for (_, item) in cart.items() {
            product_ids.push(item.product_id);
            product_ids.extend(item.configurable_id);
            variant_ids.extend(item.variant_ids.iter().copied());
        }
        product_ids.sort_unstable();
        product_ids.dedup();
        variant_ids.sort_unstable();
        variant_ids.dedup();

        let products: HashMap<Uuid, Product> = self
            .catalog
            .products(&product_ids)
            .await?
            .into_iter()
            .map(|p| (p.id, p))
            .collect();
        let variants: HashMap<Uuid, VariantModifier> = if variant_ids.is_empty() {
            HashMap::new()
        } else {
            self.catalog
                .variants(&variant_ids)
                .await?
                .into_iter()
                .map(|v| (v.id, v))
                .collect()
        };

        let mut detailed = Vec::with_capacity(cart.count_items());
        for (key, item) in cart.items() {
            // Product deleted or id changed: the line is stale, skip it.
            let Some(product) = products.get(&item.product_id).cloned() else {
                continue;
            };
            let configurable = item.configurable_id.and_then(|id| products.get(&id).cloned());
            let resolved = item
                .variant_ids
                .iter()
                .filter_map(|id| variants.get(id).cloned())
                .collect();
            detailed.push(DetailedItem {
                key: key.clone(),
                item: item.clone(),
                product,
                configurable,
                variants: resolved,
            });
        }
        Ok(detailed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::memory::{MemoryCartStore, MemoryCatalog};
    use rust_decimal::Decimal;

    fn line(product_id: Uuid) -> CartItem {
        CartItem {
            product_id,
            variant_ids: vec![],
            configurable_id: None,
            quantity: 1,
            unit_price: Decimal::from(10),
        }
    }

    fn store() -> (CartStore, Arc<MemoryCartStore>, Arc<MemoryCatalog>) {
        let sessions = Arc::new(MemoryCartStore::new());
        let catalog = Arc::new(MemoryCatalog::new());
        (
            CartStore::new(sessions.clone(), catalog.clone()),
            sessions,
            catalog,
        )
    }

    #[tokio::test]
    async fn test_mutations_persist_immediately() {
        let (carts, sessions, _) = store();
        let key = carts.add("s1", line(Uuid::new_v4())).await.unwrap();
        assert_eq!(sessions.load("s1").await.unwrap().count_items(), 1);

        carts.recount("s1", &[(key.clone(), 4)]).await.unwrap();
        let cart = sessions.load("s1").await.unwrap();
        assert_eq!(cart.get(&key).unwrap().quantity, 4);

        carts.remove("s1", &key).await.unwrap();
        assert!(sessions.load("s1").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_sessions_are_isolated() {
        let (carts, _, _) = store();
        carts.add("s1", line(Uuid::new_v4())).await.unwrap();
        assert_eq!(carts.count_items("s1").await.unwrap(), 1);
        assert_eq!(carts.count_items("s2").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_details_drop_stale_lines_without_mutating() {
        let (carts, sessions, catalog) = store();
        let live = Product::new("SKU-1", "Live", Decimal::from(10), false);
        catalog.save_product(&live).await.unwrap();

        carts.add("s1", line(live.id)).await.unwrap();
        carts.add("s1", line(Uuid::new_v4())).await.unwrap(); // never in the catalog

        let detailed = carts.items_with_details("s1").await.unwrap();
        assert_eq!(detailed.len(), 1);
        assert_eq!(detailed[0].product.id, live.id);

        // The stored document still has both lines.
        assert_eq!(sessions.load("s1").await.unwrap().count_items(), 2);
    }

    #[tokio::test]
    async fn test_details_resolve_configuration_and_variants() {
        let (carts, _, catalog) = store();
        let parent = Product::new("SHIRT", "Shirt", Decimal::ZERO, true);
        let child = Product::new("SHIRT-L", "Shirt L", Decimal::from(25), false);
        catalog.save_product(&parent).await.unwrap();
        catalog.save_product(&child).await.unwrap();
        let variant = VariantModifier {
            id: Uuid::new_v4(),
            product_id: parent.id,
            attribute: "Color".into(),
            option_name: "Red".into(),
            price_type: crate::domain::aggregates::PriceType::Flat,
            amount: Decimal::from(2),
            position: 0,
        };
        catalog.save_variant(&variant).await.unwrap();

        let missing_variant = Uuid::new_v4();
        carts
            .add(
                "s1",
                CartItem {
                    product_id: parent.id,
                    variant_ids: vec![variant.id, missing_variant],
                    configurable_id: Some(child.id),
                    quantity: 1,
                    unit_price: Decimal::from(27),
                },
            )
            .await
            .unwrap();

        let detailed = carts.items_with_details("s1").await.unwrap();
        assert_eq!(detailed.len(), 1);
        assert_eq!(detailed[0].configurable.as_ref().unwrap().id, child.id);
        // The dangling variant reference is omitted, not an error.
        assert_eq!(detailed[0].variants.len(), 1);
        assert_eq!(detailed[0].variants[0].id, variant.id);
    }

    #[tokio::test]
    async fn test_empty_session_loads_empty_cart() {
        let (carts, _, _) = store();
        assert!(carts.items_with_details("fresh").await.unwrap().is_empty());
        assert_eq!(carts.count_items("fresh").await.unwrap(), 0);
    }
}
