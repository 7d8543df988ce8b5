//! In-memory adapters, used by the test suites.

use async_trait::async_trait;
use chrono::Utc;
use rust_decimal::Decimal;
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::domain::aggregates::{Cart, Product, VariantModifier};
use crate::repository::{CatalogRepository, SessionCartStore};
use crate::Result;

#[derive(Default)]
pub struct MemoryCatalog {
    products: RwLock<HashMap<Uuid, Product>>,
    variants: RwLock<HashMap<Uuid, VariantModifier>>,
    /// (parent, child) configuration links.
    links: RwLock<Vec<(Uuid, Uuid)>>,
}

impl MemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CatalogRepository for MemoryCatalog {
    async fn product(&self, id: Uuid) -> Result<Option<Product>> {
        Ok(self.products.read().await.get(&id).cloned())
    }

    async fn products(&self, ids: &[Uuid]) -> Result<Vec<Product>> {
        let products = self.products.read().await;
        Ok(ids.iter().filter_map(|id| products.get(id).cloned()).collect())
    }

    async fn variants(&self, ids: &[Uuid]) -> Result<Vec<VariantModifier>> {
        let variants = self.variants.read().await;
        let mut found: Vec<VariantModifier> =
            ids.iter().filter_map(|id| variants.get(id).cloned()).collect();
        found.sort_by_key(|v| v.position);
        Ok(found)
    }

    async fn save_product(&self, product: &Product) -> Result<()> {
        self.products.write().await.insert(product.id, product.clone());
        Ok(())
    }

    async fn save_variant(&self, variant: &VariantModifier) -> Result<()> {
        self.variants.write().await.insert(variant.id, variant.clone());
        Ok(())
    }

    async fn configurations_of(&self, parent_id: Uuid) -> Result<Vec<Uuid>> {
        Ok(self
            .links
            .read()
            .await
            .iter()
            .filter(|(parent, _)| *parent == parent_id)
            .map(|(_, child)| *child)
            .collect())
    }

    async fn parents_of(&self, child_id: Uuid) -> Result<Vec<Uuid>> {
        Ok(self
            .links
            .read()
            .await
            .iter()
            .filter(|(_, child)| *child == child_id)
            .map(|(parent, _)| *parent)
            .collect())
    }

    async fn set_configurations(&self, parent_id: Uuid, child_ids: &[Uuid]) -> Result<()> {
        let mut links = self.links.write().await;
        links.retain(|(parent, _)| *parent != parent_id);
        links.extend(child_ids.iter().map(|child| (parent_id, *child)));
        Ok(())
    }

    async fn write_price_range(&self, id: Uuid, price: Decimal, max_price: Decimal) -> Result<()> {
        if let Some(product) = self.products.write().await.get_mut(&id) {
            product.price = price;
            product.max_price = Some(max_price);
            product.updated_at = Utc::now();
        }
        Ok(())
    }
}

#[derive(Default)]
pub struct MemoryCartStore {
    carts: RwLock<HashMap<String, Cart>>,
}

impl MemoryCartStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionCartStore for MemoryCartStore {
    async fn load(&self, session_id: &str) -> Result<Cart> {
        Ok(self.carts.read().await.get(session_id).cloned().unwrap_or_default())
    }

    async fn save(&self, session_id: &str, cart: &Cart) -> Result<()> {
        self.carts.write().await.insert(session_id.to_string(), cart.clone());
        Ok(())
    }
}
