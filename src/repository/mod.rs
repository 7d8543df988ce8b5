//! Storage ports
//!
//! The cart and pricing components talk to the catalog and to session
//! state through these traits. Postgres adapters live in [`postgres`], an
//! in-memory pair in [`memory`].

use async_trait::async_trait;
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::domain::aggregates::{Cart, Product, VariantModifier};
use crate::Result;

pub mod memory;
pub mod postgres;

/// Read/write access to products, variants and configuration links.
#[async_trait]
pub trait CatalogRepository: Send + Sync {
    async fn product(&self, id: Uuid) -> Result<Option<Product>>;

    /// Batch read. Ids that do not resolve are simply absent from the
    /// result; callers decide whether that is an error.
    async fn products(&self, ids: &[Uuid]) -> Result<Vec<Product>>;

    /// Batch read of variant modifiers, ordered by option position.
    async fn variants(&self, ids: &[Uuid]) -> Result<Vec<VariantModifier>>;

    /// Insert or replace a product.
    async fn save_product(&self, product: &Product) -> Result<()>;

    /// Insert or replace a variant modifier.
    async fn save_variant(&self, variant: &VariantModifier) -> Result<()>;

    /// Concrete children of a configurable parent.
    async fn configurations_of(&self, parent_id: Uuid) -> Result<Vec<Uuid>>;

    /// Configurable parents the product is a configuration of.
    async fn parents_of(&self, child_id: Uuid) -> Result<Vec<Uuid>>;

    /// Replace the set of children of a configurable parent.
    async fn set_configurations(&self, parent_id: Uuid, child_ids: &[Uuid]) -> Result<()>;

    /// Write back a derived min/max price pair.
    async fn write_price_range(&self, id: Uuid, price: Decimal, max_price: Decimal) -> Result<()>;
}

/// One cart document per session.
#[async_trait]
pub trait SessionCartStore: Send + Sync {
    /// Load the session's cart; empty when none has been stored yet.
    async fn load(&self, session_id: &str) -> Result<Cart>;

    /// Replace the session's cart. Last writer wins.
    async fn save(&self, session_id: &str, cart: &Cart) -> Result<()>;
}
