//! Postgres adapters

use async_trait::async_trait;
use rust_decimal::Decimal;
use sqlx::PgPool;
use uuid::Uuid;

use crate::domain::aggregates::{Cart, Product, VariantModifier};
use crate::repository::{CatalogRepository, SessionCartStore};
use crate::Result;

pub struct PgCatalog {
    pool: PgPool,
}

impl PgCatalog {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CatalogRepository for PgCatalog {
    async fn product(&self, id: Uuid) -> Result<Option<Product>> {
        Ok(sqlx::query_as::<_, Product>("SELECT * FROM products WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn products(&self, ids: &[Uuid]) -> Result<Vec<Product>> {
        Ok(sqlx::query_as::<_, Product>("SELECT * FROM products WHERE id = ANY($1)")
            .bind(ids)
            .fetch_all(&self.pool)
            .await?)
    }

    async fn variants(&self, ids: &[Uuid]) -> Result<Vec<VariantModifier>> {
        Ok(sqlx::query_as::<_, VariantModifier>(
            "SELECT * FROM product_variants WHERE id = ANY($1) ORDER BY position",
        )
        .bind(ids)
        .fetch_all(&self.pool)
        .await?)
    }

    async fn save_product(&self, product: &Product) -> Result<()> {
        sqlx::query(
            "INSERT INTO products (id, sku, name, price, max_price, use_configurations, is_active, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9) \
             ON CONFLICT (id) DO UPDATE SET sku = EXCLUDED.sku, name = EXCLUDED.name, price = EXCLUDED.price, \
             max_price = EXCLUDED.max_price, use_configurations = EXCLUDED.use_configurations, \
             is_active = EXCLUDED.is_active, updated_at = EXCLUDED.updated_at",
        )
        .bind(product.id)
        .bind(&product.sku)
        .bind(&product.name)
        .bind(product.price)
        .bind(product.max_price)
        .bind(product.use_configurations)
        .bind(product.is_active)
        .bind(product.created_at)
        .bind(product.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn save_variant(&self, variant: &VariantModifier) -> Result<()> {
        sqlx::query(
            "INSERT INTO product_variants (id, product_id, attribute, option_name, price_type, amount, position) \
             VALUES ($1, $2, $3, $4, $5, $6, $7) \
             ON CONFLICT (id) DO UPDATE SET attribute = EXCLUDED.attribute, option_name = EXCLUDED.option_name, \
             price_type = EXCLUDED.price_type, amount = EXCLUDED.amount, position = EXCLUDED.position",
        )
        .bind(variant.id)
        .bind(variant.product_id)
        .bind(&variant.attribute)
        .bind(&variant.option_name)
        .bind(variant.price_type)
        .bind(variant.amount)
        .bind(variant.position)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn configurations_of(&self, parent_id: Uuid) -> Result<Vec<Uuid>> {
        Ok(sqlx::query_scalar::<_, Uuid>(
            "SELECT child_id FROM product_configurations WHERE parent_id = $1",
        )
        .bind(parent_id)
        .fetch_all(&self.pool)
        .await?)
    }

    async fn parents_of(&self, child_id: Uuid) -> Result<Vec<Uuid>> {
        Ok(sqlx::query_scalar::<_, Uuid>(
            "SELECT parent_id FROM product_configurations WHERE child_id = $1",
        )
        .bind(child_id)
        .fetch_all(&self.pool)
        .await?)
    }

    async fn set_configurations(&self, parent_id: Uuid, child_ids: &[Uuid]) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM product_configurations WHERE parent_id = $1")
            .bind(parent_id)
            .execute(&mut *tx)
            .await?;
        for child_id in child_ids {
            sqlx::query("INSERT INTO product_configurations (parent_id, child_id) VALUES ($1, $2)")
                .bind(parent_id)
                .bind(child_id)
                .execute(&mut *tx)
                .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    async fn write_price_range(&self, id: Uuid, price: Decimal, max_price: Decimal) -> Result<()> {
        sqlx::query("UPDATE products SET price = $2, max_price = $3, updated_at = NOW() WHERE id = $1")
            .bind(id)
            .bind(price)
            .bind(max_price)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

/// Cart documents keyed by session id, stored as JSONB. The whole document
/// is replaced on every write; concurrent requests on one session resolve
/// last-writer-wins.
pub struct PgCartStore {
    pool: PgPool,
}

impl PgCartStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SessionCartStore for PgCartStore {
    async fn load(&self, session_id: &str) -> Result<Cart> {
        let row = sqlx::query_scalar::<_, serde_json::Value>(
            "SELECT cart_data FROM cart_sessions WHERE session_id = $1",
        )
        .bind(session_id)
        .fetch_optional(&self.pool)
        .await?;
        match row {
            Some(data) => Ok(serde_json::from_value(data)?),
            None => Ok(Cart::new()),
        }
    }

    async fn save(&self, session_id: &str, cart: &Cart) -> Result<()> {
        sqlx::query(
            "INSERT INTO cart_sessions (session_id, cart_data, updated_at) VALUES ($1, $2, NOW()) \
             ON CONFLICT (session_id) DO UPDATE SET cart_data = EXCLUDED.cart_data, updated_at = NOW()",
        )
        .bind(session_id)
        .bind(serde_json::to_value(cart)?)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}
