//! Storefront Cart
//!
//! Session-backed shopping cart and configurable product pricing.
//!
//! ## Features
//! - Keyed session carts (add / remove / recount / clear)
//! - Read-time projection of cart lines against the live catalog
//! - Configurable products priced as the min/max of their configurations
//! - Variant price modifiers, flat or percent of the running price
//! - Display-side currency conversion

use thiserror::Error;

pub mod cart_store;
pub mod currency;
pub mod domain;
pub mod pricing;
pub mod repository;

// =============================================================================
// Error Types
// =============================================================================

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Product not found")]
    ProductNotFound,

    #[error("Variant not found")]
    VariantNotFound,

    #[error("Storage error: {0}")]
    StorageError(String),
}

impl From<sqlx::Error> for StoreError {
    fn from(e: sqlx::Error) -> Self {
        Self::StorageError(e.to_string())
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(e: serde_json::Error) -> Self {
        Self::StorageError(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, StoreError>;
