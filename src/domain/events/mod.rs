//! Domain events
//!
//! Published to the message bus when one is configured; consumers get a
//! JSON document per mutation.

use rust_decimal::Decimal;
use serde::Serialize;
use uuid::Uuid;

use crate::domain::value_objects::ItemKey;

#[derive(Clone, Debug, Serialize)]
pub enum DomainEvent {
    Cart(CartEvent),
    Catalog(CatalogEvent),
}

impl DomainEvent {
    /// Bus subject the event is published on.
    pub fn subject(&self) -> &'static str {
        match self {
            Self::Cart(_) => "storefront.cart",
            Self::Catalog(_) => "storefront.catalog",
        }
    }
}

#[derive(Clone, Debug, Serialize)]
pub enum CartEvent {
    ItemAdded {
        session_id: String,
        key: ItemKey,
        product_id: Uuid,
    },
    ItemRemoved {
        session_id: String,
        key: ItemKey,
    },
    Recounted {
        session_id: String,
    },
    Cleared {
        session_id: String,
    },
}

#[derive(Clone, Debug, Serialize)]
pub enum CatalogEvent {
    PricesPropagated {
        product_id: Uuid,
        price: Decimal,
        max_price: Decimal,
    },
}
