//! Storefront Cart - Session carts and configurable pricing over HTTP

use anyhow::Result;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{delete, get, post, put},
    Json, Router,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use uuid::Uuid;
use validator::Validate;

use storefront_cart::cart_store::CartStore;
use storefront_cart::currency::{format_amount, CurrencyConverter, FixedRateCurrency};
use storefront_cart::domain::aggregates::{CartItem, PriceType, Product, VariantModifier};
use storefront_cart::domain::events::{CartEvent, CatalogEvent, DomainEvent};
use storefront_cart::domain::value_objects::ItemKey;
use storefront_cart::pricing::{PriceRange, PricingResolver};
use storefront_cart::repository::postgres::{PgCartStore, PgCatalog};
use storefront_cart::repository::CatalogRepository;
use storefront_cart::StoreError;

#[derive(Clone)]
pub struct AppState {
    pub catalog: Arc<dyn CatalogRepository>,
    pub carts: Arc<CartStore>,
    pub pricing: Arc<PricingResolver>,
    pub currency: Arc<dyn CurrencyConverter>,
    pub nats: Option<async_nats::Client>,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let db = PgPoolOptions::new()
        .max_connections(10)
        .connect(&std::env::var("DATABASE_URL")?)
        .await?;
    sqlx::migrate!("./migrations").run(&db).await?;

    let nats = match std::env::var("NATS_URL") {
        Ok(url) => async_nats::connect(&url).await.ok(),
        Err(_) => None,
    };

    let catalog: Arc<dyn CatalogRepository> = Arc::new(PgCatalog::new(db.clone()));
    let carts = Arc::new(CartStore::new(
        Arc::new(PgCartStore::new(db.clone())),
        catalog.clone(),
    ));
    let pricing = Arc::new(PricingResolver::new(catalog.clone()));
    let currency: Arc<dyn CurrencyConverter> = Arc::new(currency_from_env());
    let state = AppState { catalog, carts, pricing, currency, nats };

    let app = Router::new()
        .route("/health", get(|| async {
            Json(serde_json::json!({"status": "healthy", "service": "storefront-cart"}))
        }))
        .route("/api/v1/products", post(create_product))
        .route("/api/v1/products/:id", get(get_product).put(update_product))
        .route("/api/v1/products/:id/variants", post(create_variant))
        .route("/api/v1/products/:id/configurations", put(set_configurations))
        .route("/api/v1/products/:id/price", post(quote_price))
        .route("/api/v1/cart/:session", get(get_cart).delete(clear_cart))
        .route("/api/v1/cart/:session/items", post(add_to_cart))
        .route("/api/v1/cart/:session/items/:key", delete(remove_from_cart))
        .route("/api/v1/cart/:session/quantities", put(recount_cart))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state);

    let port = std::env::var("PORT").unwrap_or_else(|_| "8083".to_string());
    tracing::info!("storefront-cart listening on 0.0.0.0:{port}");
    axum::serve(tokio::net::TcpListener::bind(format!("0.0.0.0:{port}")).await?, app).await?;
    Ok(())
}

fn currency_from_env() -> FixedRateCurrency {
    let rate = std::env::var("CURRENCY_RATE")
        .ok()
        .and_then(|v| v.parse::<Decimal>().ok())
        .unwrap_or(Decimal::ONE);
    let symbol = std::env::var("CURRENCY_SYMBOL").unwrap_or_else(|_| "$".to_string());
    FixedRateCurrency::new(rate, symbol)
}

type HttpError = (StatusCode, String);

fn store_err(e: StoreError) -> HttpError {
    match e {
        StoreError::ProductNotFound | StoreError::VariantNotFound => {
            (StatusCode::NOT_FOUND, e.to_string())
        }
        StoreError::StorageError(_) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
    }
}

fn invalid(e: impl ToString) -> HttpError {
    (StatusCode::UNPROCESSABLE_ENTITY, e.to_string())
}

fn display_price(currency: &dyn CurrencyConverter, amount: Decimal) -> String {
    format!("{} {}", format_amount(currency.convert(amount)), currency.symbol())
}

async fn publish(state: &AppState, event: DomainEvent) {
    let Some(client) = &state.nats else { return };
    match serde_json::to_vec(&event) {
        Ok(payload) => {
            if let Err(e) = client.publish(event.subject().to_string(), payload.into()).await {
                tracing::warn!("event publish failed: {e}");
            }
        }
        Err(e) => tracing::warn!("event serialization failed: {e}"),
    }
}

async fn publish_propagated(state: &AppState, updated: Vec<PriceRange>) {
    for range in updated {
        publish(
            state,
            DomainEvent::Catalog(CatalogEvent::PricesPropagated {
                product_id: range.product_id,
                price: range.price,
                max_price: range.max_price,
            }),
        )
        .await;
    }
}

// =============================================================================
// Products
// =============================================================================

#[derive(Debug, Serialize)]
pub struct ProductResponse {
    pub id: Uuid,
    pub sku: String,
    pub name: String,
    pub price: Decimal,
    pub max_price: Option<Decimal>,
    pub use_configurations: bool,
    pub is_active: bool,
    pub price_range: String,
}

fn product_response(state: &AppState, product: Product) -> ProductResponse {
    let price_range = product.price_range(state.currency.as_ref());
    ProductResponse {
        id: product.id,
        sku: product.sku,
        name: product.name,
        price: product.price,
        max_price: product.max_price,
        use_configurations: product.use_configurations,
        is_active: product.is_active,
        price_range,
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateProductRequest {
    #[validate(length(min = 1, max = 255))]
    pub name: String,
    #[validate(length(min = 1, max = 255))]
    pub sku: Option<String>,
    pub price: Option<Decimal>,
    pub use_configurations: Option<bool>,
}

async fn create_product(
    State(state): State<AppState>,
    Json(r): Json<CreateProductRequest>,
) -> Result<(StatusCode, Json<ProductResponse>), HttpError> {
    r.validate().map_err(invalid)?;
    let sku = r
        .sku
        .unwrap_or_else(|| format!("SKU-{:08}", rand::random::<u32>()));
    let product = Product::new(
        sku,
        r.name,
        r.price.unwrap_or(Decimal::ZERO),
        r.use_configurations.unwrap_or(false),
    );
    state.catalog.save_product(&product).await.map_err(store_err)?;
    let updated = state
        .pricing
        .propagate_prices(&product)
        .await
        .map_err(store_err)?;
    publish_propagated(&state, updated).await;
    Ok((StatusCode::CREATED, Json(product_response(&state, product))))
}

async fn get_product(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ProductResponse>, HttpError> {
    let product = state
        .catalog
        .product(id)
        .await
        .map_err(store_err)?
        .ok_or_else(|| store_err(StoreError::ProductNotFound))?;
    Ok(Json(product_response(&state, product)))
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateProductRequest {
    #[validate(length(min = 1, max = 255))]
    pub name: Option<String>,
    pub price: Option<Decimal>,
    pub is_active: Option<bool>,
}

async fn update_product(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(r): Json<UpdateProductRequest>,
) -> Result<Json<ProductResponse>, HttpError> {
    r.validate().map_err(invalid)?;
    let mut product = state
        .catalog
        .product(id)
        .await
        .map_err(store_err)?
        .ok_or_else(|| store_err(StoreError::ProductNotFound))?;
    if let Some(name) = r.name {
        product.name = name;
    }
    if let Some(price) = r.price {
        product.price = price;
    }
    if let Some(is_active) = r.is_active {
        product.is_active = is_active;
    }
    // A configurable parent never carries a hand-set price; propagation
    // re-derives it from the children right after the save.
    if product.use_configurations {
        product.price = Decimal::ZERO;
    }
    product.touch();
    state.catalog.save_product(&product).await.map_err(store_err)?;
    let updated = state
        .pricing
        .propagate_prices(&product)
        .await
        .map_err(store_err)?;
    publish_propagated(&state, updated).await;

    // Re-read so a self-recompute is reflected in the response.
    let product = state
        .catalog
        .product(id)
        .await
        .map_err(store_err)?
        .ok_or_else(|| store_err(StoreError::ProductNotFound))?;
    Ok(Json(product_response(&state, product)))
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateVariantRequest {
    #[validate(length(min = 1, max = 255))]
    pub attribute: String,
    #[validate(length(min = 1, max = 255))]
    pub option_name: String,
    pub price_type: PriceType,
    pub amount: Decimal,
    pub position: Option<i32>,
}

async fn create_variant(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(r): Json<CreateVariantRequest>,
) -> Result<(StatusCode, Json<VariantModifier>), HttpError> {
    r.validate().map_err(invalid)?;
    if state.catalog.product(id).await.map_err(store_err)?.is_none() {
        return Err(store_err(StoreError::ProductNotFound));
    }
    let variant = VariantModifier {
        id: Uuid::now_v7(),
        product_id: id,
        attribute: r.attribute,
        option_name: r.option_name,
        price_type: r.price_type,
        amount: r.amount,
        position: r.position.unwrap_or(0),
    };
    state.catalog.save_variant(&variant).await.map_err(store_err)?;
    Ok((StatusCode::CREATED, Json(variant)))
}

#[derive(Debug, Deserialize)]
pub struct SetConfigurationsRequest {
    pub child_ids: Vec<Uuid>,
}

async fn set_configurations(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(r): Json<SetConfigurationsRequest>,
) -> Result<Json<ProductResponse>, HttpError> {
    let product = state
        .catalog
        .product(id)
        .await
        .map_err(store_err)?
        .ok_or_else(|| store_err(StoreError::ProductNotFound))?;
    state
        .catalog
        .set_configurations(id, &r.child_ids)
        .await
        .map_err(store_err)?;
    let updated = state
        .pricing
        .propagate_prices(&product)
        .await
        .map_err(store_err)?;
    publish_propagated(&state, updated).await;

    let product = state
        .catalog
        .product(id)
        .await
        .map_err(store_err)?
        .ok_or_else(|| store_err(StoreError::ProductNotFound))?;
    Ok(Json(product_response(&state, product)))
}

#[derive(Debug, Deserialize)]
pub struct PriceQuoteRequest {
    #[serde(default)]
    pub variant_ids: Vec<Uuid>,
    pub configuration_id: Option<Uuid>,
}

#[derive(Debug, Serialize)]
pub struct PriceQuoteResponse {
    pub amount: Decimal,
    pub display: String,
}

async fn quote_price(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(r): Json<PriceQuoteRequest>,
) -> Result<Json<PriceQuoteResponse>, HttpError> {
    let amount = state
        .pricing
        .calculate(id, &r.variant_ids, r.configuration_id)
        .await
        .map_err(store_err)?;
    Ok(Json(PriceQuoteResponse {
        amount,
        display: display_price(state.currency.as_ref(), amount),
    }))
}

// =============================================================================
// Cart
// =============================================================================

#[derive(Debug, Serialize)]
pub struct VariantView {
    pub attribute: String,
    pub option_name: String,
}

#[derive(Debug, Serialize)]
pub struct CartLineView {
    pub key: ItemKey,
    pub product_id: Uuid,
    pub name: String,
    pub sku: String,
    pub quantity: u32,
    pub unit_price: Decimal,
    pub line_total: Decimal,
    pub display_price: String,
    pub configurable: Option<String>,
    pub variants: Vec<VariantView>,
}

#[derive(Debug, Serialize)]
pub struct CartView {
    pub items: Vec<CartLineView>,
    /// Distinct lines, not summed quantity.
    pub item_count: usize,
    pub subtotal: Decimal,
    pub subtotal_display: String,
}

async fn get_cart(
    State(state): State<AppState>,
    Path(session): Path<String>,
) -> Result<Json<CartView>, HttpError> {
    let detailed = state
        .carts
        .items_with_details(&session)
        .await
        .map_err(store_err)?;
    let subtotal: Decimal = detailed.iter().map(|d| d.item.line_total()).sum();
    let items = detailed
        .into_iter()
        .map(|d| CartLineView {
            key: d.key,
            product_id: d.product.id,
            name: d.product.name.clone(),
            sku: d.product.sku.clone(),
            quantity: d.item.quantity,
            unit_price: d.item.unit_price,
            line_total: d.item.line_total(),
            display_price: display_price(state.currency.as_ref(), d.item.unit_price),
            configurable: d.configurable.map(|c| c.name),
            variants: d
                .variants
                .into_iter()
                .map(|v| VariantView {
                    attribute: v.attribute,
                    option_name: v.option_name,
                })
                .collect(),
        })
        .collect::<Vec<_>>();
    Ok(Json(CartView {
        item_count: items.len(),
        items,
        subtotal,
        subtotal_display: display_price(state.currency.as_ref(), subtotal),
    }))
}

#[derive(Debug, Deserialize)]
pub struct AddToCartRequest {
    pub product_id: Uuid,
    #[serde(default)]
    pub variant_ids: Vec<Uuid>,
    pub configuration_id: Option<Uuid>,
    pub quantity: Option<u32>,
}

#[derive(Debug, Serialize)]
pub struct AddToCartResponse {
    pub key: ItemKey,
    pub unit_price: Decimal,
}

async fn add_to_cart(
    State(state): State<AppState>,
    Path(session): Path<String>,
    Json(r): Json<AddToCartRequest>,
) -> Result<(StatusCode, Json<AddToCartResponse>), HttpError> {
    // Unit price is captured now; later catalog edits do not reprice the
    // line.
    let unit_price = state
        .pricing
        .calculate(r.product_id, &r.variant_ids, r.configuration_id)
        .await
        .map_err(store_err)?;
    let item = CartItem {
        product_id: r.product_id,
        variant_ids: r.variant_ids,
        configurable_id: r.configuration_id,
        quantity: r.quantity.unwrap_or(1).max(1),
        unit_price,
    };
    let product_id = item.product_id;
    let key = state.carts.add(&session, item).await.map_err(store_err)?;
    publish(
        &state,
        DomainEvent::Cart(CartEvent::ItemAdded {
            session_id: session,
            key: key.clone(),
            product_id,
        }),
    )
    .await;
    Ok((StatusCode::CREATED, Json(AddToCartResponse { key, unit_price })))
}

async fn remove_from_cart(
    State(state): State<AppState>,
    Path((session, key)): Path<(String, String)>,
) -> Result<StatusCode, HttpError> {
    let key = ItemKey::from(key);
    state.carts.remove(&session, &key).await.map_err(store_err)?;
    publish(
        &state,
        DomainEvent::Cart(CartEvent::ItemRemoved { session_id: session, key }),
    )
    .await;
    Ok(StatusCode::NO_CONTENT)
}

async fn recount_cart(
    State(state): State<AppState>,
    Path(session): Path<String>,
    Json(body): Json<serde_json::Value>,
) -> Result<StatusCode, HttpError> {
    // Anything that is not a key/quantity object is a no-op, not an error.
    let Some(map) = body.as_object() else {
        return Ok(StatusCode::NO_CONTENT);
    };
    let updates: Vec<(ItemKey, i64)> = map
        .iter()
        .map(|(key, quantity)| {
            (ItemKey::from(key.clone()), quantity.as_i64().unwrap_or(0))
        })
        .collect();
    state
        .carts
        .recount(&session, &updates)
        .await
        .map_err(store_err)?;
    publish(
        &state,
        DomainEvent::Cart(CartEvent::Recounted { session_id: session }),
    )
    .await;
    Ok(StatusCode::NO_CONTENT)
}

async fn clear_cart(
    State(state): State<AppState>,
    Path(session): Path<String>,
) -> Result<StatusCode, HttpError> {
    state.carts.clear(&session).await.map_err(store_err)?;
    publish(
        &state,
        DomainEvent::Cart(CartEvent::Cleared { session_id: session }),
    )
    .await;
    Ok(StatusCode::NO_CONTENT)
}
