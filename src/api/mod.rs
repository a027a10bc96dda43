//! HTTP surface.

pub mod error;
pub mod orders;
pub mod payments;
pub mod products;
pub mod stats;

use axum::{extract::FromRef, extract::FromRequest, routing::{get, post}, Json, Router};
use std::sync::Arc;

use crate::auth::SessionKeys;
use crate::config::Config;
use crate::messaging::EventBus;
use crate::payment::{PaymentGateway, WebhookVerifier};
use crate::services::{CatalogService, OrderService};
use crate::store::Store;
use crate::EcommerceError;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn Store>,
    pub orders: OrderService,
    pub catalog: CatalogService,
    pub sessions: SessionKeys,
}

impl AppState {
    pub fn new(config: &Config, store: Arc<dyn Store>, gateway: Arc<dyn PaymentGateway>, events: EventBus) -> Self {
        let orders = OrderService::new(
            store.clone(), gateway, config.stripe_webhook_secret.as_deref().map_or_else(WebhookVerifier::disabled, |secret| WebhookVerifier::new(secret)), events.clone(),
            config.pricing.clone(), config.checkout_urls.clone(),
        );
        Self {
            catalog: CatalogService::new(store.clone(), events),
            orders,
            store,
            sessions: SessionKeys::new(&config.session_secret, config.production),
        }
    }
}

impl FromRef<AppState> for SessionKeys {
    fn from_ref(state: &AppState) -> Self { state.sessions.clone() }
}

/// `Json` whose rejections are reported as 400 validation errors.
#[derive(FromRequest)]
#[from_request(via(axum::Json), rejection(EcommerceError))]
pub struct ApiJson<T>(pub T);

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(|| async { Json(serde_json::json!({"status": "healthy", "service": "nexonic-store"})) }))
        .route("/products", get(products::list_products).post(products::create_product))
        .route("/products/:id", get(products::get_product).put(products::update_product).delete(products::delete_product))
        .route("/order", get(orders::list_orders).post(orders::place_order))
        .route("/order/new", post(orders::place_order))
        .route("/order/my-orders", get(orders::my_orders))
        .route("/order/:id", get(orders::get_order).put(orders::update_order_status).delete(orders::cancel_order))
        .route("/payment/create-checkout-session", post(payments::create_checkout_session))
        .route("/payment/webhook", post(payments::webhook))
        .route("/admin/stats", get(stats::dashboard))
        .with_state(state)
}
