#![allow(dead_code)]

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
    Router,
};
use hmac::{Hmac, Mac};
use nexonic_store::{
    api::{self, AppState},
    auth::{Role, SessionKeys},
    config::Config,
    domain::aggregates::{Category, Product, ProductDraft},
    messaging::EventBus,
    payment::{CheckoutUrls, GatewayError, PaymentGateway, PaymentHandle, PaymentRequest},
    store::{MemoryStore, Store},
};
use rust_decimal::Decimal;
use serde_json::{json, Value};
use sha2::Sha256;
use std::str::FromStr;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc, Mutex,
};
use tower::ServiceExt;
use uuid::Uuid;

pub const SESSION_SECRET: &str = "test-session-secret";
pub const WEBHOOK_SECRET: &str = "whsec_test123secret456";

/// Records every charge request; can be switched to fail.
#[derive(Default)]
pub struct RecordingGateway {
    pub requests: Mutex<Vec<PaymentRequest>>,
    pub failing: AtomicBool,
}

impl RecordingGateway {
    pub fn calls(&self) -> usize { self.requests.lock().unwrap().len() }
    pub fn last(&self) -> Option<PaymentRequest> { self.requests.lock().unwrap().last().cloned() }

    fn record(&self, request: &PaymentRequest) -> Result<usize, GatewayError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(GatewayError::Rejected { status: 402, message: "card declined".into() });
        }
        let mut requests = self.requests.lock().unwrap();
        requests.push(request.clone());
        Ok(requests.len())
    }
}

#[async_trait]
impl PaymentGateway for RecordingGateway {
    async fn create_intent(&self, request: &PaymentRequest) -> Result<PaymentHandle, GatewayError> {
        let n = self.record(request)?;
        Ok(PaymentHandle { reference: format!("pi_test_{}", n), client_secret: Some(format!("pi_test_{}_secret", n)), url: None })
    }

    async fn create_checkout_session(&self, request: &PaymentRequest, _urls: &CheckoutUrls) -> Result<PaymentHandle, GatewayError> {
        let n = self.record(request)?;
        Ok(PaymentHandle { reference: format!("cs_test_{}", n), client_secret: None, url: Some(format!("https://checkout.stripe.test/{}", n)) })
    }
}

pub struct TestApp {
    pub router: Router,
    pub state: AppState,
    pub store: Arc<MemoryStore>,
    pub gateway: Arc<RecordingGateway>,
    pub sessions: SessionKeys,
}

pub fn config() -> Config {
    Config::from_lookup(|key| match key {
        "SESSION_SECRET" => Some(SESSION_SECRET.to_string()),
        "STRIPE_WEBHOOK_SECRET" => Some(WEBHOOK_SECRET.to_string()),
        _ => None,
    })
    .unwrap()
}

pub fn app() -> TestApp { app_with(config()) }

pub fn app_with(config: Config) -> TestApp {
    let store = Arc::new(MemoryStore::new());
    let gateway = Arc::new(RecordingGateway::default());
    let state = AppState::new(&config, store.clone() as Arc<dyn Store>, gateway.clone() as Arc<dyn PaymentGateway>, EventBus::disabled());
    TestApp { router: api::router(state.clone()), state, store, gateway, sessions: SessionKeys::new(SESSION_SECRET, false) }
}

impl TestApp {
    pub fn token(&self, user: Uuid, role: Role) -> String { self.sessions.issue(user, role, chrono::Duration::hours(1)).unwrap() }
    pub fn customer(&self) -> (Uuid, String) { let id = Uuid::now_v7(); (id, self.token(id, Role::Customer)) }
    pub fn admin(&self) -> String { self.token(Uuid::now_v7(), Role::Admin) }

    pub async fn product(&self, title: &str, price: i64, stock: u32) -> Product {
        self.state.catalog.create(ProductDraft {
            title: title.into(), description: String::new(), price: Decimal::new(price, 0), discount: Decimal::ZERO,
            category: Category::Electronics, stock, images: vec![format!("{}.png", title.to_lowercase())],
        }).await.unwrap()
    }

    pub async fn send(&self, request: Request<Body>) -> (StatusCode, Value) {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = serde_json::from_slice(&bytes).unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()));
        (status, body)
    }

    pub async fn call(&self, method: Method, uri: &str, token: Option<&str>, body: Option<Value>) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token { builder = builder.header(header::COOKIE, format!("token={}", token)); }
        let request = match body {
            Some(body) => builder.header(header::CONTENT_TYPE, "application/json").body(Body::from(body.to_string())).unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };
        self.send(request).await
    }

    pub async fn webhook(&self, payload: &str, signature: Option<String>) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(Method::POST).uri("/payment/webhook").header(header::CONTENT_TYPE, "application/json");
        if let Some(signature) = signature { builder = builder.header("Stripe-Signature", signature); }
        self.send(builder.body(Body::from(payload.to_string())).unwrap()).await
    }

    pub async fn product_stock(&self, id: Uuid) -> u32 {
        self.store.find_product(id).await.unwrap().unwrap().stock()
    }
}

pub fn address() -> Value {
    json!({
        "fullName": "Ada Obi", "address": "12 Marina Road", "city": "Lagos", "state": "Lagos",
        "country": "Nigeria", "pincode": "100001", "phone": "+2348000000000"
    })
}

pub fn order_body(product_id: Uuid, quantity: u32) -> Value {
    json!({ "shippingAddress": address(), "items": [{ "productId": product_id, "quantity": quantity }] })
}

pub fn sign(payload: &str, secret: &str, timestamp: i64) -> String {
    let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes()).unwrap();
    mac.update(format!("{}.{}", timestamp, payload).as_bytes());
    format!("t={},v1={}", timestamp, hex::encode(mac.finalize().into_bytes()))
}

pub fn intent_succeeded(event_id: &str, intent_id: &str, order_id: &str) -> String {
    json!({
        "id": event_id, "type": "payment_intent.succeeded",
        "data": { "object": { "id": intent_id, "metadata": { "order_id": order_id } } }
    }).to_string()
}

pub fn dec(value: &Value) -> Decimal {
    match value {
        Value::String(s) => Decimal::from_str(s).unwrap(),
        other => Decimal::from_str(&other.to_string()).unwrap(),
    }
}
