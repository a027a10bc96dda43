use axum::{body::Bytes, extract::State, http::HeaderMap, Json};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use uuid::Uuid;

use super::{ApiJson, AppState};
use crate::auth::CurrentUser;
use crate::domain::aggregates::{CartLine, PaymentFlow, PaymentMethod, ShippingAddress};
use crate::services::PlaceOrder;
use crate::{EcommerceError, Result};

pub const SIGNATURE_HEADER: &str = "stripe-signature";

/// Cart items may still carry the browser's title, image and price; only the
/// product id and quantity are read.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutSessionRequest {
    pub shipping_address: ShippingAddress,
    pub cart_items: Vec<CartLine>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutSessionResponse { pub url: String, pub order_id: Uuid }

pub async fn create_checkout_session(State(s): State<AppState>, user: CurrentUser, ApiJson(r): ApiJson<CheckoutSessionRequest>) -> Result<Json<CheckoutSessionResponse>> {
    let placed = s.orders.place_order(PlaceOrder {
        buyer_id: user.id(), shipping_address: r.shipping_address, lines: r.cart_items, method: PaymentMethod::Card, flow: PaymentFlow::HostedSession,
    }).await?;
    let url = placed.payment.and_then(|h| h.url).ok_or_else(|| EcommerceError::PaymentSetup("processor returned no checkout URL".into()))?;
    Ok(Json(CheckoutSessionResponse { url, order_id: placed.order.id() }))
}

/// Takes the raw body so the signature is checked before any JSON parsing.
pub async fn webhook(State(s): State<AppState>, headers: HeaderMap, body: Bytes) -> Result<Json<Value>> {
    let signature = headers.get(SIGNATURE_HEADER).and_then(|v| v.to_str().ok());
    s.orders.handle_webhook(&body, signature).await?;
    Ok(Json(json!({ "received": true })))
}
