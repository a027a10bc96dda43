use axum::{extract::{Path, State}, http::StatusCode, Json};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{ApiJson, AppState};
use crate::auth::{AdminUser, CurrentUser};
use crate::domain::aggregates::{CartLine, Order, PaymentFlow, PaymentMethod, ShippingAddress};
use crate::services::PlaceOrder;
use crate::Result;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaceOrderRequest {
    pub shipping_address: ShippingAddress,
    pub items: Vec<CartLine>,
    #[serde(default)]
    pub payment_method: PaymentMethod,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaceOrderResponse { pub order_id: Uuid, pub payment_handle: Option<String> }

#[derive(Debug, Deserialize)]
pub struct UpdateStatusRequest { pub status: String }

pub async fn place_order(State(s): State<AppState>, user: CurrentUser, ApiJson(r): ApiJson<PlaceOrderRequest>) -> Result<(StatusCode, Json<PlaceOrderResponse>)> {
    let placed = s.orders.place_order(PlaceOrder {
        buyer_id: user.id(), shipping_address: r.shipping_address, lines: r.items, method: r.payment_method, flow: PaymentFlow::Intent,
    }).await?;
    let payment_handle = placed.payment.and_then(|h| h.client_secret);
    Ok((StatusCode::CREATED, Json(PlaceOrderResponse { order_id: placed.order.id(), payment_handle })))
}

pub async fn my_orders(State(s): State<AppState>, user: CurrentUser) -> Result<Json<Vec<Order>>> {
    Ok(Json(s.orders.my_orders(&user).await?))
}

pub async fn get_order(State(s): State<AppState>, user: CurrentUser, Path(id): Path<Uuid>) -> Result<Json<Order>> {
    Ok(Json(s.orders.get_order(&user, id).await?))
}

pub async fn list_orders(State(s): State<AppState>, _admin: AdminUser) -> Result<Json<Vec<Order>>> {
    Ok(Json(s.orders.all_orders().await?))
}

pub async fn update_order_status(State(s): State<AppState>, _admin: AdminUser, Path(id): Path<Uuid>, ApiJson(r): ApiJson<UpdateStatusRequest>) -> Result<Json<Order>> {
    Ok(Json(s.orders.update_status(id, &r.status).await?))
}

pub async fn cancel_order(State(s): State<AppState>, _admin: AdminUser, Path(id): Path<Uuid>) -> Result<Json<Order>> {
    Ok(Json(s.orders.cancel(id).await?))
}
