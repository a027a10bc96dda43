mod common;

use axum::http::{Method, StatusCode};
use common::{address, app, dec, order_body};
use nexonic_store::store::Store;
use rust_decimal::Decimal;
use serde_json::json;
use std::sync::atomic::Ordering;
use uuid::Uuid;

#[tokio::test]
async fn test_place_order_prices_and_reserves_stock() {
    let app = app();
    let lamp = app.product("Lamp", 1000, 5).await;
    let (buyer, token) = app.customer();

    let (status, body) = app.call(Method::POST, "/order", Some(&token), Some(order_body(lamp.id(), 2))).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["paymentHandle"], "pi_test_1_secret");
    let order_id = body["orderId"].as_str().unwrap().to_string();

    let (status, order) = app.call(Method::GET, &format!("/order/{}", order_id), Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(dec(&order["subtotal"]), Decimal::new(2000, 0));
    assert_eq!(dec(&order["tax"]), Decimal::new(100, 0));
    assert_eq!(dec(&order["shipping"]), Decimal::new(10, 0));
    assert_eq!(dec(&order["total"]), Decimal::new(2110, 0));
    assert_eq!(order["status"], "Processing");
    assert_eq!(order["isPaid"], false);
    assert_eq!(order["buyerId"], buyer.to_string());
    assert_eq!(order["items"][0]["title"], "Lamp");
    assert_eq!(order["payment"]["reference"], "pi_test_1");

    assert_eq!(app.product_stock(lamp.id()).await, 3);
    let request = app.gateway.last().unwrap();
    assert_eq!(request.amount_minor, 211_000);
    assert_eq!(request.currency, "usd");
}

#[tokio::test]
async fn test_insufficient_stock_rejects_without_side_effects() {
    let app = app();
    let lamp = app.product("Lamp", 1000, 5).await;
    let (_, token) = app.customer();

    let (status, body) = app.call(Method::POST, "/order", Some(&token), Some(order_body(lamp.id(), 6))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let message = body["error"].as_str().unwrap();
    assert!(message.contains("Lamp"), "{}", message);
    assert!(message.contains("only 5 available"), "{}", message);

    assert_eq!(app.product_stock(lamp.id()).await, 5);
    assert_eq!(app.gateway.calls(), 0);
    let (_, mine) = app.call(Method::GET, "/order/my-orders", Some(&token), None).await;
    assert_eq!(mine, json!([]));
}

#[tokio::test]
async fn test_one_short_line_rejects_the_whole_cart() {
    let app = app();
    let lamp = app.product("Lamp", 1000, 5).await;
    let desk = app.product("Desk", 300, 1).await;
    let (_, token) = app.customer();

    let body = json!({ "shippingAddress": address(), "items": [
        { "productId": lamp.id(), "quantity": 2 },
        { "productId": desk.id(), "quantity": 2 },
    ]});
    let (status, _) = app.call(Method::POST, "/order", Some(&token), Some(body)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(app.product_stock(lamp.id()).await, 5);
    assert_eq!(app.product_stock(desk.id()).await, 1);
}

#[tokio::test]
async fn test_unknown_and_archived_products_are_rejected() {
    let app = app();
    let lamp = app.product("Lamp", 1000, 5).await;
    app.state.catalog.archive(lamp.id()).await.unwrap();
    let (_, token) = app.customer();

    let (status, _) = app.call(Method::POST, "/order", Some(&token), Some(order_body(Uuid::now_v7(), 1))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let (status, _) = app.call(Method::POST, "/order", Some(&token), Some(order_body(lamp.id(), 1))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(app.gateway.calls(), 0);
}

#[tokio::test]
async fn test_order_requires_session() {
    let app = app();
    let lamp = app.product("Lamp", 1000, 5).await;

    let (status, _) = app.call(Method::POST, "/order", None, Some(order_body(lamp.id(), 1))).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    let (status, _) = app.call(Method::POST, "/order", Some("not-a-token"), Some(order_body(lamp.id(), 1))).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(app.product_stock(lamp.id()).await, 5);
}

#[tokio::test]
async fn test_invalid_requests_are_rejected() {
    let app = app();
    let lamp = app.product("Lamp", 1000, 5).await;
    let (_, token) = app.customer();

    let empty = json!({ "shippingAddress": address(), "items": [] });
    assert_eq!(app.call(Method::POST, "/order", Some(&token), Some(empty)).await.0, StatusCode::BAD_REQUEST);

    let zero = order_body(lamp.id(), 0);
    assert_eq!(app.call(Method::POST, "/order", Some(&token), Some(zero)).await.0, StatusCode::BAD_REQUEST);

    let mut blank_city = order_body(lamp.id(), 1);
    blank_city["shippingAddress"]["city"] = json!("  ");
    assert_eq!(app.call(Method::POST, "/order", Some(&token), Some(blank_city)).await.0, StatusCode::BAD_REQUEST);

    let missing = json!({ "items": [{ "productId": lamp.id(), "quantity": 1 }] });
    assert_eq!(app.call(Method::POST, "/order", Some(&token), Some(missing)).await.0, StatusCode::BAD_REQUEST);

    assert_eq!(app.product_stock(lamp.id()).await, 5);
    assert_eq!(app.gateway.calls(), 0);
}

#[tokio::test]
async fn test_amount_over_processor_limit_is_rejected() {
    let app = app();
    let ring = app.product("Ring", 500_000, 10).await;
    let (_, token) = app.customer();

    let (status, _) = app.call(Method::POST, "/order", Some(&token), Some(order_body(ring.id(), 2))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(app.gateway.calls(), 0);
    assert_eq!(app.product_stock(ring.id()).await, 10);
}

#[tokio::test]
async fn test_payment_setup_failure_keeps_unpaid_order() {
    let app = app();
    let lamp = app.product("Lamp", 1000, 5).await;
    let (buyer, token) = app.customer();
    app.gateway.failing.store(true, Ordering::SeqCst);

    let (status, body) = app.call(Method::POST, "/order", Some(&token), Some(order_body(lamp.id(), 1))).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(!body["error"].as_str().unwrap().contains("card declined"));

    let orders = app.store.list_orders(Some(buyer)).await.unwrap();
    assert_eq!(orders.len(), 1);
    assert!(!orders[0].is_paid());
    assert_eq!(orders[0].status().as_str(), "Processing");
}

#[tokio::test]
async fn test_cash_on_delivery_skips_processor() {
    let app = app();
    let lamp = app.product("Lamp", 1000, 5).await;
    let (_, token) = app.customer();

    let mut body = order_body(lamp.id(), 1);
    body["paymentMethod"] = json!("cod");
    let (status, placed) = app.call(Method::POST, "/order/new", Some(&token), Some(body)).await;
    assert_eq!(status, StatusCode::CREATED);
    assert!(placed["paymentHandle"].is_null());
    assert_eq!(app.gateway.calls(), 0);
    assert_eq!(app.product_stock(lamp.id()).await, 4);

    let (_, order) = app.call(Method::GET, &format!("/order/{}", placed["orderId"].as_str().unwrap()), Some(&token), None).await;
    assert_eq!(order["payment"]["method"], "cod");
    assert_eq!(order["payment"]["flow"], "offline");
}

#[tokio::test]
async fn test_checkout_session_ignores_client_prices() {
    let app = app();
    let lamp = app.product("Lamp", 1000, 5).await;
    let (_, token) = app.customer();

    let body = json!({
        "shippingAddress": address(),
        "cartItems": [{ "productId": lamp.id(), "quantity": 2, "title": "Lamp", "price": 1 }]
    });
    let (status, session) = app.call(Method::POST, "/payment/create-checkout-session", Some(&token), Some(body)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(session["url"], "https://checkout.stripe.test/1");

    let request = app.gateway.last().unwrap();
    assert_eq!(request.amount_minor, 211_000);
    let sum: i64 = request.lines.iter().map(|l| l.unit_amount_minor * i64::from(l.quantity)).sum();
    assert_eq!(sum, request.amount_minor);
    assert_eq!(request.order_id.to_string(), session["orderId"].as_str().unwrap());
}

#[tokio::test]
async fn test_orders_are_private_to_their_buyer() {
    let app = app();
    let lamp = app.product("Lamp", 1000, 5).await;
    let (_, owner) = app.customer();
    let (_, stranger) = app.customer();

    let (_, placed) = app.call(Method::POST, "/order", Some(&owner), Some(order_body(lamp.id(), 1))).await;
    let uri = format!("/order/{}", placed["orderId"].as_str().unwrap());

    assert_eq!(app.call(Method::GET, &uri, Some(&stranger), None).await.0, StatusCode::NOT_FOUND);
    assert_eq!(app.call(Method::GET, &uri, Some(&app.admin()), None).await.0, StatusCode::OK);
    let (_, mine) = app.call(Method::GET, "/order/my-orders", Some(&stranger), None).await;
    assert_eq!(mine, json!([]));
}
