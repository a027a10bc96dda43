//! Order placement, status management and payment settlement.

use chrono::Utc;
use std::sync::Arc;
use tracing::{error, info, warn};
use uuid::Uuid;
use validator::Validate;

use crate::auth::CurrentUser;
use crate::domain::aggregates::{Cart, CartLine, Order, OrderStatus, PaymentFlow, PaymentMethod, ShippingAddress};
use crate::domain::events::{DomainEvent, OrderEvent};
use crate::domain::pricing::{self, PricingPolicy};
use crate::domain::value_objects::Money;
use crate::messaging::EventBus;
use crate::payment::{CheckoutLine, CheckoutUrls, PaymentGateway, PaymentHandle, PaymentRequest, WebhookEvent, WebhookVerifier};
use crate::store::{SettleOutcome, Store};
use crate::{EcommerceError, Result};

#[derive(Clone, Debug)]
pub struct PlaceOrder {
    pub buyer_id: Uuid,
    pub shipping_address: ShippingAddress,
    pub lines: Vec<CartLine>,
    pub method: PaymentMethod,
    pub flow: PaymentFlow,
}

#[derive(Debug)]
pub struct PlacedOrder {
    pub order: Order,
    pub payment: Option<PaymentHandle>,
}

/// What a verified webhook delivery did.
#[derive(Debug, PartialEq, Eq)]
pub enum WebhookOutcome { Settled(Uuid), AlreadyPaid, Duplicate, Ignored }

#[derive(Clone)]
pub struct OrderService {
    store: Arc<dyn Store>,
    gateway: Arc<dyn PaymentGateway>,
    verifier: WebhookVerifier,
    events: EventBus,
    pricing: PricingPolicy,
    checkout_urls: CheckoutUrls,
}

impl OrderService {
    pub fn new(store: Arc<dyn Store>, gateway: Arc<dyn PaymentGateway>, verifier: WebhookVerifier, events: EventBus, pricing: PricingPolicy, checkout_urls: CheckoutUrls) -> Self {
        Self { store, gateway, verifier, events, pricing, checkout_urls }
    }

    /// Validates and prices the cart, reserves stock and persists the order, then
    /// asks the processor for a payment handle.
    ///
    /// Nothing is written when validation fails. If the processor call fails the
    /// order stays `Processing` and unpaid and the error is `PaymentSetup`.
    pub async fn place_order(&self, cmd: PlaceOrder) -> Result<PlacedOrder> {
        cmd.shipping_address.validate()?;
        let cart = Cart::from_lines(cmd.lines)?;
        let catalog = self.store.find_products(&cart.product_ids()).await?;
        let quote = pricing::quote(&cart, &catalog, &self.pricing)?;

        let mut order = Order::place(cmd.buyer_id, quote, cmd.shipping_address, cmd.method, cmd.flow);
        self.store.place_order(&order).await?;
        self.events.publish(order.take_events()).await;
        info!(order_id = %order.id(), buyer_id = %order.buyer_id(), total = %order.total_money(), "order placed");

        if order.payment().method() == PaymentMethod::CashOnDelivery {
            return Ok(PlacedOrder { order, payment: None });
        }

        let request = payment_request(&order)?;
        let result = match order.payment().flow() {
            PaymentFlow::HostedSession => self.gateway.create_checkout_session(&request, &self.checkout_urls).await,
            _ => self.gateway.create_intent(&request).await,
        };
        let handle = result.map_err(|e| {
            error!(order_id = %order.id(), error = %e, "payment setup failed");
            EcommerceError::from(e)
        })?;
        self.store.attach_payment_reference(order.id(), &handle.reference).await?;
        order.attach_payment_reference(&handle.reference);
        Ok(PlacedOrder { order, payment: Some(handle) })
    }

    /// Owners and admins may read an order; everyone else gets `OrderNotFound`.
    pub async fn get_order(&self, user: &CurrentUser, id: Uuid) -> Result<Order> {
        let order = self.store.find_order(id).await?.ok_or(EcommerceError::OrderNotFound)?;
        if order.buyer_id() != user.id() && !user.is_admin() { return Err(EcommerceError::OrderNotFound); }
        Ok(order)
    }

    pub async fn my_orders(&self, user: &CurrentUser) -> Result<Vec<Order>> { self.store.list_orders(Some(user.id())).await }

    pub async fn all_orders(&self) -> Result<Vec<Order>> { self.store.list_orders(None).await }

    /// Admin status change. The status string is checked before the order is looked up.
    pub async fn update_status(&self, id: Uuid, status: &str) -> Result<Order> {
        let next: OrderStatus = status.parse()?;
        let mut order = self.store.find_order(id).await?.ok_or(EcommerceError::OrderNotFound)?;
        let previous = order.status();
        if order.update_status(next)? {
            self.store.save_status(&order, previous).await?;
            info!(order_id = %id, from = %previous, to = %next, "order status changed");
            self.events.publish(order.take_events()).await;
        }
        Ok(order)
    }

    /// Soft delete: cancels the order and returns its stock.
    pub async fn cancel(&self, id: Uuid) -> Result<Order> { self.update_status(id, OrderStatus::Cancelled.as_str()).await }

    /// Verifies and applies a processor webhook delivery.
    pub async fn handle_webhook(&self, payload: &[u8], signature: Option<&str>) -> Result<WebhookOutcome> {
        let signature = signature.ok_or_else(|| EcommerceError::Webhook("missing Stripe-Signature header".into()))?;
        self.verifier.verify(payload, signature, Utc::now().timestamp()).map_err(|e| {
            warn!(error = %e, "webhook signature rejected");
            EcommerceError::Webhook(e.to_string())
        })?;
        let event: WebhookEvent = serde_json::from_slice(payload).map_err(|e| EcommerceError::Webhook(format!("invalid payload: {}", e)))?;

        let settlement = match event.settlement(Utc::now()) {
            Ok(Some(s)) => s,
            Ok(None) => { info!(event_id = %event.id, kind = %event.kind, "webhook event ignored"); return Ok(WebhookOutcome::Ignored); }
            Err(e) => { warn!(error = %e, "webhook event cannot be applied"); return Ok(WebhookOutcome::Ignored); }
        };

        match self.store.settle_payment(&settlement).await {
            Ok(SettleOutcome::Settled(order)) => {
                info!(order_id = %order.id(), event_id = %settlement.event_id, "order paid");
                let paid_at = order.paid_at().unwrap_or(settlement.paid_at);
                self.events.publish(vec![DomainEvent::Order(OrderEvent::Paid { order_id: order.id(), paid_at })]).await;
                Ok(WebhookOutcome::Settled(order.id()))
            }
            Ok(SettleOutcome::AlreadyPaid) => { info!(order_id = %settlement.order_id, "order already paid"); Ok(WebhookOutcome::AlreadyPaid) }
            Ok(SettleOutcome::DuplicateEvent) => { info!(event_id = %settlement.event_id, "duplicate webhook event"); Ok(WebhookOutcome::Duplicate) }
            Err(EcommerceError::OrderNotFound) => { warn!(order_id = %settlement.order_id, event_id = %settlement.event_id, "webhook for unknown order"); Ok(WebhookOutcome::Ignored) }
            Err(e) => Err(e),
        }
    }
}

/// Charge request for an order; lines add up to the order total.
fn payment_request(order: &Order) -> Result<PaymentRequest> {
    let currency = order.total_money().currency().to_string();
    let minor = |amount| Money::new(amount, &currency).to_minor_units().map_err(|e| EcommerceError::Validation(e.to_string()));
    let mut lines = order.items().iter()
        .map(|item| Ok(CheckoutLine { name: item.title.clone(), image: item.image.clone(), unit_amount_minor: minor(item.unit_price)?, quantity: item.quantity }))
        .collect::<Result<Vec<_>>>()?;
    for (name, amount) in [("Tax", order.tax()), ("Shipping", order.shipping())] {
        let unit_amount_minor = minor(amount)?;
        if unit_amount_minor > 0 { lines.push(CheckoutLine { name: name.into(), image: None, unit_amount_minor, quantity: 1 }); }
    }
    Ok(PaymentRequest { order_id: order.id(), buyer_id: order.buyer_id(), amount_minor: minor(order.total())?, currency, lines })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::pricing::{Quote, QuotedLine};
    use rust_decimal::Decimal;

    #[test]
    fn test_payment_request_lines_sum_to_total() {
        let line = QuotedLine { product_id: Uuid::now_v7(), title: "Lamp".into(), image: None, unit_price: Decimal::new(1000, 0), quantity: 2, line_total: Decimal::new(2000, 0) };
        let quote = Quote { lines: vec![line], subtotal: Decimal::new(2000, 0), tax: Decimal::new(100, 0), shipping: Decimal::new(10, 0), total: Decimal::new(2110, 0), amount_minor: 211_000, currency: "usd".into() };
        let order = Order::place(Uuid::now_v7(), quote, ShippingAddress::default(), PaymentMethod::Card, PaymentFlow::HostedSession);
        let request = payment_request(&order).unwrap();
        assert_eq!(request.amount_minor, 211_000);
        assert_eq!(request.lines.len(), 3);
        let sum: i64 = request.lines.iter().map(|l| l.unit_amount_minor * i64::from(l.quantity)).sum();
        assert_eq!(sum, request.amount_minor);
    }
}
