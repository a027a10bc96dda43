//! Order Aggregate

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};
use uuid::Uuid;
use validator::{Validate, ValidationError};
use crate::domain::aggregates::payment::{Payment, PaymentFlow, PaymentMethod};
use crate::domain::events::{DomainEvent, OrderEvent};
use crate::domain::pricing::Quote;
use crate::domain::value_objects::Money;

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub(crate) id: Uuid,
    pub(crate) buyer_id: Uuid,
    pub(crate) items: Vec<LineItem>,
    pub(crate) subtotal: Decimal,
    pub(crate) tax: Decimal,
    pub(crate) shipping: Decimal,
    pub(crate) total: Decimal,
    pub(crate) currency: String,
    pub(crate) status: OrderStatus,
    pub(crate) is_paid: bool,
    pub(crate) paid_at: Option<DateTime<Utc>>,
    pub(crate) delivered_at: Option<DateTime<Utc>>,
    pub(crate) shipping_address: ShippingAddress,
    pub(crate) payment: Payment,
    pub(crate) created_at: DateTime<Utc>,
    pub(crate) updated_at: DateTime<Utc>,
    #[serde(skip)]
    pub(crate) events: Vec<DomainEvent>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LineItem { pub product_id: Uuid, pub title: String, pub image: Option<String>, pub unit_price: Decimal, pub quantity: u32, pub line_total: Decimal }

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ShippingAddress {
    #[validate(custom = "non_blank")]
    pub full_name: String,
    #[serde(alias = "address")]
    #[validate(custom = "non_blank")]
    pub street: String,
    #[validate(custom = "non_blank")]
    pub city: String,
    #[validate(custom = "non_blank")]
    pub state: String,
    #[validate(custom = "non_blank")]
    pub country: String,
    #[serde(alias = "pincode")]
    #[validate(custom = "non_blank")]
    pub postal_code: String,
    #[validate(custom = "non_blank")]
    pub phone: String,
}

fn non_blank(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() { return Err(ValidationError::new("required")); }
    Ok(())
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OrderStatus { #[default] Processing, Shipped, Delivered, Cancelled }

impl OrderStatus {
    pub const ALL: [OrderStatus; 4] = [Self::Processing, Self::Shipped, Self::Delivered, Self::Cancelled];
    pub fn as_str(&self) -> &'static str {
        match self { Self::Processing => "Processing", Self::Shipped => "Shipped", Self::Delivered => "Delivered", Self::Cancelled => "Cancelled" }
    }
    pub fn is_terminal(&self) -> bool { matches!(self, Self::Delivered | Self::Cancelled) }
    fn can_become(&self, next: OrderStatus) -> bool {
        matches!((self, next), (Self::Processing, Self::Shipped) | (Self::Shipped, Self::Delivered) | (Self::Processing | Self::Shipped, Self::Cancelled))
    }
}

impl FromStr for OrderStatus {
    type Err = OrderError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL.into_iter().find(|st| st.as_str() == s).ok_or_else(|| OrderError::UnknownStatus(s.to_string()))
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
}

impl Order {
    /// Builds a new, unpaid order in `Processing` from a validated quote.
    pub fn place(buyer_id: Uuid, quote: Quote, shipping_address: ShippingAddress, method: PaymentMethod, flow: PaymentFlow) -> Self {
        let now = Utc::now();
        let flow = if method == PaymentMethod::CashOnDelivery { PaymentFlow::Offline } else { flow };
        let items = quote.lines.into_iter().map(|l| LineItem { product_id: l.product_id, title: l.title, image: l.image, unit_price: l.unit_price, quantity: l.quantity, line_total: l.line_total }).collect();
        let mut order = Self {
            id: Uuid::now_v7(), buyer_id, items, subtotal: quote.subtotal, tax: quote.tax, shipping: quote.shipping, total: quote.total,
            currency: quote.currency, status: OrderStatus::Processing, is_paid: false, paid_at: None, delivered_at: None,
            shipping_address, payment: Payment::pending(method, flow), created_at: now, updated_at: now, events: vec![],
        };
        order.raise_event(DomainEvent::Order(OrderEvent::Placed { order_id: order.id, buyer_id, total: order.total }));
        order
    }

    pub fn id(&self) -> Uuid { self.id }
    pub fn buyer_id(&self) -> Uuid { self.buyer_id }
    pub fn status(&self) -> OrderStatus { self.status }
    pub fn items(&self) -> &[LineItem] { &self.items }
    pub fn subtotal(&self) -> Decimal { self.subtotal }
    pub fn tax(&self) -> Decimal { self.tax }
    pub fn shipping(&self) -> Decimal { self.shipping }
    pub fn total(&self) -> Decimal { self.total }
    pub fn total_money(&self) -> Money { Money::new(self.total, &self.currency) }
    pub fn is_paid(&self) -> bool { self.is_paid }
    pub fn paid_at(&self) -> Option<DateTime<Utc>> { self.paid_at }
    pub fn payment(&self) -> &Payment { &self.payment }
    pub fn shipping_address(&self) -> &ShippingAddress { &self.shipping_address }
    pub fn created_at(&self) -> DateTime<Utc> { self.created_at }

    /// Admin status change. Returns `false` when the order already has that status.
    ///
    /// A card order must be paid before it can be delivered; a cash-on-delivery
    /// order is settled by its delivery.
    pub fn update_status(&mut self, next: OrderStatus) -> Result<bool, OrderError> {
        if self.status == next { return Ok(false); }
        if !self.status.can_become(next) { return Err(OrderError::InvalidTransition { from: self.status, to: next }); }
        let now = Utc::now();
        if next == OrderStatus::Delivered {
            match self.payment.method() {
                PaymentMethod::Card if !self.is_paid => return Err(OrderError::UnpaidDelivery),
                PaymentMethod::CashOnDelivery => { self.mark_paid(None, now); }
                PaymentMethod::Card => {}
            }
            self.delivered_at = Some(now);
        }
        let previous = self.status;
        self.status = next;
        self.touch();
        self.raise_event(DomainEvent::Order(OrderEvent::StatusChanged { order_id: self.id, from: previous.to_string(), to: next.to_string() }));
        if next == OrderStatus::Cancelled { self.raise_event(DomainEvent::Order(OrderEvent::Cancelled { order_id: self.id })); }
        Ok(true)
    }

    /// Records settlement. Returns `false` if the order was already paid.
    pub fn mark_paid(&mut self, reference: Option<&str>, at: DateTime<Utc>) -> bool {
        if self.is_paid { return false; }
        self.is_paid = true;
        self.paid_at = Some(at);
        self.payment.settle(reference, at);
        self.touch();
        self.raise_event(DomainEvent::Order(OrderEvent::Paid { order_id: self.id, paid_at: at }));
        true
    }

    pub fn attach_payment_reference(&mut self, reference: &str) {
        self.payment.reference = Some(reference.to_string());
        self.touch();
    }

    pub fn take_events(&mut self) -> Vec<DomainEvent> { std::mem::take(&mut self.events) }
    fn raise_event(&mut self, e: DomainEvent) { self.events.push(e); }
    fn touch(&mut self) { self.updated_at = Utc::now(); }
}

#[derive(Debug, Clone, PartialEq, Eq)] pub enum OrderError { UnknownStatus(String), InvalidTransition { from: OrderStatus, to: OrderStatus }, UnpaidDelivery }
impl std::error::Error for OrderError {}
impl fmt::Display for OrderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownStatus(s) => write!(f, "Invalid order status '{}'", s),
            Self::InvalidTransition { from, to } => write!(f, "Cannot change order status from {} to {}", from, to),
            Self::UnpaidDelivery => write!(f, "Order must be paid before it can be delivered"),
        }
    }
}
