//! Payment processor integration.
//!
//! Card payments are collected in one of two ways: a payment intent whose client
//! secret the browser confirms directly, or a hosted checkout session the buyer is
//! redirected to. Either way the processor later reports success through a signed
//! webhook (see [`webhook`]).

pub mod stripe;
pub mod webhook;

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

pub use stripe::StripeGateway;
pub use webhook::{WebhookEvent, WebhookVerifier};

#[derive(Clone, Debug, PartialEq)]
pub struct CheckoutLine {
    pub name: String,
    pub image: Option<String>,
    pub unit_amount_minor: i64,
    pub quantity: u32,
}

/// Everything the processor needs to charge one order.
#[derive(Clone, Debug, PartialEq)]
pub struct PaymentRequest {
    pub order_id: Uuid,
    pub buyer_id: Uuid,
    pub amount_minor: i64,
    pub currency: String,
    pub lines: Vec<CheckoutLine>,
}

#[derive(Clone, Debug, Serialize)]
pub struct CheckoutUrls { pub success: String, pub cancel: String }

/// Processor-side object the client uses to complete payment.
#[derive(Clone, Debug, PartialEq)]
pub struct PaymentHandle {
    pub reference: String,
    pub client_secret: Option<String>,
    pub url: Option<String>,
}

#[derive(Error, Debug)]
pub enum GatewayError {
    #[error("payment processor is not configured")]
    NotConfigured,
    #[error("payment processor unreachable: {0}")]
    Transport(String),
    #[error("payment processor rejected the request ({status}): {message}")]
    Rejected { status: u16, message: String },
}

impl From<GatewayError> for crate::EcommerceError {
    fn from(e: GatewayError) -> Self { Self::PaymentSetup(e.to_string()) }
}

#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn create_intent(&self, request: &PaymentRequest) -> Result<PaymentHandle, GatewayError>;
    async fn create_checkout_session(&self, request: &PaymentRequest, urls: &CheckoutUrls) -> Result<PaymentHandle, GatewayError>;
}

/// Used when no processor key is configured; every card payment fails to set up.
pub struct DisabledGateway;

#[async_trait]
impl PaymentGateway for DisabledGateway {
    async fn create_intent(&self, _: &PaymentRequest) -> Result<PaymentHandle, GatewayError> { Err(GatewayError::NotConfigured) }
    async fn create_checkout_session(&self, _: &PaymentRequest, _: &CheckoutUrls) -> Result<PaymentHandle, GatewayError> { Err(GatewayError::NotConfigured) }
}
