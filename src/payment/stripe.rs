//! Stripe REST client for payment intents and checkout sessions.

use async_trait::async_trait;
use serde::{de::DeserializeOwned, Deserialize};

use super::{CheckoutUrls, GatewayError, PaymentGateway, PaymentHandle, PaymentRequest};

pub const DEFAULT_API_BASE: &str = "https://api.stripe.com";

#[derive(Clone)]
pub struct StripeGateway {
    client: reqwest::Client,
    secret_key: String,
    api_base: String,
}

#[derive(Deserialize)]
struct IntentResponse { id: String, client_secret: Option<String> }

#[derive(Deserialize)]
struct SessionResponse { id: String, url: Option<String> }

#[derive(Deserialize)]
struct ErrorEnvelope { error: ErrorBody }

#[derive(Deserialize)]
struct ErrorBody { message: Option<String> }

impl StripeGateway {
    pub fn new(secret_key: impl Into<String>, api_base: impl Into<String>) -> Self {
        Self { client: reqwest::Client::new(), secret_key: secret_key.into(), api_base: api_base.into().trim_end_matches('/').to_string() }
    }

    async fn post_form<T: DeserializeOwned>(&self, path: &str, idempotency_key: &str, params: &[(String, String)]) -> Result<T, GatewayError> {
        let response = self.client.post(format!("{}{}", self.api_base, path))
            .bearer_auth(&self.secret_key)
            .header("Idempotency-Key", idempotency_key)
            .form(params)
            .send().await
            .map_err(|e| GatewayError::Transport(e.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            let message = response.json::<ErrorEnvelope>().await.ok().and_then(|e| e.error.message).unwrap_or_else(|| status.to_string());
            return Err(GatewayError::Rejected { status: status.as_u16(), message });
        }
        response.json::<T>().await.map_err(|e| GatewayError::Transport(e.to_string()))
    }
}

fn metadata(request: &PaymentRequest) -> Vec<(String, String)> {
    vec![
        ("metadata[order_id]".into(), request.order_id.to_string()),
        ("metadata[buyer_id]".into(), request.buyer_id.to_string()),
    ]
}

pub(crate) fn intent_params(request: &PaymentRequest) -> Vec<(String, String)> {
    let mut params = vec![
        ("amount".to_string(), request.amount_minor.to_string()),
        ("currency".to_string(), request.currency.clone()),
        ("automatic_payment_methods[enabled]".to_string(), "true".to_string()),
    ];
    params.extend(metadata(request));
    params
}

pub(crate) fn session_params(request: &PaymentRequest, urls: &CheckoutUrls) -> Vec<(String, String)> {
    let mut params = vec![
        ("mode".to_string(), "payment".to_string()),
        ("success_url".to_string(), urls.success.clone()),
        ("cancel_url".to_string(), urls.cancel.clone()),
        ("client_reference_id".to_string(), request.order_id.to_string()),
    ];
    for (i, line) in request.lines.iter().enumerate() {
        let key = |field: &str| format!("line_items[{}]{}", i, field);
        params.push((key("[price_data][currency]"), request.currency.clone()));
        params.push((key("[price_data][product_data][name]"), line.name.clone()));
        if let Some(image) = &line.image { params.push((key("[price_data][product_data][images][0]"), image.clone())); }
        params.push((key("[price_data][unit_amount]"), line.unit_amount_minor.to_string()));
        params.push((key("[quantity]"), line.quantity.to_string()));
    }
    params.extend(metadata(request));
    params.push(("payment_intent_data[metadata][order_id]".into(), request.order_id.to_string()));
    params
}

#[async_trait]
impl PaymentGateway for StripeGateway {
    async fn create_intent(&self, request: &PaymentRequest) -> Result<PaymentHandle, GatewayError> {
        let intent: IntentResponse = self.post_form("/v1/payment_intents", &format!("intent-{}", request.order_id), &intent_params(request)).await?;
        tracing::info!(order_id = %request.order_id, intent = %intent.id, "payment intent created");
        Ok(PaymentHandle { reference: intent.id, client_secret: intent.client_secret, url: None })
    }

    async fn create_checkout_session(&self, request: &PaymentRequest, urls: &CheckoutUrls) -> Result<PaymentHandle, GatewayError> {
        let session: SessionResponse = self.post_form("/v1/checkout/sessions", &format!("session-{}", request.order_id), &session_params(request, urls)).await?;
        tracing::info!(order_id = %request.order_id, session = %session.id, "checkout session created");
        Ok(PaymentHandle { reference: session.id, client_secret: None, url: session.url })
    }
}
