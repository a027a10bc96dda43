//! Webhook signature verification and event decoding.
//!
//! The `Stripe-Signature` header has the form `t=<unix seconds>,v1=<hex>[,v1=<hex>...]`
//! where each `v1` is an HMAC-SHA256 of `"<t>.<raw body>"` keyed by the endpoint
//! secret. Verification runs on the raw bytes, before anything parses them.

use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use serde::Deserialize;
use sha2::Sha256;
use std::collections::HashMap;
use thiserror::Error;
use uuid::Uuid;

use crate::store::Settlement;

type HmacSha256 = Hmac<Sha256>;

/// Signatures older than this are treated as replays.
pub const SIGNATURE_TOLERANCE_SECS: i64 = 300;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum SignatureError {
    #[error("malformed signature header")]
    MalformedHeader,
    #[error("signature header has no timestamp")]
    MissingTimestamp,
    #[error("signature header has no v1 signature")]
    MissingSignature,
    #[error("timestamp outside the tolerance zone")]
    TimestampOutOfTolerance,
    #[error("no signatures found matching the expected signature for payload")]
    Mismatch,
    #[error("no webhook signing secret is configured")]
    NotConfigured,
}

/// Without a secret every delivery is rejected; an empty key would let anyone sign.
#[derive(Clone)]
pub struct WebhookVerifier {
    secret: Option<String>,
    tolerance_secs: i64,
}

impl WebhookVerifier {
    pub fn new(secret: impl Into<String>) -> Self {
        let secret = Some(secret.into()).filter(|s| !s.is_empty());
        Self { secret, tolerance_secs: SIGNATURE_TOLERANCE_SECS }
    }

    pub fn disabled() -> Self { Self { secret: None, tolerance_secs: SIGNATURE_TOLERANCE_SECS } }

    pub fn is_configured(&self) -> bool { self.secret.is_some() }

    pub fn verify(&self, payload: &[u8], header: &str, now: i64) -> Result<(), SignatureError> {
        let secret = self.secret.as_deref().ok_or(SignatureError::NotConfigured)?;
        let mut timestamp = None;
        let mut signatures = Vec::new();
        for part in header.split(',') {
            let (key, value) = part.trim().split_once('=').ok_or(SignatureError::MalformedHeader)?;
            match key {
                "t" => timestamp = Some(value.parse::<i64>().map_err(|_| SignatureError::MalformedHeader)?),
                "v1" => signatures.push(value),
                _ => {}
            }
        }
        let timestamp = timestamp.ok_or(SignatureError::MissingTimestamp)?;
        if signatures.is_empty() { return Err(SignatureError::MissingSignature); }

        let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).map_err(|_| SignatureError::Mismatch)?;
        mac.update(timestamp.to_string().as_bytes());
        mac.update(b".");
        mac.update(payload);
        let matched = signatures.iter()
            .filter_map(|s| hex::decode(s).ok())
            .any(|expected| mac.clone().verify_slice(&expected).is_ok());
        if !matched { return Err(SignatureError::Mismatch); }
        if (now - timestamp).abs() > self.tolerance_secs { return Err(SignatureError::TimestampOutOfTolerance); }
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
pub struct WebhookEvent {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub data: EventData,
}

#[derive(Debug, Deserialize)]
pub struct EventData { pub object: EventObject }

#[derive(Debug, Deserialize)]
pub struct EventObject {
    pub id: String,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
    #[serde(default)]
    pub client_reference_id: Option<String>,
    #[serde(default)]
    pub payment_status: Option<String>,
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum EventError {
    #[error("event {0} carries no order reference")]
    MissingOrder(String),
    #[error("event {event} has an invalid order reference '{value}'")]
    InvalidOrder { event: String, value: String },
}

pub const CHECKOUT_COMPLETED: &str = "checkout.session.completed";
pub const INTENT_SUCCEEDED: &str = "payment_intent.succeeded";

impl WebhookEvent {
    /// The settlement this event requests, or `None` for events that change nothing.
    pub fn settlement(&self, received_at: DateTime<Utc>) -> Result<Option<Settlement>, EventError> {
        let object = &self.data.object;
        let settles = match self.kind.as_str() {
            CHECKOUT_COMPLETED => object.payment_status.as_deref() == Some("paid"),
            INTENT_SUCCEEDED => true,
            _ => false,
        };
        if !settles { return Ok(None); }
        let raw = object.metadata.get("order_id").or(object.client_reference_id.as_ref()).ok_or_else(|| EventError::MissingOrder(self.id.clone()))?;
        let order_id = Uuid::parse_str(raw).map_err(|_| EventError::InvalidOrder { event: self.id.clone(), value: raw.clone() })?;
        Ok(Some(Settlement { event_id: self.id.clone(), order_id, reference: object.id.clone(), paid_at: received_at }))
    }
}
