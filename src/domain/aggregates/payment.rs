//! Payment record, one per order.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentMethod {
    #[default]
    Card,
    #[serde(rename = "cod")]
    CashOnDelivery,
}

/// How the processor is asked to collect a card payment.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentFlow { Intent, HostedSession, Offline }

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum PaymentStatus { #[default] Pending, Paid }

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Payment {
    pub(crate) method: PaymentMethod,
    pub(crate) flow: PaymentFlow,
    pub(crate) status: PaymentStatus,
    pub(crate) reference: Option<String>,
    pub(crate) updated_at: DateTime<Utc>,
}

impl Payment {
    pub fn pending(method: PaymentMethod, flow: PaymentFlow) -> Self {
        Self { method, flow, status: PaymentStatus::Pending, reference: None, updated_at: Utc::now() }
    }

    pub fn method(&self) -> PaymentMethod { self.method }
    pub fn flow(&self) -> PaymentFlow { self.flow }
    pub fn status(&self) -> PaymentStatus { self.status }
    pub fn reference(&self) -> Option<&str> { self.reference.as_deref() }

    pub(crate) fn settle(&mut self, reference: Option<&str>, at: DateTime<Utc>) {
        self.status = PaymentStatus::Paid;
        if self.reference.is_none() { self.reference = reference.map(str::to_string); }
        self.updated_at = at;
    }
}

macro_rules! text_enum {
    ($ty:ty { $($variant:ident => $text:literal),+ $(,)? }) => {
        impl $ty {
            pub fn as_str(&self) -> &'static str { match self { $(Self::$variant => $text),+ } }
        }
        impl FromStr for $ty {
            type Err = String;
            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s { $($text => Ok(Self::$variant),)+ other => Err(other.to_string()) }
            }
        }
    };
}

text_enum!(PaymentMethod { Card => "card", CashOnDelivery => "cod" });
text_enum!(PaymentFlow { Intent => "intent", HostedSession => "hosted_session", Offline => "offline" });
text_enum!(PaymentStatus { Pending => "Pending", Paid => "Paid" });
