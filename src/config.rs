//! Environment configuration, read once at start-up.

use rust_decimal::Decimal;
use std::{env, str::FromStr};

use crate::domain::pricing::{PricingPolicy, PROCESSOR_MAX_AMOUNT_MINOR};
use crate::payment::{stripe::DEFAULT_API_BASE, CheckoutUrls};

#[derive(Clone, Debug)]
pub struct Config {
    pub port: u16,
    pub database_url: Option<String>,
    pub nats_url: Option<String>,
    pub session_secret: String,
    pub stripe_secret_key: Option<String>,
    pub stripe_webhook_secret: Option<String>,
    pub stripe_api_base: String,
    pub pricing: PricingPolicy,
    pub checkout_urls: CheckoutUrls,
    pub production: bool,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("missing required environment variable {0}")]
    Missing(&'static str),
    #[error("invalid value for {name}: {value}")]
    Invalid { name: &'static str, value: String },
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the configuration from any key lookup.
    pub fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let parsed = |name: &'static str| -> Result<Option<Decimal>, ConfigError> { parse_opt(name, get(name)) };
        let tax_rate = parsed("TAX_RATE")?.unwrap_or_else(|| Decimal::new(5, 2));
        if tax_rate < Decimal::ZERO || tax_rate > Decimal::ONE {
            return Err(ConfigError::Invalid { name: "TAX_RATE", value: tax_rate.to_string() });
        }
        let pricing = PricingPolicy {
            tax_rate,
            shipping_flat: parsed("SHIPPING_FLAT")?.unwrap_or_else(|| Decimal::new(1000, 2)),
            currency: get("CURRENCY").unwrap_or_else(|| "usd".into()).to_lowercase(),
            max_amount_minor: PROCESSOR_MAX_AMOUNT_MINOR,
        };
        let secret = |name: &str| get(name).filter(|v| !v.trim().is_empty());
        let frontend = get("FRONTEND_URL").unwrap_or_else(|| "http://localhost:5173".into());
        Ok(Self {
            port: parse_opt("PORT", get("PORT"))?.unwrap_or(8083),
            database_url: get("DATABASE_URL"),
            nats_url: get("NATS_URL"),
            session_secret: secret("SESSION_SECRET").ok_or(ConfigError::Missing("SESSION_SECRET"))?,
            stripe_secret_key: secret("STRIPE_SECRET_KEY"),
            stripe_webhook_secret: secret("STRIPE_WEBHOOK_SECRET"),
            stripe_api_base: get("STRIPE_API_BASE").unwrap_or_else(|| DEFAULT_API_BASE.into()),
            pricing,
            checkout_urls: CheckoutUrls {
                success: get("CHECKOUT_SUCCESS_URL").unwrap_or_else(|| format!("{}/success", frontend)),
                cancel: get("CHECKOUT_CANCEL_URL").unwrap_or_else(|| format!("{}/cancel", frontend)),
            },
            production: get("APP_ENV").as_deref() == Some("production"),
        })
    }
}

fn parse_opt<T: FromStr>(name: &'static str, value: Option<String>) -> Result<Option<T>, ConfigError> {
    value.map(|v| v.trim().parse::<T>().map_err(|_| ConfigError::Invalid { name, value: v })).transpose()
}
