//! Order validation and total computation.
//!
//! Every price and stock fact comes from the catalog snapshot passed in; the
//! client's cart contributes nothing but product ids and quantities.

use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::HashMap;
use uuid::Uuid;
use crate::domain::aggregates::{Cart, Product};
use crate::domain::value_objects::{round_cents, Money};

/// Largest amount Stripe accepts for a single charge, in minor units.
pub const PROCESSOR_MAX_AMOUNT_MINOR: i64 = 99_999_999;

#[derive(Clone, Debug)]
pub struct PricingPolicy {
    pub tax_rate: Decimal,
    pub shipping_flat: Decimal,
    pub currency: String,
    pub max_amount_minor: i64,
}

impl Default for PricingPolicy {
    fn default() -> Self {
        Self { tax_rate: Decimal::new(5, 2), shipping_flat: Decimal::new(1000, 2), currency: "usd".into(), max_amount_minor: PROCESSOR_MAX_AMOUNT_MINOR }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuotedLine {
    pub product_id: Uuid,
    pub title: String,
    pub image: Option<String>,
    pub unit_price: Decimal,
    pub quantity: u32,
    pub line_total: Decimal,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Quote {
    pub lines: Vec<QuotedLine>,
    pub subtotal: Decimal,
    pub tax: Decimal,
    pub shipping: Decimal,
    pub total: Decimal,
    pub amount_minor: i64,
    pub currency: String,
}

/// Prices a cart against the catalog. Fails on the first bad line; never partial.
pub fn quote(cart: &Cart, catalog: &[Product], policy: &PricingPolicy) -> Result<Quote, PricingError> {
    let by_id: HashMap<Uuid, &Product> = catalog.iter().map(|p| (p.id(), p)).collect();
    let too_large = |_| PricingError::AmountExceedsLimit { amount_minor: i64::MAX, limit: policy.max_amount_minor };
    let currency = policy.currency.as_str();
    let mut lines = Vec::with_capacity(cart.item_count());
    let mut subtotal = Money::new(Decimal::ZERO, currency);
    for &(product_id, quantity) in cart.items() {
        let product = by_id.get(&product_id).filter(|p| p.is_orderable()).ok_or(PricingError::UnknownProduct(product_id))?;
        if quantity > product.stock() {
            return Err(PricingError::InsufficientStock { product_id, title: product.title().to_string(), available: product.stock() });
        }
        let unit_price = product.total_price();
        let line_total = Money::new(unit_price, currency).checked_times(quantity).map_err(too_large)?;
        subtotal = subtotal.checked_add(&line_total).map_err(too_large)?;
        lines.push(QuotedLine {
            product_id, title: product.title().to_string(), image: product.images().first().cloned(),
            unit_price, quantity, line_total: line_total.amount(),
        });
    }
    let tax = subtotal.checked_scale(policy.tax_rate).map_err(too_large)?;
    let shipping = Money::new(round_cents(policy.shipping_flat), currency);
    let total = subtotal.checked_add(&tax).and_then(|t| t.checked_add(&shipping)).map_err(too_large)?;
    let amount_minor = total.to_minor_units().map_err(too_large)?;
    if amount_minor > policy.max_amount_minor {
        return Err(PricingError::AmountExceedsLimit { amount_minor, limit: policy.max_amount_minor });
    }
    Ok(Quote {
        lines, subtotal: subtotal.amount(), tax: tax.amount(), shipping: shipping.amount(), total: total.amount(),
        amount_minor, currency: total.currency().to_string(),
    })
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PricingError {
    UnknownProduct(Uuid),
    InsufficientStock { product_id: Uuid, title: String, available: u32 },
    AmountExceedsLimit { amount_minor: i64, limit: i64 },
}
