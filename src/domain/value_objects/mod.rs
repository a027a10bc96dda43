//! Value Objects for the storefront

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Rounds a monetary amount to cents, half away from zero.
pub fn round_cents(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// Money value object
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Money { amount: Decimal, currency: String }

impl Money {
    pub fn new(amount: Decimal, currency: &str) -> Self { Self { amount, currency: currency.to_lowercase() } }
    pub fn amount(&self) -> Decimal { self.amount }
    pub fn currency(&self) -> &str { &self.currency }

    pub fn checked_add(&self, other: &Money) -> Result<Money, MoneyError> {
        if self.currency != other.currency { return Err(MoneyError::CurrencyMismatch); }
        let amount = self.amount.checked_add(other.amount).ok_or(MoneyError::Overflow)?;
        Ok(Money::new(amount, &self.currency))
    }

    /// `amount * qty`, rounded to cents.
    pub fn checked_times(&self, qty: u32) -> Result<Money, MoneyError> {
        let amount = self.amount.checked_mul(Decimal::from(qty)).ok_or(MoneyError::Overflow)?;
        Ok(Money::new(round_cents(amount), &self.currency))
    }

    /// `amount * rate`, rounded to cents.
    pub fn checked_scale(&self, rate: Decimal) -> Result<Money, MoneyError> {
        let amount = self.amount.checked_mul(rate).ok_or(MoneyError::Overflow)?;
        Ok(Money::new(round_cents(amount), &self.currency))
    }

    /// Amount in the processor's smallest currency unit (cents).
    pub fn to_minor_units(&self) -> Result<i64, MoneyError> {
        let minor = round_cents(self.amount).checked_mul(Decimal::ONE_HUNDRED).ok_or(MoneyError::Overflow)?.trunc();
        i64::try_from(minor).map_err(|_| MoneyError::Overflow)
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "{:.2} {}", self.amount, self.currency.to_uppercase()) }
}

#[derive(Debug, Clone, PartialEq, Eq)] pub enum MoneyError { CurrencyMismatch, Overflow }
impl std::error::Error for MoneyError {}
impl fmt::Display for MoneyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self { Self::CurrencyMismatch => write!(f, "Currency mismatch"), Self::Overflow => write!(f, "Amount out of range") }
    }
}

/// Discount percentage in `0..=100`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Decimal", into = "Decimal")]
pub struct Discount(Decimal);

impl Discount {
    pub fn new(percent: Decimal) -> Result<Self, DiscountError> {
        if percent < Decimal::ZERO || percent > Decimal::ONE_HUNDRED { return Err(DiscountError::OutOfRange(percent)); }
        Ok(Self(percent))
    }
    pub fn percent(&self) -> Decimal { self.0 }

    /// `price - price * discount / 100`, rounded to cents; `None` when out of range.
    pub fn apply(&self, price: Decimal) -> Option<Decimal> {
        let off = price.checked_mul(self.0)?.checked_div(Decimal::ONE_HUNDRED)?;
        Some(round_cents(price.checked_sub(off)?))
    }
}

impl TryFrom<Decimal> for Discount {
    type Error = DiscountError;
    fn try_from(value: Decimal) -> Result<Self, Self::Error> { Self::new(value) }
}

impl From<Discount> for Decimal {
    fn from(d: Discount) -> Self { d.0 }
}

#[derive(Debug, Clone, PartialEq, Eq)] pub enum DiscountError { OutOfRange(Decimal) }
impl std::error::Error for DiscountError {}
impl fmt::Display for DiscountError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self { Self::OutOfRange(d) => write!(f, "discount {} must be between 0 and 100", d) }
    }
}

/// Quantity value object
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Quantity(u32);

impl Quantity {
    pub fn new(value: u32) -> Self { Self(value) }
    pub fn value(&self) -> u32 { self.0 }
    pub fn add(&self, other: u32) -> Self { Self(self.0.saturating_add(other)) }
    pub fn subtract(&self, other: u32) -> Option<Self> {
        if other > self.0 { None } else { Some(Self(self.0 - other)) }
    }
}

impl Default for Quantity { fn default() -> Self { Self(0) } }
