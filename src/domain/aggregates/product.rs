//! Product Aggregate

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};
use uuid::Uuid;
use crate::domain::value_objects::{round_cents, Discount, DiscountError, Quantity};
use crate::domain::events::{DomainEvent, ProductEvent};

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub(crate) id: Uuid,
    pub(crate) title: String,
    pub(crate) description: String,
    pub(crate) price: Decimal,
    pub(crate) discount: Discount,
    pub(crate) total_price: Decimal,
    pub(crate) category: Category,
    pub(crate) stock: Quantity,
    pub(crate) images: Vec<String>,
    pub(crate) status: ProductStatus,
    pub(crate) created_at: DateTime<Utc>,
    pub(crate) updated_at: DateTime<Utc>,
    #[serde(skip)]
    pub(crate) events: Vec<DomainEvent>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Category { Electronics, Fashion, Home, Beauty, Sports, Books, Toys, Grocery }

impl Category {
    pub const ALL: [Category; 8] = [Self::Electronics, Self::Fashion, Self::Home, Self::Beauty, Self::Sports, Self::Books, Self::Toys, Self::Grocery];
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Electronics => "Electronics", Self::Fashion => "Fashion", Self::Home => "Home", Self::Beauty => "Beauty",
            Self::Sports => "Sports", Self::Books => "Books", Self::Toys => "Toys", Self::Grocery => "Grocery",
        }
    }
}

impl FromStr for Category {
    type Err = ProductError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL.into_iter().find(|c| c.as_str().eq_ignore_ascii_case(s)).ok_or_else(|| ProductError::UnknownCategory(s.to_string()))
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProductStatus { #[default] Active, Archived }

impl ProductStatus {
    pub fn as_str(&self) -> &'static str { match self { Self::Active => "Active", Self::Archived => "Archived" } }
}

impl FromStr for ProductStatus {
    type Err = ProductError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s { "Active" => Ok(Self::Active), "Archived" => Ok(Self::Archived), other => Err(ProductError::UnknownStatus(other.to_string())) }
    }
}

/// Admin input for a new product.
#[derive(Clone, Debug)]
pub struct ProductDraft {
    pub title: String,
    pub description: String,
    pub price: Decimal,
    pub discount: Decimal,
    pub category: Category,
    pub stock: u32,
    pub images: Vec<String>,
}

/// Partial admin edit; `None` keeps the current value.
#[derive(Clone, Debug, Default)]
pub struct ProductPatch {
    pub title: Option<String>,
    pub description: Option<String>,
    pub price: Option<Decimal>,
    pub discount: Option<Decimal>,
    pub category: Option<Category>,
    pub stock: Option<u32>,
    pub images: Option<Vec<String>>,
}

impl Product {
    pub fn create(draft: ProductDraft) -> Result<Self, ProductError> {
        let title = draft.title.trim().to_string();
        if title.is_empty() { return Err(ProductError::MissingTitle); }
        let price = validate_price(draft.price)?;
        let discount = Discount::new(draft.discount)?;
        let total_price = discount.apply(price).ok_or(ProductError::InvalidPrice(price))?;
        let now = Utc::now();
        let mut product = Self {
            id: Uuid::now_v7(), title, description: draft.description, price, discount,
            total_price, category: draft.category, stock: Quantity::new(draft.stock),
            images: draft.images, status: ProductStatus::Active, created_at: now, updated_at: now, events: vec![],
        };
        product.raise_event(DomainEvent::Product(ProductEvent::Created { product_id: product.id, title: product.title.clone() }));
        Ok(product)
    }

    pub fn id(&self) -> Uuid { self.id }
    pub fn title(&self) -> &str { &self.title }
    pub fn price(&self) -> Decimal { self.price }
    pub fn discount(&self) -> Discount { self.discount }
    pub fn total_price(&self) -> Decimal { self.total_price }
    pub fn category(&self) -> Category { self.category }
    pub fn stock(&self) -> u32 { self.stock.value() }
    pub fn images(&self) -> &[String] { &self.images }
    pub fn status(&self) -> ProductStatus { self.status }
    pub fn is_orderable(&self) -> bool { self.status == ProductStatus::Active }

    /// Applies an admin edit. Price and discount changes always regenerate the total price.
    pub fn apply(&mut self, patch: ProductPatch) -> Result<(), ProductError> {
        let title = patch.title.map(|t| t.trim().to_string());
        if title.as_deref() == Some("") { return Err(ProductError::MissingTitle); }
        let price = patch.price.map(validate_price).transpose()?.unwrap_or(self.price);
        let discount = patch.discount.map(Discount::new).transpose()?.unwrap_or(self.discount);
        let total = discount.apply(price).ok_or(ProductError::InvalidPrice(price))?;
        if let Some(title) = title { self.title = title; }
        if let Some(description) = patch.description { self.description = description; }
        if let Some(category) = patch.category { self.category = category; }
        if let Some(stock) = patch.stock { self.stock = Quantity::new(stock); }
        if let Some(images) = patch.images { self.images = images; }
        self.price = price;
        self.discount = discount;
        if total != self.total_price {
            self.total_price = total;
            self.raise_event(DomainEvent::Product(ProductEvent::Repriced { product_id: self.id, total_price: total }));
        }
        self.touch();
        Ok(())
    }

    pub fn archive(&mut self) {
        if self.status == ProductStatus::Archived { return; }
        self.status = ProductStatus::Archived;
        self.touch();
        self.raise_event(DomainEvent::Product(ProductEvent::Archived { product_id: self.id }));
    }

    pub fn reserve(&mut self, qty: u32) -> Result<(), ProductError> {
        self.stock = self.stock.subtract(qty).ok_or(ProductError::InsufficientStock { available: self.stock.value() })?;
        self.touch();
        Ok(())
    }

    pub fn release(&mut self, qty: u32) { self.stock = self.stock.add(qty); self.touch(); }

    pub fn take_events(&mut self) -> Vec<DomainEvent> { std::mem::take(&mut self.events) }
    fn raise_event(&mut self, e: DomainEvent) { self.events.push(e); }
    fn touch(&mut self) { self.updated_at = Utc::now(); }
}

/// Prices are stored as `NUMERIC(12, 2)`.
pub const MAX_PRICE: Decimal = Decimal::from_parts(3_567_587_327, 232, 0, false, 2);

fn validate_price(price: Decimal) -> Result<Decimal, ProductError> {
    let price = round_cents(price);
    if price <= Decimal::ZERO || price > MAX_PRICE { return Err(ProductError::InvalidPrice(price)); }
    Ok(price)
}

#[derive(Debug, Clone, PartialEq)]
pub enum ProductError { MissingTitle, InvalidPrice(Decimal), Discount(DiscountError), UnknownCategory(String), UnknownStatus(String), InsufficientStock { available: u32 } }
impl std::error::Error for ProductError {}
impl fmt::Display for ProductError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingTitle => write!(f, "Product title is required"),
            Self::InvalidPrice(p) => write!(f, "Price must be positive and at most {}, got {}", MAX_PRICE, p),
            Self::Discount(e) => write!(f, "{}", e),
            Self::UnknownCategory(c) => write!(f, "Unknown category '{}'", c),
            Self::UnknownStatus(s) => write!(f, "Unknown product status '{}'", s),
            Self::InsufficientStock { available } => write!(f, "Only {} in stock", available),
        }
    }
}
impl From<DiscountError> for ProductError { fn from(e: DiscountError) -> Self { Self::Discount(e) } }

#[cfg(test)]
mod tests {
    use super::*;

    fn draft() -> ProductDraft {
        ProductDraft { title: "Headphones".into(), description: "Wireless".into(), price: Decimal::new(20000, 2), discount: Decimal::new(10, 0), category: Category::Electronics, stock: 5, images: vec!["headphones.png".into()] }
    }

    #[test]
    fn test_product_create_derives_total() {
        let mut p = Product::create(draft()).unwrap();
        assert_eq!(p.total_price(), Decimal::new(180, 0));
        assert!(matches!(p.take_events()[0], DomainEvent::Product(ProductEvent::Created { .. })));
    }
    #[test]
    fn test_patch_reprices() {
        let mut p = Product::create(draft()).unwrap();
        p.take_events();
        p.apply(ProductPatch { discount: Some(Decimal::new(50, 0)), ..Default::default() }).unwrap();
        assert_eq!(p.total_price(), Decimal::new(100, 0));
        assert_eq!(p.take_events().len(), 1);
        assert!(p.apply(ProductPatch { price: Some(Decimal::ZERO), ..Default::default() }).is_err());
        assert_eq!(p.price(), Decimal::new(200, 0));
    }
    #[test]
    fn test_price_out_of_range_is_rejected() {
        assert_eq!(MAX_PRICE, Decimal::new(999_999_999_999, 2));
        let huge = ProductDraft { price: Decimal::MAX, ..draft() };
        assert!(matches!(Product::create(huge), Err(ProductError::InvalidPrice(_))));
        let over = ProductDraft { price: Decimal::new(1_000_000_000_000, 2), ..draft() };
        assert!(matches!(Product::create(over), Err(ProductError::InvalidPrice(_))));
        let mut p = Product::create(ProductDraft { price: MAX_PRICE, ..draft() }).unwrap();
        assert!(matches!(p.apply(ProductPatch { price: Some(Decimal::MAX), ..Default::default() }), Err(ProductError::InvalidPrice(_))));
        assert_eq!(p.price(), MAX_PRICE);
    }
    #[test]
    fn test_reserve_and_release() {
        let mut p = Product::create(draft()).unwrap();
        assert_eq!(p.reserve(6), Err(ProductError::InsufficientStock { available: 5 }));
        p.reserve(2).unwrap();
        assert_eq!(p.stock(), 3);
        p.release(2);
        assert_eq!(p.stock(), 5);
    }
    #[test]
    fn test_category_parse() {
        assert_eq!("books".parse::<Category>().unwrap(), Category::Books);
        assert!("Garden".parse::<Category>().is_err());
    }
}
