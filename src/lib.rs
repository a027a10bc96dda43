//! Nexonic Store - storefront order and payment service
//!
//! Server side of the Nexonic storefront.
//!
//! ## Features
//! - Product catalog management
//! - Cart re-validation and order pricing
//! - Atomic stock reservation at order time
//! - Card payments through payment intents or hosted checkout sessions
//! - Signed, idempotent payment webhooks
//! - Admin order management and dashboard statistics

pub mod api;
pub mod auth;
pub mod config;
pub mod domain;
pub mod messaging;
pub mod payment;
pub mod services;
pub mod store;

use thiserror::Error;
use uuid::Uuid;

use crate::domain::aggregates::{CartError, OrderError, ProductError};
use crate::domain::pricing::PricingError;

// =============================================================================
// Error Types
// =============================================================================

#[derive(Error, Debug)]
pub enum EcommerceError {
    #[error("{0}")]
    Validation(String),

    #[error("Product not found: {0}")]
    UnknownProduct(Uuid),

    #[error("Insufficient stock for {title}: only {available} available")]
    InsufficientStock { product_id: Uuid, title: String, available: u32 },

    #[error("Order amount of {amount_minor} minor units exceeds the payment processor limit of {limit}")]
    AmountExceedsLimit { amount_minor: i64, limit: i64 },

    #[error("Product not found")]
    ProductNotFound,

    #[error("Order not found")]
    OrderNotFound,

    #[error("{0}")]
    Conflict(String),

    #[error("Unauthorized")]
    Unauthorized,

    #[error("Forbidden")]
    Forbidden,

    #[error("Payment setup failed: {0}")]
    PaymentSetup(String),

    #[error("Webhook Error: {0}")]
    Webhook(String),

    #[error("Storage error: {0}")]
    StorageError(String),
}

pub type Result<T> = std::result::Result<T, EcommerceError>;

impl From<PricingError> for EcommerceError {
    fn from(e: PricingError) -> Self {
        match e {
            PricingError::UnknownProduct(id) => Self::UnknownProduct(id),
            PricingError::InsufficientStock { product_id, title, available } => Self::InsufficientStock { product_id, title, available },
            PricingError::AmountExceedsLimit { amount_minor, limit } => Self::AmountExceedsLimit { amount_minor, limit },
        }
    }
}

impl From<OrderError> for EcommerceError {
    fn from(e: OrderError) -> Self {
        match e {
            OrderError::UnknownStatus(_) => Self::Validation(e.to_string()),
            OrderError::InvalidTransition { .. } | OrderError::UnpaidDelivery => Self::Conflict(e.to_string()),
        }
    }
}

impl From<ProductError> for EcommerceError {
    fn from(e: ProductError) -> Self { Self::Validation(e.to_string()) }
}

impl From<CartError> for EcommerceError {
    fn from(e: CartError) -> Self { Self::Validation(e.to_string()) }
}

impl From<validator::ValidationErrors> for EcommerceError {
    fn from(e: validator::ValidationErrors) -> Self { Self::Validation(e.to_string()) }
}

impl From<sqlx::Error> for EcommerceError {
    fn from(e: sqlx::Error) -> Self { Self::StorageError(e.to_string()) }
}
