//! Aggregates module
pub mod product;
pub mod order;
pub mod cart;
pub mod payment;

pub use product::{Category, Product, ProductDraft, ProductError, ProductPatch, ProductStatus};
pub use order::{LineItem, Order, OrderError, OrderStatus, ShippingAddress};
pub use cart::{Cart, CartError, CartLine};
pub use payment::{Payment, PaymentFlow, PaymentMethod, PaymentStatus};
