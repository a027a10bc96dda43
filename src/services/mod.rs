//! Application services: the operations the HTTP layer exposes.
pub mod catalog;
pub mod orders;

pub use catalog::CatalogService;
pub use orders::{OrderService, PlaceOrder, PlacedOrder, WebhookOutcome};
