//! Persistence for the catalog, orders, payment records and the webhook ledger.
//!
//! Two backends share one contract: PostgreSQL for deployments and an in-memory
//! store for local runs and tests. Every multi-row write is atomic.

pub mod memory;
pub mod postgres;
pub mod stats;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::domain::aggregates::{Category, Order, OrderStatus, Product};
use crate::Result;

pub use memory::MemoryStore;
pub use postgres::PgStore;
pub use stats::DashboardStats;

#[derive(Clone, Debug, Default)]
pub struct ProductFilter {
    pub category: Option<Category>,
    pub search: Option<String>,
    pub include_archived: bool,
    pub page: u32,
    pub per_page: u32,
}

impl ProductFilter {
    pub fn page(&self) -> u32 { self.page.max(1) }
    pub fn per_page(&self) -> u32 { if self.per_page == 0 { 20 } else { self.per_page.min(100) } }
    pub fn offset(&self) -> i64 { i64::from(self.page() - 1) * i64::from(self.per_page()) }
}

#[derive(Debug, Serialize)]
pub struct Page<T> { pub data: Vec<T>, pub total: i64, pub page: u32 }

/// A verified processor notification that an order was paid.
#[derive(Clone, Debug)]
pub struct Settlement {
    pub event_id: String,
    pub order_id: Uuid,
    pub reference: String,
    pub paid_at: DateTime<Utc>,
}

#[derive(Debug)]
pub enum SettleOutcome {
    Settled(Order),
    AlreadyPaid,
    DuplicateEvent,
}

#[async_trait]
pub trait Store: Send + Sync {
    async fn insert_product(&self, product: &Product) -> Result<()>;
    /// Writes every product field except stock, which is only replaced when `stock`
    /// is given; reservations made since `product` was read are kept. Returns the stored row.
    async fn update_product(&self, product: &Product, stock: Option<u32>) -> Result<Product>;
    async fn find_product(&self, id: Uuid) -> Result<Option<Product>>;
    async fn find_products(&self, ids: &[Uuid]) -> Result<Vec<Product>>;
    async fn list_products(&self, filter: &ProductFilter) -> Result<Page<Product>>;

    /// Reserves stock for every line and persists the order with its payment record,
    /// all or nothing. A line whose stock no longer covers it fails with
    /// `InsufficientStock` carrying the current availability.
    async fn place_order(&self, order: &Order) -> Result<()>;
    async fn attach_payment_reference(&self, order_id: Uuid, reference: &str) -> Result<()>;
    async fn find_order(&self, id: Uuid) -> Result<Option<Order>>;
    /// Newest first; all orders when `buyer_id` is `None`.
    async fn list_orders(&self, buyer_id: Option<Uuid>) -> Result<Vec<Order>>;
    /// Persists a status change only if the stored status is still `previous`.
    /// Cancellation returns the reserved stock to the catalog.
    async fn save_status(&self, order: &Order, previous: OrderStatus) -> Result<()>;

    /// Marks the order paid unless the event id was already processed.
    async fn settle_payment(&self, settlement: &Settlement) -> Result<SettleOutcome>;

    async fn dashboard_stats(&self, day: NaiveDate) -> Result<DashboardStats>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filter_paging_bounds() {
        let filter = ProductFilter::default();
        assert_eq!((filter.page(), filter.per_page(), filter.offset()), (1, 20, 0));
        let filter = ProductFilter { page: 3, per_page: 500, ..Default::default() };
        assert_eq!((filter.per_page(), filter.offset()), (100, 200));
        let filter = ProductFilter { page: u32::MAX, per_page: 20, ..Default::default() };
        assert_eq!(filter.offset(), i64::from(u32::MAX - 1) * 20);
    }
}
