//! In-memory store. One mutex guards all state, so each call is atomic.

use async_trait::async_trait;
use chrono::NaiveDate;
use std::collections::{HashMap, HashSet};
use tokio::sync::Mutex;
use uuid::Uuid;

use super::{stats, DashboardStats, Page, ProductFilter, SettleOutcome, Settlement, Store};
use crate::domain::aggregates::{Order, OrderStatus, Product, ProductError};
use crate::domain::value_objects::Quantity;
use crate::{EcommerceError, Result};

#[derive(Default)]
struct State {
    products: HashMap<Uuid, Product>,
    orders: HashMap<Uuid, Order>,
    webhook_events: HashSet<String>,
}

#[derive(Default)]
pub struct MemoryStore { state: Mutex<State> }

impl MemoryStore {
    pub fn new() -> Self { Self::default() }
}

fn snapshot(product: &Product) -> Product {
    let mut p = product.clone();
    p.events.clear();
    p
}

fn snapshot_order(order: &Order) -> Order {
    let mut o = order.clone();
    o.events.clear();
    o
}

#[async_trait]
impl Store for MemoryStore {
    async fn insert_product(&self, product: &Product) -> Result<()> {
        self.state.lock().await.products.insert(product.id(), snapshot(product));
        Ok(())
    }

    async fn update_product(&self, product: &Product, stock: Option<u32>) -> Result<Product> {
        let mut state = self.state.lock().await;
        let stored = state.products.get_mut(&product.id()).ok_or(EcommerceError::ProductNotFound)?;
        let current = stored.stock;
        *stored = snapshot(product);
        stored.stock = stock.map(Quantity::new).unwrap_or(current);
        Ok(stored.clone())
    }

    async fn find_product(&self, id: Uuid) -> Result<Option<Product>> {
        Ok(self.state.lock().await.products.get(&id).cloned())
    }

    async fn find_products(&self, ids: &[Uuid]) -> Result<Vec<Product>> {
        let state = self.state.lock().await;
        Ok(ids.iter().filter_map(|id| state.products.get(id).cloned()).collect())
    }

    async fn list_products(&self, filter: &ProductFilter) -> Result<Page<Product>> {
        let state = self.state.lock().await;
        let search = filter.search.as_ref().map(|s| s.to_lowercase());
        let mut matching: Vec<&Product> = state.products.values()
            .filter(|p| filter.include_archived || p.is_orderable())
            .filter(|p| filter.category.map_or(true, |c| p.category() == c))
            .filter(|p| search.as_ref().map_or(true, |s| p.title().to_lowercase().contains(s)))
            .collect();
        matching.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| b.id().cmp(&a.id())));
        let total = matching.len() as i64;
        let data = matching.into_iter().skip(usize::try_from(filter.offset()).unwrap_or(usize::MAX)).take(filter.per_page() as usize).cloned().collect();
        Ok(Page { data, total, page: filter.page() })
    }

    async fn place_order(&self, order: &Order) -> Result<()> {
        let mut state = self.state.lock().await;
        // Check every line before touching any stock.
        for item in order.items() {
            let product = state.products.get(&item.product_id).filter(|p| p.is_orderable()).ok_or(EcommerceError::UnknownProduct(item.product_id))?;
            if product.stock() < item.quantity {
                return Err(EcommerceError::InsufficientStock { product_id: product.id(), title: product.title().to_string(), available: product.stock() });
            }
        }
        for item in order.items() {
            if let Some(product) = state.products.get_mut(&item.product_id) {
                product.reserve(item.quantity).map_err(|e: ProductError| EcommerceError::StorageError(e.to_string()))?;
            }
        }
        state.orders.insert(order.id(), snapshot_order(order));
        Ok(())
    }

    async fn attach_payment_reference(&self, order_id: Uuid, reference: &str) -> Result<()> {
        let mut state = self.state.lock().await;
        let order = state.orders.get_mut(&order_id).ok_or(EcommerceError::OrderNotFound)?;
        order.attach_payment_reference(reference);
        Ok(())
    }

    async fn find_order(&self, id: Uuid) -> Result<Option<Order>> {
        Ok(self.state.lock().await.orders.get(&id).cloned())
    }

    async fn list_orders(&self, buyer_id: Option<Uuid>) -> Result<Vec<Order>> {
        let state = self.state.lock().await;
        let mut orders: Vec<Order> = state.orders.values().filter(|o| buyer_id.map_or(true, |b| o.buyer_id() == b)).cloned().collect();
        orders.sort_by(|a, b| b.created_at().cmp(&a.created_at()).then_with(|| b.id().cmp(&a.id())));
        Ok(orders)
    }

    async fn save_status(&self, order: &Order, previous: OrderStatus) -> Result<()> {
        let mut state = self.state.lock().await;
        let stored = state.orders.get(&order.id()).ok_or(EcommerceError::OrderNotFound)?;
        if stored.status() != previous {
            return Err(EcommerceError::Conflict(format!("Order status changed concurrently to {}", stored.status())));
        }
        // Payment fields stay as stored unless this change is the one that settles the order.
        let mut next = snapshot_order(order);
        if stored.is_paid() || !next.is_paid() {
            next.is_paid = stored.is_paid();
            next.paid_at = stored.paid_at;
            next.payment = stored.payment.clone();
        }
        if order.status() == OrderStatus::Cancelled {
            for item in order.items() {
                if let Some(product) = state.products.get_mut(&item.product_id) { product.release(item.quantity); }
            }
        }
        state.orders.insert(order.id(), next);
        Ok(())
    }

    async fn settle_payment(&self, settlement: &Settlement) -> Result<SettleOutcome> {
        let mut state = self.state.lock().await;
        if state.webhook_events.contains(&settlement.event_id) { return Ok(SettleOutcome::DuplicateEvent); }
        let order = state.orders.get_mut(&settlement.order_id).ok_or(EcommerceError::OrderNotFound)?;
        let changed = order.mark_paid(Some(&settlement.reference), settlement.paid_at);
        let outcome = if changed { SettleOutcome::Settled(order.clone()) } else { SettleOutcome::AlreadyPaid };
        order.events.clear();
        state.webhook_events.insert(settlement.event_id.clone());
        Ok(outcome)
    }

    async fn dashboard_stats(&self, day: NaiveDate) -> Result<DashboardStats> {
        let state = self.state.lock().await;
        let orders: Vec<Order> = state.orders.values().cloned().collect();
        let products: Vec<Product> = state.products.values().cloned().collect();
        Ok(stats::compute(&orders, &products, day))
    }
}
