//! Admin dashboard read model.

use chrono::{Datelike, NaiveDate};
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap, HashSet};
use uuid::Uuid;

use crate::domain::aggregates::{Order, OrderStatus, Product};

/// Active products with fewer units than this are reported as low stock.
pub const LOW_STOCK_THRESHOLD: u32 = 5;
pub const TOP_SELLERS: usize = 5;

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardStats {
    pub total_revenue: Decimal,
    pub total_orders: i64,
    pub total_buyers: i64,
    pub total_products: i64,
    pub orders_by_status: Vec<StatusCount>,
    pub monthly: Vec<MonthlyPoint>,
    pub low_stock: Vec<LowStockProduct>,
    pub top_selling: Vec<TopSeller>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct StatusCount { pub status: OrderStatus, pub count: i64 }

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MonthlyPoint { pub month: String, pub revenue: Decimal, pub orders: i64 }

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LowStockProduct { pub product_id: Uuid, pub title: String, pub stock: u32 }

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TopSeller { pub product_id: Uuid, pub title: String, pub quantity: i64 }

/// Zero-fills statuses missing from `counts`, in lifecycle order.
pub fn status_counts(counts: &HashMap<OrderStatus, i64>) -> Vec<StatusCount> {
    OrderStatus::ALL.into_iter().map(|status| StatusCount { status, count: counts.get(&status).copied().unwrap_or(0) }).collect()
}

/// Computes the dashboard from full snapshots of orders and products.
pub fn compute(orders: &[Order], products: &[Product], day: NaiveDate) -> DashboardStats {
    let mut by_status = HashMap::new();
    let mut monthly: BTreeMap<String, (Decimal, i64)> = BTreeMap::new();
    let mut sold: HashMap<Uuid, (String, i64)> = HashMap::new();
    let mut buyers = HashSet::new();
    let mut revenue = Decimal::ZERO;

    for order in orders {
        *by_status.entry(order.status()).or_insert(0) += 1;
        buyers.insert(order.buyer_id());
        let created = order.created_at();
        let point = monthly.entry(format!("{:04}-{:02}", created.year(), created.month())).or_default();
        point.1 += 1;
        if order.is_paid() {
            revenue += order.total();
            point.0 += order.total();
        }
        if created.date_naive() == day && order.status() != OrderStatus::Cancelled {
            for item in order.items() {
                sold.entry(item.product_id).or_insert_with(|| (item.title.clone(), 0)).1 += i64::from(item.quantity);
            }
        }
    }

    let mut low_stock: Vec<_> = products.iter()
        .filter(|p| p.is_orderable() && p.stock() < LOW_STOCK_THRESHOLD)
        .map(|p| LowStockProduct { product_id: p.id(), title: p.title().to_string(), stock: p.stock() })
        .collect();
    low_stock.sort_by(|a, b| a.stock.cmp(&b.stock).then_with(|| a.title.cmp(&b.title)));

    let mut top_selling: Vec<_> = sold.into_iter().map(|(product_id, (title, quantity))| TopSeller { product_id, title, quantity }).collect();
    top_selling.sort_by(|a, b| b.quantity.cmp(&a.quantity).then_with(|| a.title.cmp(&b.title)));
    top_selling.truncate(TOP_SELLERS);

    DashboardStats {
        total_revenue: revenue,
        total_orders: orders.len() as i64,
        total_buyers: buyers.len() as i64,
        total_products: products.iter().filter(|p| p.is_orderable()).count() as i64,
        orders_by_status: status_counts(&by_status),
        monthly: monthly.into_iter().map(|(month, (revenue, orders))| MonthlyPoint { month, revenue, orders }).collect(),
        low_stock,
        top_selling,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::aggregates::{PaymentFlow, PaymentMethod, ShippingAddress};
    use crate::domain::pricing::{Quote, QuotedLine};
    use chrono::Utc;

    fn order(product_id: Uuid, quantity: u32, total: i64) -> Order {
        let line = QuotedLine { product_id, title: "Mug".into(), image: None, unit_price: Decimal::ONE, quantity, line_total: Decimal::from(quantity) };
        let quote = Quote { lines: vec![line], subtotal: Decimal::from(total), tax: Decimal::ZERO, shipping: Decimal::ZERO, total: Decimal::from(total), amount_minor: total * 100, currency: "usd".into() };
        Order::place(Uuid::now_v7(), quote, ShippingAddress::default(), PaymentMethod::Card, PaymentFlow::Intent)
    }

    #[test]
    fn test_revenue_counts_only_paid_orders() {
        let product = Uuid::now_v7();
        let mut paid = order(product, 2, 40);
        paid.mark_paid(Some("pi_1"), Utc::now());
        let unpaid = order(product, 3, 60);
        let stats = compute(&[paid, unpaid], &[], Utc::now().date_naive());
        assert_eq!(stats.total_revenue, Decimal::from(40));
        assert_eq!(stats.total_orders, 2);
        assert_eq!(stats.orders_by_status[0], StatusCount { status: OrderStatus::Processing, count: 2 });
        assert_eq!(stats.orders_by_status.len(), 4);
        assert_eq!(stats.monthly.len(), 1);
        assert_eq!(stats.monthly[0].orders, 2);
        assert_eq!(stats.top_selling[0].quantity, 5);
    }

    #[test]
    fn test_top_sellers_skip_other_days() {
        let stats = compute(&[order(Uuid::now_v7(), 1, 10)], &[], NaiveDate::from_ymd_opt(2001, 1, 1).unwrap());
        assert!(stats.top_selling.is_empty());
    }
}
