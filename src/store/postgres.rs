//! PostgreSQL store.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use sqlx::{postgres::PgConnection, types::Json, PgPool};
use std::collections::HashMap;
use uuid::Uuid;

use super::stats::{self, LowStockProduct, MonthlyPoint, TopSeller, LOW_STOCK_THRESHOLD, TOP_SELLERS};
use super::{DashboardStats, Page, ProductFilter, SettleOutcome, Settlement, Store};
use crate::domain::aggregates::{LineItem, Order, OrderStatus, Payment, Product, ShippingAddress};
use crate::domain::value_objects::{Discount, Quantity};
use crate::{EcommerceError, Result};

#[derive(Clone)]
pub struct PgStore { pool: PgPool }

impl PgStore {
    pub fn new(pool: PgPool) -> Self { Self { pool } }
}

#[derive(Debug, sqlx::FromRow)]
struct ProductRow {
    id: Uuid, title: String, description: String, price: Decimal, discount: Decimal, total_price: Decimal,
    category: String, stock: i32, images: Vec<String>, status: String,
    created_at: DateTime<Utc>, updated_at: DateTime<Utc>,
}

impl TryFrom<ProductRow> for Product {
    type Error = EcommerceError;
    fn try_from(r: ProductRow) -> Result<Self> {
        Ok(Product {
            id: r.id, title: r.title, description: r.description, price: r.price,
            discount: Discount::new(r.discount).map_err(corrupt)?, total_price: r.total_price,
            category: r.category.parse().map_err(corrupt)?, stock: Quantity::new(u32::try_from(r.stock).map_err(corrupt)?),
            images: r.images, status: r.status.parse().map_err(corrupt)?,
            created_at: r.created_at, updated_at: r.updated_at, events: vec![],
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct OrderRow {
    id: Uuid, buyer_id: Uuid, subtotal: Decimal, tax: Decimal, shipping: Decimal, total: Decimal, currency: String,
    status: String, is_paid: bool, paid_at: Option<DateTime<Utc>>, delivered_at: Option<DateTime<Utc>>,
    shipping_address: Json<ShippingAddress>, created_at: DateTime<Utc>, updated_at: DateTime<Utc>,
    method: String, flow: String, payment_status: String, reference: Option<String>, payment_updated_at: DateTime<Utc>,
}

#[derive(Debug, sqlx::FromRow)]
struct OrderItemRow { order_id: Uuid, product_id: Uuid, title: String, image: Option<String>, unit_price: Decimal, quantity: i32, line_total: Decimal }

impl OrderRow {
    fn into_order(self, items: Vec<LineItem>) -> Result<Order> {
        let payment = Payment {
            method: self.method.parse().map_err(corrupt)?, flow: self.flow.parse().map_err(corrupt)?,
            status: self.payment_status.parse().map_err(corrupt)?, reference: self.reference, updated_at: self.payment_updated_at,
        };
        Ok(Order {
            id: self.id, buyer_id: self.buyer_id, items, subtotal: self.subtotal, tax: self.tax, shipping: self.shipping,
            total: self.total, currency: self.currency, status: self.status.parse().map_err(corrupt)?, is_paid: self.is_paid,
            paid_at: self.paid_at, delivered_at: self.delivered_at, shipping_address: self.shipping_address.0,
            payment, created_at: self.created_at, updated_at: self.updated_at, events: vec![],
        })
    }
}

impl From<OrderItemRow> for LineItem {
    fn from(r: OrderItemRow) -> Self {
        LineItem { product_id: r.product_id, title: r.title, image: r.image, unit_price: r.unit_price, quantity: r.quantity.max(0) as u32, line_total: r.line_total }
    }
}

fn corrupt(e: impl std::fmt::Display) -> EcommerceError { EcommerceError::StorageError(format!("corrupt row: {}", e)) }

fn to_i32(qty: u32) -> Result<i32> {
    i32::try_from(qty).map_err(|_| EcommerceError::Validation(format!("Quantity {} is too large", qty)))
}

const ORDER_SELECT: &str = "SELECT o.id, o.buyer_id, o.subtotal, o.tax, o.shipping, o.total, o.currency, o.status, o.is_paid, o.paid_at, o.delivered_at, o.shipping_address, o.created_at, o.updated_at, p.method, p.flow, p.status AS payment_status, p.reference, p.updated_at AS payment_updated_at FROM orders o JOIN payments p ON p.order_id = o.id";

async fn load_orders(conn: &mut PgConnection, rows: Vec<OrderRow>) -> Result<Vec<Order>> {
    let ids: Vec<Uuid> = rows.iter().map(|r| r.id).collect();
    let item_rows = sqlx::query_as::<_, OrderItemRow>("SELECT order_id, product_id, title, image, unit_price, quantity, line_total FROM order_items WHERE order_id = ANY($1) ORDER BY order_id, position")
        .bind(&ids).fetch_all(&mut *conn).await?;
    let mut items: HashMap<Uuid, Vec<LineItem>> = HashMap::new();
    for row in item_rows { items.entry(row.order_id).or_default().push(row.into()); }
    rows.into_iter().map(|r| { let lines = items.remove(&r.id).unwrap_or_default(); r.into_order(lines) }).collect()
}

async fn fetch_order(conn: &mut PgConnection, id: Uuid, for_update: bool) -> Result<Option<Order>> {
    let sql = format!("{} WHERE o.id = $1{}", ORDER_SELECT, if for_update { " FOR UPDATE OF o" } else { "" });
    let row = sqlx::query_as::<_, OrderRow>(&sql).bind(id).fetch_optional(&mut *conn).await?;
    match row {
        Some(row) => Ok(load_orders(conn, vec![row]).await?.pop()),
        None => Ok(None),
    }
}

#[async_trait]
impl Store for PgStore {
    async fn insert_product(&self, p: &Product) -> Result<()> {
        sqlx::query("INSERT INTO products (id, title, description, price, discount, total_price, category, stock, images, status, created_at, updated_at) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)")
            .bind(p.id).bind(&p.title).bind(&p.description).bind(p.price).bind(p.discount.percent()).bind(p.total_price)
            .bind(p.category.as_str()).bind(to_i32(p.stock())?).bind(&p.images).bind(p.status.as_str()).bind(p.created_at).bind(p.updated_at)
            .execute(&self.pool).await?;
        Ok(())
    }

    async fn update_product(&self, p: &Product, stock: Option<u32>) -> Result<Product> {
        let stock = stock.map(to_i32).transpose()?;
        let row = sqlx::query_as::<_, ProductRow>("UPDATE products SET title = $2, description = $3, price = $4, discount = $5, total_price = $6, category = $7, stock = COALESCE($8, stock), images = $9, status = $10, updated_at = $11 WHERE id = $1 RETURNING *")
            .bind(p.id).bind(&p.title).bind(&p.description).bind(p.price).bind(p.discount.percent()).bind(p.total_price)
            .bind(p.category.as_str()).bind(stock).bind(&p.images).bind(p.status.as_str()).bind(p.updated_at)
            .fetch_optional(&self.pool).await?;
        row.map(Product::try_from).transpose()?.ok_or(EcommerceError::ProductNotFound)
    }

    async fn find_product(&self, id: Uuid) -> Result<Option<Product>> {
        sqlx::query_as::<_, ProductRow>("SELECT * FROM products WHERE id = $1").bind(id).fetch_optional(&self.pool).await?
            .map(Product::try_from).transpose()
    }

    async fn find_products(&self, ids: &[Uuid]) -> Result<Vec<Product>> {
        sqlx::query_as::<_, ProductRow>("SELECT * FROM products WHERE id = ANY($1)").bind(ids).fetch_all(&self.pool).await?
            .into_iter().map(Product::try_from).collect()
    }

    async fn list_products(&self, f: &ProductFilter) -> Result<Page<Product>> {
        const FILTER: &str = "($1::text IS NULL OR category = $1) AND ($2::text IS NULL OR title ILIKE '%' || $2 || '%') AND ($3 OR status = 'Active')";
        let category = f.category.map(|c| c.as_str());
        let rows = sqlx::query_as::<_, ProductRow>(&format!("SELECT * FROM products WHERE {} ORDER BY created_at DESC, id DESC LIMIT $4 OFFSET $5", FILTER))
            .bind(category).bind(&f.search).bind(f.include_archived).bind(i64::from(f.per_page())).bind(f.offset())
            .fetch_all(&self.pool).await?;
        let total: (i64,) = sqlx::query_as(&format!("SELECT COUNT(*) FROM products WHERE {}", FILTER))
            .bind(category).bind(&f.search).bind(f.include_archived)
            .fetch_one(&self.pool).await?;
        let data = rows.into_iter().map(Product::try_from).collect::<Result<Vec<_>>>()?;
        Ok(Page { data, total: total.0, page: f.page() })
    }

    async fn place_order(&self, order: &Order) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        // Lock rows in a fixed order so concurrent checkouts cannot deadlock.
        let mut lines: Vec<&LineItem> = order.items().iter().collect();
        lines.sort_by_key(|l| l.product_id);
        for line in lines {
            let reserved = sqlx::query("UPDATE products SET stock = stock - $2, updated_at = NOW() WHERE id = $1 AND status = 'Active' AND stock >= $2")
                .bind(line.product_id).bind(to_i32(line.quantity)?).execute(&mut *tx).await?;
            if reserved.rows_affected() == 0 {
                let current: Option<(String, i32, String)> = sqlx::query_as("SELECT title, stock, status FROM products WHERE id = $1")
                    .bind(line.product_id).fetch_optional(&mut *tx).await?;
                return Err(match current {
                    Some((title, stock, status)) if status == "Active" => EcommerceError::InsufficientStock { product_id: line.product_id, title, available: stock.max(0) as u32 },
                    _ => EcommerceError::UnknownProduct(line.product_id),
                });
            }
        }

        sqlx::query("INSERT INTO orders (id, buyer_id, subtotal, tax, shipping, total, currency, status, is_paid, paid_at, delivered_at, shipping_address, created_at, updated_at) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)")
            .bind(order.id).bind(order.buyer_id).bind(order.subtotal).bind(order.tax).bind(order.shipping).bind(order.total)
            .bind(&order.currency).bind(order.status.as_str()).bind(order.is_paid).bind(order.paid_at).bind(order.delivered_at)
            .bind(Json(&order.shipping_address)).bind(order.created_at).bind(order.updated_at)
            .execute(&mut *tx).await?;
        for (position, item) in order.items().iter().enumerate() {
            sqlx::query("INSERT INTO order_items (order_id, position, product_id, title, image, unit_price, quantity, line_total) VALUES ($1, $2, $3, $4, $5, $6, $7, $8)")
                .bind(order.id).bind(position as i32).bind(item.product_id).bind(&item.title).bind(&item.image)
                .bind(item.unit_price).bind(to_i32(item.quantity)?).bind(item.line_total)
                .execute(&mut *tx).await?;
        }
        let payment = order.payment();
        sqlx::query("INSERT INTO payments (order_id, method, flow, status, reference, updated_at) VALUES ($1, $2, $3, $4, $5, $6)")
            .bind(order.id).bind(payment.method().as_str()).bind(payment.flow().as_str()).bind(payment.status().as_str())
            .bind(payment.reference()).bind(payment.updated_at)
            .execute(&mut *tx).await?;
        tx.commit().await?;
        Ok(())
    }

    async fn attach_payment_reference(&self, order_id: Uuid, reference: &str) -> Result<()> {
        let updated = sqlx::query("UPDATE payments SET reference = $2, updated_at = NOW() WHERE order_id = $1")
            .bind(order_id).bind(reference).execute(&self.pool).await?;
        if updated.rows_affected() == 0 { return Err(EcommerceError::OrderNotFound); }
        Ok(())
    }

    async fn find_order(&self, id: Uuid) -> Result<Option<Order>> {
        let mut conn = self.pool.acquire().await?;
        fetch_order(&mut *conn, id, false).await
    }

    async fn list_orders(&self, buyer_id: Option<Uuid>) -> Result<Vec<Order>> {
        let mut conn = self.pool.acquire().await?;
        let rows = sqlx::query_as::<_, OrderRow>(&format!("{} WHERE ($1::uuid IS NULL OR o.buyer_id = $1) ORDER BY o.created_at DESC, o.id DESC", ORDER_SELECT))
            .bind(buyer_id).fetch_all(&mut *conn).await?;
        load_orders(&mut *conn, rows).await
    }

    async fn save_status(&self, order: &Order, previous: OrderStatus) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        let updated = sqlx::query("UPDATE orders SET status = $2, is_paid = is_paid OR $3, paid_at = COALESCE(paid_at, $4), delivered_at = $5, updated_at = $6 WHERE id = $1 AND status = $7")
            .bind(order.id).bind(order.status.as_str()).bind(order.is_paid).bind(order.paid_at).bind(order.delivered_at)
            .bind(order.updated_at).bind(previous.as_str())
            .execute(&mut *tx).await?;
        if updated.rows_affected() == 0 {
            let exists: Option<(String,)> = sqlx::query_as("SELECT status FROM orders WHERE id = $1").bind(order.id).fetch_optional(&mut *tx).await?;
            return Err(match exists {
                Some((status,)) => EcommerceError::Conflict(format!("Order status changed concurrently to {}", status)),
                None => EcommerceError::OrderNotFound,
            });
        }
        if order.is_paid {
            sqlx::query("UPDATE payments SET status = 'Paid', updated_at = $2 WHERE order_id = $1 AND status <> 'Paid'")
                .bind(order.id).bind(order.updated_at).execute(&mut *tx).await?;
        }
        if order.status == OrderStatus::Cancelled {
            for item in order.items() {
                sqlx::query("UPDATE products SET stock = stock + $2, updated_at = NOW() WHERE id = $1")
                    .bind(item.product_id).bind(to_i32(item.quantity)?).execute(&mut *tx).await?;
            }
        }
        tx.commit().await?;
        Ok(())
    }

    async fn settle_payment(&self, s: &Settlement) -> Result<SettleOutcome> {
        let mut tx = self.pool.begin().await?;
        let recorded = sqlx::query("INSERT INTO webhook_events (event_id, order_id, received_at) VALUES ($1, $2, NOW()) ON CONFLICT (event_id) DO NOTHING")
            .bind(&s.event_id).bind(s.order_id).execute(&mut *tx).await?;
        if recorded.rows_affected() == 0 { return Ok(SettleOutcome::DuplicateEvent); }

        let mut order = fetch_order(&mut *tx, s.order_id, true).await?.ok_or(EcommerceError::OrderNotFound)?;
        if !order.mark_paid(Some(&s.reference), s.paid_at) {
            tx.commit().await?;
            return Ok(SettleOutcome::AlreadyPaid);
        }
        sqlx::query("UPDATE orders SET is_paid = TRUE, paid_at = $2, updated_at = $3 WHERE id = $1")
            .bind(order.id).bind(order.paid_at).bind(order.updated_at).execute(&mut *tx).await?;
        sqlx::query("UPDATE payments SET status = 'Paid', reference = COALESCE(reference, $2), updated_at = $3 WHERE order_id = $1")
            .bind(order.id).bind(&s.reference).bind(s.paid_at).execute(&mut *tx).await?;
        tx.commit().await?;
        order.events.clear();
        Ok(SettleOutcome::Settled(order))
    }

    async fn dashboard_stats(&self, day: NaiveDate) -> Result<DashboardStats> {
        let (total_revenue, total_orders, total_buyers): (Decimal, i64, i64) = sqlx::query_as(
            "SELECT COALESCE(SUM(total) FILTER (WHERE is_paid), 0), COUNT(*), COUNT(DISTINCT buyer_id) FROM orders")
            .fetch_one(&self.pool).await?;
        let (total_products,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM products WHERE status = 'Active'").fetch_one(&self.pool).await?;

        let by_status: Vec<(String, i64)> = sqlx::query_as("SELECT status, COUNT(*) FROM orders GROUP BY status").fetch_all(&self.pool).await?;
        let by_status = by_status.into_iter()
            .map(|(status, count)| Ok((status.parse::<OrderStatus>()?, count)))
            .collect::<Result<HashMap<_, _>>>()?;

        let monthly: Vec<(String, Decimal, i64)> = sqlx::query_as(
            "SELECT to_char(date_trunc('month', created_at AT TIME ZONE 'UTC'), 'YYYY-MM'), COALESCE(SUM(total) FILTER (WHERE is_paid), 0), COUNT(*) FROM orders GROUP BY 1 ORDER BY 1")
            .fetch_all(&self.pool).await?;

        let low_stock: Vec<(Uuid, String, i32)> = sqlx::query_as("SELECT id, title, stock FROM products WHERE status = 'Active' AND stock < $1 ORDER BY stock, title")
            .bind(LOW_STOCK_THRESHOLD as i32).fetch_all(&self.pool).await?;

        let top: Vec<(Uuid, String, i64)> = sqlx::query_as(
            "SELECT oi.product_id, MIN(oi.title), SUM(oi.quantity)::BIGINT AS sold FROM order_items oi JOIN orders o ON o.id = oi.order_id \
             WHERE (o.created_at AT TIME ZONE 'UTC')::date = $1 AND o.status <> 'Cancelled' GROUP BY oi.product_id ORDER BY sold DESC, 2 LIMIT $2")
            .bind(day).bind(TOP_SELLERS as i64).fetch_all(&self.pool).await?;

        Ok(DashboardStats {
            total_revenue, total_orders, total_buyers, total_products,
            orders_by_status: stats::status_counts(&by_status),
            monthly: monthly.into_iter().map(|(month, revenue, orders)| MonthlyPoint { month, revenue, orders }).collect(),
            low_stock: low_stock.into_iter().map(|(product_id, title, stock)| LowStockProduct { product_id, title, stock: stock.max(0) as u32 }).collect(),
            top_selling: top.into_iter().map(|(product_id, title, quantity)| TopSeller { product_id, title, quantity }).collect(),
        })
    }
}
