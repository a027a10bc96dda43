use axum::{extract::{Path, Query, State}, http::StatusCode, Json};
use rust_decimal::Decimal;
use serde::Deserialize;
use uuid::Uuid;

use super::{ApiJson, AppState};
use crate::auth::AdminUser;
use crate::domain::aggregates::{Category, Product, ProductDraft, ProductPatch};
use crate::store::{Page, ProductFilter};
use crate::Result;

#[derive(Debug, Deserialize)]
pub struct ListParams { pub page: Option<u32>, pub per_page: Option<u32>, pub category: Option<Category>, pub search: Option<String> }

#[derive(Debug, Deserialize)]
pub struct CreateProductRequest {
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub price: Decimal,
    #[serde(default)]
    pub discount: Decimal,
    pub category: Category,
    #[serde(default)]
    pub stock: u32,
    #[serde(default)]
    pub images: Vec<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdateProductRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    pub price: Option<Decimal>,
    pub discount: Option<Decimal>,
    pub category: Option<Category>,
    pub stock: Option<u32>,
    pub images: Option<Vec<String>>,
}

pub async fn list_products(State(s): State<AppState>, Query(p): Query<ListParams>) -> Result<Json<Page<Product>>> {
    let filter = ProductFilter { category: p.category, search: p.search.filter(|q| !q.trim().is_empty()), include_archived: false, page: p.page.unwrap_or(1), per_page: p.per_page.unwrap_or(20) };
    Ok(Json(s.catalog.list(&filter).await?))
}

pub async fn get_product(State(s): State<AppState>, Path(id): Path<Uuid>) -> Result<Json<Product>> {
    Ok(Json(s.catalog.get(id).await?))
}

pub async fn create_product(State(s): State<AppState>, _admin: AdminUser, ApiJson(r): ApiJson<CreateProductRequest>) -> Result<(StatusCode, Json<Product>)> {
    let draft = ProductDraft { title: r.title, description: r.description, price: r.price, discount: r.discount, category: r.category, stock: r.stock, images: r.images };
    Ok((StatusCode::CREATED, Json(s.catalog.create(draft).await?)))
}

pub async fn update_product(State(s): State<AppState>, _admin: AdminUser, Path(id): Path<Uuid>, ApiJson(r): ApiJson<UpdateProductRequest>) -> Result<Json<Product>> {
    let patch = ProductPatch { title: r.title, description: r.description, price: r.price, discount: r.discount, category: r.category, stock: r.stock, images: r.images };
    Ok(Json(s.catalog.update(id, patch).await?))
}

pub async fn delete_product(State(s): State<AppState>, _admin: AdminUser, Path(id): Path<Uuid>) -> Result<StatusCode> {
    s.catalog.archive(id).await?;
    Ok(StatusCode::NO_CONTENT)
}
