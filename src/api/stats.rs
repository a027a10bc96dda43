use axum::{extract::{Query, State}, Json};
use chrono::{NaiveDate, Utc};
use serde::Deserialize;

use super::AppState;
use crate::auth::AdminUser;
use crate::store::DashboardStats;
use crate::Result;

#[derive(Debug, Deserialize)]
pub struct StatsParams { pub day: Option<NaiveDate> }

/// Top sellers are reported for `day`, today (UTC) by default.
pub async fn dashboard(State(s): State<AppState>, _admin: AdminUser, Query(p): Query<StatsParams>) -> Result<Json<DashboardStats>> {
    let day = p.day.unwrap_or_else(|| Utc::now().date_naive());
    Ok(Json(s.store.dashboard_stats(day).await?))
}
