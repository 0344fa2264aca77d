//! Token usage ledger endpoints.

use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::api::error::ApiError;
use crate::api::types::ApiContext;
use crate::db::repository::{get_usage, set_budget};
use crate::models::UsageStats;

#[derive(Debug, Serialize)]
pub struct UsageResponse {
    pub daily: i64,
    pub monthly: i64,
    pub yearly: i64,
    pub budget: i64,
    pub over_budget: bool,
}

impl From<UsageStats> for UsageResponse {
    fn from(stats: UsageStats) -> Self {
        Self {
            daily: stats.daily,
            monthly: stats.monthly,
            yearly: stats.yearly,
            budget: stats.budget,
            over_budget: stats.is_over_budget(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct BudgetRequest {
    pub budget: i64,
}

/// `GET /api/usage` — current counters plus the derived gate flag.
pub async fn current(State(ctx): State<ApiContext>) -> Result<Json<UsageResponse>, ApiError> {
    let conn = ctx.core.open_db()?;
    Ok(Json(get_usage(&conn)?.into()))
}

/// `PUT /api/usage/budget` — set the monthly ceiling. Takes effect on
/// the next send; an in-flight turn is never interrupted.
pub async fn update_budget(
    State(ctx): State<ApiContext>,
    Json(payload): Json<BudgetRequest>,
) -> Result<Json<UsageResponse>, ApiError> {
    if payload.budget < 0 {
        return Err(ApiError::BadRequest("Budget must be non-negative".into()));
    }
    let conn = ctx.core.open_db()?;
    let stats = set_budget(&conn, payload.budget)?;
    tracing::info!(budget = payload.budget, "Monthly budget updated");
    Ok(Json(stats.into()))
}
