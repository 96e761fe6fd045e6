use axum::{extract::State, Json};
use serde_json::{json, Value};

use crate::error::AppResult;
use crate::middleware::auth::AuthUser;
use crate::models::usage::UsageRecord;
use crate::services::quota;
use crate::AppState;

pub async fn usage_status(
    State(state): State<AppState>,
    user: axum::Extension<AuthUser>,
) -> AppResult<Json<Value>> {
    let snapshot = quota::fetch_usage(&state.db, &state.config.plans, user.id).await?;
    Ok(Json(json!({ "usage": snapshot })))
}

/// Per-month counters, most recent first. Months with no activity have
/// no row and simply don't appear.
pub async fn usage_history(
    State(state): State<AppState>,
    user: axum::Extension<AuthUser>,
) -> AppResult<Json<Value>> {
    let records: Vec<UsageRecord> = sqlx::query_as(
        "SELECT * FROM usage_records WHERE user_id = $1 ORDER BY month_year DESC LIMIT 12",
    )
    .bind(user.id)
    .fetch_all(&state.db)
    .await?;

    Ok(Json(json!({ "history": records })))
}
