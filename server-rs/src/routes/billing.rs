use axum::{extract::State, Json};
use serde_json::{json, Value};

use crate::error::AppResult;
use crate::middleware::auth::AuthUser;
use crate::models::subscription::{Plan, Subscription};
use crate::services::quota;
use crate::AppState;

/// The configured plan policy table, as shown on the pricing screen.
pub async fn plans(State(state): State<AppState>) -> Json<Value> {
    let policy = &state.config.plans;
    let plans: Vec<Value> = [Plan::Free, Plan::Start, Plan::Pro, Plan::Business]
        .iter()
        .map(|p| {
            json!({
                "plan": p,
                "monthlyGenerations": policy.limit_for(*p),
                "unlimited": policy.limit_for(*p) < 0,
            })
        })
        .collect();

    Json(json!({ "plans": plans }))
}

pub async fn subscription_status(
    State(state): State<AppState>,
    user: axum::Extension<AuthUser>,
) -> AppResult<Json<Value>> {
    let sub: Option<Subscription> = sqlx::query_as(
        r#"SELECT * FROM subscriptions
        WHERE user_id = $1 AND status = 'active'
          AND (expires_at IS NULL OR expires_at > NOW())
        ORDER BY updated_at DESC LIMIT 1"#,
    )
    .bind(user.id)
    .fetch_optional(&state.db)
    .await?;

    let effective_plan = quota::effective_plan(&state.db, user.id).await?;

    Ok(Json(json!({
        "subscription": sub,
        "effectivePlan": effective_plan,
    })))
}
