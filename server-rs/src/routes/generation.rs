use axum::{extract::State, Json};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::error::{AppError, AppResult};
use crate::middleware::auth::AuthUser;
use crate::services::quota;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct GenerateRequest {
    #[serde(rename = "productTitle")]
    pub product_title: String,
    #[serde(rename = "productDescription")]
    pub product_description: Option<String>,
    pub tone: Option<String>,
}

/// The generation critical path: allowance check, AI call, then the
/// atomic usage increment.
pub async fn generate(
    State(state): State<AppState>,
    user: axum::Extension<AuthUser>,
    Json(body): Json<GenerateRequest>,
) -> AppResult<Json<Value>> {
    if body.product_title.trim().is_empty() {
        return Err(AppError::BadRequest("productTitle required".into()));
    }

    let usage = quota::fetch_usage(&state.db, &state.config.plans, user.id).await?;
    if !usage.can_generate {
        return Err(AppError::Forbidden("quota_exceeded".into()));
    }

    let openai = state
        .openai
        .as_ref()
        .ok_or_else(|| AppError::Internal("OpenAI not configured".into()))?;

    let language: String =
        sqlx::query_scalar("SELECT preferred_language FROM profiles WHERE user_id = $1")
            .bind(user.id)
            .fetch_optional(&state.db)
            .await?
            .unwrap_or_else(|| "en".to_string());

    let content = openai
        .generate_product_copy(
            &body.product_title,
            body.product_description.as_deref(),
            body.tone.as_deref(),
            &language,
        )
        .await?;

    // The increment can refuse if a concurrent request took the last
    // slot between the check and here; the generated copy is still
    // returned, it just isn't counted.
    let counted =
        quota::increment_usage(&state.db, &state.config.plans, user.id, "product_copy").await?;
    if !counted {
        tracing::warn!(user_id = %user.id, "generation completed but allowance was exhausted concurrently");
    }

    let usage = quota::fetch_usage(&state.db, &state.config.plans, user.id).await?;

    Ok(Json(json!({
        "content": content,
        "usage": usage,
    })))
}
