use axum::{extract::State, Json};
use serde_json::{json, Value};

use crate::error::AppResult;
use crate::middleware::auth::AuthUser;
use crate::models::lead::Lead;
use crate::AppState;

/// Contacts captured from the WhatsApp inbox, newest first.
pub async fn list_leads(
    State(state): State<AppState>,
    user: axum::Extension<AuthUser>,
) -> AppResult<Json<Value>> {
    let leads: Vec<Lead> = sqlx::query_as(
        "SELECT * FROM leads WHERE user_id = $1 ORDER BY last_contact_at DESC",
    )
    .bind(user.id)
    .fetch_all(&state.db)
    .await?;

    Ok(Json(json!({ "leads": leads })))
}
