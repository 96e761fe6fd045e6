use axum::{extract::State, Json};
use serde_json::{json, Value};

use crate::error::{AppError, AppResult};
use crate::middleware::auth::AuthUser;
use crate::models::user::{Profile, UpdateProfileRequest};
use crate::AppState;

pub async fn get_profile(
    State(state): State<AppState>,
    user: axum::Extension<AuthUser>,
) -> AppResult<Json<Value>> {
    let profile: Profile = sqlx::query_as("SELECT * FROM profiles WHERE user_id = $1")
        .bind(user.id)
        .fetch_optional(&state.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Profile not found".into()))?;

    Ok(Json(json!({ "profile": profile })))
}

/// Settings writes: display name and language. Plan is owned by the
/// payment webhook path and cannot be set here.
pub async fn update_profile(
    State(state): State<AppState>,
    user: axum::Extension<AuthUser>,
    Json(body): Json<UpdateProfileRequest>,
) -> AppResult<Json<Value>> {
    if let Some(ref language) = body.preferred_language {
        if language.is_empty() || language.len() > 8 {
            return Err(AppError::BadRequest("Invalid language code".into()));
        }
        sqlx::query(
            "UPDATE profiles SET preferred_language = $1, updated_at = NOW() WHERE user_id = $2",
        )
        .bind(language)
        .bind(user.id)
        .execute(&state.db)
        .await?;
    }

    if let Some(ref name) = body.display_name {
        sqlx::query("UPDATE users SET display_name = $1 WHERE id = $2")
            .bind(name)
            .bind(user.id)
            .execute(&state.db)
            .await?;
    }

    let profile: Profile = sqlx::query_as("SELECT * FROM profiles WHERE user_id = $1")
        .bind(user.id)
        .fetch_one(&state.db)
        .await?;

    Ok(Json(json!({ "profile": profile })))
}
