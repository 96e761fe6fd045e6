use axum::{
    body::Bytes,
    extract::{Query, State},
    http::{HeaderMap, StatusCode},
    Json,
};
use serde_json::{json, Value};
use std::collections::HashMap;
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::models::subscription::NzmlyPayload;
use crate::services::{subscription_sync, whatsapp};
use crate::AppState;

/// Payment callback from the Nzmly gateway. Verified against the raw
/// body, then applied idempotently by order_id.
pub async fn nzmly_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> AppResult<Json<Value>> {
    let secret = &state.config.nzmly.webhook_secret;
    if !secret.is_empty() {
        let signature = headers
            .get(&state.config.nzmly.signature_header)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("");
        subscription_sync::verify_signature(secret, &body, signature)?;
    }

    let payload: NzmlyPayload = serde_json::from_slice(&body)
        .map_err(|e| AppError::BadRequest(format!("Invalid webhook payload: {}", e)))?;

    if payload.order_id.is_empty() || payload.email.is_empty() {
        return Err(AppError::BadRequest("order_id and email required".into()));
    }
    if payload.amount < 0.0 {
        return Err(AppError::BadRequest("amount must not be negative".into()));
    }

    let outcome =
        subscription_sync::apply_payment(&state.db, &state.config.plans, &payload).await?;

    Ok(Json(json!({
        "success": true,
        "plan": outcome.plan,
        "status": outcome.status,
        "expires_at": outcome.expires_at,
    })))
}

/// Meta's subscription handshake: echo the challenge when the verify
/// token matches.
pub async fn whatsapp_verify(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<String, StatusCode> {
    let mode = params.get("hub.mode").map(String::as_str);
    let token = params.get("hub.verify_token").map(String::as_str);
    let challenge = params.get("hub.challenge");

    if mode == Some("subscribe")
        && !state.config.whatsapp.verify_token.is_empty()
        && token == Some(state.config.whatsapp.verify_token.as_str())
    {
        return Ok(challenge.cloned().unwrap_or_default());
    }
    Err(StatusCode::UNAUTHORIZED)
}

/// Inbound WhatsApp messages: upsert the lead, send an AI reply.
/// Always answers 200; Meta re-delivers on any other status, and
/// retries don't help the failure modes here. Errors are logged.
pub async fn whatsapp_inbound(
    State(state): State<AppState>,
    Json(payload): Json<Value>,
) -> StatusCode {
    let owner: Option<Uuid> = Uuid::parse_str(&state.config.whatsapp.owner_user_id).ok();

    for message in whatsapp::extract_messages(&payload) {
        tracing::info!(from = %message.from, "inbound whatsapp message");

        if let Some(owner_id) = owner {
            let result = sqlx::query(
                r#"INSERT INTO leads (user_id, phone, contact_name, last_message, last_contact_at)
                VALUES ($1, $2, $3, $4, NOW())
                ON CONFLICT (user_id, phone) DO UPDATE SET
                    contact_name = COALESCE(EXCLUDED.contact_name, leads.contact_name),
                    last_message = EXCLUDED.last_message, last_contact_at = NOW()"#,
            )
            .bind(owner_id)
            .bind(&message.from)
            .bind(&message.contact_name)
            .bind(&message.body)
            .execute(&state.db)
            .await;
            if let Err(e) = result {
                tracing::error!("lead upsert failed: {e}");
            }
        }

        let reply = match &state.openai {
            Some(openai) => match openai.generate_chat_reply(&message.body).await {
                Ok(text) => text,
                Err(e) => {
                    tracing::error!("reply generation failed: {e}");
                    continue;
                }
            },
            None => continue,
        };

        if let Some(wa) = &state.whatsapp {
            if let Err(e) = wa.send_text(&message.from, &reply).await {
                tracing::error!("whatsapp send failed: {e}");
            }
        }
    }

    StatusCode::OK
}
