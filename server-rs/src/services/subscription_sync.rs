use chrono::{Duration, Utc};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use uuid::Uuid;

use crate::config::PlanPolicy;
use crate::error::{AppError, AppResult};
use crate::models::subscription::{NzmlyPayload, PaymentOutcome, Plan, SubscriptionStatus};
use crate::services::quota;

type HmacSha256 = Hmac<Sha256>;

/// Verifies the gateway's HMAC-SHA256 signature over the raw body.
pub fn verify_signature(secret: &str, payload: &[u8], signature: &str) -> AppResult<()> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|_| AppError::Internal("HMAC key error".into()))?;
    mac.update(payload);

    let expected = hex::encode(mac.finalize().into_bytes());
    if expected != signature.trim().to_lowercase() {
        return Err(AppError::Unauthorized(
            "Webhook signature verification failed".into(),
        ));
    }
    Ok(())
}

/// Applies one payment callback. Deliveries are at-least-once, so the
/// outcome of the first processing is recorded in `payment_events` and
/// a re-delivered order_id reads it back unchanged.
pub async fn apply_payment(
    db: &sqlx::PgPool,
    policy: &PlanPolicy,
    payload: &NzmlyPayload,
) -> AppResult<PaymentOutcome> {
    let prior: Option<PaymentOutcome> = sqlx::query_as::<_, (Plan, SubscriptionStatus, Option<chrono::DateTime<Utc>>)>(
        "SELECT plan, status, expires_at FROM payment_events WHERE order_id = $1",
    )
    .bind(&payload.order_id)
    .fetch_optional(db)
    .await?
    .map(|(plan, status, expires_at)| PaymentOutcome {
        plan,
        status,
        expires_at,
    });

    if let Some(outcome) = prior {
        tracing::info!(order_id = %payload.order_id, "duplicate webhook delivery, replaying recorded outcome");
        return Ok(outcome);
    }

    let plan = policy.classify_amount(payload.amount);
    let paid_at = Utc::now();

    let user_id: Option<Uuid> =
        sqlx::query_scalar("SELECT id FROM users WHERE LOWER(email) = LOWER($1)")
            .bind(&payload.email)
            .fetch_optional(db)
            .await?;

    let outcome = match user_id {
        Some(user_id) => {
            let expires_at = paid_at + Duration::days(policy.subscription_days);

            sqlx::query(
                r#"INSERT INTO subscriptions (user_id, order_id, customer_email, plan, status, amount, paid_at, expires_at)
                VALUES ($1, $2, $3, $4, 'active', $5, $6, $7)
                ON CONFLICT (user_id) WHERE user_id IS NOT NULL DO UPDATE SET
                    order_id = EXCLUDED.order_id, customer_email = EXCLUDED.customer_email,
                    plan = EXCLUDED.plan, status = 'active', amount = EXCLUDED.amount,
                    paid_at = EXCLUDED.paid_at, expires_at = EXCLUDED.expires_at,
                    updated_at = NOW()"#,
            )
            .bind(user_id)
            .bind(&payload.order_id)
            .bind(&payload.email)
            .bind(plan)
            .bind(payload.amount)
            .bind(paid_at)
            .bind(expires_at)
            .execute(db)
            .await?;

            sqlx::query("UPDATE profiles SET plan = $1, updated_at = NOW() WHERE user_id = $2")
                .bind(plan)
                .bind(user_id)
                .execute(db)
                .await?;

            quota::reset_current_month(db, user_id).await?;

            tracing::info!(%user_id, order_id = %payload.order_id, plan = plan.as_str(), "subscription activated");
            PaymentOutcome {
                plan,
                status: SubscriptionStatus::Active,
                expires_at: Some(expires_at),
            }
        }
        None => {
            // No account with this email yet; hold the payment until
            // the buyer registers.
            sqlx::query(
                r#"INSERT INTO subscriptions (user_id, order_id, customer_email, plan, status, amount, paid_at)
                VALUES (NULL, $1, $2, $3, 'pending', $4, $5)
                ON CONFLICT (order_id) DO NOTHING"#,
            )
            .bind(&payload.order_id)
            .bind(&payload.email)
            .bind(plan)
            .bind(payload.amount)
            .bind(paid_at)
            .execute(db)
            .await?;

            tracing::warn!(order_id = %payload.order_id, email = %payload.email, "payment held pending signup");
            PaymentOutcome {
                plan,
                status: SubscriptionStatus::Pending,
                expires_at: None,
            }
        }
    };

    sqlx::query(
        r#"INSERT INTO payment_events (order_id, payload, plan, status, expires_at)
        VALUES ($1, $2, $3, $4, $5) ON CONFLICT (order_id) DO NOTHING"#,
    )
    .bind(&payload.order_id)
    .bind(serde_json::to_value(payload).unwrap_or_default())
    .bind(outcome.plan)
    .bind(outcome.status)
    .bind(outcome.expires_at)
    .execute(db)
    .await?;

    Ok(outcome)
}

/// Links payments that arrived before the buyer had an account.
///
/// The most recent pending payment for the email becomes the active
/// subscription; its 30-day window counts from the original payment
/// receipt. Older pending rows for the same email are closed out.
pub async fn reconcile_pending(
    db: &sqlx::PgPool,
    policy: &PlanPolicy,
    user_id: Uuid,
    email: &str,
) -> AppResult<Option<Plan>> {
    let latest: Option<(Uuid, Plan, chrono::DateTime<Utc>)> = sqlx::query_as(
        r#"SELECT id, plan, paid_at FROM subscriptions
        WHERE user_id IS NULL AND status = 'pending' AND LOWER(customer_email) = LOWER($1)
        ORDER BY paid_at DESC LIMIT 1"#,
    )
    .bind(email)
    .fetch_optional(db)
    .await?;

    let (sub_id, plan, paid_at) = match latest {
        Some(row) => row,
        None => return Ok(None),
    };

    let expires_at = paid_at + Duration::days(policy.subscription_days);

    sqlx::query(
        r#"UPDATE subscriptions
        SET user_id = $1, status = 'active', expires_at = $2, updated_at = NOW()
        WHERE id = $3"#,
    )
    .bind(user_id)
    .bind(expires_at)
    .bind(sub_id)
    .execute(db)
    .await?;

    sqlx::query(
        r#"UPDATE subscriptions SET status = 'canceled', updated_at = NOW()
        WHERE user_id IS NULL AND status = 'pending' AND LOWER(customer_email) = LOWER($1)"#,
    )
    .bind(email)
    .execute(db)
    .await?;

    sqlx::query("UPDATE profiles SET plan = $1, updated_at = NOW() WHERE user_id = $2")
        .bind(plan)
        .bind(user_id)
        .execute(db)
        .await?;

    quota::reset_current_month(db, user_id).await?;

    tracing::info!(%user_id, plan = plan.as_str(), "pending subscription reconciled at signup");
    Ok(Some(plan))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sign(secret: &str, payload: &[u8]) -> String {
        let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).unwrap();
        mac.update(payload);
        hex::encode(mac.finalize().into_bytes())
    }

    #[test]
    fn valid_signature_accepted() {
        let body = br#"{"order_id":"ord_1","amount":10}"#;
        let sig = sign("whsec", body);
        assert!(verify_signature("whsec", body, &sig).is_ok());
    }

    #[test]
    fn signature_case_insensitive() {
        let body = b"payload";
        let sig = sign("whsec", body).to_uppercase();
        assert!(verify_signature("whsec", body, &sig).is_ok());
    }

    #[test]
    fn bad_signature_rejected() {
        let body = b"payload";
        let sig = sign("other-secret", body);
        assert!(verify_signature("whsec", body, &sig).is_err());
    }

    #[test]
    fn tampered_body_rejected() {
        let sig = sign("whsec", b"amount=10");
        assert!(verify_signature("whsec", b"amount=99", &sig).is_err());
    }
}
