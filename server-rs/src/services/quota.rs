use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::config::PlanPolicy;
use crate::error::AppResult;
use crate::models::subscription::Plan;
use crate::models::usage::UsageSnapshot;

pub fn month_key(now: DateTime<Utc>) -> String {
    now.format("%Y-%m").to_string()
}

/// Builds the allowance view from a plan, a used count, and the plan's
/// limit. Unlimited plans carry the -1 sentinel.
pub fn snapshot(plan: Plan, month_year: String, used: i64, limit: i64) -> UsageSnapshot {
    let unlimited = limit < 0;
    let remaining = if unlimited {
        None
    } else {
        Some((limit - used).max(0))
    };
    let can_generate = unlimited || used < limit;
    let percentage_used = if unlimited || limit == 0 {
        0.0
    } else {
        (used as f64 / limit as f64 * 100.0).min(100.0)
    };
    UsageSnapshot {
        plan,
        month_year,
        used,
        limit,
        remaining,
        can_generate,
        percentage_used,
    }
}

/// Effective plan: the active, non-expired subscription wins, then the
/// profile's plan field, then free.
pub async fn effective_plan(db: &sqlx::PgPool, user_id: Uuid) -> AppResult<Plan> {
    let sub_plan: Option<Plan> = sqlx::query_scalar(
        r#"SELECT plan FROM subscriptions
        WHERE user_id = $1 AND status = 'active'
          AND (expires_at IS NULL OR expires_at > NOW())
        ORDER BY updated_at DESC LIMIT 1"#,
    )
    .bind(user_id)
    .fetch_optional(db)
    .await?;

    if let Some(plan) = sub_plan {
        return Ok(plan);
    }

    let profile_plan: Option<Plan> =
        sqlx::query_scalar("SELECT plan FROM profiles WHERE user_id = $1")
            .bind(user_id)
            .fetch_optional(db)
            .await?;

    Ok(profile_plan.unwrap_or_default())
}

pub async fn fetch_usage(
    db: &sqlx::PgPool,
    policy: &PlanPolicy,
    user_id: Uuid,
) -> AppResult<UsageSnapshot> {
    let plan = effective_plan(db, user_id).await?;
    let month = month_key(Utc::now());

    let used: Option<i64> = sqlx::query_scalar(
        "SELECT generations_count FROM usage_records WHERE user_id = $1 AND month_year = $2",
    )
    .bind(user_id)
    .bind(&month)
    .fetch_optional(db)
    .await?;

    Ok(snapshot(plan, month, used.unwrap_or(0), policy.limit_for(plan)))
}

/// Counts one generation against the current month, atomically.
///
/// The ceiling is enforced inside the conditional upsert, so two
/// concurrent calls cannot both slip past the last remaining slot.
/// Returns false (and writes nothing) once the allowance is exhausted.
pub async fn increment_usage(
    db: &sqlx::PgPool,
    policy: &PlanPolicy,
    user_id: Uuid,
    kind: &str,
) -> AppResult<bool> {
    let plan = effective_plan(db, user_id).await?;
    let limit = policy.limit_for(plan);
    if limit == 0 {
        return Ok(false);
    }
    let month = month_key(Utc::now());

    let new_count: Option<i64> = sqlx::query_scalar(
        r#"INSERT INTO usage_records (user_id, month_year, generations_count, updated_at)
        VALUES ($1, $2, 1, NOW())
        ON CONFLICT (user_id, month_year) DO UPDATE
            SET generations_count = usage_records.generations_count + 1, updated_at = NOW()
            WHERE $3 < 0 OR usage_records.generations_count < $3
        RETURNING generations_count"#,
    )
    .bind(user_id)
    .bind(&month)
    .bind(limit)
    .fetch_optional(db)
    .await?;

    let counted = match new_count {
        Some(count) => {
            sqlx::query("INSERT INTO usage_log (user_id, month_year, kind) VALUES ($1, $2, $3)")
                .bind(user_id)
                .bind(&month)
                .bind(kind)
                .execute(db)
                .await?;
            tracing::debug!(%user_id, month, count, "usage incremented");
            true
        }
        None => false,
    };

    Ok(counted)
}

/// Zeroes the current month's counter. Invoked when a new subscription
/// activates so the paid allowance starts fresh.
pub async fn reset_current_month(db: &sqlx::PgPool, user_id: Uuid) -> AppResult<()> {
    let month = month_key(Utc::now());
    sqlx::query(
        r#"INSERT INTO usage_records (user_id, month_year, generations_count, updated_at)
        VALUES ($1, $2, 0, NOW())
        ON CONFLICT (user_id, month_year) DO UPDATE
            SET generations_count = 0, updated_at = NOW()"#,
    )
    .bind(user_id)
    .bind(&month)
    .execute(db)
    .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn month_key_format() {
        let at = Utc.with_ymd_and_hms(2026, 8, 7, 12, 0, 0).unwrap();
        assert_eq!(month_key(at), "2026-08");
        let january = Utc.with_ymd_and_hms(2027, 1, 1, 0, 0, 0).unwrap();
        assert_eq!(month_key(january), "2027-01");
    }

    #[test]
    fn can_generate_iff_unlimited_or_under_limit() {
        for (used, limit, expected) in [
            (0, 5, true),
            (4, 5, true),
            (5, 5, false),
            (6, 5, false),
            (0, -1, true),
            (1_000_000, -1, true),
            (0, 0, false),
        ] {
            let s = snapshot(Plan::Free, "2026-08".into(), used, limit);
            assert_eq!(s.can_generate, expected, "used={used} limit={limit}");
        }
    }

    #[test]
    fn remaining_is_none_for_unlimited() {
        let s = snapshot(Plan::Pro, "2026-08".into(), 12, -1);
        assert_eq!(s.remaining, None);
        assert_eq!(s.percentage_used, 0.0);
    }

    #[test]
    fn remaining_clamps_at_zero() {
        let s = snapshot(Plan::Free, "2026-08".into(), 7, 5);
        assert_eq!(s.remaining, Some(0));
        assert_eq!(s.percentage_used, 100.0);
    }

    #[test]
    fn percentage_used_is_proportional() {
        let s = snapshot(Plan::Start, "2026-08".into(), 25, 50);
        assert_eq!(s.percentage_used, 50.0);
    }
}
