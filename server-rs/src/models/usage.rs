use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::subscription::Plan;

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct UsageRecord {
    pub user_id: Uuid,
    pub month_year: String,
    pub generations_count: i64,
    pub updated_at: DateTime<Utc>,
}

/// A point-in-time view of a user's allowance for the current month.
#[derive(Debug, Clone, Serialize)]
pub struct UsageSnapshot {
    pub plan: Plan,
    pub month_year: String,
    pub used: i64,
    /// -1 means unlimited.
    pub limit: i64,
    /// None when the plan is unlimited.
    pub remaining: Option<i64>,
    #[serde(rename = "canGenerate")]
    pub can_generate: bool,
    #[serde(rename = "percentageUsed")]
    pub percentage_used: f64,
}
