use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "plan_tier", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Plan {
    Free,
    Start,
    Pro,
    Business,
}

impl Plan {
    pub fn as_str(&self) -> &'static str {
        match self {
            Plan::Free => "free",
            Plan::Start => "start",
            Plan::Pro => "pro",
            Plan::Business => "business",
        }
    }
}

impl Default for Plan {
    fn default() -> Self {
        Self::Free
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "subscription_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum SubscriptionStatus {
    Pending,
    Active,
    Canceled,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Subscription {
    pub id: Uuid,
    pub user_id: Option<Uuid>,
    pub order_id: String,
    pub customer_email: String,
    pub plan: Plan,
    pub status: SubscriptionStatus,
    pub amount: f64,
    pub paid_at: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Inbound payment callback from the Nzmly gateway.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NzmlyPayload {
    pub order_id: String,
    pub email: String,
    pub status: Option<String>,
    pub amount: f64,
    pub product_name: Option<String>,
    pub customer_name: Option<String>,
    pub payment_method: Option<String>,
}

/// Result of applying a payment event, also what a re-delivered
/// webhook reads back from the ledger.
#[derive(Debug, Clone, Serialize)]
pub struct PaymentOutcome {
    pub plan: Plan,
    pub status: SubscriptionStatus,
    pub expires_at: Option<DateTime<Utc>>,
}
