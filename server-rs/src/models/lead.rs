use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// WhatsApp contact captured from an inbound message.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Lead {
    pub user_id: Uuid,
    pub phone: String,
    pub contact_name: Option<String>,
    pub last_message: Option<String>,
    pub last_contact_at: DateTime<Utc>,
}
