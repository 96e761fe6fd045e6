use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "store_platform", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Shopify,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct StoreConnection {
    pub id: Uuid,
    pub user_id: Uuid,
    pub platform: Platform,
    pub store_url: String,
    pub store_name: Option<String>,
    #[serde(skip_serializing)]
    pub access_token_enc: String,
    pub is_active: bool,
    pub products_count: i32,
    pub last_sync_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct SyncedProduct {
    pub connection_id: Uuid,
    pub external_product_id: String,
    pub title: String,
    pub price: Option<f64>,
    pub image_url: Option<String>,
    pub inventory_quantity: Option<i64>,
    pub synced_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
pub struct AuthUrlQuery {
    pub shop: String,
}

#[derive(Debug, Deserialize)]
pub struct ExchangeTokenRequest {
    pub shop: String,
    pub code: String,
    pub state: String,
}
