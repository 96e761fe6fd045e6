use axum::{
    extract::{Query, State},
    Json,
};
use serde_json::{json, Value};

use crate::crypto;
use crate::error::{AppError, AppResult};
use crate::middleware::auth::AuthUser;
use crate::models::store::*;
use crate::services::shopify::{self, RemoteProduct};
use crate::AppState;

const OAUTH_STATE_TTL_SECS: u64 = 600;

fn state_key(nonce: &str) -> String {
    format!("oauth_state:{}", nonce)
}

/// Starts the OAuth handshake: a state nonce bound to the shop, held
/// in Redis until the callback comes back.
pub async fn auth_url(
    State(state): State<AppState>,
    Query(query): Query<AuthUrlQuery>,
) -> AppResult<Json<Value>> {
    let shopify_client = state
        .shopify
        .as_ref()
        .ok_or_else(|| AppError::Internal("Shopify not configured".into()))?;

    let shop = query.shop.trim().to_lowercase();
    if !shopify::is_valid_shop_domain(&shop) {
        return Err(AppError::BadRequest(
            "shop must be a *.myshopify.com domain".into(),
        ));
    }

    let nonce = shopify::generate_state_nonce();
    state
        .cache
        .set(&state_key(&nonce), &shop, OAUTH_STATE_TTL_SECS)
        .await;

    Ok(Json(json!({
        "authUrl": shopify_client.build_auth_url(&shop, &nonce),
        "state": nonce,
        "shop": shop,
    })))
}

/// OAuth callback: single-use state check, code-for-token exchange,
/// encrypted persistence of the connection.
pub async fn exchange_token(
    State(state): State<AppState>,
    user: axum::Extension<AuthUser>,
    Json(body): Json<ExchangeTokenRequest>,
) -> AppResult<Json<Value>> {
    let shopify_client = state
        .shopify
        .as_ref()
        .ok_or_else(|| AppError::Internal("Shopify not configured".into()))?;

    let shop = body.shop.trim().to_lowercase();
    let bound_shop = state.cache.take(&state_key(&body.state)).await;
    if bound_shop.as_deref() != Some(shop.as_str()) {
        return Err(AppError::Unauthorized("Invalid or expired state".into()));
    }

    let access_token = shopify_client.exchange_code(&shop, &body.code).await?;
    let store_name = shopify_client.fetch_shop_name(&shop, &access_token).await?;
    let token_enc = crypto::encrypt(&state.config.credential_key, &access_token)?;

    let connection: StoreConnection = sqlx::query_as(
        r#"INSERT INTO store_connections (user_id, platform, store_url, store_name, access_token_enc, is_active)
        VALUES ($1, 'shopify', $2, $3, $4, true)
        ON CONFLICT (user_id, platform) DO UPDATE SET
            store_url = EXCLUDED.store_url, store_name = EXCLUDED.store_name,
            access_token_enc = EXCLUDED.access_token_enc, is_active = true
        RETURNING *"#,
    )
    .bind(user.id)
    .bind(&shop)
    .bind(&store_name)
    .bind(&token_enc)
    .fetch_one(&state.db)
    .await?;

    tracing::info!(user_id = %user.id, shop, "store connected");

    Ok(Json(json!({
        "connection": connection,
        "message": "Store connected successfully",
    })))
}

async fn active_connection(
    state: &AppState,
    user_id: uuid::Uuid,
) -> AppResult<StoreConnection> {
    sqlx::query_as(
        "SELECT * FROM store_connections WHERE user_id = $1 AND platform = 'shopify' AND is_active = true",
    )
    .bind(user_id)
    .fetch_optional(&state.db)
    .await?
    .ok_or_else(|| AppError::NotFound("no_connection".into()))
}

/// Pulls one page of the remote catalog and mirrors it locally. The
/// upsert key is (connection, external product id), so re-syncing
/// unchanged data rewrites rows instead of duplicating them.
pub async fn sync(
    State(state): State<AppState>,
    user: axum::Extension<AuthUser>,
) -> AppResult<Json<Value>> {
    let shopify_client = state
        .shopify
        .as_ref()
        .ok_or_else(|| AppError::Internal("Shopify not configured".into()))?;

    let connection = active_connection(&state, user.id).await?;
    let access_token = crypto::decrypt(&state.config.credential_key, &connection.access_token_enc)?;

    let products: Vec<RemoteProduct> = shopify_client
        .fetch_products(
            &connection.store_url,
            &access_token,
            state.config.shopify.sync_page_size,
        )
        .await?;

    for product in &products {
        sqlx::query(
            r#"INSERT INTO synced_products
                (connection_id, external_product_id, title, price, image_url, inventory_quantity, synced_at)
            VALUES ($1, $2, $3, $4, $5, $6, NOW())
            ON CONFLICT (connection_id, external_product_id) DO UPDATE SET
                title = EXCLUDED.title, price = EXCLUDED.price,
                image_url = EXCLUDED.image_url,
                inventory_quantity = EXCLUDED.inventory_quantity,
                synced_at = NOW()"#,
        )
        .bind(connection.id)
        .bind(&product.external_id)
        .bind(&product.title)
        .bind(product.price)
        .bind(&product.image_url)
        .bind(product.inventory_quantity)
        .execute(&state.db)
        .await?;
    }

    sqlx::query(
        "UPDATE store_connections SET products_count = $1, last_sync_at = NOW() WHERE id = $2",
    )
    .bind(products.len() as i32)
    .bind(connection.id)
    .execute(&state.db)
    .await?;

    tracing::info!(user_id = %user.id, count = products.len(), "store sync completed");

    Ok(Json(json!({
        "synced": products.len(),
        "store": connection.store_url,
    })))
}

/// Soft delete; the connection row and its mirrored products stay for
/// a later reconnect.
pub async fn disconnect(
    State(state): State<AppState>,
    user: axum::Extension<AuthUser>,
) -> AppResult<Json<Value>> {
    let connection = active_connection(&state, user.id).await?;

    sqlx::query("UPDATE store_connections SET is_active = false WHERE id = $1")
        .bind(connection.id)
        .execute(&state.db)
        .await?;

    Ok(Json(json!({ "message": "Store disconnected" })))
}

pub async fn list_connections(
    State(state): State<AppState>,
    user: axum::Extension<AuthUser>,
) -> AppResult<Json<Value>> {
    let connections: Vec<StoreConnection> = sqlx::query_as(
        "SELECT * FROM store_connections WHERE user_id = $1 AND is_active = true ORDER BY created_at",
    )
    .bind(user.id)
    .fetch_all(&state.db)
    .await?;

    Ok(Json(json!({ "connections": connections })))
}

pub async fn list_products(
    State(state): State<AppState>,
    user: axum::Extension<AuthUser>,
) -> AppResult<Json<Value>> {
    let connection = active_connection(&state, user.id).await?;

    let products: Vec<SyncedProduct> = sqlx::query_as(
        "SELECT * FROM synced_products WHERE connection_id = $1 ORDER BY title",
    )
    .bind(connection.id)
    .fetch_all(&state.db)
    .await?;

    Ok(Json(json!({
        "products": products,
        "lastSyncAt": connection.last_sync_at,
    })))
}
