use axum::{
    middleware as axum_mw,
    routing::{get, post},
    Router,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::compression::CompressionLayer;
use tower_http::cors::{Any, CorsLayer};

mod cache;
mod config;
mod crypto;
mod db;
mod error;
mod middleware;
mod models;
mod routes;
mod services;

use cache::Cache;
use config::Config;
use middleware::rate_limit::RateLimiter;
use services::openai::OpenAiClient;
use services::shopify::ShopifyClient;
use services::whatsapp::WhatsAppClient;

#[derive(Clone)]
pub struct AppState {
    pub db: sqlx::PgPool,
    pub cache: Cache,
    pub config: Arc<Config>,
    pub shopify: Option<ShopifyClient>,
    pub openai: Option<OpenAiClient>,
    pub whatsapp: Option<WhatsAppClient>,
    pub rate_limiter: RateLimiter,
    pub generate_rate_limiter: RateLimiter,
}

fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // --- Auth routes (no auth required) ---
    let auth_routes = Router::new()
        .route("/register", post(routes::auth::register))
        .route("/login", post(routes::auth::login))
        .route("/refresh", post(routes::auth::refresh));

    // --- Webhook routes (raw body / provider auth, no bearer) ---
    let webhook_routes = Router::new()
        .route("/nzmly", post(routes::webhooks::nzmly_webhook))
        .route(
            "/whatsapp",
            get(routes::webhooks::whatsapp_verify).post(routes::webhooks::whatsapp_inbound),
        );

    // --- Authenticated routes ---
    let profile_routes = Router::new()
        .route(
            "/",
            get(routes::profile::get_profile).put(routes::profile::update_profile),
        )
        .layer(axum_mw::from_fn_with_state(
            state.clone(),
            middleware::auth::authenticate,
        ));

    let billing_routes = Router::new()
        .route("/status", get(routes::billing::subscription_status))
        .layer(axum_mw::from_fn_with_state(
            state.clone(),
            middleware::auth::authenticate,
        ))
        .route("/plans", get(routes::billing::plans));

    let usage_routes = Router::new()
        .route("/", get(routes::usage::usage_status))
        .route("/history", get(routes::usage::usage_history))
        .layer(axum_mw::from_fn_with_state(
            state.clone(),
            middleware::auth::authenticate,
        ));

    let lead_routes = Router::new()
        .route("/", get(routes::leads::list_leads))
        .layer(axum_mw::from_fn_with_state(
            state.clone(),
            middleware::auth::authenticate,
        ));

    let generation_routes = Router::new()
        .route(
            "/",
            post(routes::generation::generate).layer(axum_mw::from_fn_with_state(
                state.clone(),
                middleware::rate_limit::generate_rate_limit,
            )),
        )
        .layer(axum_mw::from_fn_with_state(
            state.clone(),
            middleware::auth::authenticate,
        ));

    let store_routes = Router::new()
        .route("/", get(routes::stores::list_connections))
        .route("/exchange", post(routes::stores::exchange_token))
        .route("/sync", post(routes::stores::sync))
        .route("/disconnect", post(routes::stores::disconnect))
        .route("/products", get(routes::stores::list_products))
        .layer(axum_mw::from_fn_with_state(
            state.clone(),
            middleware::auth::authenticate,
        ))
        .route("/auth-url", get(routes::stores::auth_url));

    // --- Compose full API ---
    let api = Router::new()
        .nest("/auth", auth_routes)
        .nest("/profile", profile_routes)
        .nest("/billing", billing_routes)
        .nest("/usage", usage_routes)
        .nest("/leads", lead_routes)
        .nest("/generate", generation_routes)
        .nest("/stores", store_routes)
        .nest("/webhooks", webhook_routes);

    Router::new()
        .nest("/api/v1", api)
        // Path the payment gateway was originally configured with.
        .route("/nzmly-webhook", post(routes::webhooks::nzmly_webhook))
        .route("/health", get(routes::health::health))
        // Global middleware
        .layer(axum_mw::from_fn_with_state(
            state.clone(),
            middleware::rate_limit::rate_limit,
        ))
        .layer(CompressionLayer::new())
        .layer(cors)
        .with_state(state)
}

#[tokio::main]
async fn main() {
    let _ = dotenvy::dotenv();
    let config = Config::from_env();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .json()
        .init();

    let pool = db::create_pool(&config).await;

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .expect("Failed to run database migrations");

    let cache = Cache::new(&config).await;
    let shopify = ShopifyClient::new(&config.shopify);
    let openai = OpenAiClient::new(&config.openai);
    let whatsapp = WhatsAppClient::new(&config.whatsapp);
    let rate_limiter =
        RateLimiter::new(config.rate_limit.max_requests, config.rate_limit.window_secs);
    let generate_rate_limiter =
        RateLimiter::new(config.rate_limit.generate_max, config.rate_limit.window_secs);

    let port = config.port;
    tracing::info!("SellGenius API initialized (Rust/Axum)");

    let state = AppState {
        db: pool,
        cache,
        config: Arc::new(config),
        shopify,
        openai,
        whatsapp,
        rate_limiter,
        generate_rate_limiter,
    };

    let router = build_router(state);
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind listener");
    tracing::info!("listening on {addr}");
    axum::serve(
        listener,
        router.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await
    .expect("Server error");
}
