use std::env;

use crate::models::subscription::Plan;

#[derive(Clone, Debug)]
pub struct Config {
    pub port: u16,
    pub node_env: String,
    pub cors_origins: Vec<String>,
    pub db: DbConfig,
    pub redis: RedisConfig,
    pub jwt: JwtConfig,
    pub rate_limit: RateLimitConfig,
    pub plans: PlanPolicy,
    pub nzmly: NzmlyConfig,
    pub shopify: ShopifyConfig,
    pub openai: OpenAiConfig,
    pub whatsapp: WhatsAppConfig,
    /// Key for encrypting store access tokens at rest.
    pub credential_key: String,
}

#[derive(Clone, Debug)]
pub struct DbConfig {
    pub host: String,
    pub port: u16,
    pub database: String,
    pub user: String,
    pub password: String,
    pub pool_min: u32,
    pub pool_max: u32,
}

#[derive(Clone, Debug)]
pub struct RedisConfig {
    pub host: String,
    pub port: u16,
    pub password: Option<String>,
    pub db: u8,
    pub key_prefix: String,
}

#[derive(Clone, Debug)]
pub struct JwtConfig {
    pub secret: String,
    pub access_expiry_secs: i64,
    pub refresh_expiry_secs: i64,
}

#[derive(Clone, Debug)]
pub struct RateLimitConfig {
    pub window_secs: u64,
    pub max_requests: u32,
    pub generate_max: u32,
}

/// Plan policy table: monthly generation limits and the payment-amount
/// thresholds the webhook receiver classifies tiers by. Loaded from the
/// environment so pricing changes don't require a deploy.
#[derive(Clone, Debug)]
pub struct PlanPolicy {
    pub free_limit: i64,
    pub start_limit: i64,
    pub pro_limit: i64,
    pub business_limit: i64,
    pub pro_threshold: f64,
    pub business_threshold: f64,
    pub subscription_days: i64,
}

impl PlanPolicy {
    /// Monthly generation allowance for a plan. -1 means unlimited.
    pub fn limit_for(&self, plan: Plan) -> i64 {
        match plan {
            Plan::Free => self.free_limit,
            Plan::Start => self.start_limit,
            Plan::Pro => self.pro_limit,
            Plan::Business => self.business_limit,
        }
    }

    /// Classifies a payment amount into a plan tier. Thresholds are
    /// checked greatest-first; any amount below the pro threshold maps
    /// to start (the smallest paid tier).
    pub fn classify_amount(&self, amount: f64) -> Plan {
        if amount >= self.business_threshold {
            Plan::Business
        } else if amount >= self.pro_threshold {
            Plan::Pro
        } else {
            Plan::Start
        }
    }
}

impl Default for PlanPolicy {
    fn default() -> Self {
        Self {
            free_limit: 5,
            start_limit: 50,
            pro_limit: -1,
            business_limit: -1,
            pro_threshold: 10.0,
            business_threshold: 20.0,
            subscription_days: 30,
        }
    }
}

#[derive(Clone, Debug)]
pub struct NzmlyConfig {
    pub webhook_secret: String,
    pub signature_header: String,
}

#[derive(Clone, Debug)]
pub struct ShopifyConfig {
    pub api_key: String,
    pub api_secret: String,
    pub scopes: String,
    pub redirect_url: String,
    pub api_version: String,
    pub sync_page_size: u32,
}

#[derive(Clone, Debug)]
pub struct OpenAiConfig {
    pub api_key: String,
    pub model: String,
    pub base_url: String,
}

#[derive(Clone, Debug)]
pub struct WhatsAppConfig {
    pub verify_token: String,
    pub access_token: String,
    pub phone_number_id: String,
    /// Account that owns inbound leads on this WhatsApp number.
    pub owner_user_id: String,
}

fn env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_or_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

impl Config {
    pub fn from_env() -> Self {
        let defaults = PlanPolicy::default();
        Self {
            port: env_or_parse("PORT", 3000),
            node_env: env_or("NODE_ENV", "development"),
            cors_origins: env_or("CORS_ORIGINS", "http://localhost:3000,http://localhost:8080")
                .split(',')
                .map(|s| s.trim().to_string())
                .collect(),
            db: DbConfig {
                host: env_or("DB_HOST", "localhost"),
                port: env_or_parse("DB_PORT", 5432),
                database: env_or("DB_NAME", "sellgenius"),
                user: env_or("DB_USER", "sellgenius_admin"),
                password: env_or("DB_PASSWORD", ""),
                pool_min: env_or_parse("DB_POOL_MIN", 5),
                pool_max: env_or_parse("DB_POOL_MAX", 50),
            },
            redis: RedisConfig {
                host: env_or("REDIS_HOST", "localhost"),
                port: env_or_parse("REDIS_PORT", 6379),
                password: env::var("REDIS_PASSWORD").ok().filter(|s| !s.is_empty()),
                db: env_or_parse("REDIS_DB", 0),
                key_prefix: "sg:".to_string(),
            },
            jwt: JwtConfig {
                secret: env_or("JWT_SECRET", "change-me-to-a-secure-random-string"),
                access_expiry_secs: parse_duration_to_secs(&env_or("JWT_ACCESS_EXPIRY", "1h")),
                refresh_expiry_secs: parse_duration_to_secs(&env_or("JWT_REFRESH_EXPIRY", "30d")),
            },
            rate_limit: RateLimitConfig {
                window_secs: 60,
                max_requests: env_or_parse("RATE_LIMIT_MAX", 100),
                generate_max: env_or_parse("RATE_LIMIT_GENERATE", 20),
            },
            plans: PlanPolicy {
                free_limit: env_or_parse("PLAN_FREE_LIMIT", defaults.free_limit),
                start_limit: env_or_parse("PLAN_START_LIMIT", defaults.start_limit),
                pro_limit: env_or_parse("PLAN_PRO_LIMIT", defaults.pro_limit),
                business_limit: env_or_parse("PLAN_BUSINESS_LIMIT", defaults.business_limit),
                pro_threshold: env_or_parse("PLAN_PRO_THRESHOLD", defaults.pro_threshold),
                business_threshold: env_or_parse(
                    "PLAN_BUSINESS_THRESHOLD",
                    defaults.business_threshold,
                ),
                subscription_days: env_or_parse("PLAN_SUBSCRIPTION_DAYS", defaults.subscription_days),
            },
            nzmly: NzmlyConfig {
                webhook_secret: env_or("NZMLY_WEBHOOK_SECRET", ""),
                signature_header: "x-nzmly-signature".to_string(),
            },
            shopify: ShopifyConfig {
                api_key: env_or("SHOPIFY_API_KEY", ""),
                api_secret: env_or("SHOPIFY_API_SECRET", ""),
                scopes: env_or("SHOPIFY_SCOPES", "read_products"),
                redirect_url: env_or(
                    "SHOPIFY_REDIRECT_URL",
                    "http://localhost:3000/settings/stores/callback",
                ),
                api_version: env_or("SHOPIFY_API_VERSION", "2024-01"),
                sync_page_size: env_or_parse("SHOPIFY_SYNC_PAGE_SIZE", 250),
            },
            openai: OpenAiConfig {
                api_key: env_or("OPENAI_API_KEY", ""),
                model: env_or("OPENAI_MODEL", "gpt-4o-mini"),
                base_url: env_or("OPENAI_BASE_URL", "https://api.openai.com/v1"),
            },
            whatsapp: WhatsAppConfig {
                verify_token: env_or("WHATSAPP_VERIFY_TOKEN", ""),
                access_token: env_or("WHATSAPP_ACCESS_TOKEN", ""),
                phone_number_id: env_or("WHATSAPP_PHONE_NUMBER_ID", ""),
                owner_user_id: env_or("WHATSAPP_OWNER_USER_ID", ""),
            },
            credential_key: env_or("CREDENTIAL_KEY", "change-me-credential-key"),
        }
    }

    pub fn database_url(&self) -> String {
        if let Ok(url) = env::var("DATABASE_URL") {
            return url;
        }
        if let Ok(url) = env::var("POSTGRES_URL") {
            return url;
        }
        format!(
            "postgres://{}:{}@{}:{}/{}",
            self.db.user, self.db.password, self.db.host, self.db.port, self.db.database
        )
    }

    pub fn redis_url(&self) -> String {
        if let Ok(url) = env::var("REDIS_URL") {
            return url;
        }
        match &self.redis.password {
            Some(pw) if !pw.is_empty() => format!(
                "redis://:{}@{}:{}/{}",
                pw, self.redis.host, self.redis.port, self.redis.db
            ),
            _ => format!(
                "redis://{}:{}/{}",
                self.redis.host, self.redis.port, self.redis.db
            ),
        }
    }
}

fn parse_duration_to_secs(s: &str) -> i64 {
    let s = s.trim();
    if s.is_empty() {
        return 3600;
    }
    let (num_str, unit) = s.split_at(s.len() - 1);
    let num: i64 = num_str.parse().unwrap_or(1);
    match unit {
        "s" => num,
        "m" => num * 60,
        "h" => num * 3600,
        "d" => num * 86400,
        _ => s.parse().unwrap_or(3600),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_limits_match_published_tiers() {
        let policy = PlanPolicy::default();
        assert_eq!(policy.limit_for(Plan::Free), 5);
        assert_eq!(policy.limit_for(Plan::Start), 50);
        assert_eq!(policy.limit_for(Plan::Pro), -1);
        assert_eq!(policy.limit_for(Plan::Business), -1);
    }

    #[test]
    fn classify_amount_boundaries() {
        let policy = PlanPolicy::default();
        assert_eq!(policy.classify_amount(0.0), Plan::Start);
        assert_eq!(policy.classify_amount(4.99), Plan::Start);
        assert_eq!(policy.classify_amount(5.0), Plan::Start);
        assert_eq!(policy.classify_amount(9.99), Plan::Start);
        assert_eq!(policy.classify_amount(10.0), Plan::Pro);
        assert_eq!(policy.classify_amount(19.99), Plan::Pro);
        assert_eq!(policy.classify_amount(20.0), Plan::Business);
        assert_eq!(policy.classify_amount(20.01), Plan::Business);
    }

    #[test]
    fn parse_duration_units() {
        assert_eq!(parse_duration_to_secs("90s"), 90);
        assert_eq!(parse_duration_to_secs("15m"), 900);
        assert_eq!(parse_duration_to_secs("1h"), 3600);
        assert_eq!(parse_duration_to_secs("30d"), 2_592_000);
        assert_eq!(parse_duration_to_secs(""), 3600);
    }
}
