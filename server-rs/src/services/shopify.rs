use rand::RngCore;
use serde_json::Value;

use crate::config::ShopifyConfig;
use crate::error::{AppError, AppResult};

/// Lightweight Shopify Admin client wrapping raw HTTP calls: the OAuth
/// handshake plus the product reads the sync path needs.
#[derive(Clone)]
pub struct ShopifyClient {
    api_key: String,
    api_secret: String,
    scopes: String,
    redirect_url: String,
    api_version: String,
    client: reqwest::Client,
}

/// Product fields mirrored into the local catalog.
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteProduct {
    pub external_id: String,
    pub title: String,
    pub price: Option<f64>,
    pub image_url: Option<String>,
    pub inventory_quantity: Option<i64>,
}

/// A shop domain must be a bare `*.myshopify.com` host.
pub fn is_valid_shop_domain(shop: &str) -> bool {
    let Some(name) = shop.strip_suffix(".myshopify.com") else {
        return false;
    };
    !name.is_empty()
        && !name.contains('.')
        && !name.starts_with('-')
        && !name.ends_with('-')
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-')
}

/// Random hex nonce binding the OAuth callback to the request that
/// started it.
pub fn generate_state_nonce() -> String {
    let mut bytes = [0u8; 16];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

impl ShopifyClient {
    pub fn new(config: &ShopifyConfig) -> Option<Self> {
        if config.api_key.is_empty() || config.api_secret.is_empty() {
            return None;
        }
        Some(Self {
            api_key: config.api_key.clone(),
            api_secret: config.api_secret.clone(),
            scopes: config.scopes.clone(),
            redirect_url: config.redirect_url.clone(),
            api_version: config.api_version.clone(),
            client: reqwest::Client::new(),
        })
    }

    pub fn build_auth_url(&self, shop: &str, state: &str) -> String {
        format!(
            "https://{}/admin/oauth/authorize?client_id={}&scope={}&redirect_uri={}&state={}",
            shop, self.api_key, self.scopes, self.redirect_url, state
        )
    }

    async fn get(&self, shop: &str, token: &str, path: &str) -> AppResult<Value> {
        let url = format!("https://{}/admin/api/{}{}", shop, self.api_version, path);
        let resp = self
            .client
            .get(&url)
            .header("X-Shopify-Access-Token", token)
            .send()
            .await
            .map_err(|e| AppError::Upstream(format!("Shopify request failed: {}", e)))?;

        let status = resp.status();
        let body: Value = resp
            .json()
            .await
            .map_err(|e| AppError::Upstream(format!("Shopify response parse failed: {}", e)))?;

        if !status.is_success() {
            let msg = body["errors"]
                .as_str()
                .unwrap_or("Unknown Shopify error");
            return Err(AppError::Upstream(format!("Shopify error: {}", msg)));
        }
        Ok(body)
    }

    /// Exchanges the OAuth authorization code for a permanent access
    /// token at the shop's token endpoint.
    pub async fn exchange_code(&self, shop: &str, code: &str) -> AppResult<String> {
        let url = format!("https://{}/admin/oauth/access_token", shop);
        let resp = self
            .client
            .post(&url)
            .json(&serde_json::json!({
                "client_id": self.api_key,
                "client_secret": self.api_secret,
                "code": code,
            }))
            .send()
            .await
            .map_err(|e| AppError::Upstream(format!("Shopify request failed: {}", e)))?;

        let status = resp.status();
        let body: Value = resp
            .json()
            .await
            .map_err(|e| AppError::Upstream(format!("Shopify response parse failed: {}", e)))?;

        if !status.is_success() {
            return Err(AppError::Upstream(
                "Shopify token exchange failed".into(),
            ));
        }

        body["access_token"]
            .as_str()
            .map(String::from)
            .ok_or_else(|| AppError::Upstream("No access token in Shopify response".into()))
    }

    pub async fn fetch_shop_name(&self, shop: &str, token: &str) -> AppResult<Option<String>> {
        let body = self.get(shop, token, "/shop.json").await?;
        Ok(body["shop"]["name"].as_str().map(String::from))
    }

    /// Fetches one page of the product catalog, newest first.
    pub async fn fetch_products(
        &self,
        shop: &str,
        token: &str,
        limit: u32,
    ) -> AppResult<Vec<RemoteProduct>> {
        let body = self
            .get(shop, token, &format!("/products.json?limit={}", limit))
            .await?;

        let products = body["products"]
            .as_array()
            .map(|items| items.iter().filter_map(map_product).collect())
            .unwrap_or_default();
        Ok(products)
    }
}

/// Maps one Shopify product payload into the local shape. Price and
/// inventory come off the first variant; products without an id are
/// skipped.
pub fn map_product(raw: &Value) -> Option<RemoteProduct> {
    let external_id = match &raw["id"] {
        Value::Number(n) => n.to_string(),
        Value::String(s) => s.clone(),
        _ => return None,
    };
    let title = raw["title"].as_str().unwrap_or("Untitled").to_string();
    let variant = &raw["variants"][0];
    let price = variant["price"]
        .as_str()
        .and_then(|p| p.parse::<f64>().ok())
        .or_else(|| variant["price"].as_f64());
    let inventory_quantity = variant["inventory_quantity"].as_i64();
    let image_url = raw["image"]["src"].as_str().map(String::from);

    Some(RemoteProduct {
        external_id,
        title,
        price,
        image_url,
        inventory_quantity,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn shop_domain_validation() {
        assert!(is_valid_shop_domain("my-store.myshopify.com"));
        assert!(is_valid_shop_domain("store123.myshopify.com"));
        assert!(!is_valid_shop_domain("myshopify.com"));
        assert!(!is_valid_shop_domain(".myshopify.com"));
        assert!(!is_valid_shop_domain("evil.com"));
        assert!(!is_valid_shop_domain("a.b.myshopify.com"));
        assert!(!is_valid_shop_domain("evil.com/x.myshopify.com"));
        assert!(!is_valid_shop_domain("-store.myshopify.com"));
    }

    #[test]
    fn state_nonce_is_32_hex_chars_and_unpredictable() {
        let a = generate_state_nonce();
        let b = generate_state_nonce();
        assert_eq!(a.len(), 32);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(a, b);
    }

    #[test]
    fn map_product_reads_first_variant() {
        let raw = json!({
            "id": 632910392,
            "title": "IPod Nano - 8GB",
            "variants": [
                {"price": "19.99", "inventory_quantity": 10},
                {"price": "29.99", "inventory_quantity": 3}
            ],
            "image": {"src": "https://cdn.shopify.com/ipod.png"}
        });
        let p = map_product(&raw).unwrap();
        assert_eq!(p.external_id, "632910392");
        assert_eq!(p.title, "IPod Nano - 8GB");
        assert_eq!(p.price, Some(19.99));
        assert_eq!(p.inventory_quantity, Some(10));
        assert_eq!(p.image_url.as_deref(), Some("https://cdn.shopify.com/ipod.png"));
    }

    #[test]
    fn map_product_tolerates_missing_fields() {
        let p = map_product(&json!({"id": "42"})).unwrap();
        assert_eq!(p.external_id, "42");
        assert_eq!(p.title, "Untitled");
        assert_eq!(p.price, None);
        assert_eq!(p.image_url, None);

        assert!(map_product(&json!({"title": "no id"})).is_none());
    }
}
