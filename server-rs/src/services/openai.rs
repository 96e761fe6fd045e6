use serde_json::{json, Value};

use crate::config::OpenAiConfig;
use crate::error::{AppError, AppResult};

/// Minimal chat-completions client for product copy generation.
#[derive(Clone)]
pub struct OpenAiClient {
    api_key: String,
    model: String,
    base_url: String,
    client: reqwest::Client,
}

impl OpenAiClient {
    pub fn new(config: &OpenAiConfig) -> Option<Self> {
        if config.api_key.is_empty() {
            return None;
        }
        Some(Self {
            api_key: config.api_key.clone(),
            model: config.model.clone(),
            base_url: config.base_url.clone(),
            client: reqwest::Client::new(),
        })
    }

    async fn chat(&self, system: &str, user: &str) -> AppResult<String> {
        let url = format!("{}/chat/completions", self.base_url);
        let resp = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&json!({
                "model": self.model,
                "messages": [
                    {"role": "system", "content": system},
                    {"role": "user", "content": user},
                ],
            }))
            .send()
            .await
            .map_err(|e| AppError::Upstream(format!("OpenAI request failed: {}", e)))?;

        let status = resp.status();
        let body: Value = resp
            .json()
            .await
            .map_err(|e| AppError::Upstream(format!("OpenAI response parse failed: {}", e)))?;

        if !status.is_success() {
            let msg = body["error"]["message"]
                .as_str()
                .unwrap_or("Unknown OpenAI error");
            return Err(AppError::Upstream(format!("OpenAI error: {}", msg)));
        }

        body["choices"][0]["message"]["content"]
            .as_str()
            .map(|s| s.trim().to_string())
            .ok_or_else(|| AppError::Upstream("Empty completion from OpenAI".into()))
    }

    /// Marketing copy for a product, written in the user's preferred
    /// language.
    pub async fn generate_product_copy(
        &self,
        title: &str,
        description: Option<&str>,
        tone: Option<&str>,
        language: &str,
    ) -> AppResult<String> {
        let system = format!(
            "You are an e-commerce copywriter. Write a compelling product \
             title and description in {} for online stores. Reply with the \
             copy only, no preamble.",
            language
        );
        let mut prompt = format!("Product: {}", title);
        if let Some(desc) = description {
            prompt.push_str(&format!("\nCurrent description: {}", desc));
        }
        if let Some(tone) = tone {
            prompt.push_str(&format!("\nTone: {}", tone));
        }
        self.chat(&system, &prompt).await
    }

    /// Short conversational reply to an inbound WhatsApp message.
    pub async fn generate_chat_reply(&self, message: &str) -> AppResult<String> {
        self.chat(
            "You are a helpful assistant answering customers of an online \
             store over WhatsApp. Keep replies short and friendly.",
            message,
        )
        .await
    }
}
