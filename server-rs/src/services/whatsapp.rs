use serde_json::{json, Value};

use crate::config::WhatsAppConfig;
use crate::error::{AppError, AppResult};

/// Outbound side of the WhatsApp Business integration: text replies
/// through the Meta Graph API.
#[derive(Clone)]
pub struct WhatsAppClient {
    access_token: String,
    phone_number_id: String,
    client: reqwest::Client,
}

impl WhatsAppClient {
    pub fn new(config: &WhatsAppConfig) -> Option<Self> {
        if config.access_token.is_empty() || config.phone_number_id.is_empty() {
            return None;
        }
        Some(Self {
            access_token: config.access_token.clone(),
            phone_number_id: config.phone_number_id.clone(),
            client: reqwest::Client::new(),
        })
    }

    pub async fn send_text(&self, to: &str, body: &str) -> AppResult<()> {
        let url = format!(
            "https://graph.facebook.com/v19.0/{}/messages",
            self.phone_number_id
        );
        let resp = self
            .client
            .post(&url)
            .bearer_auth(&self.access_token)
            .json(&json!({
                "messaging_product": "whatsapp",
                "to": to,
                "type": "text",
                "text": {"body": body},
            }))
            .send()
            .await
            .map_err(|e| AppError::Upstream(format!("WhatsApp request failed: {}", e)))?;

        let status = resp.status();
        if !status.is_success() {
            let body: Value = resp.json().await.unwrap_or_default();
            let msg = body["error"]["message"]
                .as_str()
                .unwrap_or("Unknown WhatsApp error");
            return Err(AppError::Upstream(format!("WhatsApp error: {}", msg)));
        }
        Ok(())
    }
}

/// One inbound text message lifted out of a webhook delivery.
#[derive(Debug, Clone, PartialEq)]
pub struct InboundMessage {
    pub from: String,
    pub contact_name: Option<String>,
    pub body: String,
}

/// Flattens Meta's entry/changes nesting into the text messages it
/// carries. Non-text messages (media, reactions, status updates) are
/// ignored.
pub fn extract_messages(payload: &Value) -> Vec<InboundMessage> {
    let mut out = Vec::new();
    let entries = payload["entry"].as_array().cloned().unwrap_or_default();
    for entry in &entries {
        let changes = entry["changes"].as_array().cloned().unwrap_or_default();
        for change in &changes {
            let value = &change["value"];
            let contact_name = value["contacts"][0]["profile"]["name"]
                .as_str()
                .map(String::from);
            let messages = value["messages"].as_array().cloned().unwrap_or_default();
            for msg in &messages {
                if msg["type"].as_str() != Some("text") {
                    continue;
                }
                let (Some(from), Some(body)) =
                    (msg["from"].as_str(), msg["text"]["body"].as_str())
                else {
                    continue;
                };
                out.push(InboundMessage {
                    from: from.to_string(),
                    contact_name: contact_name.clone(),
                    body: body.to_string(),
                });
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_text_messages() {
        let payload = json!({
            "entry": [{
                "changes": [{
                    "value": {
                        "contacts": [{"profile": {"name": "Sara"}}],
                        "messages": [
                            {"type": "text", "from": "15551234567", "text": {"body": "hi"}},
                            {"type": "image", "from": "15551234567"}
                        ]
                    }
                }]
            }]
        });
        let msgs = extract_messages(&payload);
        assert_eq!(msgs.len(), 1);
        assert_eq!(msgs[0].from, "15551234567");
        assert_eq!(msgs[0].contact_name.as_deref(), Some("Sara"));
        assert_eq!(msgs[0].body, "hi");
    }

    #[test]
    fn status_only_delivery_yields_nothing() {
        let payload = json!({
            "entry": [{"changes": [{"value": {"statuses": [{"status": "delivered"}]}}]}]
        });
        assert!(extract_messages(&payload).is_empty());
    }

    #[test]
    fn malformed_payload_yields_nothing() {
        assert!(extract_messages(&json!({"object": "whatsapp"})).is_empty());
        assert!(extract_messages(&json!(null)).is_empty());
    }
}
