//! LINE Messaging API (reply endpoint only)

use async_trait::async_trait;

use crate::error::BoxError;

const REPLY_URL: &str = "https://api.line.me/v2/bot/message/reply";

/// LINE caps a text message at 5000 characters
const MAX_TEXT_CHARS: usize = 5000;

#[async_trait]
pub trait LineMessenger: Send + Sync {
    async fn reply_text(&self, reply_token: &str, text: &str) -> Result<(), BoxError>;
}

#[derive(Clone)]
pub struct LineClient {
    http: reqwest::Client,
    access_token: String,
}

impl LineClient {
    pub fn new(access_token: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            access_token: access_token.into(),
        }
    }
}

fn reply_body(reply_token: &str, text: &str) -> serde_json::Value {
    let text: String = text.chars().take(MAX_TEXT_CHARS).collect();
    serde_json::json!({
        "replyToken": reply_token,
        "messages": [{ "type": "text", "text": text }],
    })
}

#[async_trait]
impl LineMessenger for LineClient {
    async fn reply_text(&self, reply_token: &str, text: &str) -> Result<(), BoxError> {
        let resp = self
            .http
            .post(REPLY_URL)
            .bearer_auth(&self.access_token)
            .json(&reply_body(reply_token, text))
            .send()
            .await?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(format!("LINE reply failed ({status}): {body}").into());
        }
        Ok(())
    }
}
