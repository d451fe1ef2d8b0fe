//! LINE chatbot: webhook payloads, signature check and knowledge-base matching

mod knowledge;
mod signature;

pub use knowledge::*;
pub use signature::*;

use serde::{Deserialize, Serialize};

/// Reply used when no knowledge entry matches
pub const FALLBACK_REPLY: &str =
    "Sorry, I could not find an answer to that. A staff member will get back to you shortly.";

/// Body of a LINE Messaging API webhook call
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WebhookBody {
    #[serde(default)]
    pub destination: String,
    #[serde(default)]
    pub events: Vec<WebhookEvent>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookEvent {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub reply_token: Option<String>,
    #[serde(default)]
    pub message: Option<EventMessage>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventMessage {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub text: Option<String>,
}

impl WebhookEvent {
    /// `(reply_token, text)` for text message events, `None` for anything else
    pub fn text_message(&self) -> Option<(&str, &str)> {
        if self.kind != "message" {
            return None;
        }
        let message = self.message.as_ref().filter(|m| m.kind == "text")?;
        Some((self.reply_token.as_deref()?, message.text.as_deref()?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_text_event() {
        let body: WebhookBody = serde_json::from_str(
            r#"{
                "destination": "U123",
                "events": [
                    {"type": "message", "replyToken": "rt-1",
                     "message": {"type": "text", "id": "1", "text": "Wi-Fi password?"}},
                    {"type": "message", "replyToken": "rt-2",
                     "message": {"type": "sticker", "id": "2"}},
                    {"type": "follow", "replyToken": "rt-3"}
                ]
            }"#,
        )
        .unwrap();
        assert_eq!(body.events.len(), 3);
        assert_eq!(body.events[0].text_message(), Some(("rt-1", "Wi-Fi password?")));
        assert_eq!(body.events[1].text_message(), None);
        assert_eq!(body.events[2].text_message(), None);
    }

    #[test]
    fn test_empty_verification_body() {
        let body: WebhookBody = serde_json::from_str(r#"{"destination":"U1","events":[]}"#).unwrap();
        assert!(body.events.is_empty());
    }
}
