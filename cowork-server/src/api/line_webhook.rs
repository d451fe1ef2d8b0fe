//! LINE Messaging API webhook
//!
//! POST /line/webhook — answer member questions from the knowledge base

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use shared::chatbot::{WebhookBody, verify_line_signature};

use crate::services::chatbot;
use crate::state::AppState;

/// Once the signature checks out the webhook is acknowledged with 200,
/// even when individual replies fail, so LINE does not redeliver.
pub async fn handle_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> StatusCode {
    let Some(signature) = headers
        .get("x-line-signature")
        .and_then(|v| v.to_str().ok())
    else {
        tracing::warn!("Missing X-Line-Signature header");
        return StatusCode::UNAUTHORIZED;
    };

    if let Err(e) = verify_line_signature(&body, signature, &state.line_channel_secret) {
        tracing::warn!(error = e, "LINE signature verification failed");
        return StatusCode::UNAUTHORIZED;
    }

    let webhook: WebhookBody = match serde_json::from_slice(&body) {
        Ok(v) => v,
        Err(e) => {
            tracing::warn!(%e, "Failed to parse LINE webhook JSON");
            return StatusCode::BAD_REQUEST;
        }
    };
    if webhook.events.is_empty() {
        // Verification ping from the LINE console
        return StatusCode::OK;
    }

    let kb = match chatbot::load_knowledge_base(
        &state.knowledge_cache,
        state.backends.knowledge.as_ref(),
    )
    .await
    {
        Ok(kb) => kb,
        Err(e) => {
            tracing::error!(error = %e, "Failed to load knowledge base");
            return StatusCode::INTERNAL_SERVER_ERROR;
        }
    };

    let summary = chatbot::reply_to_events(&kb, state.backends.line.as_ref(), &webhook).await;
    tracing::info!(
        replied = summary.replied,
        ignored = summary.ignored,
        failed = summary.failed,
        "LINE webhook processed"
    );
    StatusCode::OK
}
