//! Calendar watch-channel notifications
//!
//! POST /calendar/notifications
//!
//! The channel headers identify the room and prove the sender knows the
//! channel token. The changed events ride in the JSON body, posted by the
//! relay that pulls them from the calendar provider. A notification without
//! a body is acknowledged and left for the relay's next push.

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use serde::Deserialize;
use shared::booking::{ExternalEvent, ResourceState, channel_token_matches};

use crate::services::booking;
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct ChangedEvents {
    #[serde(default)]
    pub events: Vec<ExternalEvent>,
}

fn header<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

pub async fn handle_notification(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> StatusCode {
    let (Some(channel_id), Some(token), Some(resource_state)) = (
        header(&headers, "x-goog-channel-id"),
        header(&headers, "x-goog-channel-token"),
        header(&headers, "x-goog-resource-state"),
    ) else {
        tracing::warn!("Calendar notification missing channel headers");
        return StatusCode::BAD_REQUEST;
    };

    if !channel_token_matches(&state.calendar_channel_token, token) {
        tracing::warn!(channel_id, "Calendar notification with wrong channel token");
        return StatusCode::UNAUTHORIZED;
    }

    match ResourceState::parse(resource_state) {
        None => {
            tracing::warn!(channel_id, resource_state, "Unknown resource state");
            StatusCode::BAD_REQUEST
        }
        Some(ResourceState::Sync) => {
            tracing::info!(channel_id, "Calendar channel handshake");
            StatusCode::OK
        }
        Some(ResourceState::NotExists) => {
            tracing::info!(channel_id, "Watched calendar no longer exists");
            StatusCode::OK
        }
        Some(ResourceState::Exists) => sync_changed_events(&state, channel_id, &body).await,
    }
}

async fn sync_changed_events(state: &AppState, channel_id: &str, body: &[u8]) -> StatusCode {
    if body.is_empty() {
        return StatusCode::OK;
    }
    let changed: ChangedEvents = match serde_json::from_slice(body) {
        Ok(v) => v,
        Err(e) => {
            tracing::warn!(%e, channel_id, "Failed to parse calendar events");
            return StatusCode::BAD_REQUEST;
        }
    };

    match booking::sync_calendar(state.backends.bookings.as_ref(), channel_id, &changed.events)
        .await
    {
        Ok(_) => StatusCode::OK,
        Err(e) => {
            tracing::error!(error = %e, channel_id, "Calendar sync failed");
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}
