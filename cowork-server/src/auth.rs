//! Bearer-token guards for staff and cron routes

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};
use shared::error::{AppError, ErrorCode};
use shared::util::secure_eq;

use crate::state::AppState;

fn bearer_token(request: &Request) -> Option<&str> {
    request
        .headers()
        .get("Authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
}

fn check_bearer(request: &Request, expected: &str) -> Result<(), Response> {
    let token = bearer_token(request).ok_or_else(|| {
        AppError::with_message(ErrorCode::NotAuthenticated, "Missing bearer token").into_response()
    })?;
    if expected.is_empty() || !secure_eq(token.as_bytes(), expected.as_bytes()) {
        tracing::warn!(path = %request.uri().path(), "Rejected bearer token");
        return Err(AppError::new(ErrorCode::TokenInvalid).into_response());
    }
    Ok(())
}

/// Guards the staff-facing `/api/*` routes
pub async fn staff_auth_middleware(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, Response> {
    check_bearer(&request, &state.staff_api_token)?;
    Ok(next.run(request).await)
}

/// Guards `/internal/cron/*`, called by the platform scheduler
pub async fn cron_auth_middleware(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, Response> {
    check_bearer(&request, &state.cron_secret)?;
    Ok(next.run(request).await)
}
