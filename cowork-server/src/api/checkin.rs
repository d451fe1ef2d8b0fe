//! Front-desk check-in, check-out and QR issuance
//!
//! POST /api/checkin     — scan a QR token at a seat
//! POST /api/checkout    — scan the same visitor's QR on the way out
//! POST /api/qr-tokens   — issue a QR token for a member or an open drop-in pass
//! POST /api/dropins     — authorize a drop-in card and issue a pass token

use axum::Json;
use axum::extract::State;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use shared::error::{ApiResponse, AppError};

use crate::error::ServiceResult;
use crate::services::checkin::{self, CheckInReceipt, CheckOutReceipt, DropInRegistration};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct CheckInRequest {
    pub token: String,
    pub seat_id: i64,
}

#[derive(Debug, Deserialize)]
pub struct CheckOutRequest {
    pub token: String,
}

/// Exactly one of the two subjects
#[derive(Debug, Deserialize)]
pub struct QrTokenRequest {
    pub member_id: Option<i64>,
    pub pass_id: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct DropInRequest {
    /// Stripe customer holding the visitor's card
    pub customer_id: String,
}

#[derive(Debug, Serialize)]
pub struct QrToken {
    pub token: String,
    pub expires_in_secs: i64,
}

pub async fn check_in(
    State(state): State<AppState>,
    Json(req): Json<CheckInRequest>,
) -> ServiceResult<ApiResponse<CheckInReceipt>> {
    let receipt = checkin::check_in(
        state.checkin_deps(),
        &state.checkin,
        &req.token,
        req.seat_id,
        Utc::now(),
    )
    .await?;
    Ok(ApiResponse::success(receipt))
}

pub async fn check_out(
    State(state): State<AppState>,
    Json(req): Json<CheckOutRequest>,
) -> ServiceResult<ApiResponse<CheckOutReceipt>> {
    let receipt =
        checkin::check_out(state.checkin_deps(), &state.checkin, &req.token, Utc::now()).await?;
    Ok(ApiResponse::success(receipt))
}

pub async fn issue_qr_token(
    State(state): State<AppState>,
    Json(req): Json<QrTokenRequest>,
) -> ServiceResult<ApiResponse<QrToken>> {
    let now = Utc::now();
    let token = match (req.member_id, req.pass_id) {
        (Some(member_id), None) => checkin::issue_member_token(&state.checkin, member_id, now)?,
        (None, Some(pass_id)) => {
            checkin::issue_pass_token(state.backends.visits.as_ref(), &state.checkin, pass_id, now)
                .await?
        }
        _ => return Err(AppError::validation("Give either member_id or pass_id").into()),
    };
    Ok(ApiResponse::success(QrToken {
        token,
        expires_in_secs: state.checkin.token_ttl_secs,
    }))
}

pub async fn register_drop_in(
    State(state): State<AppState>,
    Json(req): Json<DropInRequest>,
) -> ServiceResult<ApiResponse<DropInRegistration>> {
    let customer_id = req.customer_id.trim();
    if customer_id.is_empty() {
        return Err(AppError::validation("customer_id is required").into());
    }
    let registration =
        checkin::register_drop_in(state.checkin_deps(), &state.checkin, customer_id, Utc::now())
            .await?;
    Ok(ApiResponse::success(registration))
}
