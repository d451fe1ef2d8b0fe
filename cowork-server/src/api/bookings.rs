//! Meeting-room bookings

use axum::Json;
use axum::extract::State;
use chrono::Utc;
use shared::booking::BookingRequest;
use shared::error::ApiResponse;

use crate::error::ServiceResult;
use crate::services::booking::{self, BookingReceipt};
use crate::state::AppState;

/// POST /api/bookings
pub async fn create_booking(
    State(state): State<AppState>,
    Json(req): Json<BookingRequest>,
) -> ServiceResult<ApiResponse<BookingReceipt>> {
    let receipt = booking::create_booking(
        state.backends.bookings.as_ref(),
        state.backends.plans.as_ref(),
        &state.booking,
        &req,
        Utc::now(),
    )
    .await?;
    Ok(ApiResponse::success(receipt))
}
