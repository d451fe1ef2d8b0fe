//! Scheduler-triggered jobs
//!
//! POST /internal/cron/cancellations — run every cancellation due today

use axum::extract::State;
use chrono::Utc;
use shared::error::ApiResponse;

use crate::error::ServiceResult;
use crate::services::cancellation::{self, CancellationRunSummary};
use crate::state::AppState;

pub async fn run_cancellations(
    State(state): State<AppState>,
) -> ServiceResult<ApiResponse<CancellationRunSummary>> {
    let now = Utc::now();
    let summary = cancellation::run_due_cancellations(
        state.backends.plans.as_ref(),
        state.backends.seats.as_ref(),
        state.backends.payments.as_ref(),
        state.local_date(now),
        now,
    )
    .await?;
    Ok(ApiResponse::success(summary))
}
