//! Plan cancellation and knowledge-base maintenance

use axum::Json;
use axum::extract::{Path, State};
use chrono::{NaiveDate, Utc};
use serde::Deserialize;
use shared::error::ApiResponse;

use crate::error::ServiceResult;
use crate::services::cancellation::{self, CancellationPreview};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct CancelRequest {
    /// Last day of service
    pub cancel_on: NaiveDate,
}

/// POST /api/plans/{id}/cancel
pub async fn schedule_cancellation(
    State(state): State<AppState>,
    Path(user_plan_id): Path<i64>,
    Json(req): Json<CancelRequest>,
) -> ServiceResult<ApiResponse<CancellationPreview>> {
    let today = state.local_date(Utc::now());
    let preview = cancellation::schedule_cancellation(
        state.backends.plans.as_ref(),
        user_plan_id,
        req.cancel_on,
        today,
    )
    .await?;
    Ok(ApiResponse::success(preview))
}

/// POST /api/knowledge/refresh — drop the cached knowledge base
pub async fn refresh_knowledge(State(state): State<AppState>) -> ApiResponse<()> {
    state.knowledge_cache.invalidate(&()).await;
    tracing::info!("Knowledge base cache invalidated");
    ApiResponse::ok()
}
