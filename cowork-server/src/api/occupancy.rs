//! Live occupancy and locker assignment

use axum::Json;
use axum::extract::{Path, State};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use shared::error::{ApiResponse, AppError, ErrorCode};
use shared::models::{LockerAssignment, OccupancySnapshot, UserPlanStatus};

use crate::error::ServiceResult;
use crate::services::occupancy;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct OccupancyView {
    #[serde(flatten)]
    pub snapshot: OccupancySnapshot,
    pub seats_free: i64,
    pub lockers_free: i64,
}

#[derive(Debug, Deserialize)]
pub struct AssignLockerRequest {
    pub user_plan_id: i64,
}

/// GET /api/occupancy
pub async fn snapshot(State(state): State<AppState>) -> ServiceResult<ApiResponse<OccupancyView>> {
    let snapshot = occupancy::occupancy_snapshot(state.backends.seats.as_ref()).await?;
    Ok(ApiResponse::success(OccupancyView {
        seats_free: snapshot.seats_free(),
        lockers_free: snapshot.lockers_free(),
        snapshot,
    }))
}

/// POST /api/lockers/{id}/assign
pub async fn assign_locker(
    State(state): State<AppState>,
    Path(locker_id): Path<i64>,
    Json(req): Json<AssignLockerRequest>,
) -> ServiceResult<ApiResponse<LockerAssignment>> {
    let user_plan = state
        .backends
        .plans
        .find_user_plan(req.user_plan_id)
        .await?
        .ok_or_else(|| AppError::new(ErrorCode::UserPlanNotFound))?;
    if user_plan.status == UserPlanStatus::Canceled {
        return Err(AppError::new(ErrorCode::PlanAlreadyCanceled).into());
    }

    let assignment = occupancy::assign_locker(
        state.backends.seats.as_ref(),
        locker_id,
        req.user_plan_id,
        Utc::now(),
    )
    .await?;
    Ok(ApiResponse::success(assignment))
}

/// POST /api/lockers/{id}/release
pub async fn release_locker(
    State(state): State<AppState>,
    Path(locker_id): Path<i64>,
) -> ServiceResult<ApiResponse<LockerAssignment>> {
    let assignment =
        occupancy::release_locker(state.backends.seats.as_ref(), locker_id, Utc::now()).await?;
    Ok(ApiResponse::success(assignment))
}
