//! Seat and locker occupancy
//!
//! Optimistic check-then-insert: the rules are checked against the current
//! rows, then the insert relies on the partial unique indexes. An insert that
//! loses a race surfaces as the same error the pre-check would have raised.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use shared::models::{
    Locker, LockerAssignment, OccupancyError, OccupancySnapshot, Seat, SeatOccupancy, Visitor,
    check_locker_admission, check_seat_admission,
};
use shared::util::snowflake_id;

use crate::db::InsertOutcome;
use crate::error::{BoxError, ServiceResult};

#[async_trait]
pub trait OccupancyStore: Send + Sync {
    async fn find_seat(&self, seat_id: i64) -> Result<Option<Seat>, BoxError>;
    async fn open_occupancy_for_seat(&self, seat_id: i64)
    -> Result<Option<SeatOccupancy>, BoxError>;
    async fn open_occupancy_for_visitor(
        &self,
        visitor: &Visitor,
    ) -> Result<Option<SeatOccupancy>, BoxError>;
    async fn insert_occupancy(&self, occupancy: &SeatOccupancy) -> Result<InsertOutcome, BoxError>;
    /// Returns false when the occupancy was already closed
    async fn end_occupancy(&self, occupancy_id: i64, ended_at: DateTime<Utc>)
    -> Result<bool, BoxError>;

    async fn find_locker(&self, locker_id: i64) -> Result<Option<Locker>, BoxError>;
    async fn open_assignment_for_locker(
        &self,
        locker_id: i64,
    ) -> Result<Option<LockerAssignment>, BoxError>;
    async fn open_assignments_for_plan(
        &self,
        user_plan_id: i64,
    ) -> Result<Vec<LockerAssignment>, BoxError>;
    async fn insert_assignment(&self, assignment: &LockerAssignment)
    -> Result<InsertOutcome, BoxError>;
    async fn end_assignment(&self, assignment_id: i64, released_at: DateTime<Utc>)
    -> Result<bool, BoxError>;

    async fn snapshot(&self) -> Result<OccupancySnapshot, BoxError>;
}

/// Seat `visitor` at `seat_id`
pub async fn occupy_seat(
    store: &dyn OccupancyStore,
    seat_id: i64,
    visitor: Visitor,
    now: DateTime<Utc>,
) -> ServiceResult<SeatOccupancy> {
    let seat = store
        .find_seat(seat_id)
        .await?
        .ok_or(OccupancyError::SeatNotFound(seat_id))?;
    check_seat_admission(&seat, &visitor)?;

    if let Some(current) = store.open_occupancy_for_visitor(&visitor).await? {
        return Err(OccupancyError::AlreadySeated(current.seat_id).into());
    }
    if store.open_occupancy_for_seat(seat_id).await?.is_some() {
        return Err(OccupancyError::SeatOccupied(seat_id).into());
    }

    let occupancy = SeatOccupancy {
        id: snowflake_id(),
        seat_id,
        visitor,
        started_at: now,
        ended_at: None,
    };
    match store.insert_occupancy(&occupancy).await? {
        InsertOutcome::Inserted => {
            tracing::info!(seat_id, visitor = ?visitor, "Seat occupied");
            Ok(occupancy)
        }
        InsertOutcome::Conflict => {
            tracing::warn!(seat_id, visitor = ?visitor, "Seat taken concurrently");
            Err(OccupancyError::SeatOccupied(seat_id).into())
        }
    }
}

/// Close the visitor's open occupancy
pub async fn release_seat(
    store: &dyn OccupancyStore,
    visitor: &Visitor,
    now: DateTime<Utc>,
) -> ServiceResult<SeatOccupancy> {
    let mut occupancy = store
        .open_occupancy_for_visitor(visitor)
        .await?
        .ok_or(OccupancyError::NotSeated)?;
    if !store.end_occupancy(occupancy.id, now).await? {
        return Err(OccupancyError::NotSeated.into());
    }
    occupancy.ended_at = Some(now);
    tracing::info!(seat_id = occupancy.seat_id, visitor = ?visitor, "Seat released");
    Ok(occupancy)
}

pub async fn assign_locker(
    store: &dyn OccupancyStore,
    locker_id: i64,
    user_plan_id: i64,
    now: DateTime<Utc>,
) -> ServiceResult<LockerAssignment> {
    let locker = store
        .find_locker(locker_id)
        .await?
        .ok_or(OccupancyError::LockerNotFound(locker_id))?;
    check_locker_admission(&locker)?;

    if store.open_assignment_for_locker(locker_id).await?.is_some() {
        return Err(OccupancyError::LockerOccupied(locker_id).into());
    }

    let assignment = LockerAssignment {
        id: snowflake_id(),
        locker_id,
        user_plan_id,
        assigned_at: now,
        released_at: None,
    };
    match store.insert_assignment(&assignment).await? {
        InsertOutcome::Inserted => {
            tracing::info!(locker_id, user_plan_id, "Locker assigned");
            Ok(assignment)
        }
        InsertOutcome::Conflict => Err(OccupancyError::LockerOccupied(locker_id).into()),
    }
}

pub async fn release_locker(
    store: &dyn OccupancyStore,
    locker_id: i64,
    now: DateTime<Utc>,
) -> ServiceResult<LockerAssignment> {
    let mut assignment = store
        .open_assignment_for_locker(locker_id)
        .await?
        .ok_or(OccupancyError::LockerNotAssigned(locker_id))?;
    if !store.end_assignment(assignment.id, now).await? {
        return Err(OccupancyError::LockerNotAssigned(locker_id).into());
    }
    assignment.released_at = Some(now);
    tracing::info!(locker_id, user_plan_id = assignment.user_plan_id, "Locker released");
    Ok(assignment)
}

/// Release every locker held by a user plan. Returns how many were released.
pub async fn release_plan_lockers(
    store: &dyn OccupancyStore,
    user_plan_id: i64,
    now: DateTime<Utc>,
) -> ServiceResult<usize> {
    let mut released = 0;
    for assignment in store.open_assignments_for_plan(user_plan_id).await? {
        if store.end_assignment(assignment.id, now).await? {
            released += 1;
        }
    }
    Ok(released)
}

pub async fn occupancy_snapshot(store: &dyn OccupancyStore) -> ServiceResult<OccupancySnapshot> {
    Ok(store.snapshot().await?)
}
