//! Seats, lockers and their open occupancies

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use shared::models::{
    Locker, LockerAssignment, OccupancySnapshot, Seat, SeatKind, SeatOccupancy, Visitor,
};
use sqlx::PgPool;

use super::{InsertOutcome, PgStore};
use crate::error::BoxError;
use crate::services::occupancy::OccupancyStore;

#[derive(sqlx::FromRow)]
struct SeatRow {
    id: i64,
    code: String,
    zone: String,
    fixed_member_id: Option<i64>,
    is_active: bool,
}

impl From<SeatRow> for Seat {
    fn from(row: SeatRow) -> Self {
        Seat {
            id: row.id,
            code: row.code,
            zone: row.zone,
            kind: match row.fixed_member_id {
                Some(member_id) => SeatKind::FixedDesk { member_id },
                None => SeatKind::HotDesk,
            },
            is_active: row.is_active,
        }
    }
}

#[derive(sqlx::FromRow)]
struct OccupancyRow {
    id: i64,
    seat_id: i64,
    visitor_kind: String,
    visitor_ref: i64,
    started_at: DateTime<Utc>,
    ended_at: Option<DateTime<Utc>>,
}

impl TryFrom<OccupancyRow> for SeatOccupancy {
    type Error = BoxError;

    fn try_from(row: OccupancyRow) -> Result<Self, Self::Error> {
        let visitor = Visitor::from_db(&row.visitor_kind, row.visitor_ref)
            .ok_or_else(|| format!("unknown visitor kind: {}", row.visitor_kind))?;
        Ok(SeatOccupancy {
            id: row.id,
            seat_id: row.seat_id,
            visitor,
            started_at: row.started_at,
            ended_at: row.ended_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct LockerRow {
    id: i64,
    code: String,
    is_active: bool,
}

#[derive(sqlx::FromRow)]
struct AssignmentRow {
    id: i64,
    locker_id: i64,
    user_plan_id: i64,
    assigned_at: DateTime<Utc>,
    released_at: Option<DateTime<Utc>>,
}

impl From<AssignmentRow> for LockerAssignment {
    fn from(row: AssignmentRow) -> Self {
        LockerAssignment {
            id: row.id,
            locker_id: row.locker_id,
            user_plan_id: row.user_plan_id,
            assigned_at: row.assigned_at,
            released_at: row.released_at,
        }
    }
}

const OCCUPANCY_COLUMNS: &str = "id, seat_id, visitor_kind, visitor_ref, started_at, ended_at";
const ASSIGNMENT_COLUMNS: &str = "id, locker_id, user_plan_id, assigned_at, released_at";

pub async fn find_seat(pool: &PgPool, seat_id: i64) -> Result<Option<Seat>, sqlx::Error> {
    let row: Option<SeatRow> = sqlx::query_as(
        "SELECT id, code, zone, fixed_member_id, is_active FROM seats WHERE id = $1",
    )
    .bind(seat_id)
    .fetch_optional(pool)
    .await?;
    Ok(row.map(Seat::from))
}

pub async fn open_occupancy_for_seat(
    pool: &PgPool,
    seat_id: i64,
) -> Result<Option<SeatOccupancy>, BoxError> {
    let row: Option<OccupancyRow> = sqlx::query_as(&format!(
        "SELECT {OCCUPANCY_COLUMNS} FROM seat_occupancies WHERE seat_id = $1 AND ended_at IS NULL"
    ))
    .bind(seat_id)
    .fetch_optional(pool)
    .await?;
    row.map(SeatOccupancy::try_from).transpose()
}

pub async fn open_occupancy_for_visitor(
    pool: &PgPool,
    visitor: &Visitor,
) -> Result<Option<SeatOccupancy>, BoxError> {
    let row: Option<OccupancyRow> = sqlx::query_as(&format!(
        "SELECT {OCCUPANCY_COLUMNS} FROM seat_occupancies
         WHERE visitor_kind = $1 AND visitor_ref = $2 AND ended_at IS NULL"
    ))
    .bind(visitor.kind_db())
    .bind(visitor.ref_id())
    .fetch_optional(pool)
    .await?;
    row.map(SeatOccupancy::try_from).transpose()
}

pub async fn insert_occupancy(
    pool: &PgPool,
    occupancy: &SeatOccupancy,
) -> Result<InsertOutcome, sqlx::Error> {
    let result = sqlx::query(
        "INSERT INTO seat_occupancies (id, seat_id, visitor_kind, visitor_ref, started_at)
         VALUES ($1, $2, $3, $4, $5)",
    )
    .bind(occupancy.id)
    .bind(occupancy.seat_id)
    .bind(occupancy.visitor.kind_db())
    .bind(occupancy.visitor.ref_id())
    .bind(occupancy.started_at)
    .execute(pool)
    .await;
    InsertOutcome::from_result(result)
}

pub async fn end_occupancy(
    pool: &PgPool,
    occupancy_id: i64,
    ended_at: DateTime<Utc>,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        "UPDATE seat_occupancies SET ended_at = $2 WHERE id = $1 AND ended_at IS NULL",
    )
    .bind(occupancy_id)
    .bind(ended_at)
    .execute(pool)
    .await?;
    Ok(result.rows_affected() == 1)
}

pub async fn find_locker(pool: &PgPool, locker_id: i64) -> Result<Option<Locker>, sqlx::Error> {
    let row: Option<LockerRow> =
        sqlx::query_as("SELECT id, code, is_active FROM lockers WHERE id = $1")
            .bind(locker_id)
            .fetch_optional(pool)
            .await?;
    Ok(row.map(|r| Locker {
        id: r.id,
        code: r.code,
        is_active: r.is_active,
    }))
}

pub async fn open_assignment_for_locker(
    pool: &PgPool,
    locker_id: i64,
) -> Result<Option<LockerAssignment>, sqlx::Error> {
    let row: Option<AssignmentRow> = sqlx::query_as(&format!(
        "SELECT {ASSIGNMENT_COLUMNS} FROM locker_assignments
         WHERE locker_id = $1 AND released_at IS NULL"
    ))
    .bind(locker_id)
    .fetch_optional(pool)
    .await?;
    Ok(row.map(LockerAssignment::from))
}

pub async fn open_assignments_for_plan(
    pool: &PgPool,
    user_plan_id: i64,
) -> Result<Vec<LockerAssignment>, sqlx::Error> {
    let rows: Vec<AssignmentRow> = sqlx::query_as(&format!(
        "SELECT {ASSIGNMENT_COLUMNS} FROM locker_assignments
         WHERE user_plan_id = $1 AND released_at IS NULL ORDER BY assigned_at"
    ))
    .bind(user_plan_id)
    .fetch_all(pool)
    .await?;
    Ok(rows.into_iter().map(LockerAssignment::from).collect())
}

pub async fn insert_assignment(
    pool: &PgPool,
    assignment: &LockerAssignment,
) -> Result<InsertOutcome, sqlx::Error> {
    let result = sqlx::query(
        "INSERT INTO locker_assignments (id, locker_id, user_plan_id, assigned_at)
         VALUES ($1, $2, $3, $4)",
    )
    .bind(assignment.id)
    .bind(assignment.locker_id)
    .bind(assignment.user_plan_id)
    .bind(assignment.assigned_at)
    .execute(pool)
    .await;
    InsertOutcome::from_result(result)
}

pub async fn end_assignment(
    pool: &PgPool,
    assignment_id: i64,
    released_at: DateTime<Utc>,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        "UPDATE locker_assignments SET released_at = $2 WHERE id = $1 AND released_at IS NULL",
    )
    .bind(assignment_id)
    .bind(released_at)
    .execute(pool)
    .await?;
    Ok(result.rows_affected() == 1)
}

pub async fn snapshot(pool: &PgPool) -> Result<OccupancySnapshot, sqlx::Error> {
    let (seats_total, seats_occupied, lockers_total, lockers_assigned): (i64, i64, i64, i64) =
        sqlx::query_as(
            "SELECT
                (SELECT count(*) FROM seats WHERE is_active),
                (SELECT count(*) FROM seat_occupancies WHERE ended_at IS NULL),
                (SELECT count(*) FROM lockers WHERE is_active),
                (SELECT count(*) FROM locker_assignments WHERE released_at IS NULL)",
        )
        .fetch_one(pool)
        .await?;
    Ok(OccupancySnapshot {
        seats_total,
        seats_occupied,
        lockers_total,
        lockers_assigned,
    })
}

#[async_trait]
impl OccupancyStore for PgStore {
    async fn find_seat(&self, seat_id: i64) -> Result<Option<Seat>, BoxError> {
        Ok(find_seat(&self.pool, seat_id).await?)
    }

    async fn open_occupancy_for_seat(
        &self,
        seat_id: i64,
    ) -> Result<Option<SeatOccupancy>, BoxError> {
        open_occupancy_for_seat(&self.pool, seat_id).await
    }

    async fn open_occupancy_for_visitor(
        &self,
        visitor: &Visitor,
    ) -> Result<Option<SeatOccupancy>, BoxError> {
        open_occupancy_for_visitor(&self.pool, visitor).await
    }

    async fn insert_occupancy(&self, occupancy: &SeatOccupancy) -> Result<InsertOutcome, BoxError> {
        Ok(insert_occupancy(&self.pool, occupancy).await?)
    }

    async fn end_occupancy(
        &self,
        occupancy_id: i64,
        ended_at: DateTime<Utc>,
    ) -> Result<bool, BoxError> {
        Ok(end_occupancy(&self.pool, occupancy_id, ended_at).await?)
    }

    async fn find_locker(&self, locker_id: i64) -> Result<Option<Locker>, BoxError> {
        Ok(find_locker(&self.pool, locker_id).await?)
    }

    async fn open_assignment_for_locker(
        &self,
        locker_id: i64,
    ) -> Result<Option<LockerAssignment>, BoxError> {
        Ok(open_assignment_for_locker(&self.pool, locker_id).await?)
    }

    async fn open_assignments_for_plan(
        &self,
        user_plan_id: i64,
    ) -> Result<Vec<LockerAssignment>, BoxError> {
        Ok(open_assignments_for_plan(&self.pool, user_plan_id).await?)
    }

    async fn insert_assignment(
        &self,
        assignment: &LockerAssignment,
    ) -> Result<InsertOutcome, BoxError> {
        Ok(insert_assignment(&self.pool, assignment).await?)
    }

    async fn end_assignment(
        &self,
        assignment_id: i64,
        released_at: DateTime<Utc>,
    ) -> Result<bool, BoxError> {
        Ok(end_assignment(&self.pool, assignment_id, released_at).await?)
    }

    async fn snapshot(&self) -> Result<OccupancySnapshot, BoxError> {
        Ok(snapshot(&self.pool).await?)
    }
}
