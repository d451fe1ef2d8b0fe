//! Seats, lockers and who holds them

use crate::error::{AppError, ErrorCode};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SeatKind {
    HotDesk,
    /// Dedicated desk; only the assigned member may sit here
    FixedDesk { member_id: i64 },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Seat {
    pub id: i64,
    pub code: String,
    pub zone: String,
    pub kind: SeatKind,
    pub is_active: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Locker {
    pub id: i64,
    pub code: String,
    pub is_active: bool,
}

/// Who is in the building
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Visitor {
    Member { member_id: i64 },
    DropIn { pass_id: i64 },
}

impl Visitor {
    pub fn kind_db(&self) -> &'static str {
        match self {
            Self::Member { .. } => "member",
            Self::DropIn { .. } => "drop_in",
        }
    }

    pub fn ref_id(&self) -> i64 {
        match self {
            Self::Member { member_id } => *member_id,
            Self::DropIn { pass_id } => *pass_id,
        }
    }

    pub fn from_db(kind: &str, ref_id: i64) -> Option<Self> {
        match kind {
            "member" => Some(Self::Member { member_id: ref_id }),
            "drop_in" => Some(Self::DropIn { pass_id: ref_id }),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeatOccupancy {
    pub id: i64,
    pub seat_id: i64,
    pub visitor: Visitor,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockerAssignment {
    pub id: i64,
    pub locker_id: i64,
    pub user_plan_id: i64,
    pub assigned_at: DateTime<Utc>,
    pub released_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct OccupancySnapshot {
    pub seats_total: i64,
    pub seats_occupied: i64,
    pub lockers_total: i64,
    pub lockers_assigned: i64,
}

impl OccupancySnapshot {
    pub fn seats_free(&self) -> i64 {
        (self.seats_total - self.seats_occupied).max(0)
    }

    pub fn lockers_free(&self) -> i64 {
        (self.lockers_total - self.lockers_assigned).max(0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OccupancyError {
    #[error("seat {0} not found")]
    SeatNotFound(i64),
    #[error("seat {0} is out of service")]
    SeatInactive(i64),
    #[error("seat {0} is occupied")]
    SeatOccupied(i64),
    #[error("seat {0} is reserved for another member")]
    SeatReserved(i64),
    #[error("visitor already holds seat {0}")]
    AlreadySeated(i64),
    #[error("visitor holds no seat")]
    NotSeated,
    #[error("locker {0} not found")]
    LockerNotFound(i64),
    #[error("locker {0} is out of service")]
    LockerInactive(i64),
    #[error("locker {0} is already assigned")]
    LockerOccupied(i64),
    #[error("locker {0} is not assigned")]
    LockerNotAssigned(i64),
}

impl From<OccupancyError> for AppError {
    fn from(err: OccupancyError) -> Self {
        let (code, id) = match err {
            OccupancyError::SeatNotFound(id) => (ErrorCode::SeatNotFound, Some(id)),
            OccupancyError::SeatInactive(id) => (ErrorCode::SeatInactive, Some(id)),
            OccupancyError::SeatOccupied(id) => (ErrorCode::SeatOccupied, Some(id)),
            OccupancyError::SeatReserved(id) => (ErrorCode::SeatReserved, Some(id)),
            OccupancyError::AlreadySeated(id) => (ErrorCode::AlreadySeated, Some(id)),
            OccupancyError::NotSeated => (ErrorCode::NotSeated, None),
            OccupancyError::LockerNotFound(id) => (ErrorCode::LockerNotFound, Some(id)),
            OccupancyError::LockerInactive(id) => (ErrorCode::LockerInactive, Some(id)),
            OccupancyError::LockerOccupied(id) => (ErrorCode::LockerOccupied, Some(id)),
            OccupancyError::LockerNotAssigned(id) => (ErrorCode::LockerNotAssigned, Some(id)),
        };
        let app = AppError::with_message(code, err.to_string());
        match id {
            Some(id) => app.with_detail("id", id),
            None => app,
        }
    }
}

/// Static admission rules for a seat, checked before any occupancy lookup
pub fn check_seat_admission(seat: &Seat, visitor: &Visitor) -> Result<(), OccupancyError> {
    if !seat.is_active {
        return Err(OccupancyError::SeatInactive(seat.id));
    }
    if let SeatKind::FixedDesk { member_id } = seat.kind {
        match visitor {
            Visitor::Member { member_id: m } if *m == member_id => {}
            _ => return Err(OccupancyError::SeatReserved(seat.id)),
        }
    }
    Ok(())
}

pub fn check_locker_admission(locker: &Locker) -> Result<(), OccupancyError> {
    if !locker.is_active {
        return Err(OccupancyError::LockerInactive(locker.id));
    }
    Ok(())
}
