//! Meeting-room booking rules
//!
//! Bookings live on a fixed slot grid in site-local time, must fit inside the
//! opening hours and may not overlap another confirmed booking of the same
//! room. Intervals are half-open: a booking ending at 10:00 does not collide
//! with one starting at 10:00.

mod calendar;

pub use calendar::*;

use crate::billing::money::{div_ceil, to_amount, to_decimal};
use crate::billing::{Amount, TimeWindow};
use crate::error::{AppError, ErrorCode};
use chrono::{DateTime, FixedOffset, NaiveTime, Timelike, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Rooms are priced per started half hour
const PRICE_UNIT_MINUTES: i64 = 30;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Room {
    pub id: i64,
    pub name: String,
    pub capacity: u32,
    pub hourly_price: Amount,
    /// Google Calendar the room mirrors
    pub calendar_id: Option<String>,
    pub is_active: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BookingStatus {
    Confirmed,
    Cancelled,
}

impl BookingStatus {
    pub fn as_db(&self) -> &'static str {
        match self {
            Self::Confirmed => "confirmed",
            Self::Cancelled => "cancelled",
        }
    }

    pub fn from_db(s: &str) -> Option<Self> {
        match s {
            "confirmed" => Some(Self::Confirmed),
            "cancelled" => Some(Self::Cancelled),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Booking {
    pub id: i64,
    pub room_id: i64,
    /// `None` for bookings created directly in the external calendar
    pub member_id: Option<i64>,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub attendees: u32,
    pub status: BookingStatus,
    pub external_event_id: Option<String>,
}

impl Booking {
    pub fn is_confirmed(&self) -> bool {
        self.status == BookingStatus::Confirmed
    }

    pub fn overlaps(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> bool {
        overlaps(self.start, self.end, start, end)
    }
}

/// Half-open interval intersection
pub fn overlaps(
    a_start: DateTime<Utc>,
    a_end: DateTime<Utc>,
    b_start: DateTime<Utc>,
    b_end: DateTime<Utc>,
) -> bool {
    a_start < b_end && b_start < a_end
}

/// Site-wide booking constraints
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookingRules {
    pub slot_minutes: u32,
    pub max_duration_minutes: u32,
    pub opening_hours: TimeWindow,
}

impl Default for BookingRules {
    fn default() -> Self {
        Self {
            slot_minutes: 15,
            max_duration_minutes: 240,
            opening_hours: TimeWindow {
                start: NaiveTime::from_hms_opt(8, 0, 0).unwrap_or(NaiveTime::MIN),
                end: NaiveTime::from_hms_opt(22, 0, 0).unwrap_or(NaiveTime::MIN),
            },
        }
    }
}

/// A booking as requested by a member
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookingRequest {
    pub room_id: i64,
    pub member_id: i64,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub attendees: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BookingError {
    #[error("room {0} not found")]
    RoomNotFound(i64),

    #[error("booking {0} not found")]
    NotFound(i64),

    #[error("booking must end after it starts")]
    InvalidTime,

    #[error("booking must start and end on a {slot_minutes}-minute boundary")]
    Misaligned { slot_minutes: u32 },

    #[error("booking is outside opening hours")]
    OutsideHours,

    #[error("booking of {minutes} minutes exceeds the {max_minutes}-minute limit")]
    TooLong { minutes: i64, max_minutes: u32 },

    #[error("{attendees} attendees exceed capacity {capacity}")]
    CapacityExceeded { attendees: u32, capacity: u32 },

    #[error("overlaps booking {booking_id}")]
    Conflict { booking_id: i64 },
}

impl From<BookingError> for AppError {
    fn from(err: BookingError) -> Self {
        let code = match err {
            BookingError::RoomNotFound(_) => ErrorCode::RoomNotFound,
            BookingError::NotFound(_) => ErrorCode::BookingNotFound,
            BookingError::InvalidTime => ErrorCode::BookingInvalidTime,
            BookingError::Misaligned { .. } => ErrorCode::BookingMisaligned,
            BookingError::OutsideHours => ErrorCode::BookingOutsideHours,
            BookingError::TooLong { .. } => ErrorCode::BookingTooLong,
            BookingError::CapacityExceeded { .. } => ErrorCode::BookingCapacityExceeded,
            BookingError::Conflict { .. } => ErrorCode::BookingConflict,
        };
        let app = AppError::with_message(code, err.to_string());
        match err {
            BookingError::Conflict { booking_id } => app.with_detail("booking_id", booking_id),
            _ => app,
        }
    }
}

fn is_aligned(time: NaiveTime, slot_minutes: u32) -> bool {
    time.nanosecond() == 0 && time.num_seconds_from_midnight() % (slot_minutes * 60) == 0
}

/// Validate a booking window against the room, the site rules and the room's
/// existing bookings. `exclude_id` skips the booking being rescheduled.
pub fn validate_booking(
    room: &Room,
    request: &BookingRequest,
    rules: &BookingRules,
    offset: FixedOffset,
    existing: &[Booking],
    exclude_id: Option<i64>,
) -> Result<(), BookingError> {
    if !room.is_active {
        return Err(BookingError::RoomNotFound(room.id));
    }
    if request.start >= request.end {
        return Err(BookingError::InvalidTime);
    }

    let local_start = request.start.with_timezone(&offset).naive_local();
    let local_end = request.end.with_timezone(&offset).naive_local();

    let slot = rules.slot_minutes.max(1);
    if !is_aligned(local_start.time(), slot) || !is_aligned(local_end.time(), slot) {
        return Err(BookingError::Misaligned { slot_minutes: slot });
    }

    if local_start.date() != local_end.date()
        || local_start.time() < rules.opening_hours.start
        || local_end.time() > rules.opening_hours.end
    {
        return Err(BookingError::OutsideHours);
    }

    let minutes = (request.end - request.start).num_minutes();
    if minutes > i64::from(rules.max_duration_minutes) {
        return Err(BookingError::TooLong {
            minutes,
            max_minutes: rules.max_duration_minutes,
        });
    }

    if request.attendees > room.capacity {
        return Err(BookingError::CapacityExceeded {
            attendees: request.attendees,
            capacity: room.capacity,
        });
    }

    if let Some(clash) = existing.iter().find(|b| {
        b.room_id == room.id
            && b.is_confirmed()
            && Some(b.id) != exclude_id
            && b.overlaps(request.start, request.end)
    }) {
        return Err(BookingError::Conflict {
            booking_id: clash.id,
        });
    }

    Ok(())
}

/// Room charge: `hourly_price / 2` per started half hour, minus the member
/// discount, truncated.
pub fn booking_price(
    room: &Room,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    member_discount_percent: Decimal,
) -> Amount {
    let seconds = (end - start).num_seconds().max(0);
    let units = div_ceil(div_ceil(seconds, 60), PRICE_UNIT_MINUTES);
    let discount = member_discount_percent.clamp(Decimal::ZERO, Decimal::ONE_HUNDRED);
    let gross = to_decimal(room.hourly_price) * Decimal::from(units) / Decimal::TWO;
    to_amount(gross * (Decimal::ONE_HUNDRED - discount) / Decimal::ONE_HUNDRED)
}
