//! Unified error codes for the coworking platform
//!
//! Error codes are organized by category:
//! - 0xxx: General errors
//! - 1xxx: Authentication errors (QR tokens, signatures)
//! - 3xxx: Membership / plan errors
//! - 4xxx: Billing arithmetic errors
//! - 5xxx: Payment errors
//! - 6xxx: Occupancy errors (seats, lockers)
//! - 7xxx: Meeting-room booking errors
//! - 9xxx: System errors

use serde::{Deserialize, Serialize};
use std::fmt;

/// Unified error code enum
///
/// All error codes are represented as u16 values on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "u16", try_from = "u16")]
#[repr(u16)]
pub enum ErrorCode {
    // ==================== 0xxx: General ====================
    /// Operation completed successfully
    Success = 0,
    /// Validation failed
    ValidationFailed = 2,

    // ==================== 1xxx: Auth ====================
    /// Caller is not authenticated
    NotAuthenticated = 1001,
    /// Token has expired
    TokenExpired = 1003,
    /// Token is invalid or malformed
    TokenInvalid = 1004,
    /// Request signature did not verify
    SignatureInvalid = 1005,

    // ==================== 3xxx: Membership ====================
    /// Plan not found
    PlanNotFound = 3002,
    /// User plan not found
    UserPlanNotFound = 3003,
    /// Member has no billable plan
    NoActivePlan = 3004,
    /// User plan is already canceled
    PlanAlreadyCanceled = 3005,
    /// A cancellation is already scheduled
    CancellationAlreadyScheduled = 3006,
    /// Cancellation date is not allowed
    CancellationDateInvalid = 3007,
    /// Group slot tiers are inconsistent
    GroupTierInvalid = 3008,
    /// No free slot left in the group
    GroupSlotUnavailable = 3009,
    /// Slot number outside the group's capacity
    GroupSlotOutOfRange = 3010,

    // ==================== 4xxx: Billing ====================
    /// Date range is inverted
    InvalidDateRange = 4001,
    /// Rate configuration is invalid
    InvalidRate = 4002,
    /// Billing period is empty or inverted
    InvalidBillingPeriod = 4003,

    // ==================== 5xxx: Payment ====================
    /// Payment processing failed
    PaymentFailed = 5001,
    /// No authorization hold exists for the visit
    AuthorizationMissing = 5002,
    /// Capturing the authorization failed
    CaptureFailed = 5003,

    // ==================== 6xxx: Occupancy ====================
    /// Seat not found
    SeatNotFound = 6001,
    /// Seat is out of service
    SeatInactive = 6002,
    /// Seat is occupied
    SeatOccupied = 6003,
    /// Seat is a fixed desk assigned to another member
    SeatReserved = 6004,
    /// Visitor already holds a seat
    AlreadySeated = 6005,
    /// Visitor holds no seat
    NotSeated = 6006,
    /// Locker not found
    LockerNotFound = 6101,
    /// Locker is out of service
    LockerInactive = 6102,
    /// Locker is already assigned
    LockerOccupied = 6103,
    /// Locker is not assigned
    LockerNotAssigned = 6104,

    // ==================== 7xxx: Booking ====================
    /// Meeting room not found
    RoomNotFound = 7001,
    /// Booking overlaps an existing booking
    BookingConflict = 7002,
    /// Booking is outside opening hours
    BookingOutsideHours = 7003,
    /// Booking is not aligned to the slot grid
    BookingMisaligned = 7004,
    /// Booking exceeds the maximum duration
    BookingTooLong = 7005,
    /// Attendees exceed room capacity
    BookingCapacityExceeded = 7006,
    /// Booking start is not before its end
    BookingInvalidTime = 7007,
    /// Booking not found
    BookingNotFound = 7008,

    // ==================== 9xxx: System ====================
    /// Internal server error
    InternalError = 9001,
    /// Configuration error
    ConfigError = 9005,
}

impl ErrorCode {
    /// Get the numeric code value
    #[inline]
    pub const fn code(&self) -> u16 {
        *self as u16
    }

    /// Check if this is a success code
    #[inline]
    pub const fn is_success(&self) -> bool {
        matches!(self, ErrorCode::Success)
    }

    /// Get the developer-facing English message for this error code
    pub const fn message(&self) -> &'static str {
        match self {
            // General
            ErrorCode::Success => "Operation completed successfully",
            ErrorCode::ValidationFailed => "Validation failed",

            // Auth
            ErrorCode::NotAuthenticated => "Caller is not authenticated",
            ErrorCode::TokenExpired => "Token has expired",
            ErrorCode::TokenInvalid => "Token is invalid",
            ErrorCode::SignatureInvalid => "Signature verification failed",

            // Membership
            ErrorCode::PlanNotFound => "Plan not found",
            ErrorCode::UserPlanNotFound => "User plan not found",
            ErrorCode::NoActivePlan => "Member has no active plan",
            ErrorCode::PlanAlreadyCanceled => "Plan is already canceled",
            ErrorCode::CancellationAlreadyScheduled => "A cancellation is already scheduled",
            ErrorCode::CancellationDateInvalid => "Cancellation date is not allowed",
            ErrorCode::GroupTierInvalid => "Group slot tiers are invalid",
            ErrorCode::GroupSlotUnavailable => "No free slot left in the group",
            ErrorCode::GroupSlotOutOfRange => "Slot number is outside the group capacity",

            // Billing
            ErrorCode::InvalidDateRange => "Date range is invalid",
            ErrorCode::InvalidRate => "Rate configuration is invalid",
            ErrorCode::InvalidBillingPeriod => "Billing period is invalid",

            // Payment
            ErrorCode::PaymentFailed => "Payment processing failed",
            ErrorCode::AuthorizationMissing => "No payment authorization for this visit",
            ErrorCode::CaptureFailed => "Capturing the payment authorization failed",

            // Occupancy
            ErrorCode::SeatNotFound => "Seat not found",
            ErrorCode::SeatInactive => "Seat is out of service",
            ErrorCode::SeatOccupied => "Seat is occupied",
            ErrorCode::SeatReserved => "Seat is reserved for another member",
            ErrorCode::AlreadySeated => "Visitor already holds a seat",
            ErrorCode::NotSeated => "Visitor does not hold a seat",
            ErrorCode::LockerNotFound => "Locker not found",
            ErrorCode::LockerInactive => "Locker is out of service",
            ErrorCode::LockerOccupied => "Locker is already assigned",
            ErrorCode::LockerNotAssigned => "Locker is not assigned",

            // Booking
            ErrorCode::RoomNotFound => "Meeting room not found",
            ErrorCode::BookingConflict => "Booking overlaps an existing booking",
            ErrorCode::BookingOutsideHours => "Booking is outside opening hours",
            ErrorCode::BookingMisaligned => "Booking must start and end on a slot boundary",
            ErrorCode::BookingTooLong => "Booking exceeds the maximum duration",
            ErrorCode::BookingCapacityExceeded => "Attendees exceed room capacity",
            ErrorCode::BookingInvalidTime => "Booking must end after it starts",
            ErrorCode::BookingNotFound => "Booking not found",

            // System
            ErrorCode::InternalError => "Internal server error",
            ErrorCode::ConfigError => "Configuration error",
        }
    }
}

impl From<ErrorCode> for u16 {
    #[inline]
    fn from(code: ErrorCode) -> Self {
        code.code()
    }
}

/// Error when converting from an invalid u16 to ErrorCode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InvalidErrorCode(pub u16);

impl fmt::Display for InvalidErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid error code: {}", self.0)
    }
}

impl std::error::Error for InvalidErrorCode {}

impl TryFrom<u16> for ErrorCode {
    type Error = InvalidErrorCode;

    fn try_from(value: u16) -> Result<Self, Self::Error> {
        match value {
            // General
            0 => Ok(ErrorCode::Success),
            2 => Ok(ErrorCode::ValidationFailed),

            // Auth
            1001 => Ok(ErrorCode::NotAuthenticated),
            1003 => Ok(ErrorCode::TokenExpired),
            1004 => Ok(ErrorCode::TokenInvalid),
            1005 => Ok(ErrorCode::SignatureInvalid),

            // Membership
            3002 => Ok(ErrorCode::PlanNotFound),
            3003 => Ok(ErrorCode::UserPlanNotFound),
            3004 => Ok(ErrorCode::NoActivePlan),
            3005 => Ok(ErrorCode::PlanAlreadyCanceled),
            3006 => Ok(ErrorCode::CancellationAlreadyScheduled),
            3007 => Ok(ErrorCode::CancellationDateInvalid),
            3008 => Ok(ErrorCode::GroupTierInvalid),
            3009 => Ok(ErrorCode::GroupSlotUnavailable),
            3010 => Ok(ErrorCode::GroupSlotOutOfRange),

            // Billing
            4001 => Ok(ErrorCode::InvalidDateRange),
            4002 => Ok(ErrorCode::InvalidRate),
            4003 => Ok(ErrorCode::InvalidBillingPeriod),

            // Payment
            5001 => Ok(ErrorCode::PaymentFailed),
            5002 => Ok(ErrorCode::AuthorizationMissing),
            5003 => Ok(ErrorCode::CaptureFailed),

            // Occupancy
            6001 => Ok(ErrorCode::SeatNotFound),
            6002 => Ok(ErrorCode::SeatInactive),
            6003 => Ok(ErrorCode::SeatOccupied),
            6004 => Ok(ErrorCode::SeatReserved),
            6005 => Ok(ErrorCode::AlreadySeated),
            6006 => Ok(ErrorCode::NotSeated),
            6101 => Ok(ErrorCode::LockerNotFound),
            6102 => Ok(ErrorCode::LockerInactive),
            6103 => Ok(ErrorCode::LockerOccupied),
            6104 => Ok(ErrorCode::LockerNotAssigned),

            // Booking
            7001 => Ok(ErrorCode::RoomNotFound),
            7002 => Ok(ErrorCode::BookingConflict),
            7003 => Ok(ErrorCode::BookingOutsideHours),
            7004 => Ok(ErrorCode::BookingMisaligned),
            7005 => Ok(ErrorCode::BookingTooLong),
            7006 => Ok(ErrorCode::BookingCapacityExceeded),
            7007 => Ok(ErrorCode::BookingInvalidTime),
            7008 => Ok(ErrorCode::BookingNotFound),

            // System
            9001 => Ok(ErrorCode::InternalError),
            9005 => Ok(ErrorCode::ConfigError),

            _ => Err(InvalidErrorCode(value)),
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_code_values() {
        assert_eq!(ErrorCode::Success.code(), 0);
        assert_eq!(ErrorCode::TokenExpired.code(), 1003);
        assert_eq!(ErrorCode::GroupTierInvalid.code(), 3008);
        assert_eq!(ErrorCode::InvalidDateRange.code(), 4001);
        assert_eq!(ErrorCode::CaptureFailed.code(), 5003);
        assert_eq!(ErrorCode::SeatOccupied.code(), 6003);
        assert_eq!(ErrorCode::LockerOccupied.code(), 6103);
        assert_eq!(ErrorCode::BookingConflict.code(), 7002);
        assert_eq!(ErrorCode::InternalError.code(), 9001);
    }

    #[test]
    fn test_try_from_roundtrip_for_every_code() {
        let all = [
            ErrorCode::Success,
            ErrorCode::SignatureInvalid,
            ErrorCode::NoActivePlan,
            ErrorCode::GroupSlotOutOfRange,
            ErrorCode::InvalidBillingPeriod,
            ErrorCode::AuthorizationMissing,
            ErrorCode::NotSeated,
            ErrorCode::LockerNotAssigned,
            ErrorCode::BookingNotFound,
            ErrorCode::InternalError,
            ErrorCode::ConfigError,
        ];
        for code in all {
            assert_eq!(ErrorCode::try_from(code.code()), Ok(code));
        }
    }

    #[test]
    fn test_invalid_code() {
        assert_eq!(ErrorCode::try_from(4242), Err(InvalidErrorCode(4242)));
        // Unassigned slots inside a used range
        assert!(ErrorCode::try_from(2001).is_err());
        assert!(ErrorCode::try_from(9002).is_err());
        assert_eq!(
            InvalidErrorCode(4242).to_string(),
            "invalid error code: 4242"
        );
    }

    #[test]
    fn test_serde_as_number() {
        let json = serde_json::to_string(&ErrorCode::SeatOccupied).unwrap();
        assert_eq!(json, "6003");
        let code: ErrorCode = serde_json::from_str("7002").unwrap();
        assert_eq!(code, ErrorCode::BookingConflict);
        assert!(serde_json::from_str::<ErrorCode>("12345").is_err());
    }
}
