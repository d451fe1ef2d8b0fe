//! Status line used when an [`ErrorCode`] leaves the server

use super::codes::ErrorCode;
use http::StatusCode;

impl ErrorCode {
    /// Codes not listed here are client mistakes and map to 400
    pub fn http_status(&self) -> StatusCode {
        match self {
            Self::Success => StatusCode::OK,

            Self::PlanNotFound
            | Self::UserPlanNotFound
            | Self::SeatNotFound
            | Self::LockerNotFound
            | Self::RoomNotFound
            | Self::BookingNotFound => StatusCode::NOT_FOUND,

            // Taken, already done, or overlapping
            Self::PlanAlreadyCanceled
            | Self::CancellationAlreadyScheduled
            | Self::GroupSlotUnavailable
            | Self::SeatOccupied
            | Self::SeatReserved
            | Self::AlreadySeated
            | Self::LockerOccupied
            | Self::BookingConflict => StatusCode::CONFLICT,

            Self::NotAuthenticated
            | Self::TokenExpired
            | Self::TokenInvalid
            | Self::SignatureInvalid => StatusCode::UNAUTHORIZED,

            Self::NoActivePlan | Self::AuthorizationMissing => StatusCode::PAYMENT_REQUIRED,

            // Stripe said no
            Self::PaymentFailed | Self::CaptureFailed => StatusCode::BAD_GATEWAY,

            Self::InternalError | Self::ConfigError => StatusCode::INTERNAL_SERVER_ERROR,

            _ => StatusCode::BAD_REQUEST,
        }
    }
}
