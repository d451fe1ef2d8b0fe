use super::codes::ErrorCode;
use serde::{Deserialize, Serialize};

/// Domain an [`ErrorCode`] belongs to, taken from its thousands digit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    General,
    Auth,
    Membership,
    Billing,
    Payment,
    /// Seats and lockers
    Occupancy,
    /// Meeting rooms
    Booking,
    System,
}

impl ErrorCategory {
    /// Anything at 9000 or above counts as a system error; unused ranges
    /// fall back to general
    pub fn from_code(code: u16) -> Self {
        match code / 1000 {
            1 => Self::Auth,
            3 => Self::Membership,
            4 => Self::Billing,
            5 => Self::Payment,
            6 => Self::Occupancy,
            7 => Self::Booking,
            9.. => Self::System,
            _ => Self::General,
        }
    }
}

impl ErrorCode {
    pub fn category(&self) -> ErrorCategory {
        ErrorCategory::from_code(self.code())
    }
}
