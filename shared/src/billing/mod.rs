//! Billing rules
//!
//! Pure, deterministic fee arithmetic. All amounts are integer minor units of
//! the site currency (JPY has no minor unit, so one unit is one yen).
//! Intermediate math runs on `rust_decimal`; fractional results are truncated
//! toward zero so a customer is never charged a partial unit.

mod campaign;
mod cancellation;
mod dropin;
mod group;
pub(crate) mod money;
mod overtime;
mod proration;

pub use campaign::*;
pub use cancellation::*;
pub use dropin::*;
pub use group::*;
pub use money::Amount;
pub use overtime::*;
pub use proration::*;

use crate::error::{AppError, ErrorCode};
use chrono::NaiveDate;
use thiserror::Error;

/// Errors raised by the billing arithmetic
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BillingError {
    #[error("date range is inverted: {start} > {end}")]
    InvalidDateRange { start: NaiveDate, end: NaiveDate },

    #[error("invalid rate: {0}")]
    InvalidRate(&'static str),

    #[error("billing period {start}..{end} is empty")]
    InvalidBillingPeriod { start: NaiveDate, end: NaiveDate },

    #[error(transparent)]
    Group(#[from] GroupTierError),
}

impl From<BillingError> for AppError {
    fn from(err: BillingError) -> Self {
        match err {
            BillingError::InvalidDateRange { start, end } => {
                AppError::with_message(ErrorCode::InvalidDateRange, err.to_string())
                    .with_detail("start", start.to_string())
                    .with_detail("end", end.to_string())
            }
            BillingError::InvalidRate(_) => {
                AppError::with_message(ErrorCode::InvalidRate, err.to_string())
            }
            BillingError::InvalidBillingPeriod { .. } => {
                AppError::with_message(ErrorCode::InvalidBillingPeriod, err.to_string())
            }
            BillingError::Group(group) => group.into(),
        }
    }
}
