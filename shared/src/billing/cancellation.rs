//! Early-termination fee for plans cancelled inside their minimum term

use super::BillingError;
use super::money::{Amount, percent_of};
use chrono::{Datelike, Months, NaiveDate};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// How the early-termination fee is computed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EarlyTerminationFee {
    /// No fee, even inside the minimum term
    #[default]
    None,
    /// Fixed amount
    Flat { amount: Amount },
    /// Percentage of the fees still owed for the rest of the term
    RemainingMonths { rate_percent: Decimal },
    /// A number of monthly fees, never more than the months still owed
    MonthsOfFee { months: u32 },
}

/// Contract-level cancellation terms of a plan
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct CancellationPolicy {
    pub minimum_term_months: u32,
    pub fee: EarlyTerminationFee,
}

/// Result of [`calculate_cancellation_fee`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CancellationFee {
    /// Whole months between contract start and the effective date
    pub months_elapsed: u32,
    /// Months left in the minimum term (0 once it is served)
    pub remaining_months: u32,
    pub amount: Amount,
    /// True when the cancellation falls inside the minimum term
    pub within_term: bool,
}

impl CancellationFee {
    fn none(months_elapsed: u32) -> Self {
        Self {
            months_elapsed,
            remaining_months: 0,
            amount: 0,
            within_term: false,
        }
    }
}

/// Number of whole calendar months from `start` to `end`.
///
/// A month is complete once the same day-of-month is reached; chrono clamps
/// month ends, so Jan 31 → Feb 28 counts as one month.
pub fn whole_months_between(start: NaiveDate, end: NaiveDate) -> u32 {
    if end <= start {
        return 0;
    }
    let mut months = (end.year() - start.year()) * 12 + end.month() as i32 - start.month() as i32;
    while months > 0 {
        match start.checked_add_months(Months::new(months as u32)) {
            Some(anniversary) if anniversary <= end => break,
            _ => months -= 1,
        }
    }
    months.max(0) as u32
}

/// Compute the early-termination fee for a cancellation taking effect on
/// `effective_date`.
pub fn calculate_cancellation_fee(
    policy: &CancellationPolicy,
    contract_start: NaiveDate,
    effective_date: NaiveDate,
    monthly_price: Amount,
) -> Result<CancellationFee, BillingError> {
    if effective_date < contract_start {
        return Err(BillingError::InvalidDateRange {
            start: contract_start,
            end: effective_date,
        });
    }
    if monthly_price < 0 {
        return Err(BillingError::InvalidRate("monthly price must not be negative"));
    }

    let months_elapsed = whole_months_between(contract_start, effective_date);
    if months_elapsed >= policy.minimum_term_months {
        return Ok(CancellationFee::none(months_elapsed));
    }
    let remaining_months = policy.minimum_term_months - months_elapsed;

    let amount = match policy.fee {
        EarlyTerminationFee::None => 0,
        EarlyTerminationFee::Flat { amount } => amount,
        EarlyTerminationFee::RemainingMonths { rate_percent } => {
            if rate_percent.is_sign_negative() {
                return Err(BillingError::InvalidRate("fee rate must not be negative"));
            }
            percent_of(
                monthly_price.saturating_mul(i64::from(remaining_months)),
                rate_percent,
            )
        }
        EarlyTerminationFee::MonthsOfFee { months } => {
            monthly_price.saturating_mul(i64::from(months.min(remaining_months)))
        }
    };

    Ok(CancellationFee {
        months_elapsed,
        remaining_months,
        amount: amount.max(0),
        within_term: true,
    })
}
