//! Overtime surcharge for members staying outside their plan's time window

use super::BillingError;
use super::money::{Amount, div_ceil};
use chrono::{DateTime, Duration, FixedOffset, NaiveDateTime, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

/// Daily wall-clock window a plan allows, in site-local time.
///
/// `end` must be after `start`; windows never cross midnight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeWindow {
    pub start: NaiveTime,
    pub end: NaiveTime,
}

impl TimeWindow {
    pub fn new(start: NaiveTime, end: NaiveTime) -> Result<Self, BillingError> {
        let window = Self { start, end };
        window.validate()?;
        Ok(window)
    }

    pub fn validate(&self) -> Result<(), BillingError> {
        if self.end <= self.start {
            return Err(BillingError::InvalidRate("time window must end after it starts"));
        }
        Ok(())
    }
}

/// Overtime pricing attached to a plan
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OvertimeRate {
    /// Billing unit length in minutes (e.g. 30)
    pub unit_minutes: u32,
    /// Price per started unit
    pub unit_price: Amount,
    /// Total overtime at or below this is free
    #[serde(default)]
    pub grace_minutes: u32,
    /// Upper bound of the fee per local day
    #[serde(default)]
    pub daily_cap: Option<Amount>,
}

/// Result of [`calculate_overtime`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Overtime {
    pub overtime_minutes: i64,
    pub billable_units: i64,
    pub amount: Amount,
}

fn overlap_seconds(
    a_start: NaiveDateTime,
    a_end: NaiveDateTime,
    b_start: NaiveDateTime,
    b_end: NaiveDateTime,
) -> i64 {
    let start = a_start.max(b_start);
    let end = a_end.min(b_end);
    (end - start).num_seconds().max(0)
}

/// Compute the overtime fee for a visit.
///
/// Every local day the visit touches is evaluated on its own: the minutes
/// spent outside that day's window are overtime, rounded up to whole minutes.
/// Units and the daily cap are applied per day; the grace threshold applies
/// to the visit total.
pub fn calculate_overtime(
    check_in: DateTime<Utc>,
    check_out: DateTime<Utc>,
    offset: FixedOffset,
    window: &TimeWindow,
    rate: &OvertimeRate,
) -> Result<Overtime, BillingError> {
    if rate.unit_minutes == 0 {
        return Err(BillingError::InvalidRate("overtime unit must be at least one minute"));
    }
    if rate.unit_price < 0 || rate.daily_cap.is_some_and(|cap| cap < 0) {
        return Err(BillingError::InvalidRate("overtime prices must not be negative"));
    }
    window.validate()?;

    if check_out <= check_in {
        return Ok(Overtime::default());
    }

    let local_in = check_in.with_timezone(&offset).naive_local();
    let local_out = check_out.with_timezone(&offset).naive_local();

    let mut per_day_minutes = Vec::new();
    let mut day = local_in.date();
    while day <= local_out.date() {
        let day_start = day.and_time(NaiveTime::MIN);
        let day_end = day_start + Duration::days(1);
        let present = overlap_seconds(local_in, local_out, day_start, day_end);
        if present > 0 {
            let inside = overlap_seconds(
                local_in,
                local_out,
                day.and_time(window.start),
                day.and_time(window.end),
            );
            per_day_minutes.push(div_ceil(present - inside, 60));
        }
        match day.succ_opt() {
            Some(next) => day = next,
            None => break,
        }
    }

    let overtime_minutes: i64 = per_day_minutes.iter().sum();
    if overtime_minutes <= i64::from(rate.grace_minutes) {
        return Ok(Overtime {
            overtime_minutes,
            billable_units: 0,
            amount: 0,
        });
    }

    let unit = i64::from(rate.unit_minutes);
    let mut billable_units = 0;
    let mut amount = 0;
    for minutes in per_day_minutes {
        let units = div_ceil(minutes, unit);
        let mut day_fee = units.saturating_mul(rate.unit_price);
        if let Some(cap) = rate.daily_cap {
            day_fee = day_fee.min(cap);
        }
        billable_units += units;
        amount += day_fee;
    }

    Ok(Overtime {
        overtime_minutes,
        billable_units,
        amount,
    })
}
