//! Drop-in visitor pricing (authorization at check-in, capture at checkout)

use super::BillingError;
use super::money::{Amount, div_ceil};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

const MINUTES_PER_DAY: i64 = 24 * 60;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DropInRate {
    pub unit_minutes: u32,
    pub unit_price: Amount,
    /// Maximum charge per started 24h period
    pub daily_cap: Amount,
    /// Hold placed on the card at check-in
    pub authorization_amount: Amount,
}

impl DropInRate {
    pub fn validate(&self) -> Result<(), BillingError> {
        if self.unit_minutes == 0 {
            return Err(BillingError::InvalidRate("drop-in unit must be at least one minute"));
        }
        if self.unit_price < 0 || self.daily_cap < 0 || self.authorization_amount < 0 {
            return Err(BillingError::InvalidRate("drop-in prices must not be negative"));
        }
        Ok(())
    }

    fn charge_for(&self, minutes: i64) -> (i64, Amount) {
        let units = div_ceil(minutes, i64::from(self.unit_minutes));
        (units, units.saturating_mul(self.unit_price).min(self.daily_cap))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DropInCharge {
    pub minutes: i64,
    pub units: i64,
    pub amount: Amount,
}

/// How a checkout charge is split against the authorization hold
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapturePlan {
    pub capture_amount: Amount,
    /// Part of the charge the hold does not cover
    pub uncaptured_excess: Amount,
}

/// Charge for a drop-in visit.
///
/// Units are counted per started 24h period and each period is capped at the
/// daily cap. A zero-length visit still bills one unit.
pub fn calculate_drop_in_charge(
    check_in: DateTime<Utc>,
    check_out: DateTime<Utc>,
    rate: &DropInRate,
) -> Result<DropInCharge, BillingError> {
    rate.validate()?;
    let seconds = (check_out - check_in).num_seconds().max(0);
    let minutes = div_ceil(seconds, 60).max(1);

    let full_days = minutes / MINUTES_PER_DAY;
    let rest = minutes % MINUTES_PER_DAY;

    let (day_units, day_amount) = rate.charge_for(MINUTES_PER_DAY);
    let (rest_units, rest_amount) = rate.charge_for(rest);

    Ok(DropInCharge {
        minutes,
        units: full_days * day_units + rest_units,
        amount: full_days * day_amount + rest_amount,
    })
}

/// Split `charge` into what the hold can capture and what must be charged separately
pub fn plan_capture(charge: Amount, authorized: Amount) -> CapturePlan {
    let capture_amount = charge.clamp(0, authorized.max(0));
    CapturePlan {
        capture_amount,
        uncaptured_excess: (charge - capture_amount).max(0),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn rate() -> DropInRate {
        DropInRate {
            unit_minutes: 60,
            unit_price: 500,
            daily_cap: 2_000,
            authorization_amount: 3_000,
        }
    }

    fn start() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 1, 1, 0, 0).unwrap()
    }

    #[test]
    fn test_started_units_are_billed() {
        let c = calculate_drop_in_charge(start(), start() + Duration::minutes(61), &rate()).unwrap();
        assert_eq!(c.minutes, 61);
        assert_eq!(c.units, 2);
        assert_eq!(c.amount, 1_000);
    }

    #[test]
    fn test_daily_cap() {
        let c = calculate_drop_in_charge(start(), start() + Duration::hours(9), &rate()).unwrap();
        assert_eq!(c.units, 9);
        assert_eq!(c.amount, 2_000);
    }

    #[test]
    fn test_multi_day_caps_each_started_day() {
        // 26h = one full day (capped 2,000) + 2h (1,000)
        let c = calculate_drop_in_charge(start(), start() + Duration::hours(26), &rate()).unwrap();
        assert_eq!(c.units, 24 + 2);
        assert_eq!(c.amount, 3_000);
    }

    #[test]
    fn test_zero_length_visit_bills_one_unit() {
        let c = calculate_drop_in_charge(start(), start(), &rate()).unwrap();
        assert_eq!(c.units, 1);
        assert_eq!(c.amount, 500);
    }

    #[test]
    fn test_invalid_rate() {
        let mut r = rate();
        r.unit_minutes = 0;
        assert!(calculate_drop_in_charge(start(), start(), &r).is_err());
    }

    #[test]
    fn test_plan_capture() {
        assert_eq!(
            plan_capture(1_500, 3_000),
            CapturePlan {
                capture_amount: 1_500,
                uncaptured_excess: 0
            }
        );
        assert_eq!(
            plan_capture(4_000, 3_000),
            CapturePlan {
                capture_amount: 3_000,
                uncaptured_excess: 1_000
            }
        );
    }
}
