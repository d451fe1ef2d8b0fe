//! Prorated charges for members joining mid-period

use super::BillingError;
use super::group::GroupPricing;
use super::money::{Amount, to_amount, to_decimal};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Billing period `[start, end)`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BillingPeriod {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl BillingPeriod {
    pub fn days(&self) -> i64 {
        (self.end - self.start).num_days()
    }
}

/// Charge `amount` for the part of `period` remaining from `join_date`.
///
/// `amount * remaining_days / period_days`, truncated.
pub fn prorate(
    amount: Amount,
    period: &BillingPeriod,
    join_date: NaiveDate,
) -> Result<Amount, BillingError> {
    let period_days = period.days();
    if period_days <= 0 {
        return Err(BillingError::InvalidBillingPeriod {
            start: period.start,
            end: period.end,
        });
    }
    if join_date <= period.start {
        return Ok(amount);
    }
    if join_date >= period.end {
        return Ok(0);
    }

    let remaining_days = (period.end - join_date).num_days();
    Ok(to_amount(
        to_decimal(amount) * Decimal::from(remaining_days) / Decimal::from(period_days),
    ))
}

/// First charge for a member invited into `slot` of a group plan
pub fn invited_member_charge(
    group: &GroupPricing,
    slot: u32,
    period: &BillingPeriod,
    join_date: NaiveDate,
) -> Result<Amount, BillingError> {
    let price = group.slot_price(slot)?;
    prorate(price, period, join_date)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::billing::{GroupTierError, SlotTier};

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn april() -> BillingPeriod {
        BillingPeriod {
            start: date(2025, 4, 1),
            end: date(2025, 5, 1),
        }
    }

    #[test]
    fn test_prorate_mid_period() {
        // 30-day period, joining on the 16th leaves 15 days
        assert_eq!(prorate(20_000, &april(), date(2025, 4, 16)), Ok(10_000));
        // 11 of 30 days: 7,333.33 → 7,333
        assert_eq!(prorate(20_000, &april(), date(2025, 4, 20)), Ok(7_333));
    }

    #[test]
    fn test_prorate_boundaries() {
        assert_eq!(prorate(20_000, &april(), date(2025, 3, 20)), Ok(20_000));
        assert_eq!(prorate(20_000, &april(), date(2025, 4, 1)), Ok(20_000));
        assert_eq!(prorate(20_000, &april(), date(2025, 5, 1)), Ok(0));
        assert_eq!(prorate(20_000, &april(), date(2025, 4, 30)), Ok(666));
    }

    #[test]
    fn test_empty_period_is_rejected() {
        let period = BillingPeriod {
            start: date(2025, 4, 1),
            end: date(2025, 4, 1),
        };
        assert!(matches!(
            prorate(1_000, &period, date(2025, 4, 1)),
            Err(BillingError::InvalidBillingPeriod { .. })
        ));
    }

    #[test]
    fn test_invited_member_charge_uses_slot_price() {
        let group = GroupPricing {
            owner_price: 30_000,
            max_slots: 4,
            tiers: vec![SlotTier {
                from_slot: 2,
                price: 24_000,
            }],
        };
        assert_eq!(
            invited_member_charge(&group, 3, &april(), date(2025, 4, 16)),
            Ok(12_000)
        );
        assert_eq!(
            invited_member_charge(&group, 5, &april(), date(2025, 4, 16)),
            Err(BillingError::Group(GroupTierError::SlotOutOfRange {
                slot: 5,
                max_slots: 4
            }))
        );
    }
}
