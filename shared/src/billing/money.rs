//! Decimal helpers for integer money amounts

use rust_decimal::prelude::*;

/// Amount in minor units of the site currency
pub type Amount = i64;

#[inline]
pub(crate) fn to_decimal(amount: Amount) -> Decimal {
    Decimal::from(amount)
}

/// Truncate toward zero and convert back to an integer amount
#[inline]
pub(crate) fn to_amount(value: Decimal) -> Amount {
    value
        .round_dp_with_strategy(0, RoundingStrategy::ToZero)
        .to_i64()
        .unwrap_or_default()
}

/// `amount * rate_percent / 100`, truncated
pub(crate) fn percent_of(amount: Amount, rate_percent: Decimal) -> Amount {
    to_amount(to_decimal(amount) * rate_percent / Decimal::ONE_HUNDRED)
}

/// Ceiling division for non-negative operands
#[inline]
pub(crate) fn div_ceil(value: i64, unit: i64) -> i64 {
    if value <= 0 {
        0
    } else {
        (value + unit - 1) / unit
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_percent_of_truncates() {
        // 3333 * 10% = 333.3
        assert_eq!(percent_of(3333, Decimal::from(10)), 333);
        // 999 * 33.5% = 334.665
        assert_eq!(percent_of(999, Decimal::new(335, 1)), 334);
    }

    #[test]
    fn test_to_amount_truncates_negative_toward_zero() {
        assert_eq!(to_amount(Decimal::new(-15, 1)), -1);
    }

    #[test]
    fn test_div_ceil() {
        assert_eq!(div_ceil(0, 30), 0);
        assert_eq!(div_ceil(1, 30), 1);
        assert_eq!(div_ceil(30, 30), 1);
        assert_eq!(div_ceil(31, 30), 2);
        assert_eq!(div_ceil(-5, 30), 0);
    }
}
