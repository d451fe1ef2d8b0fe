use chrono::{DateTime, FixedOffset, NaiveDate, Offset, Utc};
use subtle::ConstantTimeEq;

/// Current UTC timestamp in milliseconds
pub fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

/// Generate a Snowflake-style i64 for use as resource ID.
///
/// Layout (53 bits, fits in JavaScript's Number.MAX_SAFE_INTEGER):
///   - 41 bits: milliseconds since 2024-01-01 UTC (~69 years)
///   - 12 bits: random (4096 values per ms)
pub fn snowflake_id() -> i64 {
    use rand::Rng;
    // Custom epoch: 2024-01-01 00:00:00 UTC
    const EPOCH_MS: i64 = 1_704_067_200_000;
    let now = now_millis();
    let ts = (now - EPOCH_MS) & 0x1FF_FFFF_FFFF; // 41 bits
    let rand_bits: i64 = rand::thread_rng().gen_range(0..0x1000); // 12 bits
    (ts << 12) | rand_bits
}

/// Constant-time comparison of two shared secrets. Empty inputs never match.
pub fn secure_eq(a: &[u8], b: &[u8]) -> bool {
    !a.is_empty() && bool::from(a.ct_eq(b))
}

/// Site-local UTC offset. Falls back to UTC for offsets chrono rejects (> ±24h).
pub fn site_offset(offset_minutes: i32) -> FixedOffset {
    FixedOffset::east_opt(offset_minutes * 60).unwrap_or_else(|| Utc.fix())
}

/// Calendar date of an instant as seen at the site
pub fn local_date(instant: DateTime<Utc>, offset: FixedOffset) -> NaiveDate {
    instant.with_timezone(&offset).date_naive()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_snowflake_ids_fit_in_53_bits() {
        let a = snowflake_id();
        let b = snowflake_id();
        assert!(a > 0);
        assert!(b > 0);
        assert!(a < (1i64 << 53));
    }

    #[test]
    fn test_local_date_crosses_midnight_in_jst() {
        let jst = site_offset(540);
        // 2025-03-31 16:30 UTC is 2025-04-01 01:30 JST
        let instant = Utc.with_ymd_and_hms(2025, 3, 31, 16, 30, 0).unwrap();
        assert_eq!(
            local_date(instant, jst),
            NaiveDate::from_ymd_opt(2025, 4, 1).unwrap()
        );
    }

    #[test]
    fn test_secure_eq() {
        assert!(secure_eq(b"cron-secret", b"cron-secret"));
        assert!(!secure_eq(b"cron-secret", b"cron-secreT"));
        assert!(!secure_eq(b"cron", b"cron-secret"));
        assert!(!secure_eq(b"", b""));
    }

    #[test]
    fn test_site_offset_out_of_range_falls_back_to_utc() {
        assert_eq!(site_offset(100_000).local_minus_utc(), 0);
    }
}
