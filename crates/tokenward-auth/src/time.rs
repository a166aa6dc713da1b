//! Clocks and every conversion between token time and store time.
//!
//! Signed tokens carry `iat`/`exp` as whole Unix seconds, plus the exact
//! issue instant in Unix milliseconds. The key-value store takes TTLs as
//! [`Duration`]s and applies them with millisecond precision, and the
//! password-change watermark is kept in Unix milliseconds. Nothing outside
//! this module multiplies or divides by 1000.

use std::fmt;
use std::sync::atomic::{AtomicI64, Ordering};
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};

use tokenward_core::error::AppError;
use tokenward_core::result::AppResult;

/// Source of the current instant.
pub trait Clock: Send + Sync + fmt::Debug + 'static {
    /// The current instant.
    fn now(&self) -> DateTime<Utc>;

    /// The current instant in whole Unix seconds, as used by token claims.
    fn now_seconds(&self) -> i64 {
        self.now().timestamp()
    }

    /// The current instant in Unix milliseconds.
    fn now_millis(&self) -> i64 {
        self.now().timestamp_millis()
    }
}

/// Wall-clock time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A clock that only moves when told to.
pub struct ManualClock {
    millis: AtomicI64,
}

impl ManualClock {
    /// Start the clock at `start`.
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            millis: AtomicI64::new(start.timestamp_millis()),
        }
    }

    /// Start the clock at a whole Unix second.
    pub fn at_seconds(secs: i64) -> Self {
        Self {
            millis: AtomicI64::new(millis_of_seconds(secs)),
        }
    }

    /// Jump to an instant.
    pub fn set(&self, to: DateTime<Utc>) {
        self.millis.store(to.timestamp_millis(), Ordering::SeqCst);
    }

    /// Move forward by `by`.
    pub fn advance(&self, by: Duration) {
        self.millis
            .fetch_add(to_store_millis(by) as i64, Ordering::SeqCst);
    }
}

impl fmt::Debug for ManualClock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ManualClock")
            .field("now", &self.now())
            .finish()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        DateTime::from_timestamp_millis(self.millis.load(Ordering::SeqCst)).unwrap_or_default()
    }
}

/// `exp` claim for a token issued at `issued_at` (Unix seconds) that lives
/// for `ttl`. Sub-second parts of `ttl` are dropped.
pub fn token_expiry(issued_at: i64, ttl: Duration) -> i64 {
    issued_at.saturating_add(i64::try_from(ttl.as_secs()).unwrap_or(i64::MAX))
}

/// Whether a token with this `exp` is dead at `now` (both Unix seconds).
///
/// Validity is the half-open interval `[iat, exp)`: at `now == exp` the
/// token is already expired.
pub fn is_expired(exp: i64, now: i64) -> bool {
    exp <= now
}

/// Store TTL covering what is left of a token's life. Zero once expired.
pub fn remaining_ttl(exp: i64, now: i64) -> Duration {
    if is_expired(exp, now) {
        return Duration::ZERO;
    }
    Duration::from_secs(exp.abs_diff(now))
}

/// The whole Unix second containing a Unix-millisecond instant.
pub fn seconds_of_millis(millis: i64) -> i64 {
    millis.div_euclid(1000)
}

/// The first Unix millisecond of a whole Unix second.
pub fn millis_of_seconds(secs: i64) -> i64 {
    secs.saturating_mul(1000)
}

/// A TTL expressed in store milliseconds.
pub fn to_store_millis(ttl: Duration) -> u64 {
    u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX)
}

/// A store millisecond TTL as a [`Duration`].
pub fn from_store_millis(millis: u64) -> Duration {
    Duration::from_millis(millis)
}

/// Instant of a Unix-seconds claim.
pub fn datetime_from_seconds(secs: i64) -> AppResult<DateTime<Utc>> {
    DateTime::from_timestamp(secs, 0)
        .ok_or_else(|| AppError::validation(format!("Timestamp {secs} is out of range")))
}

/// `at + ttl` on the calendar.
pub fn add_ttl(at: DateTime<Utc>, ttl: Duration) -> AppResult<DateTime<Utc>> {
    TimeDelta::from_std(ttl)
        .ok()
        .and_then(|delta| at.checked_add_signed(delta))
        .ok_or_else(|| AppError::configuration(format!("Lifetime {ttl:?} is out of range")))
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    #[test]
    fn test_expiry_boundary_is_half_open() {
        assert!(!is_expired(1_000, 999));
        assert!(is_expired(1_000, 1_000));
        assert!(is_expired(1_000, 1_001));
        assert_eq!(remaining_ttl(1_000, 1_000), Duration::ZERO);
        assert_eq!(remaining_ttl(1_000, 999), Duration::from_secs(1));
    }

    #[test]
    fn test_store_millis_are_thousandths() {
        assert_eq!(to_store_millis(Duration::from_secs(900)), 900_000);
        assert_eq!(from_store_millis(604_800_000), Duration::from_secs(604_800));
    }

    #[test]
    fn test_manual_clock_advances() {
        let clock = ManualClock::at_seconds(1_700_000_000);
        assert_eq!(clock.now_seconds(), 1_700_000_000);
        clock.advance(Duration::from_millis(1_500));
        assert_eq!(clock.now_seconds(), 1_700_000_001);
        assert_eq!(clock.now().timestamp_subsec_millis(), 500);
    }

    #[test]
    fn test_add_ttl() {
        let at = datetime_from_seconds(1_700_000_000).unwrap();
        let later = add_ttl(at, Duration::from_secs(60)).unwrap();
        assert_eq!(later.timestamp(), 1_700_000_060);
    }

    proptest! {
        #[test]
        fn prop_store_ttl_of_fresh_token_equals_lifetime(
            now in 0i64..4_000_000_000,
            ttl_secs in 1u64..31_536_000,
        ) {
            let ttl = Duration::from_secs(ttl_secs);
            let exp = token_expiry(now, ttl);
            let store = to_store_millis(remaining_ttl(exp, now));
            prop_assert_eq!(store, ttl_secs * 1000);
            prop_assert_eq!(from_store_millis(store), ttl);
        }

        #[test]
        fn prop_store_round_trip_within_one_millisecond(nanos in 0u64..u64::MAX / 2) {
            let ttl = Duration::from_nanos(nanos);
            let back = from_store_millis(to_store_millis(ttl));
            prop_assert!(back <= ttl);
            prop_assert!(ttl - back < Duration::from_millis(1));
        }

        #[test]
        fn prop_millis_fall_inside_their_second(millis in -4_000_000_000_000i64..4_000_000_000_000) {
            let secs = seconds_of_millis(millis);
            prop_assert!(millis_of_seconds(secs) <= millis);
            prop_assert!(millis < millis_of_seconds(secs + 1));
        }

        #[test]
        fn prop_remaining_ttl_shrinks_to_zero_at_exp(
            iat in 0i64..4_000_000_000,
            ttl_secs in 1u64..1_000_000,
            elapsed in 0u64..2_000_000,
        ) {
            let exp = token_expiry(iat, Duration::from_secs(ttl_secs));
            let now = iat + elapsed as i64;
            let left = remaining_ttl(exp, now);
            prop_assert_eq!(left.is_zero(), is_expired(exp, now));
            prop_assert!(left <= Duration::from_secs(ttl_secs));
        }
    }
}
