//! Cache entry model

use bytes::Bytes;
use chrono::{DateTime, Duration, TimeZone, Utc};
use std::fmt;

/// Point in time after which an entry is considered overdue.
///
/// Stored as seconds since the Unix epoch. The cache records the deadline
/// with every entry but never compares it against the clock.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
pub struct Deadline(f64);

impl Deadline {
    /// "Effectively never"
    pub const NEVER: Deadline = Deadline(i64::MAX as f64);

    /// Deadline `secs` after the epoch
    ///
    /// NaN maps to `NEVER`, infinities clamp to `NEVER` and its negation, so
    /// every deadline is a finite number both stores can persist.
    pub fn from_secs(secs: f64) -> Self {
        if secs.is_nan() {
            return Self::NEVER;
        }
        Self(secs.clamp(-Self::NEVER.0, Self::NEVER.0))
    }

    pub fn at(when: DateTime<Utc>) -> Self {
        Self(when.timestamp_millis() as f64 / 1000.0)
    }

    /// Deadline `ttl` from now
    pub fn after(ttl: Duration) -> Self {
        Self::at(Utc::now() + ttl)
    }

    pub fn as_secs(&self) -> f64 {
        self.0
    }

    pub fn is_never(&self) -> bool {
        self.0 >= Self::NEVER.0
    }

    /// Convert to a timestamp, `None` for `NEVER` or out-of-range values
    pub fn to_datetime(&self) -> Option<DateTime<Utc>> {
        if self.is_never() || !self.0.is_finite() {
            return None;
        }
        Utc.timestamp_millis_opt((self.0 * 1000.0) as i64).single()
    }
}

impl Default for Deadline {
    fn default() -> Self {
        Self::NEVER
    }
}

impl fmt::Display for Deadline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.to_datetime() {
            Some(dt) => write!(f, "{}", dt.to_rfc3339()),
            None => write!(f, "never"),
        }
    }
}

/// A stored cache entry
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Entry {
    pub key: String,
    pub payload: Bytes,
    pub deadline: Deadline,
}

impl Entry {
    pub fn new(key: impl Into<String>, payload: impl Into<Bytes>, deadline: Deadline) -> Self {
        Self {
            key: key.into(),
            payload: payload.into(),
            deadline,
        }
    }

    /// Payload length in bytes
    pub fn size(&self) -> usize {
        self.payload.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_deadline_is_never() {
        let entry = Entry::default();
        assert!(entry.deadline.is_never());
        assert_eq!(entry.deadline.to_datetime(), None);
        assert_eq!(entry.deadline.to_string(), "never");
    }

    #[test]
    fn test_deadline_from_datetime() {
        let when = Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap();
        let deadline = Deadline::at(when);
        assert_eq!(deadline.as_secs(), 1_704_110_400.0);
        assert_eq!(deadline.to_datetime(), Some(when));
        assert!(!deadline.is_never());
    }

    #[test]
    fn test_non_finite_deadlines_are_clamped() {
        assert_eq!(Deadline::from_secs(f64::NAN), Deadline::NEVER);
        assert_eq!(Deadline::from_secs(f64::INFINITY), Deadline::NEVER);

        let past = Deadline::from_secs(f64::NEG_INFINITY);
        assert!(past.as_secs().is_finite());
        assert!(past < Deadline::from_secs(0.0));
        assert_eq!(past.to_datetime(), None);
    }

    #[test]
    fn test_deadline_after_is_in_future() {
        let deadline = Deadline::after(Duration::hours(1));
        assert!(deadline > Deadline::at(Utc::now()));
        assert!(deadline < Deadline::NEVER);
    }
}
