//! Timestamp utilities.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A UTC timestamp.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Timestamp(DateTime<Utc>);

impl Timestamp {
    /// Current time.
    pub fn now() -> Self {
        Self(Utc::now())
    }

    /// From a DateTime.
    pub fn from_datetime(dt: DateTime<Utc>) -> Self {
        Self(dt)
    }

    /// Get the inner DateTime.
    pub fn as_datetime(&self) -> DateTime<Utc> {
        self.0
    }

    /// ISO 8601 string.
    pub fn to_iso8601(&self) -> String {
        self.0.to_rfc3339()
    }

    /// This timestamp shifted forward by `duration`, or `None` past the
    /// representable range.
    pub fn checked_plus(&self, duration: Duration) -> Option<Self> {
        self.0.checked_add_signed(duration).map(Self)
    }

    /// This timestamp shifted forward by `duration`, clamped to the
    /// representable range.
    pub fn plus(&self, duration: Duration) -> Self {
        self.checked_plus(duration)
            .unwrap_or(Self(DateTime::<Utc>::MAX_UTC))
    }

    /// This timestamp shifted back by `duration`, clamped to the
    /// representable range.
    pub fn minus(&self, duration: Duration) -> Self {
        Self(
            self.0
                .checked_sub_signed(duration)
                .unwrap_or(DateTime::<Utc>::MIN_UTC),
        )
    }

    /// Whether `self` is at or before `other`.
    pub fn is_at_or_before(&self, other: &Timestamp) -> bool {
        self.0 <= other.0
    }

    /// Duration since this timestamp.
    pub fn elapsed(&self) -> Duration {
        Utc::now() - self.0
    }
}

impl Default for Timestamp {
    fn default() -> Self {
        Self::now()
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_iso8601())
    }
}

impl fmt::Debug for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Timestamp({})", self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timestamp_serialization() {
        let ts = Timestamp::now();
        let json = serde_json::to_string(&ts).unwrap();
        let deserialized: Timestamp = serde_json::from_str(&json).unwrap();
        assert_eq!(ts, deserialized);
    }

    #[test]
    fn test_timestamp_display() {
        let display_str = Timestamp::now().to_string();
        assert!(display_str.contains('T'));
        assert!(display_str.ends_with('Z') || display_str.ends_with("+00:00"));
    }

    #[test]
    fn test_shift_and_compare() {
        let now = Timestamp::now();
        let later = now.plus(Duration::minutes(5));
        assert!(now < later);
        assert!(now.is_at_or_before(&later));
        assert!(now.is_at_or_before(&now));
        assert!(!later.is_at_or_before(&now));
        assert_eq!(later.minus(Duration::minutes(5)), now);
    }

    #[test]
    fn test_shift_out_of_range() {
        let now = Timestamp::now();
        let huge = Duration::seconds(i64::MAX / 1_000);

        assert!(now.checked_plus(huge).is_none());
        assert_eq!(now.plus(huge).as_datetime(), DateTime::<Utc>::MAX_UTC);
        assert_eq!(now.minus(huge).as_datetime(), DateTime::<Utc>::MIN_UTC);
        assert_eq!(now.checked_plus(Duration::hours(1)), Some(now.plus(Duration::hours(1))));
    }
}
