//! Time-related utilities with clock abstraction for testability.

use chrono::{DateTime, SecondsFormat, Utc};

/// Clock trait for dependency injection and testing
pub trait Clock: Send + Sync {
    /// Get the current instant in UTC
    fn now(&self) -> DateTime<Utc>;
}

/// System clock implementation (uses actual system time)
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Fixed clock implementation for testing (returns a fixed time)
#[derive(Debug, Clone, Copy)]
pub struct FixedClock {
    fixed_time: DateTime<Utc>,
}

impl FixedClock {
    /// Create a new fixed clock with the given instant
    pub fn new(fixed_time: DateTime<Utc>) -> Self {
        Self { fixed_time }
    }

    /// Create a new fixed clock from a Unix timestamp in milliseconds.
    ///
    /// Out-of-range values fall back to the Unix epoch.
    pub fn from_millis(millis: i64) -> Self {
        Self::new(DateTime::from_timestamp_millis(millis).unwrap_or_default())
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.fixed_time
    }
}

/// Format an instant as RFC 3339 with millisecond precision (`2024-01-01T00:00:00.000Z`)
pub fn to_rfc3339(instant: DateTime<Utc>) -> String {
    instant.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Parse an RFC 3339 string, falling back to `fallback` when it is malformed.
///
/// Naive ISO timestamps without an offset (`2024-01-01T00:00:00.123`) are
/// treated as UTC.
pub fn parse_rfc3339_or(value: &str, fallback: DateTime<Utc>) -> DateTime<Utc> {
    if let Ok(parsed) = DateTime::parse_from_rfc3339(value) {
        return parsed.with_timezone(&Utc);
    }
    chrono::NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.f")
        .map(|naive| naive.and_utc())
        .unwrap_or(fallback)
}

/// Build a time-derived identifier such as `session_20240101093000123`
pub fn time_derived_id(prefix: &str, instant: DateTime<Utc>) -> String {
    format!("{}_{}", prefix, instant.format("%Y%m%d%H%M%S%3f"))
}

/// Build a nanosecond identifier such as `msg_1704067200000000000`
pub fn nanos_id(prefix: &str, instant: DateTime<Utc>) -> String {
    let nanos = instant
        .timestamp_nanos_opt()
        .unwrap_or_else(|| instant.timestamp_micros() * 1_000);
    format!("{}_{}", prefix, nanos)
}
