//! Compact record timestamps

use std::fmt;

use chrono::{DateTime, Local, TimeDelta, TimeZone, Utc};
use serde::{Deserialize, Serialize};

/// Time at which a record was created
///
/// Stored as whole unix seconds plus a millisecond part, which is exactly
/// what the binary record layout carries. Ordering compares seconds first,
/// then milliseconds.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct TimeStamp {
    /// Seconds since the unix epoch (UTC)
    pub unix_seconds: u32,
    /// Millisecond part, normally in `0..1000`
    pub milliseconds: i32,
}

impl TimeStamp {
    /// Create a timestamp from its raw parts
    pub const fn new(unix_seconds: u32, milliseconds: i32) -> Self {
        Self {
            unix_seconds,
            milliseconds,
        }
    }

    /// Current wall-clock time
    pub fn now() -> Self {
        Self::from_datetime(&Utc::now())
    }

    /// Convert any chrono datetime, truncating to millisecond precision
    ///
    /// Times before the epoch clamp to zero, times past 2106 clamp to `u32::MAX`.
    pub fn from_datetime<Tz: TimeZone>(dt: &DateTime<Tz>) -> Self {
        let secs = dt.timestamp().clamp(0, u32::MAX as i64) as u32;
        let millis = dt.timestamp_subsec_millis().min(999) as i32;
        Self::new(secs, millis)
    }

    /// Calendar time in the local zone
    pub fn to_absolute_time(&self) -> DateTime<Local> {
        self.to_utc().with_timezone(&Local)
    }

    /// Calendar time in UTC
    pub fn to_utc(&self) -> DateTime<Utc> {
        let base = DateTime::from_timestamp(self.unix_seconds as i64, 0).unwrap_or_default();
        base + TimeDelta::milliseconds(self.milliseconds as i64)
    }

    /// Format in the local zone with a strftime-style pattern
    pub fn format(&self, pattern: &str) -> String {
        self.to_absolute_time().format(pattern).to_string()
    }
}

impl fmt::Display for TimeStamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:03}", self.unix_seconds, self.milliseconds)
    }
}
