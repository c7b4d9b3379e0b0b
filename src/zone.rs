//! The configured local time zone.
//!
//! Deadlines, `now` and the dates inside ids are all expressed in one zone.
//! An IANA name (`America/Chicago`) follows daylight saving through
//! `chrono-tz`; a bare offset (`-06:00`) stays fixed all year.

use std::fmt;

use chrono::{DateTime, Duration, FixedOffset, NaiveDateTime, TimeZone};
use chrono_tz::Tz;

use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Zone {
    Named(Tz),
    Fixed(FixedOffset),
}

impl Default for Zone {
    fn default() -> Self {
        Zone::Named(Tz::UTC)
    }
}

impl fmt::Display for Zone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Zone::Named(tz) => write!(f, "{}", tz.name()),
            Zone::Fixed(offset) => write!(f, "{offset}"),
        }
    }
}

impl Zone {
    /// Parse an IANA zone name or a `±HH:MM` offset.
    pub fn parse(raw: &str) -> Result<Self> {
        let raw = raw.trim();
        if let Ok(tz) = raw.parse::<Tz>() {
            return Ok(Zone::Named(tz));
        }
        raw.parse::<FixedOffset>().map(Zone::Fixed).map_err(|_| {
            Error::InvalidConfig(format!(
                "timezone: unknown zone '{raw}' (expected a name like America/Chicago or an offset like -06:00)"
            ))
        })
    }

    /// The same instant, carrying the offset this zone uses at that instant.
    pub fn localize<Z: TimeZone>(&self, instant: &DateTime<Z>) -> DateTime<FixedOffset> {
        match self {
            Zone::Named(tz) => instant.with_timezone(tz).fixed_offset(),
            Zone::Fixed(offset) => instant.with_timezone(offset),
        }
    }

    /// Resolve a wall-clock time in this zone.
    ///
    /// Ambiguous times (the repeated hour in autumn) take the earlier
    /// instant. Times inside the spring-forward gap move one hour later.
    pub fn from_local(&self, local: NaiveDateTime) -> Option<DateTime<FixedOffset>> {
        match self {
            Zone::Named(tz) => tz
                .from_local_datetime(&local)
                .earliest()
                .or_else(|| tz.from_local_datetime(&(local + Duration::hours(1))).earliest())
                .map(|dt| dt.fixed_offset()),
            Zone::Fixed(offset) => offset.from_local_datetime(&local).single(),
        }
    }
}
