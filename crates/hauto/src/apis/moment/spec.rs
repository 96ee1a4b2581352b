use chrono::{DateTime, NaiveDate, NaiveTime, TimeZone, Utc};
use hauto_core::{HautoError, HautoResult};
use std::fmt;
use std::str::FromStr;

/// A point in virtual time an intent can wait for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MomentSpec {
    /// A single instant
    Absolute(DateTime<Utc>),
    /// A wall-clock time (UTC) recurring every day
    Daily(NaiveTime),
}

impl MomentSpec {
    /// Parse a moment
    ///
    /// Accepted forms:
    /// - `YYYY/MM/DD`, midnight UTC of that day
    /// - `HH:MM` or `HH:MM:SS`, daily
    /// - an RFC 3339 timestamp
    /// - a UNIX timestamp in seconds
    pub fn parse(s: &str) -> HautoResult<Self> {
        let s = s.trim();

        if let Ok(date) = NaiveDate::parse_from_str(s, "%Y/%m/%d") {
            return Ok(MomentSpec::Absolute(
                Utc.from_utc_datetime(&date.and_time(NaiveTime::default())),
            ));
        }

        for format in ["%H:%M:%S", "%H:%M"] {
            if let Ok(time) = NaiveTime::parse_from_str(s, format) {
                return Ok(MomentSpec::Daily(time));
            }
        }

        if let Ok(at) = DateTime::parse_from_rfc3339(s) {
            return Ok(MomentSpec::Absolute(at.with_timezone(&Utc)));
        }

        if let Ok(seconds) = s.parse::<i64>() {
            if let Some(at) = Utc.timestamp_opt(seconds, 0).single() {
                return Ok(MomentSpec::Absolute(at));
            }
        }

        Err(HautoError::config(format!(
            "cannot parse moment '{s}', expected YYYY/MM/DD, HH:MM[:SS], RFC 3339 or a UNIX timestamp"
        )))
    }

    /// Next instant at or after `from` at which this moment occurs
    ///
    /// Absolute moments in the past are returned unchanged.
    pub fn next_after(&self, from: DateTime<Utc>) -> DateTime<Utc> {
        match *self {
            MomentSpec::Absolute(at) => at,
            MomentSpec::Daily(time) => {
                let today = Utc.from_utc_datetime(&from.date_naive().and_time(time));
                if today >= from {
                    today
                } else {
                    today + chrono::Duration::days(1)
                }
            }
        }
    }

    pub fn is_absolute(&self) -> bool {
        matches!(self, MomentSpec::Absolute(_))
    }
}

impl FromStr for MomentSpec {
    type Err = HautoError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl From<DateTime<Utc>> for MomentSpec {
    fn from(at: DateTime<Utc>) -> Self {
        MomentSpec::Absolute(at)
    }
}

impl From<NaiveTime> for MomentSpec {
    fn from(time: NaiveTime) -> Self {
        MomentSpec::Daily(time)
    }
}

impl fmt::Display for MomentSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MomentSpec::Absolute(at) => write!(f, "{}", at.to_rfc3339()),
            MomentSpec::Daily(time) => write!(f, "daily at {}", time.format("%H:%M:%S")),
        }
    }
}
