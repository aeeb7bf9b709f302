//! Local-time normalization
//!
//! Every date-level comparison in the bot happens in one canonical timezone.
//! [`LocalTimezone`] wraps that zone and converts UTC instants and floating
//! (zone-less) wall-clock times into it.

use chrono::{DateTime, Duration, LocalResult, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;

use crate::{Error, Result};

/// Default zone used when `TIMEZONE` is not configured
pub const DEFAULT_TIMEZONE: &str = "Europe/Berlin";

/// The canonical local timezone of the bot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LocalTimezone {
    tz: Tz,
}

impl LocalTimezone {
    pub fn new(tz: Tz) -> Self {
        Self { tz }
    }

    /// Parse an IANA timezone identifier such as `Europe/Berlin`
    pub fn parse(name: &str) -> Result<Self> {
        name.trim()
            .parse::<Tz>()
            .map(Self::new)
            .map_err(|_| Error::InvalidTimezone(name.to_string()))
    }

    pub fn tz(&self) -> Tz {
        self.tz
    }

    /// Current time in the local zone
    pub fn now(&self) -> DateTime<Tz> {
        Utc::now().with_timezone(&self.tz)
    }

    /// Convert a UTC instant into local time
    pub fn to_local(&self, dt: DateTime<Utc>) -> DateTime<Tz> {
        dt.with_timezone(&self.tz)
    }

    /// Interpret a floating wall-clock time as local time.
    ///
    /// Ambiguous times (DST fall-back) resolve to the earlier instant.
    /// Returns `None` for times skipped by a DST spring-forward.
    pub fn localize(&self, naive: NaiveDateTime) -> Option<DateTime<Tz>> {
        match self.tz.from_local_datetime(&naive) {
            LocalResult::Single(dt) => Some(dt),
            LocalResult::Ambiguous(earliest, _) => Some(earliest),
            LocalResult::None => None,
        }
    }

    /// Local wall-clock `time` on `date`, shifted forward by an hour when the
    /// wall-clock time does not exist on that day.
    pub fn at(&self, date: NaiveDate, time: NaiveTime) -> DateTime<Tz> {
        let naive = date.and_time(time);
        self.localize(naive)
            .or_else(|| self.localize(naive + Duration::hours(1)))
            .unwrap_or_else(|| self.tz.from_utc_datetime(&naive))
    }

    /// Local midnight at the start of `date`
    pub fn start_of_day(&self, date: NaiveDate) -> DateTime<Tz> {
        self.at(date, NaiveTime::MIN)
    }

    /// 23:59:59 local time on `date`
    pub fn end_of_day(&self, date: NaiveDate) -> DateTime<Tz> {
        let time = NaiveTime::from_hms_opt(23, 59, 59).unwrap_or(NaiveTime::MIN);
        self.at(date, time)
    }
}

impl Default for LocalTimezone {
    fn default() -> Self {
        Self::new(chrono_tz::Europe::Berlin)
    }
}
