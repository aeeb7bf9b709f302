//! Data models for calendar access

use calbot_core::LocalTimezone;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

/// CalDAV connection settings
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct CalendarConfig {
    /// CalDAV server URL
    pub server_url: String,
    /// Username for authentication
    pub username: String,
    /// Password for authentication
    #[serde(skip_serializing)]
    pub password: String,
    /// Calendar path below the server URL
    #[serde(default)]
    pub calendar_path: Option<String>,
}

impl CalendarConfig {
    pub fn new(server_url: impl Into<String>, username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            server_url: server_url.into(),
            username: username.into(),
            password: password.into(),
            calendar_path: None,
        }
    }

    /// Set the calendar path
    pub fn with_calendar_path(mut self, calendar_path: impl Into<String>) -> Self {
        self.calendar_path = Some(calendar_path.into());
        self
    }

    /// Full URL of the calendar collection
    pub fn calendar_url(&self) -> String {
        let base = self.server_url.trim_end_matches('/');
        match self.calendar_path.as_deref().map(str::trim) {
            Some(path) if !path.is_empty() => {
                format!("{}/{}", base, path.trim_start_matches('/'))
            }
            _ => self.server_url.clone(),
        }
    }
}

/// Start or end of an event as stored in the calendar
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventTime {
    /// Calendar date without time of day (all-day events)
    Date(NaiveDate),
    /// Absolute instant
    DateTime(DateTime<Utc>),
    /// Wall-clock time without zone; read in the local timezone
    Floating(NaiveDateTime),
}

/// [`EventTime`] after conversion to the local timezone
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LocalTime {
    Date(NaiveDate),
    DateTime(DateTime<Tz>),
}

impl LocalTime {
    pub fn date(&self) -> NaiveDate {
        match self {
            LocalTime::Date(date) => *date,
            LocalTime::DateTime(dt) => dt.date_naive(),
        }
    }
}

impl EventTime {
    /// Convert to local time. `None` for floating times that do not exist
    /// locally (DST gap).
    pub fn localize(&self, tz: &LocalTimezone) -> Option<LocalTime> {
        match self {
            EventTime::Date(date) => Some(LocalTime::Date(*date)),
            EventTime::DateTime(dt) => Some(LocalTime::DateTime(tz.to_local(*dt))),
            EventTime::Floating(naive) => tz.localize(*naive).map(LocalTime::DateTime),
        }
    }

    /// Local calendar date of this time
    pub fn local_date(&self, tz: &LocalTimezone) -> NaiveDate {
        match self {
            EventTime::Date(date) => *date,
            EventTime::DateTime(dt) => tz.to_local(*dt).date_naive(),
            EventTime::Floating(naive) => naive.date(),
        }
    }
}

/// One event instance returned by a calendar query.
///
/// Recurring events arrive already expanded, one `RawEvent` per occurrence.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawEvent {
    #[serde(default)]
    pub uid: Option<String>,
    /// `DTSTART`; `None` when missing or unparseable
    #[serde(default)]
    pub start: Option<EventTime>,
    /// `DTEND`; exclusive for all-day events
    #[serde(default)]
    pub end: Option<EventTime>,
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    /// Set on expanded occurrences of a recurring event
    #[serde(default)]
    pub recurrence_id: Option<String>,
}

impl RawEvent {
    pub fn new(start: EventTime, end: Option<EventTime>) -> Self {
        Self {
            start: Some(start),
            end,
            ..Default::default()
        }
    }

    pub fn with_summary(mut self, summary: impl Into<String>) -> Self {
        self.summary = Some(summary.into());
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Timelike};

    #[test]
    fn test_calendar_url_joins_path() {
        let config = CalendarConfig::new("https://dav.example.com/", "u", "p")
            .with_calendar_path("/calendars/u/events/");
        assert_eq!(config.calendar_url(), "https://dav.example.com/calendars/u/events/");
    }

    #[test]
    fn test_calendar_url_without_path() {
        let config = CalendarConfig::new("https://dav.example.com/cal/", "u", "p");
        assert_eq!(config.calendar_url(), "https://dav.example.com/cal/");
    }

    #[test]
    fn test_localize_variants() {
        let tz = LocalTimezone::default();
        let date = NaiveDate::from_ymd_opt(2024, 3, 5).unwrap();
        assert_eq!(EventTime::Date(date).localize(&tz), Some(LocalTime::Date(date)));

        let utc = Utc.with_ymd_and_hms(2024, 3, 5, 18, 0, 0).unwrap();
        match EventTime::DateTime(utc).localize(&tz) {
            Some(LocalTime::DateTime(local)) => assert_eq!(local.hour(), 19),
            other => panic!("unexpected {:?}", other),
        }

        let floating = date.and_hms_opt(19, 0, 0).unwrap();
        match EventTime::Floating(floating).localize(&tz) {
            Some(LocalTime::DateTime(local)) => assert_eq!(local.hour(), 19),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_local_date_of_late_utc_time() {
        let tz = LocalTimezone::default();
        let utc = Utc.with_ymd_and_hms(2024, 3, 5, 23, 30, 0).unwrap();
        assert_eq!(
            EventTime::DateTime(utc).local_date(&tz),
            NaiveDate::from_ymd_opt(2024, 3, 6).unwrap()
        );
    }
}
