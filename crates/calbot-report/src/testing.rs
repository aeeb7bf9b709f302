//! In-memory fakes for pipeline tests

use async_trait::async_trait;
use calbot_calendar::{CalendarError, CalendarSource, RawEvent};
use chrono::{DateTime, NaiveDate, TimeZone};
use chrono_tz::Tz;
use std::sync::Mutex;

use crate::deliver::Notifier;

pub fn berlin(y: i32, m: u32, d: u32, h: u32, min: u32) -> DateTime<Tz> {
    chrono_tz::Europe::Berlin
        .with_ymd_and_hms(y, m, d, h, min, 0)
        .unwrap()
}

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

enum Outcome {
    Events(Vec<RawEvent>),
    Unauthorized,
    ServerError,
}

/// Calendar returning a fixed outcome and remembering the last query
pub struct FakeCalendar {
    outcome: Outcome,
    last_query: Mutex<Option<(DateTime<Tz>, DateTime<Tz>, bool)>>,
}

impl FakeCalendar {
    fn new(outcome: Outcome) -> Self {
        Self {
            outcome,
            last_query: Mutex::new(None),
        }
    }

    pub fn with_events(events: Vec<RawEvent>) -> Self {
        Self::new(Outcome::Events(events))
    }

    pub fn unauthorized() -> Self {
        Self::new(Outcome::Unauthorized)
    }

    pub fn server_error() -> Self {
        Self::new(Outcome::ServerError)
    }

    pub fn last_window(&self) -> Option<(DateTime<Tz>, DateTime<Tz>)> {
        self.last_query.lock().unwrap().map(|(start, end, _)| (start, end))
    }

    pub fn last_expand(&self) -> bool {
        self.last_query.lock().unwrap().is_some_and(|(_, _, expand)| expand)
    }
}

#[async_trait]
impl CalendarSource for FakeCalendar {
    async fn search(
        &self,
        start: DateTime<Tz>,
        end: DateTime<Tz>,
        expand: bool,
    ) -> calbot_calendar::Result<Vec<RawEvent>> {
        *self.last_query.lock().unwrap() = Some((start, end, expand));
        match &self.outcome {
            Outcome::Events(events) => Ok(events.clone()),
            Outcome::Unauthorized => Err(CalendarError::Authentication("Server returned 401".into())),
            Outcome::ServerError => Err(CalendarError::CaldavError("Request failed: 500".into())),
        }
    }
}

/// Notifier that keeps delivered messages in memory
#[derive(Default)]
pub struct RecordingNotifier {
    fail: bool,
    messages: Mutex<Vec<String>>,
}

impl RecordingNotifier {
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Default::default()
        }
    }

    pub fn messages(&self) -> Vec<String> {
        self.messages.lock().unwrap().clone()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn deliver(&self, text: &str) -> anyhow::Result<()> {
        if self.fail {
            anyhow::bail!("chat unavailable");
        }
        self.messages.lock().unwrap().push(text.to_string());
        Ok(())
    }

    fn name(&self) -> &str {
        "recording"
    }
}
