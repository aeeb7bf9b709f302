//! Query windows for the reports
//!
//! Windows are closed intervals in the local timezone: start at local
//! midnight, end at 23:59:59 of the last day.

use calbot_core::LocalTimezone;
use chrono::{DateTime, Datelike, Duration, NaiveDate};
use chrono_tz::Tz;

use crate::error::{ReportError, Result};

/// Closed time interval `[start, end]` in the local timezone
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeWindow {
    start: DateTime<Tz>,
    end: DateTime<Tz>,
}

impl TimeWindow {
    pub fn new(start: DateTime<Tz>, end: DateTime<Tz>) -> Result<Self> {
        if start > end {
            return Err(ReportError::InvalidWindow(format!(
                "start {} is after end {}",
                start, end
            )));
        }
        Ok(Self { start, end })
    }

    /// Whole local days `first..=last`
    fn days_between(tz: &LocalTimezone, first: NaiveDate, last: NaiveDate) -> Self {
        Self {
            start: tz.start_of_day(first),
            end: tz.end_of_day(last),
        }
    }

    pub fn start(&self) -> DateTime<Tz> {
        self.start
    }

    pub fn end(&self) -> DateTime<Tz> {
        self.end
    }

    /// Every calendar date touched by the window, in order
    pub fn days(&self) -> impl Iterator<Item = NaiveDate> + use<> {
        let last = self.end.date_naive();
        self.start
            .date_naive()
            .iter_days()
            .take_while(move |day| *day <= last)
    }
}

/// Today plus the following 14 days (15 calendar days)
pub fn two_week_window(now: DateTime<Tz>) -> TimeWindow {
    let tz = LocalTimezone::new(now.timezone());
    let today = now.date_naive();
    TimeWindow::days_between(&tz, today, today + Duration::days(14))
}

/// Monday to Sunday of the coming week.
///
/// Monday is `7 - weekday` days ahead (Monday = 0), so on a Monday the
/// window starts a full week later.
pub fn weekly_overview_window(now: DateTime<Tz>) -> TimeWindow {
    let tz = LocalTimezone::new(now.timezone());
    let days_until_monday = 7 - i64::from(now.weekday().num_days_from_monday());
    let monday = now.date_naive() + Duration::days(days_until_monday);
    TimeWindow::days_between(&tz, monday, monday + Duration::days(6))
}

/// The Monday the weekly poll asks about: always strictly after `today`
pub fn next_poll_monday(today: NaiveDate) -> NaiveDate {
    let mut days_until_monday = (7 - i64::from(today.weekday().num_days_from_monday())) % 7;
    if days_until_monday == 0 {
        days_until_monday = 7;
    }
    today + Duration::days(days_until_monday)
}
