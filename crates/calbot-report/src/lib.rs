//! calbot-report: free-days and weekly-overview reports
//!
//! Both pipelines take a [`CalendarSource`](calbot_calendar::CalendarSource),
//! a timezone and the current time, and always produce a text: either the
//! report or one of the fixed error sentences from the templates.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use calbot_report::{free_days_report, publish};
//!
//! let text = free_days_report(&client, &tz, &templates, tz.now()).await;
//! publish(&notifier, &text).await;
//! ```

pub mod deliver;
pub mod error;
pub mod format;
pub mod free_days;
pub mod overview;
pub mod weekday;
pub mod window;

#[cfg(test)]
mod testing;

pub use deliver::{Notifier, StdoutNotifier, publish};
pub use error::{ReportError, Result, failure_message};
pub use format::{FormattedEvent, format_event, sort_key};
pub use free_days::{compute_free_days, free_days_report, render_free_days};
pub use overview::{format_events, render_weekly_overview, weekly_overview_report};
pub use weekday::{WEEKDAY_TRANSLATIONS, german_weekday};
pub use window::{TimeWindow, next_poll_monday, two_week_window, weekly_overview_window};
