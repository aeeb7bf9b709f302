//! Error types for calbot-report

use calbot_calendar::CalendarError;
use calbot_core::ReportTemplates;
use thiserror::Error;

/// calbot-report error type
#[derive(Error, Debug)]
pub enum ReportError {
    #[error("event has no start time")]
    MissingStart,

    #[error("event time does not exist in local time: {0}")]
    InvalidTime(String),

    #[error("no translation for weekday: {0}")]
    UnknownWeekday(String),

    #[error("invalid time window: {0}")]
    InvalidWindow(String),
}

/// Result type alias
pub type Result<T> = std::result::Result<T, ReportError>;

/// The fixed sentence shown to users instead of a report when fetching
/// events failed
pub fn failure_message(err: &CalendarError, templates: &ReportTemplates) -> String {
    if err.is_connection_failure() {
        templates.connection_error.clone()
    } else {
        templates.retrieval_error.clone()
    }
}
