//! Error types for calbot-calendar

use thiserror::Error;

/// calbot-calendar error type
#[derive(Error, Debug)]
pub enum CalendarError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("CalDAV error: {0}")]
    CaldavError(String),

    #[error("HTTP error: {0}")]
    HttpError(String),

    #[error("Authentication error: {0}")]
    Authentication(String),

    #[error("Connection error: {0}")]
    Connection(String),

    #[error("XML parsing error: {0}")]
    XmlParseError(String),
}

impl CalendarError {
    /// Whether the calendar could not be reached or rejected the credentials,
    /// as opposed to a failure while retrieving events
    pub fn is_connection_failure(&self) -> bool {
        matches!(
            self,
            CalendarError::Configuration(_)
                | CalendarError::Authentication(_)
                | CalendarError::Connection(_)
        )
    }
}

/// Result type alias
pub type Result<T> = std::result::Result<T, CalendarError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connection_failure_classification() {
        assert!(CalendarError::Connection("refused".into()).is_connection_failure());
        assert!(CalendarError::Authentication("401".into()).is_connection_failure());
        assert!(CalendarError::Configuration("bad url".into()).is_connection_failure());
        assert!(!CalendarError::CaldavError("500".into()).is_connection_failure());
        assert!(!CalendarError::XmlParseError("eof".into()).is_connection_failure());
        assert!(!CalendarError::HttpError("body".into()).is_connection_failure());
    }
}
