//! Error types for the calbot binary

use std::fmt;

/// Errors raised while setting up the bot
///
/// Wraps the errors of the sub-crates that can abort startup
#[derive(Debug)]
pub enum BotError {
    /// Core error (configuration, store)
    Core(calbot_core::Error),
    /// Telegram client error
    Telegram(calbot_telegram::TelegramError),
    /// Schedule error
    Schedule(calbot_schedule::ScheduleError),
    /// Invalid command line
    Usage(String),
}

impl fmt::Display for BotError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Core(e) => write!(f, "Core error: {}", e),
            Self::Telegram(e) => write!(f, "Telegram error: {}", e),
            Self::Schedule(e) => write!(f, "Schedule error: {}", e),
            Self::Usage(e) => write!(f, "Usage error: {}", e),
        }
    }
}

impl std::error::Error for BotError {}

impl From<calbot_core::Error> for BotError {
    fn from(e: calbot_core::Error) -> Self {
        Self::Core(e)
    }
}

impl From<calbot_telegram::TelegramError> for BotError {
    fn from(e: calbot_telegram::TelegramError) -> Self {
        Self::Telegram(e)
    }
}

impl From<calbot_schedule::ScheduleError> for BotError {
    fn from(e: calbot_schedule::ScheduleError) -> Self {
        Self::Schedule(e)
    }
}

/// Result type alias
pub type Result<T> = std::result::Result<T, BotError>;
