//! calbot-telegram: Telegram delivery and the weekly poll
//!
//! ## Features
//!
//! - Bot API access through teloxide (`sendMessage`, `sendPoll`, `stopPoll`, `getUpdates`)
//! - [`TelegramNotifier`] for report delivery
//! - [`PollRunner`] for the weekly attendance poll
//!
//! ## Usage
//!
//! ```rust,ignore
//! use calbot_telegram::{TelegramApiClient, TelegramNotifier};
//!
//! let api = TelegramApiClient::new(&config.telegram.api_url, &token)?;
//! let notifier = TelegramNotifier::new(api, chat_id);
//! calbot_report::publish(&notifier, &report).await;
//! ```

pub mod api;
pub mod error;
pub mod notifier;
pub mod poll;

#[cfg(test)]
mod testing;

pub use api::{SentPoll, TelegramApiClient};
pub use error::{Result, TelegramError};
pub use notifier::TelegramNotifier;
pub use poll::{PollRunner, PollSession, PollSettings, PollVote};
