//! calbot-core: shared foundation of the calendar bot
//!
//! Configuration, the canonical local timezone, message templates and the
//! SQLite store for job runs and polls.

pub mod config;
pub mod error;
pub mod store;
pub mod templates;
pub mod time;

pub use config::{CaldavConfig, Config, Environment, SchedulerConfig, StoreConfig, TelegramConfig};
pub use error::{Error, Result};
pub use store::{JobKind, JobRun, JobRunStore, PollRecord, PollStatus, PollStore, RunStatus, SqliteStore};
pub use templates::{PollTemplates, ReportTemplates, fill};
pub use time::LocalTimezone;
