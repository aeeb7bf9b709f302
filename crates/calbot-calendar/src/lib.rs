//! calbot-calendar: CalDAV access for calbot
//!
//! ## Features
//!
//! - `CalendarSource` trait, the query seam used by the report pipelines
//! - CalDAV client with server-side expansion of recurring events
//! - iCalendar parsing into [`RawEvent`] instances
//!
//! ## Usage
//!
//! ```rust,ignore
//! use calbot_calendar::{CalendarClient, CalendarConfig, CalendarSource};
//!
//! let config = CalendarConfig::new("https://dav.example.com", "user", "password")
//!     .with_calendar_path("/calendars/user/events/");
//! let client = CalendarClient::new(config)?;
//!
//! let events = client.search(window.start, window.end, true).await?;
//! ```

pub mod client;
pub mod error;
pub mod models;
pub mod parse;
pub mod source;

pub use client::CalendarClient;
pub use error::{CalendarError, Result};
pub use models::{CalendarConfig, EventTime, LocalTime, RawEvent};
pub use source::CalendarSource;
