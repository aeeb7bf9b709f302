//! Calendar query abstraction

use async_trait::async_trait;
use chrono::DateTime;
use chrono_tz::Tz;

use crate::error::Result;
use crate::models::RawEvent;

/// A calendar that can be searched for event instances
#[async_trait]
pub trait CalendarSource: Send + Sync {
    /// Events overlapping `[start, end]`.
    ///
    /// With `expand`, recurring events are returned as one instance per
    /// occurrence inside the range.
    async fn search(&self, start: DateTime<Tz>, end: DateTime<Tz>, expand: bool) -> Result<Vec<RawEvent>>;
}
