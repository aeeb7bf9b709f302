//! Persistence of job runs and poll sessions
//!
//! Report texts are never stored; only the fact that a job ran and the
//! state of polls.

mod sqlite;
mod types;

pub use sqlite::SqliteStore;
pub use types::{JobKind, JobRun, PollRecord, PollStatus, RunStatus};

use crate::Result;

/// Store capability for job run records
pub trait JobRunStore: Send + Sync {
    /// Insert or update a run
    fn save_run(&self, run: &JobRun) -> Result<()>;

    fn load_run(&self, id: &str) -> Result<Option<JobRun>>;

    /// Most recent runs first
    fn recent_runs(&self, limit: usize) -> Result<Vec<JobRun>>;
}

/// Store capability for poll sessions
pub trait PollStore: Send + Sync {
    /// Insert or update a poll together with its current voters
    fn save_poll(&self, poll: &PollRecord) -> Result<()>;

    fn load_poll(&self, poll_id: &str) -> Result<Option<PollRecord>>;
}
