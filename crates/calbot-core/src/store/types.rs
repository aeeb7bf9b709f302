//! Persisted record types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use crate::Error;

/// The jobs the bot knows how to run
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum JobKind {
    /// Free days in the next two weeks
    FreeDays,
    /// Events of the coming week
    WeeklyOverview,
    /// Weekly attendance poll
    Poll,
}

impl JobKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobKind::FreeDays => "free_days",
            JobKind::WeeklyOverview => "weekly_overview",
            JobKind::Poll => "poll",
        }
    }
}

impl fmt::Display for JobKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "free_days" => Ok(JobKind::FreeDays),
            "weekly_overview" => Ok(JobKind::WeeklyOverview),
            "poll" => Ok(JobKind::Poll),
            other => Err(Error::Store(format!("unknown job kind: {}", other))),
        }
    }
}

/// Outcome of a job run
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Running,
    Completed,
    Failed,
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::Running => "running",
            RunStatus::Completed => "completed",
            RunStatus::Failed => "failed",
        }
    }
}

impl FromStr for RunStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "running" => Ok(RunStatus::Running),
            "completed" => Ok(RunStatus::Completed),
            "failed" => Ok(RunStatus::Failed),
            other => Err(Error::Store(format!("unknown run status: {}", other))),
        }
    }
}

/// One execution of a scheduled job
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobRun {
    pub id: String,
    /// Schedule entry name
    pub name: String,
    pub job: JobKind,
    pub status: RunStatus,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    /// Error text of a failed run
    pub detail: Option<String>,
}

impl JobRun {
    /// Start a new run record
    pub fn start(name: impl Into<String>, job: JobKind) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            name: name.into(),
            job,
            status: RunStatus::Running,
            started_at: Utc::now(),
            finished_at: None,
            detail: None,
        }
    }

    pub fn complete(&mut self) {
        self.status = RunStatus::Completed;
        self.finished_at = Some(Utc::now());
    }

    pub fn fail(&mut self, detail: impl Into<String>) {
        self.status = RunStatus::Failed;
        self.finished_at = Some(Utc::now());
        self.detail = Some(detail.into());
    }
}

/// Lifecycle state of a poll
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PollStatus {
    Open,
    Closed,
    /// The run ended before the poll could be closed
    Interrupted,
}

impl PollStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PollStatus::Open => "open",
            PollStatus::Closed => "closed",
            PollStatus::Interrupted => "interrupted",
        }
    }
}

impl FromStr for PollStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "open" => Ok(PollStatus::Open),
            "closed" => Ok(PollStatus::Closed),
            "interrupted" => Ok(PollStatus::Interrupted),
            other => Err(Error::Store(format!("unknown poll status: {}", other))),
        }
    }
}

/// Stored snapshot of a poll and its voters
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollRecord {
    /// Telegram poll id
    pub poll_id: String,
    pub chat_id: String,
    pub message_id: i64,
    pub question: String,
    pub status: PollStatus,
    pub opened_at: DateTime<Utc>,
    pub closed_at: Option<DateTime<Utc>>,
    pub voters: BTreeSet<i64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_job_kind_parse() {
        assert_eq!("free_days".parse::<JobKind>().unwrap(), JobKind::FreeDays);
        assert_eq!("free-days".parse::<JobKind>().unwrap(), JobKind::FreeDays);
        assert_eq!("Weekly_Overview".parse::<JobKind>().unwrap(), JobKind::WeeklyOverview);
        assert_eq!("poll".parse::<JobKind>().unwrap(), JobKind::Poll);
        assert!("backup".parse::<JobKind>().is_err());
    }

    #[test]
    fn test_job_kind_display_roundtrip() {
        for kind in [JobKind::FreeDays, JobKind::WeeklyOverview, JobKind::Poll] {
            assert_eq!(kind.to_string().parse::<JobKind>().unwrap(), kind);
        }
    }

    #[test]
    fn test_job_run_transitions() {
        let mut run = JobRun::start("sunday report", JobKind::WeeklyOverview);
        assert_eq!(run.status, RunStatus::Running);
        assert!(run.finished_at.is_none());

        run.fail("calendar down");
        assert_eq!(run.status, RunStatus::Failed);
        assert_eq!(run.detail.as_deref(), Some("calendar down"));
        assert!(run.finished_at.is_some());
    }
}
