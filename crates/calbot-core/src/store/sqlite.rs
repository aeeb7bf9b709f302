//! SQLite-backed store

use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, params};
use std::path::Path;
use std::sync::Mutex;
use tracing::debug;

use super::types::{JobRun, PollRecord};
use super::{JobRunStore, PollStore};
use crate::{Error, Result};

/// SQLite store for job runs and polls
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open (or create) the database at `db_path`
    pub fn new(db_path: &str) -> Result<Self> {
        if let Some(parent) = Path::new(db_path).parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(db_path)?;
        Self::with_connection(conn)
    }

    /// Create an in-memory store (for testing)
    pub fn in_memory() -> Result<Self> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self> {
        init_tables(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> Result<std::sync::MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| Error::Store("store mutex poisoned".to_string()))
    }
}

fn init_tables(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS job_runs (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            job TEXT NOT NULL,
            status TEXT NOT NULL,
            started_at TEXT NOT NULL,
            finished_at TEXT,
            detail TEXT
        );
        CREATE INDEX IF NOT EXISTS idx_job_runs_started_at ON job_runs(started_at);

        CREATE TABLE IF NOT EXISTS polls (
            poll_id TEXT PRIMARY KEY,
            chat_id TEXT NOT NULL,
            message_id INTEGER NOT NULL,
            question TEXT NOT NULL,
            status TEXT NOT NULL,
            opened_at TEXT NOT NULL,
            closed_at TEXT
        );

        CREATE TABLE IF NOT EXISTS poll_votes (
            poll_id TEXT NOT NULL REFERENCES polls(poll_id) ON DELETE CASCADE,
            user_id INTEGER NOT NULL,
            UNIQUE(poll_id, user_id)
        );",
    )?;
    Ok(())
}

fn parse_time(value: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|_| rusqlite::Error::InvalidQuery)
}

fn parse_optional_time(value: Option<String>) -> rusqlite::Result<Option<DateTime<Utc>>> {
    value.as_deref().map(parse_time).transpose()
}

fn row_to_job_run(row: &rusqlite::Row<'_>) -> rusqlite::Result<JobRun> {
    let job: String = row.get(2)?;
    let status: String = row.get(3)?;
    let started_at: String = row.get(4)?;

    Ok(JobRun {
        id: row.get(0)?,
        name: row.get(1)?,
        job: job.parse().map_err(|_| rusqlite::Error::InvalidQuery)?,
        status: status.parse().map_err(|_| rusqlite::Error::InvalidQuery)?,
        started_at: parse_time(&started_at)?,
        finished_at: parse_optional_time(row.get(5)?)?,
        detail: row.get(6)?,
    })
}

impl JobRunStore for SqliteStore {
    fn save_run(&self, run: &JobRun) -> Result<()> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT OR REPLACE INTO job_runs (id, name, job, status, started_at, finished_at, detail)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                run.id,
                run.name,
                run.job.as_str(),
                run.status.as_str(),
                run.started_at.to_rfc3339(),
                run.finished_at.map(|t| t.to_rfc3339()),
                run.detail,
            ],
        )?;
        debug!("Saved job run {} ({})", run.id, run.status.as_str());
        Ok(())
    }

    fn load_run(&self, id: &str) -> Result<Option<JobRun>> {
        let conn = self.conn()?;
        let run = conn
            .query_row(
                "SELECT id, name, job, status, started_at, finished_at, detail
                 FROM job_runs WHERE id = ?1",
                params![id],
                row_to_job_run,
            )
            .optional()?;
        Ok(run)
    }

    fn recent_runs(&self, limit: usize) -> Result<Vec<JobRun>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT id, name, job, status, started_at, finished_at, detail
             FROM job_runs ORDER BY started_at DESC LIMIT ?1",
        )?;
        let runs = stmt
            .query_map(params![limit as i64], row_to_job_run)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(runs)
    }
}

impl PollStore for SqliteStore {
    fn save_poll(&self, poll: &PollRecord) -> Result<()> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;

        tx.execute(
            "INSERT OR REPLACE INTO polls (poll_id, chat_id, message_id, question, status, opened_at, closed_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                poll.poll_id,
                poll.chat_id,
                poll.message_id,
                poll.question,
                poll.status.as_str(),
                poll.opened_at.to_rfc3339(),
                poll.closed_at.map(|t| t.to_rfc3339()),
            ],
        )?;

        tx.execute("DELETE FROM poll_votes WHERE poll_id = ?1", params![poll.poll_id])?;
        for user_id in &poll.voters {
            tx.execute(
                "INSERT OR IGNORE INTO poll_votes (poll_id, user_id) VALUES (?1, ?2)",
                params![poll.poll_id, user_id],
            )?;
        }

        tx.commit()?;
        debug!("Saved poll {} with {} voters", poll.poll_id, poll.voters.len());
        Ok(())
    }

    fn load_poll(&self, poll_id: &str) -> Result<Option<PollRecord>> {
        let conn = self.conn()?;

        let poll = conn
            .query_row(
                "SELECT poll_id, chat_id, message_id, question, status, opened_at, closed_at
                 FROM polls WHERE poll_id = ?1",
                params![poll_id],
                |row| {
                    let status: String = row.get(4)?;
                    let opened_at: String = row.get(5)?;
                    Ok(PollRecord {
                        poll_id: row.get(0)?,
                        chat_id: row.get(1)?,
                        message_id: row.get(2)?,
                        question: row.get(3)?,
                        status: status.parse().map_err(|_| rusqlite::Error::InvalidQuery)?,
                        opened_at: parse_time(&opened_at)?,
                        closed_at: parse_optional_time(row.get(6)?)?,
                        voters: Default::default(),
                    })
                },
            )
            .optional()?;

        let Some(mut poll) = poll else {
            return Ok(None);
        };

        let mut stmt = conn.prepare("SELECT user_id FROM poll_votes WHERE poll_id = ?1")?;
        poll.voters = stmt
            .query_map(params![poll_id], |row| row.get::<_, i64>(0))?
            .collect::<rusqlite::Result<_>>()?;

        Ok(Some(poll))
    }
}
