//! Scheduled execution of the report and poll jobs
//!
//! Entries in `schedule.toml` name a job and a cron expression; the
//! [`Scheduler`] fires each entry on its own task and hands the job to a
//! [`JobRunner`].

mod config;
mod error;
mod scheduler;

pub use config::{ScheduleConfig, ScheduleEntry};
pub use error::{Result, ScheduleError};
pub use scheduler::{JobRunner, Scheduler, SchedulerHandle, execute_job, parse_cron};
