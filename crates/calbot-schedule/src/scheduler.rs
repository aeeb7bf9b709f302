//! Scheduler
//!
//! Runs jobs at the times given by their cron expressions.

use async_trait::async_trait;
use calbot_core::{JobKind, JobRun, JobRunStore};
use chrono::Utc;
use chrono_tz::Tz;
use cron::Schedule as CronSchedule;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::config::{ScheduleConfig, ScheduleEntry};

/// Detail recorded for runs cut short by shutdown
const INTERRUPTED: &str = "interrupted";

/// Executes one job when its schedule fires
#[async_trait]
pub trait JobRunner: Send + Sync {
    async fn run_job(&self, job: JobKind) -> anyhow::Result<()>;
}

/// Handle of a running scheduler
pub struct SchedulerHandle {
    shutdown_tx: broadcast::Sender<()>,
    handle: JoinHandle<()>,
}

impl SchedulerHandle {
    /// Stop all schedule tasks and wait for them to finish
    pub async fn stop(self) {
        let _ = self.shutdown_tx.send(());
        let _ = self.handle.await;
    }
}

/// Cron scheduler
pub struct Scheduler {
    config: ScheduleConfig,
    runner: Arc<dyn JobRunner>,
    store: Option<Arc<dyn JobRunStore>>,
    tz: Tz,
}

impl Scheduler {
    /// Create a scheduler evaluating cron expressions in `tz`
    pub fn new(config: ScheduleConfig, runner: Arc<dyn JobRunner>, tz: Tz) -> Self {
        Self {
            config,
            runner,
            store: None,
            tz,
        }
    }

    /// Record every run in `store`
    pub fn with_store(mut self, store: Arc<dyn JobRunStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Start the scheduler
    pub fn start(self) -> SchedulerHandle {
        let (shutdown_tx, shutdown_rx) = broadcast::channel::<()>(1);
        let shutdown_tx_clone = shutdown_tx.clone();

        let handle = tokio::spawn(async move {
            let entries = self.config.enabled_entries();
            info!("Scheduler started ({} entries)", entries.len());

            let mut task_handles = Vec::new();

            for entry in entries {
                let entry = entry.clone();
                let runner = Arc::clone(&self.runner);
                let store = self.store.clone();
                let tz = self.tz;
                let mut rx = shutdown_rx.resubscribe();

                let handle = tokio::spawn(async move {
                    run_schedule_entry(entry, runner, store, tz, &mut rx).await;
                });

                task_handles.push(handle);
            }

            for handle in task_handles {
                let _ = handle.await;
            }

            info!("Scheduler stopped");
        });

        SchedulerHandle {
            shutdown_tx: shutdown_tx_clone,
            handle,
        }
    }
}

/// Fire one entry until shutdown
async fn run_schedule_entry(
    entry: ScheduleEntry,
    runner: Arc<dyn JobRunner>,
    store: Option<Arc<dyn JobRunStore>>,
    tz: Tz,
    shutdown_rx: &mut broadcast::Receiver<()>,
) {
    let schedule = match parse_cron(&entry.cron) {
        Ok(s) => s,
        Err(e) => {
            error!(job = %entry.name, "Invalid cron expression: {}", e);
            return;
        }
    };

    info!(job = %entry.name, cron = %entry.cron, "Schedule entry started");

    loop {
        let now = Utc::now();
        let next = match schedule.upcoming(tz).next() {
            Some(t) => t,
            None => {
                warn!(job = %entry.name, "No upcoming run time");
                break;
            }
        };

        let delay = (next.with_timezone(&Utc) - now).to_std().unwrap_or(Duration::ZERO);
        info!(
            job = %entry.name,
            next = %next.format("%Y-%m-%d %H:%M:%S %Z"),
            "Waiting for next run"
        );

        tokio::select! {
            _ = tokio::time::sleep(delay) => {}
            _ = shutdown_rx.recv() => {
                info!(job = %entry.name, "Shutdown requested");
                break;
            }
        }

        let mut run = begin_run(&entry.name, entry.job, store.as_deref());
        tokio::select! {
            outcome = runner.run_job(entry.job) => {
                finish_run(&mut run, outcome, store.as_deref());
            }
            _ = shutdown_rx.recv() => {
                warn!(job = %entry.name, run_id = %run.id, "Shutdown requested, interrupting running job");
                run.fail(INTERRUPTED);
                save(store.as_deref(), &run);
                break;
            }
        }
    }
}

/// Run `job` once and record the outcome
pub async fn execute_job(
    name: &str,
    job: JobKind,
    runner: &dyn JobRunner,
    store: Option<&dyn JobRunStore>,
) -> JobRun {
    let mut run = begin_run(name, job, store);
    let outcome = runner.run_job(job).await;
    finish_run(&mut run, outcome, store);
    run
}

fn begin_run(name: &str, job: JobKind, store: Option<&dyn JobRunStore>) -> JobRun {
    let run = JobRun::start(name, job);
    save(store, &run);
    info!(job = %name, kind = %job, run_id = %run.id, "Running job");
    run
}

fn finish_run(run: &mut JobRun, outcome: anyhow::Result<()>, store: Option<&dyn JobRunStore>) {
    match outcome {
        Ok(()) => {
            run.complete();
            info!(job = %run.name, "Job completed");
        }
        Err(e) => {
            error!(job = %run.name, "Job failed: {:#}", e);
            run.fail(format!("{:#}", e));
        }
    }
    save(store, run);
}

fn save(store: Option<&dyn JobRunStore>, run: &JobRun) {
    if let Some(store) = store {
        if let Err(e) = store.save_run(run) {
            warn!(run_id = %run.id, "Failed to record job run: {}", e);
        }
    }
}

/// Parse a cron expression. The first field is seconds:
/// `"0 0 9 * * Mon"` runs every Monday at 09:00.
pub fn parse_cron(cron_expr: &str) -> std::result::Result<CronSchedule, cron::error::Error> {
    cron_expr.parse::<CronSchedule>()
}
