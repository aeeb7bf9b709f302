//! calbot: calendar notification bot
//!
//! Usage:
//!   calbot                   - Start the scheduler (same as `serve`)
//!   calbot free-days         - Post the free days of the next two weeks
//!   calbot weekly-overview   - Post the overview of the coming week
//!   calbot poll              - Run the weekly attendance poll
//!   calbot --help            - Show help

mod app;
mod error;

use app::App;
use calbot_core::{Config, JobKind, RunStatus, SqliteStore};
use calbot_schedule::{ScheduleConfig, Scheduler, execute_job};
use error::BotError;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

/// Run mode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RunMode {
    /// Run the configured schedules until Ctrl+C
    Serve,
    /// Run one job and exit
    Once(JobKind),
    /// Show help
    Help,
    /// Show version
    Version,
}

/// Parsed command line
#[derive(Debug, PartialEq, Eq)]
struct Args {
    mode: RunMode,
    dry_run: bool,
    config_path: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = parse_args(std::env::args().skip(1))?;

    match args.mode {
        RunMode::Help => {
            print_help();
            return Ok(());
        }
        RunMode::Version => {
            println!("calbot {}", env!("CARGO_PKG_VERSION"));
            return Ok(());
        }
        _ => {}
    }

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive("info".parse()?)
        )
        .init();

    // Load .env file
    dotenvy::dotenv().ok();

    let config = Config::load(args.config_path.as_deref())
        .map_err(|e| anyhow::anyhow!("Config error: {}", e))?;

    tracing::info!("Starting calbot...");
    tracing::info!(
        "Timezone: {}, environment: {:?}",
        config.timezone, config.environment
    );

    let store = Arc::new(
        SqliteStore::new(&config.store.db_path)
            .map_err(|e| anyhow::anyhow!("Failed to open store: {}", e))?,
    );
    let app = Arc::new(App::from_config(&config, store.clone(), args.dry_run)?);

    match args.mode {
        RunMode::Once(job) => {
            let run = execute_job(job.as_str(), job, &*app, Some(&*store)).await;
            if run.status == RunStatus::Failed {
                anyhow::bail!("{} failed: {}", job, run.detail.unwrap_or_default());
            }
            Ok(())
        }
        RunMode::Serve => run_server(&config, app, store).await,
        _ => Ok(()),
    }
}

/// Parse command line arguments (without the program name)
fn parse_args(args: impl IntoIterator<Item = String>) -> Result<Args, BotError> {
    let mut parsed = Args {
        mode: RunMode::Serve,
        dry_run: false,
        config_path: None,
    };

    let mut args = args.into_iter();
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--help" | "-h" => return Ok(Args { mode: RunMode::Help, ..parsed }),
            "--version" | "-v" => return Ok(Args { mode: RunMode::Version, ..parsed }),
            "--dry-run" | "-n" => parsed.dry_run = true,
            "--config" | "-c" => {
                let path = args
                    .next()
                    .ok_or_else(|| BotError::Usage("--config requires a path".to_string()))?;
                parsed.config_path = Some(path);
            }
            "serve" => parsed.mode = RunMode::Serve,
            "free-days" => parsed.mode = RunMode::Once(JobKind::FreeDays),
            "weekly-overview" => parsed.mode = RunMode::Once(JobKind::WeeklyOverview),
            "poll" => parsed.mode = RunMode::Once(JobKind::Poll),
            other => return Err(BotError::Usage(format!("unknown argument: {}", other))),
        }
    }

    Ok(parsed)
}

/// Print help message
fn print_help() {
    println!("calbot - calendar notification bot");
    println!();
    println!("Usage:");
    println!("  calbot [serve]             Run the configured schedules until Ctrl+C");
    println!("  calbot free-days           Post free days of the next two weeks");
    println!("  calbot weekly-overview     Post the overview of the coming week");
    println!("  calbot poll                Run the weekly attendance poll");
    println!();
    println!("Options:");
    println!("  -n, --dry-run              Print messages instead of sending them");
    println!("  -c, --config <path>        Config file (default: calbot.toml)");
    println!("  -h, --help                 Show this help message");
    println!("  -v, --version              Show version");
    println!();
    println!("Environment Variables:");
    println!("  TIMEZONE                   IANA timezone (default: Europe/Berlin)");
    println!("  TESTING_ENVIRONMENT        false for production timings (default: true)");
    println!("  CALDAV_URL                 CalDAV server URL");
    println!("  CALENDAR_PATH              Calendar path below the server URL");
    println!("  CALDAV_USERNAME            CalDAV user");
    println!("  CALDAV_PASSWORD            CalDAV password");
    println!("  TELEGRAM_BOT_TOKEN         Bot token");
    println!("  TELEGRAM_CHAT_ID           Target chat");
    println!("  TELEGRAM_API_URL           Bot API endpoint (default: https://api.telegram.org)");
    println!("  DB_PATH                    SQLite database (default: data/calbot.db)");
    println!("  SCHEDULE_ENABLED           Run schedules in serve mode (default: true)");
    println!("  SCHEDULE_CONFIG_PATH       Path to schedule.toml");
}

/// Run the scheduler until Ctrl+C
async fn run_server(config: &Config, app: Arc<App>, store: Arc<SqliteStore>) -> anyhow::Result<()> {
    if !config.scheduler.enabled {
        tracing::warn!("Scheduler is disabled, nothing to do");
        return Ok(());
    }

    let schedule = ScheduleConfig::load(config.scheduler.config_path.as_deref()).map_err(BotError::from)?;
    if schedule.enabled_entries().is_empty() {
        tracing::warn!("No enabled schedule entries");
    }

    let tz = config.timezone()?.tz();
    let handle = Scheduler::new(schedule, app, tz).with_store(store).start();

    tracing::info!("calbot initialized successfully");
    tracing::info!("Press Ctrl+C to exit");

    tokio::signal::ctrl_c().await?;
    tracing::info!("Shutting down...");

    handle.stop().await;

    tracing::info!("Shutdown complete");
    Ok(())
}
