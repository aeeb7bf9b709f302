//! Job wiring: calendar, reports, delivery and poll

use async_trait::async_trait;
use calbot_calendar::{CalendarClient, CalendarConfig, CalendarError, CalendarSource};
use calbot_core::{Config, JobKind, LocalTimezone, PollStore, PollTemplates, ReportTemplates, fill};
use calbot_report::{
    Notifier, StdoutNotifier, failure_message, free_days_report, next_poll_monday, publish,
    weekly_overview_report,
};
use calbot_schedule::JobRunner;
use calbot_telegram::{PollRunner, PollSettings, TelegramApiClient, TelegramNotifier};
use std::sync::Arc;
use tracing::{info, warn};

use crate::error::Result;

/// Everything a job needs, built once per process
pub struct App {
    tz: LocalTimezone,
    templates: ReportTemplates,
    poll_templates: PollTemplates,
    /// Reason the calendar is unavailable when construction failed
    calendar: std::result::Result<Arc<dyn CalendarSource>, String>,
    notifier: Arc<dyn Notifier>,
    /// `None` in dry-run mode
    poll: Option<PollRunner>,
}

impl App {
    pub fn new(
        tz: LocalTimezone,
        templates: ReportTemplates,
        poll_templates: PollTemplates,
        calendar: std::result::Result<Arc<dyn CalendarSource>, String>,
        notifier: Arc<dyn Notifier>,
        poll: Option<PollRunner>,
    ) -> Self {
        Self {
            tz,
            templates,
            poll_templates,
            calendar,
            notifier,
            poll,
        }
    }

    /// Build from configuration. With `dry_run` reports are printed and no
    /// Telegram credentials are needed.
    pub fn from_config(config: &Config, store: Arc<dyn PollStore>, dry_run: bool) -> Result<Self> {
        let tz = config.timezone()?;

        let calendar = build_calendar(config).map_err(|e| {
            warn!("Calendar unavailable: {}", e);
            e.to_string()
        });

        let (notifier, poll): (Arc<dyn Notifier>, Option<PollRunner>) = if dry_run {
            info!("Dry run: messages are printed instead of sent");
            (Arc::new(StdoutNotifier), None)
        } else {
            let (token, chat_id) = config.require_telegram()?;
            let api = TelegramApiClient::new(&config.telegram.api_url, token)?;
            let settings = PollSettings::for_environment(config.environment, &config.poll);
            let poll = PollRunner::new(api.clone(), chat_id, settings, config.poll.clone()).with_store(store);
            (Arc::new(TelegramNotifier::new(api, chat_id)), Some(poll))
        };

        Ok(Self::new(
            tz,
            config.templates.clone(),
            config.poll.clone(),
            calendar,
            notifier,
            poll,
        ))
    }

    async fn report(&self, job: JobKind) -> String {
        let calendar = match &self.calendar {
            Ok(calendar) => calendar,
            Err(reason) => {
                return failure_message(&CalendarError::Configuration(reason.clone()), &self.templates);
            }
        };

        let now = self.tz.now();
        match job {
            JobKind::WeeklyOverview => {
                weekly_overview_report(calendar.as_ref(), &self.tz, &self.templates, now).await
            }
            _ => free_days_report(calendar.as_ref(), &self.tz, &self.templates, now).await,
        }
    }

    async fn deliver(&self, text: &str) -> anyhow::Result<()> {
        if !publish(self.notifier.as_ref(), text).await {
            anyhow::bail!("delivery via {} failed", self.notifier.name());
        }
        Ok(())
    }

    async fn run_poll(&self) -> anyhow::Result<()> {
        match &self.poll {
            Some(runner) => {
                let session = runner.run(self.tz.now()).await?;
                info!(
                    "Poll {} ended as {} with {} votes",
                    session.poll_id,
                    session.status.as_str(),
                    session.vote_count()
                );
                Ok(())
            }
            None => {
                let monday = next_poll_monday(self.tz.now().date_naive()).format("%d.%m.").to_string();
                let mut preview = fill(&self.poll_templates.question, &[("date", &monday)]);
                for option in &self.poll_templates.options {
                    preview.push_str("\n- ");
                    preview.push_str(option);
                }
                self.deliver(&preview).await
            }
        }
    }
}

fn build_calendar(config: &Config) -> calbot_calendar::Result<Arc<dyn CalendarSource>> {
    let url = config
        .require_calendar()
        .map_err(|e| CalendarError::Configuration(e.to_string()))?;

    let mut calendar_config = CalendarConfig::new(
        url,
        config.caldav.username.clone().unwrap_or_default(),
        config.caldav.password.clone().unwrap_or_default(),
    );
    if let Some(path) = &config.caldav.calendar_path {
        calendar_config = calendar_config.with_calendar_path(path);
    }

    Ok(Arc::new(CalendarClient::new(calendar_config)?))
}

#[async_trait]
impl JobRunner for App {
    async fn run_job(&self, job: JobKind) -> anyhow::Result<()> {
        match job {
            JobKind::FreeDays | JobKind::WeeklyOverview => {
                let text = self.report(job).await;
                self.deliver(&text).await
            }
            JobKind::Poll => self.run_poll().await,
        }
    }
}
