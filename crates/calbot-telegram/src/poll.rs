//! Weekly attendance poll
//!
//! One run of [`PollRunner::run`] sends the poll, collects answers for one
//! interval, replies with a reminder or a thank-you, collects for another
//! interval and closes the poll. Answers arrive from a `getUpdates` listener
//! task over an mpsc channel, so the [`PollSession`] is owned by the run alone.

use calbot_core::{Environment, PollRecord, PollStatus, PollStore, PollTemplates, fill};
use calbot_report::next_poll_monday;
use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use teloxide::types::{PollAnswer, UpdateKind, Voter};
use std::collections::{BTreeSet, HashSet};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::api::TelegramApiClient;
use crate::error::Result;

const TESTING_INTERVAL: Duration = Duration::from_secs(60);
const PRODUCTION_INTERVAL: Duration = Duration::from_secs(24 * 60 * 60);
const TESTING_REQUIRED_VOTES: usize = 1;
const PRODUCTION_REQUIRED_VOTES: usize = 6;

/// Server-side wait of one `getUpdates` call
const LONG_POLL_TIMEOUT_SECS: u32 = 10;
const POLLING_DIVISOR: u32 = 6;
const ERROR_BACKOFF: Duration = Duration::from_secs(5);
const ANSWER_BUFFER: usize = 64;

/// Timing and thresholds of one poll run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollSettings {
    /// Time between sending and the reminder, and between the reminder and closing
    pub interval: Duration,
    /// Votes needed for the thank-you reply instead of the reminder
    pub required_votes: usize,
    pub is_anonymous: bool,
    pub allows_multiple_answers: bool,
}

impl PollSettings {
    pub fn for_environment(environment: Environment, templates: &PollTemplates) -> Self {
        let (interval, required_votes) = if environment.is_testing() {
            (TESTING_INTERVAL, TESTING_REQUIRED_VOTES)
        } else {
            (PRODUCTION_INTERVAL, PRODUCTION_REQUIRED_VOTES)
        };

        Self {
            interval,
            required_votes,
            is_anonymous: templates.is_anonymous,
            allows_multiple_answers: templates.allows_multiple_answers,
        }
    }

    /// Pause between two `getUpdates` calls: `interval / 6` minus the
    /// long-poll timeout, never negative
    pub fn update_poll_interval(&self) -> Duration {
        (self.interval / POLLING_DIVISOR).saturating_sub(Duration::from_secs(LONG_POLL_TIMEOUT_SECS.into()))
    }
}

/// One answer taken from the update stream
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollVote {
    pub poll_id: String,
    /// `None` when a chat answered on behalf of its members
    pub user_id: Option<i64>,
    /// An answer without options withdraws the earlier vote
    pub retracted: bool,
}

impl From<PollAnswer> for PollVote {
    fn from(answer: PollAnswer) -> Self {
        let user_id = match answer.voter {
            Voter::User(user) => Some(user.id.0 as i64),
            _ => None,
        };

        Self {
            poll_id: answer.poll_id.to_string(),
            user_id,
            retracted: answer.option_ids.is_empty(),
        }
    }
}

/// State of one poll run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollSession {
    pub chat_id: String,
    pub poll_id: String,
    pub message_id: i64,
    pub question: String,
    pub opened_at: DateTime<Utc>,
    pub closed_at: Option<DateTime<Utc>>,
    /// Users with a current vote
    pub votes: HashSet<i64>,
    pub status: PollStatus,
}

impl PollSession {
    pub fn new(
        chat_id: impl Into<String>,
        poll_id: impl Into<String>,
        message_id: i64,
        question: impl Into<String>,
    ) -> Self {
        Self {
            chat_id: chat_id.into(),
            poll_id: poll_id.into(),
            message_id,
            question: question.into(),
            opened_at: Utc::now(),
            closed_at: None,
            votes: HashSet::new(),
            status: PollStatus::Open,
        }
    }

    /// Apply one answer. Returns whether the tally changed.
    pub fn apply(&mut self, vote: &PollVote) -> bool {
        if vote.poll_id != self.poll_id {
            debug!("Ignoring answer for poll {}", vote.poll_id);
            return false;
        }
        let Some(user_id) = vote.user_id else {
            return false;
        };

        if vote.retracted {
            let removed = self.votes.remove(&user_id);
            if removed {
                info!("Vote retracted by user {}. Total votes: {}", user_id, self.votes.len());
            }
            removed
        } else {
            let added = self.votes.insert(user_id);
            if added {
                info!("New vote received from user {}. Total votes: {}", user_id, self.votes.len());
            }
            added
        }
    }

    pub fn vote_count(&self) -> usize {
        self.votes.len()
    }

    pub fn to_record(&self) -> PollRecord {
        PollRecord {
            poll_id: self.poll_id.clone(),
            chat_id: self.chat_id.clone(),
            message_id: self.message_id,
            question: self.question.clone(),
            status: self.status,
            opened_at: self.opened_at,
            closed_at: self.closed_at,
            voters: self.votes.iter().copied().collect::<BTreeSet<_>>(),
        }
    }
}

/// Stops the update listener when the run ends, also when the run future
/// is dropped mid-way
struct ListenerGuard(broadcast::Sender<()>);

impl Drop for ListenerGuard {
    fn drop(&mut self) {
        let _ = self.0.send(());
    }
}

/// Forward poll answers from `getUpdates` until shutdown
fn spawn_listener(
    api: TelegramApiClient,
    pause: Duration,
    mut shutdown: broadcast::Receiver<()>,
) -> (mpsc::Receiver<PollVote>, JoinHandle<()>) {
    let (tx, rx) = mpsc::channel(ANSWER_BUFFER);

    let handle = tokio::spawn(async move {
        info!(
            "Started polling for updates every {:?} (long-poll timeout {}s)",
            pause, LONG_POLL_TIMEOUT_SECS
        );
        let mut offset = None;

        loop {
            let result = tokio::select! {
                _ = shutdown.recv() => break,
                result = api.get_updates(offset, LONG_POLL_TIMEOUT_SECS) => result,
            };

            let wait = match result {
                Ok(updates) => {
                    for update in updates {
                        offset = Some(update.id.as_offset());
                        if let UpdateKind::PollAnswer(answer) = update.kind {
                            if tx.send(PollVote::from(answer)).await.is_err() {
                                debug!("Answer receiver dropped, stopping listener");
                                return;
                            }
                        }
                    }
                    pause
                }
                Err(e) => {
                    warn!("Failed to fetch updates: {}", e);
                    pause.max(ERROR_BACKOFF)
                }
            };

            if !wait.is_zero() {
                tokio::select! {
                    _ = shutdown.recv() => break,
                    _ = tokio::time::sleep(wait) => {}
                }
            }
        }

        info!("Update listener stopped");
    });

    (rx, handle)
}

/// Runs the weekly poll in one chat
pub struct PollRunner {
    api: TelegramApiClient,
    chat_id: String,
    settings: PollSettings,
    templates: PollTemplates,
    store: Option<Arc<dyn PollStore>>,
}

impl PollRunner {
    pub fn new(api: TelegramApiClient, chat_id: impl Into<String>, settings: PollSettings, templates: PollTemplates) -> Self {
        Self {
            api,
            chat_id: chat_id.into(),
            settings,
            templates,
            store: None,
        }
    }

    /// Persist the session after every phase
    pub fn with_store(mut self, store: Arc<dyn PollStore>) -> Self {
        self.store = Some(store);
        self
    }

    fn persist(&self, session: &PollSession) {
        if let Some(store) = &self.store {
            if let Err(e) = store.save_poll(&session.to_record()) {
                warn!("Failed to save poll {}: {}", session.poll_id, e);
            }
        }
    }

    /// Send the poll about the Monday after `now`
    pub async fn send_poll(&self, now: DateTime<Tz>) -> Result<PollSession> {
        let monday = next_poll_monday(now.date_naive()).format("%d.%m.").to_string();
        let question = fill(&self.templates.question, &[("date", &monday)]);

        let sent = self
            .api
            .send_poll(
                &self.chat_id,
                &question,
                &self.templates.options,
                self.settings.is_anonymous,
                self.settings.allows_multiple_answers,
            )
            .await?;

        info!("Poll sent successfully for {}!", monday);
        Ok(PollSession::new(&self.chat_id, sent.poll_id, sent.message_id, question))
    }

    /// Apply incoming answers for `duration`, then drain whatever is buffered
    pub async fn collect_votes(&self, session: &mut PollSession, answers: &mut mpsc::Receiver<PollVote>, duration: Duration) {
        let deadline = tokio::time::Instant::now() + duration;

        loop {
            match tokio::time::timeout_at(deadline, answers.recv()).await {
                Ok(Some(answer)) => {
                    session.apply(&answer);
                }
                Ok(None) => {
                    warn!("Update listener is gone, waiting out the interval");
                    tokio::time::sleep_until(deadline).await;
                    break;
                }
                Err(_) => break,
            }
        }

        while let Ok(answer) = answers.try_recv() {
            session.apply(&answer);
        }
    }

    /// Reply to the poll with a reminder, or a thank-you once enough people voted
    pub async fn remind(&self, session: &PollSession) -> Result<()> {
        let current_votes = session.vote_count();
        let required_votes = self.settings.required_votes;

        if current_votes < required_votes {
            let text = fill(
                &self.templates.reminder,
                &[("required_votes", &required_votes.to_string())],
            );
            self.api
                .send_message(&self.chat_id, &text, Some(session.message_id))
                .await?;
            info!("Reminder sent! Current votes: {}", current_votes);
        } else {
            let text = fill(
                &self.templates.success,
                &[("total_votes", &current_votes.to_string())],
            );
            self.api
                .send_message(&self.chat_id, &text, Some(session.message_id))
                .await?;
            info!("Success message sent! Total votes: {}", current_votes);
        }
        Ok(())
    }

    /// Stop the poll. A failed `stopPoll` leaves the session `Interrupted`.
    pub async fn close(&self, session: &mut PollSession) -> Result<()> {
        match self.api.stop_poll(&self.chat_id, session.message_id).await {
            Ok(_) => {
                session.status = PollStatus::Closed;
                session.closed_at = Some(Utc::now());
                info!("Poll closed successfully.");
                Ok(())
            }
            Err(e) => {
                session.status = PollStatus::Interrupted;
                Err(e)
            }
        }
    }

    /// Run the full poll lifecycle
    pub async fn run(&self, now: DateTime<Tz>) -> Result<PollSession> {
        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
        let guard = ListenerGuard(shutdown_tx);
        let (mut answers, listener) = spawn_listener(self.api.clone(), self.settings.update_poll_interval(), shutdown_rx);

        let mut session = match self.send_poll(now).await {
            Ok(session) => session,
            Err(e) => {
                error!("Error sending poll: {}", e);
                drop(guard);
                let _ = listener.await;
                return Err(e);
            }
        };
        self.persist(&session);

        let interval = self.settings.interval;
        info!("Waiting for {:?} before sending reminder...", interval);
        self.collect_votes(&mut session, &mut answers, interval).await;

        if let Err(e) = self.remind(&session).await {
            error!("Error sending message: {}", e);
        }
        self.persist(&session);

        info!("Waiting for {:?} before closing poll...", interval);
        self.collect_votes(&mut session, &mut answers, interval).await;

        if let Err(e) = self.close(&mut session).await {
            error!("Error closing poll: {}", e);
        }
        self.persist(&session);

        drop(guard);
        if let Err(e) = listener.await {
            warn!("Update listener ended abnormally: {}", e);
        }

        info!("Poll finished with {} votes", session.vote_count());
        Ok(session)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::*;
    use calbot_core::SqliteStore;
    use chrono::TimeZone;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, body_string_contains, method};
    use wiremock::{Mock, MockServer};

    fn vote(poll_id: &str, user_id: i64) -> PollVote {
        PollVote {
            poll_id: poll_id.to_string(),
            user_id: Some(user_id),
            retracted: false,
        }
    }

    fn retraction(poll_id: &str, user_id: i64) -> PollVote {
        PollVote {
            retracted: true,
            ..vote(poll_id, user_id)
        }
    }

    fn session() -> PollSession {
        PollSession::new("-1001", "p1", 7, "Wer ist dabei?")
    }

    fn settings(interval: Duration, required_votes: usize) -> PollSettings {
        PollSettings {
            interval,
            required_votes,
            is_anonymous: false,
            allows_multiple_answers: false,
        }
    }

    fn runner(server: &MockServer, required_votes: usize) -> PollRunner {
        PollRunner::new(
            client_for(server),
            "-1001",
            settings(Duration::from_millis(200), required_votes),
            PollTemplates::default(),
        )
    }

    fn monday_morning() -> DateTime<Tz> {
        chrono_tz::Europe::Berlin.with_ymd_and_hms(2024, 3, 4, 10, 0, 0).unwrap()
    }

    #[test]
    fn test_settings_per_environment() {
        let templates = PollTemplates::default();

        let testing = PollSettings::for_environment(Environment::Testing, &templates);
        assert_eq!(testing.interval, Duration::from_secs(60));
        assert_eq!(testing.required_votes, 1);
        assert_eq!(testing.update_poll_interval(), Duration::ZERO);

        let production = PollSettings::for_environment(Environment::Production, &templates);
        assert_eq!(production.interval, Duration::from_secs(86400));
        assert_eq!(production.required_votes, 6);
        assert_eq!(production.update_poll_interval(), Duration::from_secs(14390));
    }

    #[test]
    fn test_vote_from_poll_answer() {
        let answer: PollAnswer = serde_json::from_value(json!({
            "poll_id": "p1",
            "user": {"id": 11, "is_bot": false, "first_name": "Ada"},
            "option_ids": [0]
        }))
        .unwrap();
        assert_eq!(PollVote::from(answer), vote("p1", 11));

        let answer: PollAnswer = serde_json::from_value(json!({
            "poll_id": "p1",
            "user": {"id": 11, "is_bot": false, "first_name": "Ada"},
            "option_ids": []
        }))
        .unwrap();
        assert_eq!(PollVote::from(answer), retraction("p1", 11));
    }

    #[test]
    fn test_tally_counts_unique_voters() {
        let mut session = session();
        assert!(session.apply(&vote("p1", 1)));
        assert!(!session.apply(&vote("p1", 1)));
        assert!(session.apply(&vote("p1", 2)));
        assert_eq!(session.vote_count(), 2);
    }

    #[test]
    fn test_tally_ignores_other_polls_and_chats() {
        let mut session = session();
        assert!(!session.apply(&vote("other", 1)));
        assert!(!session.apply(&PollVote {
            user_id: None,
            ..vote("p1", 1)
        }));
        assert_eq!(session.vote_count(), 0);
    }

    #[test]
    fn test_retraction_removes_vote() {
        let mut session = session();
        session.apply(&vote("p1", 1));
        assert!(session.apply(&retraction("p1", 1)));
        assert_eq!(session.vote_count(), 0);
        assert!(!session.apply(&retraction("p1", 1)));
    }

    #[test]
    fn test_to_record() {
        let mut session = session();
        session.apply(&vote("p1", 3));
        session.apply(&vote("p1", 1));
        let record = session.to_record();
        assert_eq!(record.poll_id, "p1");
        assert_eq!(record.message_id, 7);
        assert_eq!(record.voters.into_iter().collect::<Vec<_>>(), vec![1, 3]);
    }

    #[tokio::test]
    async fn test_collect_votes_until_deadline() {
        let server = MockServer::start().await;
        let runner = runner(&server, 1);
        let (tx, mut rx) = mpsc::channel(8);
        tx.send(vote("p1", 1)).await.unwrap();
        tx.send(vote("p2", 2)).await.unwrap();
        tx.send(vote("p1", 3)).await.unwrap();

        let mut session = session();
        let started = tokio::time::Instant::now();
        runner.collect_votes(&mut session, &mut rx, Duration::from_millis(50)).await;

        assert!(started.elapsed() >= Duration::from_millis(50));
        assert_eq!(session.vote_count(), 2);
    }

    #[tokio::test]
    async fn test_send_poll_question_uses_next_monday() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(api_method("sendPoll"))
            .and(body_partial_json(json!({"question": "Wer ist beim Treffen am 11.03. dabei?"})))
            .respond_with(ok(poll_message(7, "p1")))
            .expect(1)
            .mount(&server)
            .await;

        let session = runner(&server, 1).send_poll(monday_morning()).await.unwrap();
        assert_eq!(session.poll_id, "p1");
        assert_eq!(session.message_id, 7);
        assert_eq!(session.status, PollStatus::Open);
    }

    #[tokio::test]
    async fn test_remind_below_threshold() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(api_method("sendMessage"))
            .and(body_string_contains("weniger als 6 Personen"))
            .and(body_partial_json(json!({"reply_parameters": {"message_id": 7}})))
            .respond_with(ok(text_message(8, "Erinnerung")))
            .expect(1)
            .mount(&server)
            .await;

        let mut session = session();
        session.apply(&vote("p1", 1));
        runner(&server, 6).remind(&session).await.unwrap();
    }

    #[tokio::test]
    async fn test_remind_success_at_threshold() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(api_method("sendMessage"))
            .and(body_string_contains("Danke"))
            .respond_with(ok(text_message(8, "Danke")))
            .expect(1)
            .mount(&server)
            .await;

        let mut session = session();
        session.apply(&vote("p1", 1));
        runner(&server, 1).remind(&session).await.unwrap();
    }

    #[tokio::test]
    async fn test_close_failure_marks_interrupted() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(api_method("stopPoll"))
            .respond_with(api_error(400, "Bad Request: poll has already been closed"))
            .mount(&server)
            .await;

        let mut session = session();
        assert!(runner(&server, 1).close(&mut session).await.is_err());
        assert_eq!(session.status, PollStatus::Interrupted);
    }

    #[tokio::test]
    async fn test_run_full_lifecycle() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(api_method("getUpdates"))
            .respond_with(
                ok(json!([
                    poll_answer_update(1, "p1", 5, &[0]),
                    poll_answer_update(2, "old", 6, &[0])
                ]))
                .set_delay(Duration::from_millis(20)),
            )
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(api_method("sendPoll"))
            .respond_with(ok(poll_message(7, "p1")))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(api_method("sendMessage"))
            .and(body_string_contains("Danke"))
            .respond_with(ok(text_message(8, "Danke")))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(api_method("stopPoll"))
            .and(body_partial_json(json!({"message_id": 7})))
            .respond_with(ok(poll("p1", true)))
            .expect(1)
            .mount(&server)
            .await;

        let store = Arc::new(SqliteStore::in_memory().unwrap());
        let runner = runner(&server, 1).with_store(store.clone());

        let session = runner.run(monday_morning()).await.unwrap();
        assert_eq!(session.status, PollStatus::Closed);
        assert_eq!(session.votes, HashSet::from([5]));

        let record = store.load_poll("p1").unwrap().unwrap();
        assert_eq!(record.status, PollStatus::Closed);
        assert!(record.closed_at.is_some());
        assert_eq!(record.voters, BTreeSet::from([5]));
    }

    #[tokio::test]
    async fn test_run_fails_when_poll_cannot_be_sent() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(api_method("getUpdates"))
            .respond_with(ok(json!([])).set_delay(Duration::from_millis(20)))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(api_method("sendPoll"))
            .respond_with(api_error(400, "Bad Request: chat not found"))
            .mount(&server)
            .await;

        assert!(runner(&server, 1).run(monday_morning()).await.is_err());
    }

    #[tokio::test]
    async fn test_dropped_run_stops_listener() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(api_method("getUpdates"))
            .respond_with(ok(json!([])).set_delay(Duration::from_millis(20)))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(api_method("sendPoll"))
            .respond_with(ok(poll_message(7, "p1")))
            .mount(&server)
            .await;

        let runner = PollRunner::new(
            client_for(&server),
            "-1001",
            settings(Duration::from_secs(3600), 1),
            PollTemplates::default(),
        );
        let run = tokio::time::timeout(Duration::from_millis(200), runner.run(monday_morning())).await;
        assert!(run.is_err());

        tokio::time::sleep(Duration::from_millis(100)).await;
        let settled = server.received_requests().await.unwrap().len();
        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(server.received_requests().await.unwrap().len(), settled);
    }
}
