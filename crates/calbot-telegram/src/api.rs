//! Telegram Bot API access
//!
//! Wraps a teloxide [`Bot`] with the handful of calls the bot makes,
//! expressed in plain chat and message ids.

use reqwest::Url;
use teloxide::payloads::{GetUpdatesSetters, SendMessageSetters, SendPollSetters};
use teloxide::prelude::*;
use teloxide::types::{AllowedUpdate, ChatId, MessageId, ParseMode, Recipient, ReplyParameters, Update};
use tracing::{debug, info};

use crate::error::{Result, TelegramError};

/// A poll message created by `sendPoll`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentPoll {
    pub message_id: i64,
    pub poll_id: String,
}

/// Telegram Bot API client
#[derive(Clone)]
pub struct TelegramApiClient {
    bot: Bot,
}

impl TelegramApiClient {
    /// Create a client talking to `api_url`
    pub fn new(api_url: &str, token: &str) -> Result<Self> {
        if token.trim().is_empty() {
            return Err(TelegramError::Config("Bot token is empty".to_string()));
        }

        let url = Url::parse(api_url)
            .map_err(|e| TelegramError::Config(format!("Invalid API URL {}: {}", api_url, e)))?;

        Ok(Self {
            bot: Bot::new(token).set_api_url(url),
        })
    }

    /// Send a text message with HTML formatting, optionally as a reply
    pub async fn send_message(&self, chat_id: &str, text: &str, reply_to: Option<i64>) -> Result<i64> {
        let mut request = self
            .bot
            .send_message(recipient(chat_id), text)
            .parse_mode(ParseMode::Html);
        if let Some(message_id) = reply_to {
            request = request.reply_parameters(ReplyParameters::new(message_id_of(message_id)?));
        }

        debug!("Sending message to {}", chat_id);
        let message = request.await?;
        info!("Message {} sent to {}", message.id.0, chat_id);
        Ok(i64::from(message.id.0))
    }

    /// Send a poll
    pub async fn send_poll(
        &self,
        chat_id: &str,
        question: &str,
        options: &[String],
        is_anonymous: bool,
        allows_multiple_answers: bool,
    ) -> Result<SentPoll> {
        debug!("Sending poll to {}", chat_id);
        let message = self
            .bot
            .send_poll(recipient(chat_id), question, options.to_vec())
            .is_anonymous(is_anonymous)
            .allows_multiple_answers(allows_multiple_answers)
            .await?;

        let poll = message
            .poll()
            .ok_or_else(|| TelegramError::Response("sendPoll returned no poll".to_string()))?;

        Ok(SentPoll {
            message_id: i64::from(message.id.0),
            poll_id: poll.id.to_string(),
        })
    }

    /// Close a poll sent by the bot
    pub async fn stop_poll(&self, chat_id: &str, message_id: i64) -> Result<()> {
        let poll = self
            .bot
            .stop_poll(recipient(chat_id), message_id_of(message_id)?)
            .await?;
        debug!("Poll {} stopped with {} voters", poll.id, poll.total_voter_count);
        Ok(())
    }

    /// Long-poll for poll answers after `offset`
    pub async fn get_updates(&self, offset: Option<i32>, timeout_secs: u32) -> Result<Vec<Update>> {
        let mut request = self
            .bot
            .get_updates()
            .timeout(timeout_secs)
            .allowed_updates(vec![AllowedUpdate::PollAnswer]);
        if let Some(offset) = offset {
            request = request.offset(offset);
        }

        let updates = request.await?;
        debug!("Received {} updates", updates.len());
        Ok(updates)
    }
}

/// Numeric chat ids address groups and users, anything else a channel username
fn recipient(chat_id: &str) -> Recipient {
    match chat_id.parse::<i64>() {
        Ok(id) => Recipient::Id(ChatId(id)),
        Err(_) => Recipient::ChannelUsername(chat_id.to_string()),
    }
}

fn message_id_of(message_id: i64) -> Result<MessageId> {
    i32::try_from(message_id)
        .map(MessageId)
        .map_err(|_| TelegramError::Response(format!("Message id {} out of range", message_id)))
}
