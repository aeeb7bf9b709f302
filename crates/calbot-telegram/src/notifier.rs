//! Report delivery to a Telegram chat

use async_trait::async_trait;
use calbot_report::Notifier;
use tracing::{debug, warn};

use crate::api::TelegramApiClient;

/// Bot API limit for one text message
pub const MAX_MESSAGE_LEN: usize = 4096;

/// Split a message into chunks of at most `max_size` bytes, preferring
/// paragraph and line breaks
pub fn split_message(text: &str, max_size: usize) -> Vec<String> {
    if text.len() <= max_size {
        return vec![text.to_string()];
    }

    let mut chunks = Vec::new();
    let mut remaining = text;

    while !remaining.is_empty() {
        if remaining.len() <= max_size {
            chunks.push(remaining.to_string());
            break;
        }

        let mut search_end = max_size;
        while !remaining.is_char_boundary(search_end) {
            search_end -= 1;
        }
        if search_end == 0 {
            search_end = remaining.chars().next().map_or(remaining.len(), char::len_utf8);
        }
        let chunk = &remaining[..search_end];

        let break_point = chunk
            .rfind("\n\n")
            .map(|i| i + 2)
            .or_else(|| chunk.rfind('\n').map(|i| i + 1))
            .or_else(|| chunk.rfind(' ').map(|i| i + 1))
            .unwrap_or_else(|| markup_safe_end(chunk));

        chunks.push(remaining[..break_point].to_string());
        remaining = &remaining[break_point..];
    }

    chunks
}

/// Pull a hard cut back to before an unterminated `&...;` entity or `<...>`
/// tag, so each chunk stays valid HTML
fn markup_safe_end(chunk: &str) -> usize {
    let mut end = chunk.len();
    for (open, close) in [('&', ';'), ('<', '>')] {
        if let Some(start) = chunk[..end].rfind(open) {
            if start > 0 && !chunk[start..end].contains(close) {
                end = start;
            }
        }
    }
    end
}

/// Sends reports to one chat with HTML parse mode
pub struct TelegramNotifier {
    api: TelegramApiClient,
    chat_id: String,
}

impl TelegramNotifier {
    pub fn new(api: TelegramApiClient, chat_id: impl Into<String>) -> Self {
        Self {
            api,
            chat_id: chat_id.into(),
        }
    }
}

#[async_trait]
impl Notifier for TelegramNotifier {
    async fn deliver(&self, text: &str) -> anyhow::Result<()> {
        let chunks = split_message(text, MAX_MESSAGE_LEN);
        let total = chunks.len();
        debug!("Delivering report in {} message(s)", total);

        for (sent, chunk) in chunks.iter().enumerate() {
            if let Err(e) = self.api.send_message(&self.chat_id, chunk, None).await {
                if sent > 0 {
                    warn!(
                        "Report only partially delivered to {}: {} of {} messages sent",
                        self.chat_id, sent, total
                    );
                }
                return Err(e.into());
            }
        }
        Ok(())
    }

    fn name(&self) -> &str {
        "telegram"
    }
}
