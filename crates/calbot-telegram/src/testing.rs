//! Bot API fixtures shared by the unit tests

use serde_json::{Value, json};
use wiremock::ResponseTemplate;
use wiremock::matchers::{PathRegexMatcher, path_regex};

use crate::api::TelegramApiClient;

pub const TOKEN: &str = "1:t";

pub fn client_for(server: &wiremock::MockServer) -> TelegramApiClient {
    TelegramApiClient::new(&server.uri(), TOKEN).unwrap()
}

/// Matches `/bot<token>/<method>`, ignoring the case of the method name
pub fn api_method(method: &str) -> PathRegexMatcher {
    path_regex(format!(r"(?i)^/bot[^/]+/{}$", method))
}

pub fn ok(result: Value) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({"ok": true, "result": result}))
}

pub fn api_error(code: u16, description: &str) -> ResponseTemplate {
    ResponseTemplate::new(code).set_body_json(json!({
        "ok": false,
        "error_code": code,
        "description": description,
    }))
}

pub fn text_message(message_id: i32, text: &str) -> Value {
    json!({
        "message_id": message_id,
        "date": 1709550000,
        "chat": {"id": -1001, "type": "group", "title": "Stammtisch"},
        "from": {"id": 99, "is_bot": true, "first_name": "calbot"},
        "text": text,
    })
}

pub fn poll(poll_id: &str, is_closed: bool) -> Value {
    json!({
        "id": poll_id,
        "question": "Wer ist dabei?",
        "options": [
            {"text": "Ich bin dabei!", "voter_count": 0},
            {"text": "Ich kann nicht", "voter_count": 0}
        ],
        "total_voter_count": 0,
        "is_closed": is_closed,
        "is_anonymous": false,
        "type": "regular",
        "allows_multiple_answers": false,
    })
}

pub fn poll_message(message_id: i32, poll_id: &str) -> Value {
    json!({
        "message_id": message_id,
        "date": 1709550000,
        "chat": {"id": -1001, "type": "group", "title": "Stammtisch"},
        "from": {"id": 99, "is_bot": true, "first_name": "calbot"},
        "poll": poll(poll_id, false),
    })
}

pub fn poll_answer_update(update_id: u32, poll_id: &str, user_id: u64, option_ids: &[u8]) -> Value {
    json!({
        "update_id": update_id,
        "poll_answer": {
            "poll_id": poll_id,
            "user": {"id": user_id, "is_bot": false, "first_name": "Ada"},
            "option_ids": option_ids,
        }
    })
}
