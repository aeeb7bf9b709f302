//! Message templates
//!
//! Texts posted to the chat. Every field can be overridden from the
//! `[templates]` and `[poll]` sections of `calbot.toml`; the defaults are the
//! German texts the channel expects.
//!
//! Placeholders use `{name}` syntax and are substituted with [`fill`].

use serde::{Deserialize, Serialize};

/// Templates for the free-days and weekly-overview reports
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ReportTemplates {
    /// Free-days header. Placeholders: `{start_date}`, `{end_date}`
    pub free_days_header: String,
    /// Weekly-overview header. Placeholders: `{start_date}`, `{end_date}`
    pub weekly_overview_header: String,
    /// Body used when every day in the window has an event
    pub no_free_days: String,
    /// Appended to every report
    pub footer: String,
    /// Returned instead of a report when the calendar is unreachable
    pub connection_error: String,
    /// Returned instead of a report when fetching events fails
    pub retrieval_error: String,
}

impl Default for ReportTemplates {
    fn default() -> Self {
        Self {
            free_days_header:
                "Hier sind die freien Tage in den nächsten zwei Wochen ({start_date} - {end_date}):\n"
                    .to_string(),
            weekly_overview_header: "Hier ist die Wochenübersicht ({start_date} - {end_date}):\n"
                .to_string(),
            no_free_days: "Keine freien Tage in den nächsten zwei Wochen.".to_string(),
            footer: "\n\nWir freuen uns immer über euer Feedback!".to_string(),
            connection_error: "Fehler bei der Verbindung zum Kalender.".to_string(),
            retrieval_error: "Fehler beim Abrufen der Veranstaltungsdaten.".to_string(),
        }
    }
}

/// Templates and options for the weekly attendance poll
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct PollTemplates {
    /// Poll question. Placeholder: `{date}` (next Monday, `dd.mm.`)
    pub question: String,
    /// Answer options in display order
    pub options: Vec<String>,
    /// Reply when too few people voted. Placeholder: `{required_votes}`
    pub reminder: String,
    /// Reply when enough people voted. Placeholder: `{total_votes}`
    pub success: String,
    pub is_anonymous: bool,
    pub allows_multiple_answers: bool,
}

impl Default for PollTemplates {
    fn default() -> Self {
        Self {
            question: "Wer ist beim Treffen am {date} dabei?".to_string(),
            options: vec![
                "Ich bin dabei!".to_string(),
                "Ich bin nicht dabei :(".to_string(),
                "Ich weiß es noch nicht".to_string(),
            ],
            reminder: "⚠️ Bitte nehmt an der Umfrage teil! Bisher haben weniger als {required_votes} Personen abgestimmt."
                .to_string(),
            success: "Danke fürs Abstimmen! 👍".to_string(),
            is_anonymous: false,
            allows_multiple_answers: false,
        }
    }
}

/// Substitute `{key}` placeholders in `template`
pub fn fill(template: &str, values: &[(&str, &str)]) -> String {
    values.iter().fold(template.to_string(), |text, (key, value)| {
        text.replace(&format!("{{{}}}", key), value)
    })
}
