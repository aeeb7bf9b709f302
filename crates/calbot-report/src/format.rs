//! Event formatting for the weekly overview

use calbot_calendar::{LocalTime, RawEvent};
use calbot_core::LocalTimezone;
use chrono::{Duration, NaiveDate};
use tracing::error;

use crate::error::{ReportError, Result};
use crate::weekday::german_weekday;

pub const DEFAULT_TITLE: &str = "Unbenannter Termin";
pub const DEFAULT_DESCRIPTION: &str = "Keine Beschreibung vorhanden.";
pub const ALL_DAY: &str = "Ganztägig";
pub const OPEN_END: &str = "OpenEnd";
pub const SMOKE_FREE: &str = "Rauchfrei";
pub const SMOKING_ALLOWED: &str = "Rauchkneipe";

const SMOKE_FREE_MARKER: &str = "rauchfrei";

/// Markers removed from smoke-free titles, applied in order
const SMOKE_FREE_TOKENS: [&str; 8] = [
    "(rauchfrei)",
    "[rauchfrei]",
    "{rauchfrei}",
    "(Rauchfrei)",
    "[Rauchfrei]",
    "{Rauchfrei}",
    "rauchfrei",
    "Rauchfrei",
];

const TITLE_TRIM: &[char] = &[':', ',', '-', ' ', '(', ')', '[', ']', '{', '}'];

/// Reports are sent with HTML parse mode, so calendar text must not carry markup
fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;").replace('<', "&lt;").replace('>', "&gt;")
}

/// One event ready for the weekly overview
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormattedEvent {
    pub sort_key: NaiveDate,
    pub display_date: String,
    pub display_text: String,
}

/// Title used in log lines about `event`
pub fn event_label(event: &RawEvent) -> &str {
    event.summary.as_deref().unwrap_or(DEFAULT_TITLE)
}

/// Local start date used to order events
pub fn sort_key(event: &RawEvent, tz: &LocalTimezone) -> Result<NaiveDate> {
    event
        .start
        .map(|start| start.local_date(tz))
        .ok_or(ReportError::MissingStart)
}

/// Split a title into its display form and smoking status
pub fn smoking_status(title: &str) -> (String, &'static str) {
    let truncated = title.split(',').next().unwrap_or_default();

    if !title.to_lowercase().contains(SMOKE_FREE_MARKER) {
        return (truncated.to_string(), SMOKING_ALLOWED);
    }

    let mut stripped = truncated.to_string();
    for token in SMOKE_FREE_TOKENS {
        stripped = stripped.replace(token, "");
    }
    (stripped.trim_matches(TITLE_TRIM).to_string(), SMOKE_FREE)
}

fn time_range(start: LocalTime, end: Option<LocalTime>) -> String {
    match start {
        LocalTime::DateTime(start) => {
            let from = start.format("%H:%M");
            match end {
                Some(LocalTime::DateTime(end)) if end.date_naive() == start.date_naive() => {
                    format!("{} - {}", from, end.format("%H:%M"))
                }
                _ => format!("{} - {}", from, OPEN_END),
            }
        }
        LocalTime::Date(start) => match end {
            Some(LocalTime::DateTime(_)) => format!("{} - {}", ALL_DAY, OPEN_END),
            // End dates of all-day events are exclusive
            Some(LocalTime::Date(end)) if end - Duration::days(1) > start => {
                let last = end - Duration::days(1);
                format!("{} bis einschließlich {}", ALL_DAY, last.format("%d.%m."))
            }
            _ => ALL_DAY.to_string(),
        },
    }
}

fn render(event: &RawEvent, tz: &LocalTimezone) -> Result<FormattedEvent> {
    let start = event.start.ok_or(ReportError::MissingStart)?;
    let local_start = start
        .localize(tz)
        .ok_or_else(|| ReportError::InvalidTime(format!("{:?}", start)))?;
    // A nonexistent local end reads like a missing one
    let local_end = event.end.and_then(|end| end.localize(tz));

    let date = local_start.date();
    let display_date = format!("{} {}", german_weekday(date)?, date.format("%d.%m."));

    let (title, status) = smoking_status(event_label(event));
    let description = event.description.as_deref().unwrap_or(DEFAULT_DESCRIPTION);

    let display_text = format!(
        "  🗓  {}\n  🕖  {}\n  🃏  {}\n  🫧  {}\n  🪩  {}",
        display_date,
        time_range(local_start, local_end),
        escape_html(&title),
        escape_html(description),
        status
    );

    Ok(FormattedEvent {
        sort_key: sort_key(event, tz)?,
        display_date,
        display_text,
    })
}

/// Format one event for the weekly overview.
///
/// Failures are logged with the event's title before they are returned.
pub fn format_event(event: &RawEvent, tz: &LocalTimezone) -> Result<FormattedEvent> {
    render(event, tz).inspect_err(|e| {
        error!(event = %event_label(event), "Failed to format event: {}", e);
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use calbot_calendar::EventTime;
    use chrono::{NaiveDateTime, TimeZone, Utc};

    fn tz() -> LocalTimezone {
        LocalTimezone::default()
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn utc(y: i32, m: u32, d: u32, h: u32, min: u32) -> EventTime {
        EventTime::DateTime(Utc.with_ymd_and_hms(y, m, d, h, min, 0).unwrap())
    }

    fn floating(s: &str) -> EventTime {
        EventTime::Floating(NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M").unwrap())
    }

    fn lines(formatted: &FormattedEvent) -> Vec<&str> {
        formatted.display_text.lines().collect()
    }

    #[test]
    fn test_timed_event_same_day() {
        // 18:00-20:00 UTC is 19:00-21:00 in Berlin (CET)
        let event = RawEvent::new(utc(2024, 3, 5, 18, 0), Some(utc(2024, 3, 5, 20, 0)))
            .with_summary("Skatabend")
            .with_description("Karten mitbringen");

        let formatted = format_event(&event, &tz()).unwrap();
        assert_eq!(formatted.sort_key, date(2024, 3, 5));
        assert_eq!(formatted.display_date, "Dienstag 05.03.");
        assert_eq!(
            formatted.display_text,
            "  🗓  Dienstag 05.03.\n  🕖  19:00 - 21:00\n  🃏  Skatabend\n  🫧  Karten mitbringen\n  🪩  Rauchkneipe"
        );
    }

    #[test]
    fn test_timed_event_across_midnight_is_open_end() {
        let event = RawEvent::new(floating("2024-03-08 22:00"), Some(floating("2024-03-09 02:00")));
        let formatted = format_event(&event, &tz()).unwrap();
        assert_eq!(lines(&formatted)[1], "  🕖  22:00 - OpenEnd");
    }

    #[test]
    fn test_timed_event_without_end_is_open_end() {
        let event = RawEvent::new(floating("2024-03-08 20:30"), None);
        let formatted = format_event(&event, &tz()).unwrap();
        assert_eq!(lines(&formatted)[1], "  🕖  20:30 - OpenEnd");
    }

    #[test]
    fn test_timed_event_with_all_day_end_is_open_end() {
        let event = RawEvent::new(floating("2024-03-08 20:30"), Some(EventTime::Date(date(2024, 3, 9))));
        let formatted = format_event(&event, &tz()).unwrap();
        assert_eq!(lines(&formatted)[1], "  🕖  20:30 - OpenEnd");
    }

    #[test]
    fn test_all_day_multi_day_end_is_inclusive() {
        let event = RawEvent::new(
            EventTime::Date(date(2024, 3, 8)),
            Some(EventTime::Date(date(2024, 3, 10))),
        );
        let formatted = format_event(&event, &tz()).unwrap();
        assert_eq!(formatted.display_date, "Freitag 08.03.");
        assert_eq!(lines(&formatted)[1], "  🕖  Ganztägig bis einschließlich 09.03.");
    }

    #[test]
    fn test_all_day_single_day() {
        let single = RawEvent::new(
            EventTime::Date(date(2024, 3, 8)),
            Some(EventTime::Date(date(2024, 3, 9))),
        );
        let no_end = RawEvent::new(EventTime::Date(date(2024, 3, 8)), None);

        for event in [single, no_end] {
            let formatted = format_event(&event, &tz()).unwrap();
            assert_eq!(lines(&formatted)[1], "  🕖  Ganztägig");
        }
    }

    #[test]
    fn test_all_day_with_timed_end_is_open_end() {
        let event = RawEvent::new(EventTime::Date(date(2024, 3, 8)), Some(floating("2024-03-08 23:00")));
        let formatted = format_event(&event, &tz()).unwrap();
        assert_eq!(lines(&formatted)[1], "  🕖  Ganztägig - OpenEnd");
    }

    #[test]
    fn test_defaults() {
        let event = RawEvent::new(floating("2024-03-08 20:00"), Some(floating("2024-03-08 22:00")));
        let formatted = format_event(&event, &tz()).unwrap();
        let lines = lines(&formatted);
        assert_eq!(lines[2], "  🃏  Unbenannter Termin");
        assert_eq!(lines[3], "  🫧  Keine Beschreibung vorhanden.");
        assert_eq!(lines[4], "  🪩  Rauchkneipe");
    }

    #[test]
    fn test_smoke_free_title() {
        let event = RawEvent::new(floating("2024-03-08 18:00"), Some(floating("2024-03-08 19:30")))
            .with_summary("Yoga (rauchfrei), Raum 3");
        let formatted = format_event(&event, &tz()).unwrap();
        let lines = lines(&formatted);
        assert_eq!(lines[2], "  🃏  Yoga");
        assert_eq!(lines[4], "  🪩  Rauchfrei");
    }

    #[test]
    fn test_smoking_status_rules() {
        assert_eq!(smoking_status("Quiz [Rauchfrei]"), ("Quiz".to_string(), SMOKE_FREE));
        assert_eq!(smoking_status("Rauchfrei: Kicker"), ("Kicker".to_string(), SMOKE_FREE));
        assert_eq!(smoking_status("Lesung - rauchfrei"), ("Lesung".to_string(), SMOKE_FREE));
        // Marker after the comma still counts
        assert_eq!(smoking_status("Konzert, rauchfrei"), ("Konzert".to_string(), SMOKE_FREE));
        // Only the two listed spellings are stripped
        assert_eq!(smoking_status("Jam (RAUCHFREI)"), ("Jam (RAUCHFREI".to_string(), SMOKE_FREE));
        assert_eq!(
            smoking_status("Kneipenabend, Tisch 2"),
            ("Kneipenabend".to_string(), SMOKING_ALLOWED)
        );
    }

    #[test]
    fn test_calendar_text_is_html_escaped() {
        let event = RawEvent::new(floating("2024-03-08 20:00"), None)
            .with_summary("Rock & Roll")
            .with_description("<b>laut</b>");
        let formatted = format_event(&event, &tz()).unwrap();
        let lines = lines(&formatted);
        assert_eq!(lines[2], "  🃏  Rock &amp; Roll");
        assert_eq!(lines[3], "  🫧  &lt;b&gt;laut&lt;/b&gt;");
    }

    #[test]
    fn test_missing_start_fails() {
        let event = RawEvent::default().with_summary("Kaputt");
        assert!(matches!(format_event(&event, &tz()), Err(ReportError::MissingStart)));
        assert!(matches!(sort_key(&event, &tz()), Err(ReportError::MissingStart)));
    }

    #[test]
    fn test_nonexistent_local_start_fails() {
        // 02:30 does not exist in Berlin on 2024-03-31
        let event = RawEvent::new(floating("2024-03-31 02:30"), None);
        assert!(matches!(format_event(&event, &tz()), Err(ReportError::InvalidTime(_))));
    }

    #[test]
    fn test_sort_key_uses_local_date() {
        // 23:30 UTC on the 5th is already the 6th in Berlin
        let event = RawEvent::new(utc(2024, 3, 5, 23, 30), None);
        assert_eq!(sort_key(&event, &tz()).unwrap(), date(2024, 3, 6));

        let all_day = RawEvent::new(EventTime::Date(date(2024, 3, 7)), None);
        assert_eq!(sort_key(&all_day, &tz()).unwrap(), date(2024, 3, 7));
    }
}
