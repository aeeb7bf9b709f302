//! Weekly overview of the coming Monday to Sunday

use calbot_calendar::{CalendarSource, RawEvent};
use calbot_core::{LocalTimezone, ReportTemplates, fill};
use chrono::DateTime;
use chrono_tz::Tz;
use tracing::{info, warn};

use crate::error::failure_message;
use crate::format::{FormattedEvent, event_label, format_event};
use crate::window::{TimeWindow, weekly_overview_window};

/// Format every event, skip the ones that fail and order the rest by local
/// start date. Events on the same day keep their calendar order.
pub fn format_events(events: &[RawEvent], tz: &LocalTimezone) -> Vec<FormattedEvent> {
    let mut formatted: Vec<FormattedEvent> = events
        .iter()
        .filter_map(|event| match format_event(event, tz) {
            Ok(formatted) => Some(formatted),
            Err(_) => {
                warn!(event = %event_label(event), "Skipping event in weekly overview");
                None
            }
        })
        .collect();

    formatted.sort_by_key(|event| event.sort_key);
    formatted
}

/// Render the weekly overview text
pub fn render_weekly_overview(window: &TimeWindow, events: &[FormattedEvent], templates: &ReportTemplates) -> String {
    let start_date = window.start().format("%d.%m.").to_string();
    let end_date = window.end().format("%d.%m.").to_string();

    let mut text = fill(
        &templates.weekly_overview_header,
        &[("start_date", &start_date), ("end_date", &end_date)],
    );
    for event in events {
        text.push('\n');
        text.push_str(&event.display_text);
        text.push('\n');
    }
    text.push_str(&templates.footer);
    text
}

/// Build the weekly overview for the week after `now`.
///
/// Never fails: fetch errors become one of the fixed error sentences.
pub async fn weekly_overview_report(
    source: &dyn CalendarSource,
    tz: &LocalTimezone,
    templates: &ReportTemplates,
    now: DateTime<Tz>,
) -> String {
    let window = weekly_overview_window(now);
    info!("Building weekly overview from {} to {}", window.start(), window.end());

    let events = match source.search(window.start(), window.end(), true).await {
        Ok(events) => events,
        Err(e) => {
            warn!("Failed to fetch events: {}", e);
            return failure_message(&e, templates);
        }
    };

    let formatted = format_events(&events, tz);
    info!("Formatted {} of {} events", formatted.len(), events.len());

    render_weekly_overview(&window, &formatted, templates)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FakeCalendar, berlin, date};
    use calbot_calendar::EventTime;
    use chrono::{NaiveDateTime, NaiveTime};

    fn tz() -> LocalTimezone {
        LocalTimezone::default()
    }

    fn at(y: i32, m: u32, d: u32, h: u32) -> EventTime {
        EventTime::Floating(NaiveDateTime::new(
            date(y, m, d),
            NaiveTime::from_hms_opt(h, 0, 0).unwrap(),
        ))
    }

    #[test]
    fn test_format_events_sorted_and_stable() {
        let events = vec![
            RawEvent::new(at(2024, 3, 13, 20), None).with_summary("Quiz"),
            RawEvent::new(at(2024, 3, 11, 21), None).with_summary("Spät"),
            RawEvent::new(at(2024, 3, 11, 18), None).with_summary("Früh"),
            RawEvent::new(EventTime::Date(date(2024, 3, 12)), None).with_summary("Flohmarkt"),
        ];

        let titles: Vec<_> = format_events(&events, &tz())
            .iter()
            .map(|e| e.display_text.lines().nth(2).unwrap().trim().to_string())
            .collect();
        // Same-day events keep calendar order, not time of day
        assert_eq!(titles, ["🃏  Spät", "🃏  Früh", "🃏  Flohmarkt", "🃏  Quiz"]);
    }

    #[test]
    fn test_format_events_skips_broken_events() {
        let events = vec![
            RawEvent::default().with_summary("Ohne Start"),
            RawEvent::new(at(2024, 3, 11, 19), None).with_summary("Skat"),
        ];
        let formatted = format_events(&events, &tz());
        assert_eq!(formatted.len(), 1);
        assert!(formatted[0].display_text.contains("Skat"));
    }

    #[test]
    fn test_render_weekly_overview() {
        let window = weekly_overview_window(berlin(2024, 3, 6, 12, 0));
        let events = format_events(&[RawEvent::new(at(2024, 3, 11, 19), None).with_summary("Skat")], &tz());

        let text = render_weekly_overview(&window, &events, &ReportTemplates::default());
        assert!(text.starts_with("Hier ist die Wochenübersicht (11.03. - 17.03.):\n\n  🗓  Montag 11.03.\n"));
        assert!(text.contains("  🪩  Rauchkneipe\n\n\nWir freuen uns"));
    }

    #[tokio::test]
    async fn test_report_queries_next_week() {
        let calendar = FakeCalendar::with_events(vec![
            RawEvent::new(at(2024, 3, 12, 19), Some(at(2024, 3, 12, 23))).with_summary("Lesung (rauchfrei)"),
        ]);

        let text = weekly_overview_report(&calendar, &tz(), &ReportTemplates::default(), berlin(2024, 3, 6, 12, 0)).await;

        let (start, end) = calendar.last_window().unwrap();
        assert_eq!(start, berlin(2024, 3, 11, 0, 0));
        assert_eq!(end.date_naive(), date(2024, 3, 17));
        assert!(calendar.last_expand());

        assert!(text.contains("  🗓  Dienstag 12.03.\n  🕖  19:00 - 23:00\n  🃏  Lesung\n"));
        assert!(text.contains("  🪩  Rauchfrei"));
    }

    #[tokio::test]
    async fn test_report_without_events() {
        let calendar = FakeCalendar::with_events(Vec::new());
        let text = weekly_overview_report(&calendar, &tz(), &ReportTemplates::default(), berlin(2024, 3, 6, 12, 0)).await;
        assert_eq!(
            text,
            "Hier ist die Wochenübersicht (11.03. - 17.03.):\n\n\nWir freuen uns immer über euer Feedback!"
        );
    }

    #[tokio::test]
    async fn test_report_errors() {
        let now = berlin(2024, 3, 6, 12, 0);
        let templates = ReportTemplates::default();

        let text = weekly_overview_report(&FakeCalendar::unauthorized(), &tz(), &templates, now).await;
        assert_eq!(text, "Fehler bei der Verbindung zum Kalender.");

        let text = weekly_overview_report(&FakeCalendar::server_error(), &tz(), &templates, now).await;
        assert_eq!(text, "Fehler beim Abrufen der Veranstaltungsdaten.");
    }
}
