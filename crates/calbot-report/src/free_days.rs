//! Free days in the coming two weeks

use calbot_calendar::{CalendarSource, RawEvent};
use calbot_core::{LocalTimezone, ReportTemplates, fill};
use chrono::{DateTime, NaiveDate};
use chrono_tz::Tz;
use std::collections::BTreeSet;
use std::fmt::Write;
use tracing::{debug, info, warn};

use crate::error::{Result, failure_message};
use crate::format::event_label;
use crate::weekday::german_weekday;
use crate::window::{TimeWindow, two_week_window};

/// Dates of `window` on which no event starts
pub fn compute_free_days(window: &TimeWindow, events: &[RawEvent], tz: &LocalTimezone) -> BTreeSet<NaiveDate> {
    let all_days: BTreeSet<NaiveDate> = window.days().collect();

    let mut days_with_events = BTreeSet::new();
    for event in events {
        match event.start {
            Some(start) => {
                let day = start.local_date(tz);
                debug!("Event found: {} - {}", day.format("%d.%m."), event_label(event));
                days_with_events.insert(day);
            }
            None => warn!(event = %event_label(event), "Skipping event without start time"),
        }
    }

    all_days.difference(&days_with_events).copied().collect()
}

/// Render the free days report text
pub fn render_free_days(
    window: &TimeWindow,
    free_days: &BTreeSet<NaiveDate>,
    templates: &ReportTemplates,
) -> Result<String> {
    let start_date = window.start().format("%d.%m.").to_string();
    let end_date = window.end().format("%d.%m.").to_string();

    let mut text = fill(
        &templates.free_days_header,
        &[("start_date", &start_date), ("end_date", &end_date)],
    );

    if free_days.is_empty() {
        text.push_str(&templates.no_free_days);
    } else {
        for day in free_days {
            // Writing to a String cannot fail
            let _ = writeln!(text, "{}, {}", german_weekday(*day)?, day.format("%d.%m."));
        }
    }

    text.push_str(&templates.footer);
    Ok(text)
}

/// Build the free days report for the two weeks starting at `now`.
///
/// Never fails: fetch errors become one of the fixed error sentences.
pub async fn free_days_report(
    source: &dyn CalendarSource,
    tz: &LocalTimezone,
    templates: &ReportTemplates,
    now: DateTime<Tz>,
) -> String {
    let window = two_week_window(now);
    info!("Checking free days from {} to {}", window.start(), window.end());

    let events = match source.search(window.start(), window.end(), true).await {
        Ok(events) => events,
        Err(e) => {
            warn!("Failed to fetch events: {}", e);
            return failure_message(&e, templates);
        }
    };

    let free_days = compute_free_days(&window, &events, tz);
    info!("Found {} free days", free_days.len());

    render_free_days(&window, &free_days, templates).unwrap_or_else(|e| {
        warn!("Failed to render free days: {}", e);
        templates.retrieval_error.clone()
    })
}
