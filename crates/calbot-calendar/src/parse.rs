//! CalDAV multistatus and iCalendar parsing

use chrono::{NaiveDate, NaiveDateTime, TimeZone, Utc};
use chrono_tz::Tz;
use ical::parser::ical::component::IcalEvent;
use ical::property::Property;
use quick_xml::Reader;
use quick_xml::events::Event;
use tracing::{debug, warn};

use crate::error::{CalendarError, Result};
use crate::models::{EventTime, RawEvent};

/// Extract every `calendar-data` payload from a multistatus response.
///
/// Elements are matched by local name, so any namespace prefix works.
pub fn parse_multistatus(response: &str) -> Result<Vec<String>> {
    let mut payloads = Vec::new();
    let mut reader = Reader::from_str(response);
    reader.config_mut().trim_text(true);

    let mut buf = Vec::new();
    let mut in_calendar_data = false;
    let mut current = String::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) if e.local_name().as_ref() == b"calendar-data" => {
                in_calendar_data = true;
                current.clear();
            }
            Ok(Event::End(ref e)) if e.local_name().as_ref() == b"calendar-data" => {
                in_calendar_data = false;
                if !current.trim().is_empty() {
                    payloads.push(std::mem::take(&mut current));
                }
            }
            Ok(Event::Text(ref e)) if in_calendar_data => {
                let text = e
                    .unescape()
                    .map_err(|e| CalendarError::XmlParseError(e.to_string()))?;
                current.push_str(&text);
            }
            Ok(Event::CData(ref e)) if in_calendar_data => {
                current.push_str(&String::from_utf8_lossy(e));
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(CalendarError::XmlParseError(e.to_string()));
            }
            _ => {}
        }
        buf.clear();
    }

    Ok(payloads)
}

/// Parse one iCalendar object into its event instances.
///
/// An unparseable payload is logged and yields no events.
pub fn parse_calendar_data(data: &str) -> Vec<RawEvent> {
    let mut events = Vec::new();

    for calendar in ical::IcalParser::new(data.as_bytes()) {
        match calendar {
            Ok(calendar) => {
                events.extend(calendar.events.iter().map(parse_event));
            }
            Err(e) => {
                warn!("Skipping unparseable calendar object: {}", e);
            }
        }
    }

    events
}

fn parse_event(event: &IcalEvent) -> RawEvent {
    let mut raw = RawEvent::default();

    for property in &event.properties {
        match property.name.to_uppercase().as_str() {
            "UID" => raw.uid = property.value.clone(),
            "SUMMARY" => raw.summary = property.value.as_deref().map(unescape_text),
            "DESCRIPTION" => raw.description = property.value.as_deref().map(unescape_text),
            "LOCATION" => raw.location = property.value.as_deref().map(unescape_text),
            "RECURRENCE-ID" => raw.recurrence_id = property.value.clone(),
            "DTSTART" => {
                raw.start = parse_event_time(property);
                if raw.start.is_none() {
                    debug!("Unparseable DTSTART: {:?}", property.value);
                }
            }
            "DTEND" => raw.end = parse_event_time(property),
            _ => {}
        }
    }

    raw
}

fn param<'a>(property: &'a Property, name: &str) -> Option<&'a str> {
    property
        .params
        .as_ref()?
        .iter()
        .find(|(key, _)| key.eq_ignore_ascii_case(name))
        .and_then(|(_, values)| values.first())
        .map(|value| value.trim_matches('"'))
}

/// Interpret a `DTSTART`/`DTEND` property
pub fn parse_event_time(property: &Property) -> Option<EventTime> {
    let value = property.value.as_deref()?.trim();

    let is_date = param(property, "VALUE").is_some_and(|v| v.eq_ignore_ascii_case("DATE"))
        || (value.len() == 8 && !value.contains('T'));
    if is_date {
        return NaiveDate::parse_from_str(value, "%Y%m%d")
            .ok()
            .map(EventTime::Date);
    }

    if let Some(utc) = value.strip_suffix('Z') {
        return NaiveDateTime::parse_from_str(utc, "%Y%m%dT%H%M%S")
            .ok()
            .map(|naive| EventTime::DateTime(naive.and_utc()));
    }

    let naive = NaiveDateTime::parse_from_str(value, "%Y%m%dT%H%M%S").ok()?;
    let Some(tzid) = param(property, "TZID") else {
        return Some(EventTime::Floating(naive));
    };

    match tzid.parse::<Tz>() {
        Ok(tz) => Some(
            tz.from_local_datetime(&naive)
                .earliest()
                .map(|dt| EventTime::DateTime(dt.with_timezone(&Utc)))
                .unwrap_or(EventTime::Floating(naive)),
        ),
        Err(_) => {
            debug!("Unknown TZID {}, treating time as floating", tzid);
            Some(EventTime::Floating(naive))
        }
    }
}

/// Undo iCalendar TEXT escaping
fn unescape_text(value: &str) -> String {
    let mut result = String::with_capacity(value.len());
    let mut chars = value.chars();

    while let Some(c) = chars.next() {
        if c != '\\' {
            result.push(c);
            continue;
        }
        match chars.next() {
            Some('n') | Some('N') => result.push('\n'),
            Some(other) => result.push(other),
            None => result.push('\\'),
        }
    }

    result
}
