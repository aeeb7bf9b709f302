//! CalDAV client implementation

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use reqwest::{Client, Method, StatusCode};
use std::time::Duration;
use tracing::{debug, error, info};

use crate::error::{CalendarError, Result};
use crate::models::{CalendarConfig, RawEvent};
use crate::parse::{parse_calendar_data, parse_multistatus};
use crate::source::CalendarSource;

/// CalDAV client for calendar queries
pub struct CalendarClient {
    client: Client,
    config: CalendarConfig,
    calendar_url: String,
}

impl CalendarClient {
    /// Create a new CalDAV client
    pub fn new(config: CalendarConfig) -> Result<Self> {
        if config.server_url.trim().is_empty() {
            return Err(CalendarError::Configuration("CalDAV URL is empty".to_string()));
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| CalendarError::Configuration(e.to_string()))?;

        let calendar_url = config.calendar_url();
        info!("Calendar client initialized for: {}", calendar_url);

        Ok(Self {
            client,
            config,
            calendar_url,
        })
    }

    /// Build a `calendar-query` REPORT body for `[start, end]`
    fn query_body(start: DateTime<Utc>, end: DateTime<Utc>, expand: bool) -> String {
        let start_str = start.format("%Y%m%dT%H%M%SZ").to_string();
        let end_str = end.format("%Y%m%dT%H%M%SZ").to_string();

        let calendar_data = if expand {
            format!(
                r#"<C:calendar-data>
            <C:expand start="{}" end="{}"/>
        </C:calendar-data>"#,
                start_str, end_str
            )
        } else {
            "<C:calendar-data/>".to_string()
        };

        format!(
            r#"<?xml version="1.0" encoding="utf-8" ?>
<C:calendar-query xmlns:D="DAV:" xmlns:C="urn:ietf:params:xml:ns:caldav">
    <D:prop>
        <D:getetag/>
        {}
    </D:prop>
    <C:filter>
        <C:comp-filter name="VCALENDAR">
            <C:comp-filter name="VEVENT">
                <C:time-range start="{}" end="{}"/>
            </C:comp-filter>
        </C:comp-filter>
    </C:filter>
</C:calendar-query>"#,
            calendar_data, start_str, end_str
        )
    }
}

#[async_trait]
impl CalendarSource for CalendarClient {
    async fn search(&self, start: DateTime<Tz>, end: DateTime<Tz>, expand: bool) -> Result<Vec<RawEvent>> {
        let body = Self::query_body(start.with_timezone(&Utc), end.with_timezone(&Utc), expand);
        let method = Method::from_bytes(b"REPORT").map_err(|e| CalendarError::HttpError(e.to_string()))?;

        debug!("Searching events {} - {} at {}", start, end, self.calendar_url);

        let response = self
            .client
            .request(method, &self.calendar_url)
            .basic_auth(&self.config.username, Some(&self.config.password))
            .header("Content-Type", "application/xml; charset=utf-8")
            .header("Depth", "1")
            .body(body)
            .send()
            .await
            .map_err(|e| CalendarError::Connection(e.to_string()))?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            error!("CalDAV server rejected credentials: {}", status);
            return Err(CalendarError::Authentication(format!(
                "Server returned {}",
                status
            )));
        }
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            error!("CalDAV request failed: {} - {}", status, error_text);
            return Err(CalendarError::CaldavError(format!(
                "Request failed: {} - {}",
                status, error_text
            )));
        }

        let text = response
            .text()
            .await
            .map_err(|e| CalendarError::HttpError(e.to_string()))?;

        let events: Vec<RawEvent> = parse_multistatus(&text)?
            .iter()
            .flat_map(|data| parse_calendar_data(data))
            .collect();

        info!("Fetched {} event instances", events.len());
        Ok(events)
    }
}
