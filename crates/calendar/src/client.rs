//! Google Calendar v3 HTTP client.

use std::time::Duration;

use chrono::NaiveDateTime;
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

use crate::auth::{ServiceAccountKey, TokenProvider};
use crate::{CalendarBackend, CalendarError, EventRecord, EventReference};

use scheduly_core::time::SLOT_DATETIME_FORMAT;

pub struct GoogleCalendarClient {
    base_url: String,
    http: reqwest::Client,
    tokens: TokenProvider,
}

impl GoogleCalendarClient {
    pub fn new(
        key: ServiceAccountKey,
        base_url: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, CalendarError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(CalendarError::Http)?;
        let tokens = TokenProvider::new(key, timeout)?;
        Ok(Self { base_url: base_url.into(), http, tokens })
    }

    fn events_url(&self, calendar_id: &str) -> String {
        format!("{}/calendars/{calendar_id}/events", self.base_url)
    }
}

// Wire format matches the original service: local wall time with a `Z`
// suffix, event timezone pinned to UTC.
fn wire_timestamp(value: NaiveDateTime) -> String {
    format!("{}Z", value.format(SLOT_DATETIME_FORMAT))
}

fn parse_wire_timestamp(value: &str) -> Option<NaiveDateTime> {
    let cleaned = value.strip_suffix('Z').unwrap_or(value);
    NaiveDateTime::parse_from_str(cleaned, SLOT_DATETIME_FORMAT)
        .ok()
        .or_else(|| chrono::DateTime::parse_from_rfc3339(value).ok().map(|dt| dt.naive_local()))
}

#[derive(Deserialize)]
struct EventsListResponse {
    #[serde(default)]
    items: Vec<ApiEvent>,
}

#[derive(Deserialize)]
struct ApiEvent {
    id: String,
    summary: Option<String>,
    start: Option<ApiEventTime>,
    end: Option<ApiEventTime>,
    #[serde(rename = "htmlLink")]
    html_link: Option<String>,
}

#[derive(Deserialize)]
struct ApiEventTime {
    #[serde(rename = "dateTime")]
    date_time: Option<String>,
    date: Option<String>,
}

impl ApiEventTime {
    fn to_naive(&self) -> Option<NaiveDateTime> {
        if let Some(date_time) = &self.date_time {
            return parse_wire_timestamp(date_time);
        }
        let date = self.date.as_deref()?;
        chrono::NaiveDate::parse_from_str(date, "%Y-%m-%d")
            .ok()
            .and_then(|d| d.and_hms_opt(0, 0, 0))
    }
}

#[derive(Deserialize)]
struct ApiErrorEnvelope {
    error: Option<ApiErrorBody>,
}

#[derive(Deserialize)]
struct ApiErrorBody {
    message: Option<String>,
}

async fn api_error(response: reqwest::Response) -> CalendarError {
    let status = response.status().as_u16();
    let message = match response.json::<ApiErrorEnvelope>().await {
        Ok(envelope) => envelope
            .error
            .and_then(|body| body.message)
            .unwrap_or_else(|| "no error detail".to_string()),
        Err(err) => err.to_string(),
    };
    CalendarError::Api { status, message }
}

#[async_trait::async_trait]
impl CalendarBackend for GoogleCalendarClient {
    async fn list_events(
        &self,
        calendar_id: &str,
        time_min: NaiveDateTime,
        time_max: NaiveDateTime,
    ) -> Result<Vec<EventRecord>, CalendarError> {
        let token = self.tokens.access_token().await?;
        let response = self
            .http
            .get(self.events_url(calendar_id))
            .bearer_auth(token)
            .query(&[
                ("timeMin", wire_timestamp(time_min).as_str()),
                ("timeMax", wire_timestamp(time_max).as_str()),
                ("singleEvents", "true"),
                ("orderBy", "startTime"),
            ])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(api_error(response).await);
        }

        let payload = response.json::<EventsListResponse>().await?;
        debug!(
            event_name = "calendar.list_events",
            calendar_id,
            event_count = payload.items.len(),
            "listed events in window"
        );

        Ok(payload
            .items
            .into_iter()
            .map(|event| EventRecord {
                id: event.id,
                summary: event.summary,
                start: event.start.as_ref().and_then(ApiEventTime::to_naive),
                end: event.end.as_ref().and_then(ApiEventTime::to_naive),
            })
            .collect())
    }

    async fn insert_event(
        &self,
        calendar_id: &str,
        summary: &str,
        start: NaiveDateTime,
        end: NaiveDateTime,
    ) -> Result<EventReference, CalendarError> {
        let token = self.tokens.access_token().await?;
        let body = json!({
            "summary": summary,
            "start": { "dateTime": wire_timestamp(start), "timeZone": "UTC" },
            "end": { "dateTime": wire_timestamp(end), "timeZone": "UTC" },
        });

        let response = self
            .http
            .post(self.events_url(calendar_id))
            .bearer_auth(token)
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(api_error(response).await);
        }

        let created = response.json::<ApiEvent>().await?;
        debug!(
            event_name = "calendar.insert_event",
            calendar_id,
            event_id = %created.id,
            "event created"
        );

        Ok(EventReference { id: created.id, html_link: created.html_link })
    }
}
