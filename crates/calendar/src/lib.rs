//! Calendar gateway: availability and booking against a remote calendar.
//!
//! The backend is abstracted behind [`CalendarBackend`] so the gateway's
//! window and conflict semantics can be exercised without the network;
//! [`client::GoogleCalendarClient`] is the production implementation.

pub mod auth;
pub mod client;
pub mod gateway;

use chrono::NaiveDateTime;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CalendarError {
    #[error("calendar credentials are invalid: {0}")]
    InvalidCredentials(String),
    #[error("calendar authentication failed: {0}")]
    Auth(String),
    #[error("calendar request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("calendar API error (status {status}): {message}")]
    Api { status: u16, message: String },
}

/// One event returned from a window query.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EventRecord {
    pub id: String,
    pub summary: Option<String>,
    pub start: Option<NaiveDateTime>,
    pub end: Option<NaiveDateTime>,
}

/// Reference to a created event.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EventReference {
    pub id: String,
    pub html_link: Option<String>,
}

/// Remote calendar operations. Implementations must not retry on their
/// own; a failed call is reported upward immediately.
#[async_trait::async_trait]
pub trait CalendarBackend: Send + Sync {
    /// Events on `calendar_id` overlapping `[time_min, time_max)`, local
    /// wall time in the service's reference timezone.
    async fn list_events(
        &self,
        calendar_id: &str,
        time_min: NaiveDateTime,
        time_max: NaiveDateTime,
    ) -> Result<Vec<EventRecord>, CalendarError>;

    async fn insert_event(
        &self,
        calendar_id: &str,
        summary: &str,
        start: NaiveDateTime,
        end: NaiveDateTime,
    ) -> Result<EventReference, CalendarError>;
}

pub use gateway::{BookingOutcome, CalendarGateway};
