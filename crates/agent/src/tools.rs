//! Tool declarations and the capability table.
//!
//! The registry is a fixed, ordered set built once at bootstrap and
//! read-only afterwards. The loop is polymorphic over [`Tool`], so adding
//! a tool never touches the orchestration code.

use async_trait::async_trait;
use serde_json::json;
use thiserror::Error;
use tracing::warn;

use scheduly_calendar::{BookingOutcome, CalendarGateway};
use scheduly_core::errors::ToolInputError;

use crate::extract::parse_args;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ToolError {
    #[error(transparent)]
    Input(#[from] ToolInputError),
    /// Remote calendar failure. Fed back as an observation so a fresh
    /// reasoning step may retry, and remembered by the loop so an
    /// exhausted request reports a backend failure rather than a generic
    /// budget error.
    #[error("calendar backend failure: {0}")]
    Backend(String),
}

#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &'static str;
    /// Usage text surfaced to the reasoning engine, including an example
    /// payload.
    fn description(&self) -> &'static str;
    fn required_fields(&self) -> &'static [&'static str];
    async fn invoke(&self, args_text: &str) -> Result<String, ToolError>;
}

/// Ordered, name-addressed tool set. Two entries in practice; a linear
/// scan keeps declaration order for prompt rendering.
#[derive(Default)]
pub struct ToolRegistry {
    tools: Vec<Box<dyn Tool>>,
}

impl ToolRegistry {
    pub fn register<T>(&mut self, tool: T)
    where
        T: Tool + 'static,
    {
        self.tools.push(Box::new(tool));
    }

    pub fn get(&self, name: &str) -> Option<&dyn Tool> {
        self.tools.iter().find(|tool| tool.name() == name).map(AsRef::as_ref)
    }

    pub fn iter(&self) -> impl Iterator<Item = &dyn Tool> {
        self.tools.iter().map(AsRef::as_ref)
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

pub struct CheckAvailabilityTool {
    gateway: CalendarGateway,
}

impl CheckAvailabilityTool {
    pub fn new(gateway: CalendarGateway) -> Self {
        Self { gateway }
    }
}

#[async_trait]
impl Tool for CheckAvailabilityTool {
    fn name(&self) -> &'static str {
        "check_availability"
    }

    fn description(&self) -> &'static str {
        "Check if a time slot is available on the user's calendar. Input must be a JSON \
         object with fields: calendar_id (default 'primary'), date_time (ISO format), \
         duration (minutes as string). Example: {\"calendar_id\": \"primary\", \
         \"date_time\": \"2025-07-04T14:00:00\", \"duration\": \"60\"}"
    }

    fn required_fields(&self) -> &'static [&'static str] {
        &["date_time", "duration"]
    }

    async fn invoke(&self, args_text: &str) -> Result<String, ToolError> {
        let args = parse_args(args_text, self.required_fields())?;
        let slot = args.slot()?;

        let available = self
            .gateway
            .check_availability(&args.calendar_id, slot)
            .await
            .map_err(|err| ToolError::Backend(err.to_string()))?;

        Ok(json!({ "available": available }).to_string())
    }
}

pub struct BookAppointmentTool {
    gateway: CalendarGateway,
}

impl BookAppointmentTool {
    pub fn new(gateway: CalendarGateway) -> Self {
        Self { gateway }
    }
}

#[async_trait]
impl Tool for BookAppointmentTool {
    fn name(&self) -> &'static str {
        "book_appointment"
    }

    fn description(&self) -> &'static str {
        "Book an appointment on the user's calendar. Input must be a JSON object with \
         fields: calendar_id (default 'primary'), date_time (ISO format), duration \
         (minutes as string), description. Example: {\"calendar_id\": \"primary\", \
         \"date_time\": \"2025-07-04T14:00:00\", \"duration\": \"60\", \
         \"description\": \"Meeting with Ashlok\"}"
    }

    fn required_fields(&self) -> &'static [&'static str] {
        &["date_time", "duration", "description"]
    }

    async fn invoke(&self, args_text: &str) -> Result<String, ToolError> {
        let args = parse_args(args_text, self.required_fields())?;
        let slot = args.slot()?;
        let summary = args.description.as_deref().unwrap_or("Appointment");

        // book_if_available re-checks the window right before the insert;
        // the reasoning step's earlier availability claim is not trusted.
        let outcome = self
            .gateway
            .book_if_available(&args.calendar_id, slot, summary)
            .await
            .map_err(|err| ToolError::Backend(err.to_string()))?;

        let observation = match outcome {
            BookingOutcome::SlotTaken => {
                warn!(
                    event_name = "agent.booking_refused",
                    calendar_id = %args.calendar_id,
                    date_time = %args.date_time,
                    "slot taken between reasoning and insert"
                );
                json!({ "success": false, "message": "Time slot not available" })
            }
            BookingOutcome::Booked(reference) => {
                let link = reference.html_link.unwrap_or_else(|| reference.id.clone());
                json!({
                    "success": true,
                    "message": format!(
                        "Appointment booked: {summary} at {} for {} minutes. Event link: {link}",
                        args.date_time, args.duration_minutes
                    ),
                })
            }
        };

        Ok(observation.to_string())
    }
}
