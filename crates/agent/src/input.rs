//! Inbound message validation and timestamping.

use chrono::{DateTime, FixedOffset};

use scheduly_core::errors::AgentError;
use scheduly_core::time::{reference_now, reference_now_stamp};

/// A validated chat message with the reference-timezone clock attached.
/// Owned by exactly one in-flight request and dropped with it.
#[derive(Clone, Debug)]
pub struct NormalizedInput {
    pub message: String,
    pub received_at: DateTime<FixedOffset>,
    /// Prompt fragment combining the timestamp and the user's message.
    pub context: String,
}

/// Fails with `InvalidRequest` when the message is absent or blank; no
/// reasoning or calendar call may happen in that case.
pub fn normalize(message: &str, reference_offset_minutes: i32) -> Result<NormalizedInput, AgentError> {
    let trimmed = message.trim();
    if trimmed.is_empty() {
        return Err(AgentError::InvalidRequest("message must not be empty".to_string()));
    }

    let received_at = reference_now(reference_offset_minutes);
    let stamp = reference_now_stamp(reference_offset_minutes);
    let context = format!("Today's date and time: {stamp}\n\nUser input: {trimmed}");

    Ok(NormalizedInput { message: trimmed.to_string(), received_at, context })
}
