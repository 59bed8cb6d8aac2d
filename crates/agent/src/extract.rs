//! Typed argument extraction from raw tool-input text.
//!
//! The reasoning engine is asked for a clean JSON object but routinely
//! wraps it in prose or code fences. Extraction finds the first balanced
//! JSON object in the text, parses it, and checks the invoking tool's
//! required fields individually so the loop can feed a precise error back.

use serde_json::Value;

use scheduly_core::errors::ToolInputError;
use scheduly_core::time::{parse_datetime_lenient, parse_duration_minutes, Slot};

pub const DEFAULT_CALENDAR_ID: &str = "primary";

/// Typed arguments for either calendar tool.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ToolCallArgs {
    pub calendar_id: String,
    /// Normalized ISO-8601 local form, no zone suffix.
    pub date_time: String,
    pub duration_minutes: i64,
    pub description: Option<String>,
}

impl ToolCallArgs {
    pub fn slot(&self) -> Result<Slot, ToolInputError> {
        let start = parse_datetime_lenient(&self.date_time)?;
        Ok(Slot::new(start, self.duration_minutes))
    }
}

/// First balanced-brace JSON object substring, string- and escape-aware.
pub fn extract_json_object(text: &str) -> Option<&str> {
    let open = text.find('{')?;
    let bytes = text.as_bytes();
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, byte) in bytes[open..].iter().enumerate() {
        if in_string {
            if escaped {
                escaped = false;
            } else if *byte == b'\\' {
                escaped = true;
            } else if *byte == b'"' {
                in_string = false;
            }
            continue;
        }

        match byte {
            b'"' => in_string = true,
            b'{' => depth += 1,
            b'}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[open..=open + offset]);
                }
            }
            _ => {}
        }
    }

    None
}

/// Parses raw tool-input text into typed arguments, enforcing the given
/// required wire fields (`date_time`, `duration`, `description`).
pub fn parse_args(raw: &str, required_fields: &[&str]) -> Result<ToolCallArgs, ToolInputError> {
    let json_text = extract_json_object(raw).ok_or(ToolInputError::MalformedToolInput)?;
    let object: Value =
        serde_json::from_str(json_text).map_err(|_| ToolInputError::MalformedToolInput)?;

    for field in required_fields {
        let missing = match object.get(*field) {
            None | Some(Value::Null) => true,
            Some(Value::String(text)) => text.trim().is_empty(),
            Some(_) => false,
        };
        if missing {
            return Err(ToolInputError::MissingField((*field).to_string()));
        }
    }

    let calendar_id = object
        .get("calendar_id")
        .and_then(Value::as_str)
        .filter(|value| !value.trim().is_empty())
        .unwrap_or(DEFAULT_CALENDAR_ID)
        .to_string();

    let raw_date_time = object
        .get("date_time")
        .and_then(Value::as_str)
        .ok_or_else(|| ToolInputError::MissingField("date_time".to_string()))?;
    let date_time = parse_datetime_lenient(raw_date_time)?
        .format(scheduly_core::time::SLOT_DATETIME_FORMAT)
        .to_string();

    let duration_value = object
        .get("duration")
        .ok_or_else(|| ToolInputError::MissingField("duration".to_string()))?;
    let duration_minutes = parse_duration_minutes(duration_value)?;

    let description = object
        .get("description")
        .and_then(Value::as_str)
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty());

    Ok(ToolCallArgs { calendar_id, date_time, duration_minutes, description })
}
