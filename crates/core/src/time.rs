//! Slot arithmetic and lenient date/time handling.
//!
//! The reasoning engine is instructed to emit ISO-8601 local timestamps
//! without a trailing zone marker, but its output is not guaranteed to be
//! clean. Parsing here accepts the common shapes it actually produces and
//! normalizes everything to the local ISO form used on the wire.

use chrono::{DateTime, Duration, FixedOffset, NaiveDate, NaiveDateTime, Offset, Utc};
use serde_json::Value;

use crate::errors::ToolInputError;

/// Canonical local timestamp format, no zone suffix.
pub const SLOT_DATETIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// Longest bookable slot: one full day.
pub const MAX_DURATION_MINUTES: i64 = 24 * 60;

/// A calendar time window: start plus duration, half-open `[start, end)`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Slot {
    pub start: NaiveDateTime,
    pub duration_minutes: i64,
}

impl Slot {
    pub fn new(start: NaiveDateTime, duration_minutes: i64) -> Self {
        Self { start, duration_minutes }
    }

    pub fn end(&self) -> NaiveDateTime {
        // Durations are bounded at parse time, but the fields are public;
        // saturate rather than let chrono overflow arithmetic panic.
        Duration::try_minutes(self.duration_minutes)
            .and_then(|duration| self.start.checked_add_signed(duration))
            .unwrap_or(NaiveDateTime::MAX)
    }

    /// ISO-8601 local form of the start, no zone suffix.
    pub fn start_iso(&self) -> String {
        self.start.format(SLOT_DATETIME_FORMAT).to_string()
    }

    pub fn end_iso(&self) -> String {
        self.end().format(SLOT_DATETIME_FORMAT).to_string()
    }
}

/// Parses a date/time string leniently and normalizes it to local form.
///
/// Accepted shapes, tried in order: RFC 3339 (offset dropped, wall time
/// kept), `%Y-%m-%dT%H:%M:%S`, `%Y-%m-%dT%H:%M`, the space-separated
/// variants, and date-only (midnight).
pub fn parse_datetime_lenient(raw: &str) -> Result<NaiveDateTime, ToolInputError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(ToolInputError::InvalidDateTime(raw.to_string()));
    }

    // A trailing `Z` is treated as a stray marker, not a UTC conversion:
    // the original service stripped it and kept the wall time.
    let cleaned = trimmed.strip_suffix('Z').unwrap_or(trimmed);

    if let Ok(parsed) = DateTime::parse_from_rfc3339(trimmed) {
        return Ok(parsed.naive_local());
    }

    for format in [SLOT_DATETIME_FORMAT, "%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M:%S", "%Y-%m-%d %H:%M"] {
        if let Ok(parsed) = NaiveDateTime::parse_from_str(cleaned, format) {
            return Ok(parsed);
        }
    }

    if let Ok(date) = NaiveDate::parse_from_str(cleaned, "%Y-%m-%d") {
        if let Some(midnight) = date.and_hms_opt(0, 0, 0) {
            return Ok(midnight);
        }
    }

    Err(ToolInputError::InvalidDateTime(raw.to_string()))
}

/// Coerces a JSON value into a positive minute count, at most
/// [`MAX_DURATION_MINUTES`]. The reasoning engine is told to pass duration
/// as a string but sometimes sends a number.
pub fn parse_duration_minutes(value: &Value) -> Result<i64, ToolInputError> {
    let minutes = match value {
        Value::Number(number) => number
            .as_i64()
            .ok_or_else(|| ToolInputError::InvalidDuration(number.to_string()))?,
        Value::String(text) => text
            .trim()
            .parse::<i64>()
            .map_err(|_| ToolInputError::InvalidDuration(text.clone()))?,
        other => return Err(ToolInputError::InvalidDuration(other.to_string())),
    };

    if minutes <= 0 || minutes > MAX_DURATION_MINUTES {
        return Err(ToolInputError::InvalidDuration(minutes.to_string()));
    }

    Ok(minutes)
}

/// Current wall-clock time in the fixed reference timezone.
pub fn reference_now(offset_minutes: i32) -> DateTime<FixedOffset> {
    let offset = FixedOffset::east_opt(offset_minutes * 60)
        .unwrap_or_else(|| FixedOffset::east_opt(0).unwrap_or(Utc.fix()));
    Utc::now().with_timezone(&offset)
}

/// Timestamp stamped into the prompt context so relative expressions like
/// "tomorrow" resolve deterministically against the reference timezone.
pub fn reference_now_stamp(offset_minutes: i32) -> String {
    reference_now(offset_minutes).format("%Y-%m-%d %H:%M:%S %:z").to_string()
}

#[cfg(test)]
mod tests {
    use chrono::{NaiveDate, Offset};
    use serde_json::json;

    use super::{parse_datetime_lenient, parse_duration_minutes, reference_now, Slot};
    use crate::errors::ToolInputError;

    fn slot_at(hour: u32, duration_minutes: i64) -> Slot {
        let start = NaiveDate::from_ymd_opt(2025, 7, 4)
            .and_then(|date| date.and_hms_opt(hour, 0, 0))
            .expect("valid test date");
        Slot::new(start, duration_minutes)
    }

    #[test]
    fn slot_end_is_start_plus_duration() {
        let slot = slot_at(14, 60);
        assert_eq!(slot.start_iso(), "2025-07-04T14:00:00");
        assert_eq!(slot.end_iso(), "2025-07-04T15:00:00");
    }

    #[test]
    fn parse_accepts_iso_local_form() {
        let parsed = parse_datetime_lenient("2025-07-04T14:00:00").expect("should parse");
        assert_eq!(parsed, slot_at(14, 0).start);
    }

    #[test]
    fn parse_strips_stray_zulu_marker_keeping_wall_time() {
        let parsed = parse_datetime_lenient("2025-07-04T14:00:00Z").expect("should parse");
        assert_eq!(parsed, slot_at(14, 0).start);
    }

    #[test]
    fn parse_accepts_minute_precision_and_space_separator() {
        assert!(parse_datetime_lenient("2025-07-04T14:00").is_ok());
        assert!(parse_datetime_lenient("2025-07-04 14:00:00").is_ok());
        assert!(parse_datetime_lenient("2025-07-04").is_ok());
    }

    #[test]
    fn parse_rejects_prose() {
        let error = parse_datetime_lenient("sometime next week").expect_err("should reject");
        assert!(matches!(error, ToolInputError::InvalidDateTime(_)));
    }

    #[test]
    fn duration_accepts_numeric_string_and_number() {
        assert_eq!(parse_duration_minutes(&json!("60")).expect("string"), 60);
        assert_eq!(parse_duration_minutes(&json!(45)).expect("number"), 45);
    }

    #[test]
    fn duration_rejects_non_positive_and_non_numeric() {
        assert!(matches!(
            parse_duration_minutes(&json!("an hour")),
            Err(ToolInputError::InvalidDuration(_))
        ));
        assert!(matches!(
            parse_duration_minutes(&json!("0")),
            Err(ToolInputError::InvalidDuration(_))
        ));
        assert!(matches!(
            parse_duration_minutes(&json!(-30)),
            Err(ToolInputError::InvalidDuration(_))
        ));
    }

    #[test]
    fn duration_rejects_values_past_a_day() {
        assert!(matches!(
            parse_duration_minutes(&json!("9223372036854775807")),
            Err(ToolInputError::InvalidDuration(_))
        ));
        assert!(matches!(
            parse_duration_minutes(&json!(1441)),
            Err(ToolInputError::InvalidDuration(_))
        ));
        assert_eq!(parse_duration_minutes(&json!(1440)).expect("full day"), 1440);
    }

    #[test]
    fn slot_end_saturates_on_overflowing_duration() {
        let slot = slot_at(14, i64::MAX);
        assert_eq!(slot.end(), chrono::NaiveDateTime::MAX);
    }

    #[test]
    fn reference_now_carries_the_configured_offset() {
        let now = reference_now(330);
        assert_eq!(now.offset().local_minus_utc(), 330 * 60);
    }
}
