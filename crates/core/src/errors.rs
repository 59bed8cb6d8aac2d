use thiserror::Error;

/// Failures in a single tool invocation's input. These are never fatal on
/// their own: the orchestration loop feeds them back as observations so the
/// reasoning step can self-correct, bounded by the iteration cap.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ToolInputError {
    #[error("no JSON object found in tool input")]
    MalformedToolInput,
    #[error("missing required field `{0}`")]
    MissingField(String),
    #[error("invalid duration `{0}` (expected a positive count of minutes)")]
    InvalidDuration(String),
    #[error("unrecognized date/time `{0}`")]
    InvalidDateTime(String),
}

impl ToolInputError {
    /// Observation text handed back to the reasoning step.
    pub fn observation(&self) -> String {
        format!("Error: {self}")
    }
}

/// Terminal failures for one chat request.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum AgentError {
    #[error("invalid request: {0}")]
    InvalidRequest(String),
    #[error("agent exceeded the iteration budget of {0}")]
    IterationBudgetExceeded(u32),
    #[error("agent processing exceeded the {0}s deadline")]
    RequestTimeout(u64),
    #[error("reasoning engine failure: {0}")]
    Reasoning(String),
    #[error("calendar backend failure: {0}")]
    CalendarBackend(String),
    #[error("internal error: {0}")]
    Internal(String),
}

impl AgentError {
    /// Caller-facing message. Internal detail stays in the logs; callers
    /// only need to distinguish failure classes.
    pub fn user_message(&self) -> String {
        match self {
            Self::InvalidRequest(message) => format!("Invalid request: {message}"),
            Self::IterationBudgetExceeded(_) => {
                "The assistant could not complete the request within its reasoning budget. \
                 Please rephrase and try again."
                    .to_string()
            }
            Self::RequestTimeout(_) => "Server error: Agent processing timed out".to_string(),
            Self::Reasoning(_) => {
                "The assistant is temporarily unavailable. Please retry shortly.".to_string()
            }
            Self::CalendarBackend(_) => {
                "The calendar service is temporarily unavailable. Please retry shortly.".to_string()
            }
            Self::Internal(_) => "An unexpected internal error occurred.".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::errors::{AgentError, ToolInputError};

    #[test]
    fn missing_field_observation_names_the_field() {
        let observation = ToolInputError::MissingField("date_time".to_string()).observation();
        assert!(observation.contains("date_time"));
        assert!(observation.starts_with("Error:"));
    }

    #[test]
    fn timeout_user_message_is_distinguishable_from_backend_failure() {
        let timeout = AgentError::RequestTimeout(25).user_message();
        let backend = AgentError::CalendarBackend("503 from API".to_string()).user_message();
        assert_ne!(timeout, backend);
        assert!(timeout.contains("timed out"));
    }

    #[test]
    fn internal_errors_do_not_leak_detail_to_the_caller() {
        let message =
            AgentError::Internal("panic at orchestrator.rs line 42".to_string()).user_message();
        assert!(!message.contains("orchestrator.rs"));
    }
}
