use std::sync::Arc;

use axum::{extract::State, http::StatusCode, routing::post, Json, Router};
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};
use uuid::Uuid;

use scheduly_agent::AgentRuntime;
use scheduly_core::errors::AgentError;

#[derive(Clone)]
pub struct ChatState {
    runtime: Arc<AgentRuntime>,
}

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct ChatResponse {
    pub response: String,
}

#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct ChatErrorResponse {
    pub error: String,
}

pub fn router(runtime: Arc<AgentRuntime>) -> Router {
    Router::new().route("/chat", post(chat)).with_state(ChatState { runtime })
}

pub async fn chat(
    State(state): State<ChatState>,
    Json(payload): Json<ChatRequest>,
) -> Result<Json<ChatResponse>, (StatusCode, Json<ChatErrorResponse>)> {
    let correlation_id = Uuid::new_v4().to_string();
    let message = payload.message.unwrap_or_default();

    info!(
        event_name = "chat.request_received",
        correlation_id = %correlation_id,
        message_chars = message.len(),
        "chat request received"
    );

    // The outer timeout is the hard stop: when it fires the in-flight
    // reasoning or calendar future is dropped, which cancels the remote
    // call. Remote effects already issued are not rolled back.
    let deadline = state.runtime.request_timeout();
    let outcome = tokio::time::timeout(deadline, state.runtime.handle_message(&message)).await;

    let result = match outcome {
        Ok(result) => result,
        Err(_elapsed) => Err(AgentError::RequestTimeout(deadline.as_secs())),
    };

    match result {
        Ok(response) => {
            info!(
                event_name = "chat.request_completed",
                correlation_id = %correlation_id,
                "chat request completed"
            );
            Ok(Json(ChatResponse { response }))
        }
        Err(agent_error) => {
            let status = status_for(&agent_error);
            if status.is_server_error() {
                error!(
                    event_name = "chat.request_failed",
                    correlation_id = %correlation_id,
                    status = status.as_u16(),
                    error = %agent_error,
                    "chat request failed"
                );
            } else {
                warn!(
                    event_name = "chat.request_rejected",
                    correlation_id = %correlation_id,
                    status = status.as_u16(),
                    error = %agent_error,
                    "chat request rejected"
                );
            }
            Err((status, Json(ChatErrorResponse { error: agent_error.user_message() })))
        }
    }
}

fn status_for(error: &AgentError) -> StatusCode {
    match error {
        AgentError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
        AgentError::IterationBudgetExceeded(_) => StatusCode::UNPROCESSABLE_ENTITY,
        AgentError::RequestTimeout(_) => StatusCode::GATEWAY_TIMEOUT,
        AgentError::Reasoning(_) | AgentError::CalendarBackend(_) => StatusCode::BAD_GATEWAY,
        AgentError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use anyhow::{anyhow, Result};
    use async_trait::async_trait;
    use axum::{extract::State, http::StatusCode, Json};
    use chrono::NaiveDateTime;

    use scheduly_agent::{
        AgentRuntime, BookAppointmentTool, CheckAvailabilityTool, ReasoningClient, ToolRegistry,
    };
    use scheduly_calendar::{
        CalendarBackend, CalendarError, CalendarGateway, EventRecord, EventReference,
    };

    use super::{chat, status_for, ChatRequest, ChatState};
    use scheduly_core::errors::AgentError;

    struct ScriptedReasoner {
        responses: Mutex<VecDeque<String>>,
    }

    #[async_trait]
    impl ReasoningClient for ScriptedReasoner {
        async fn complete(&self, _prompt: &str) -> Result<String> {
            self.responses
                .lock()
                .map_err(|_| anyhow!("lock poisoned"))?
                .pop_front()
                .ok_or_else(|| anyhow!("script exhausted"))
        }
    }

    /// Never completes; flags when its in-flight future is dropped.
    struct HangingReasoner {
        cancelled: Arc<AtomicBool>,
    }

    struct DropFlag(Arc<AtomicBool>);

    impl Drop for DropFlag {
        fn drop(&mut self) {
            self.0.store(true, Ordering::SeqCst);
        }
    }

    #[async_trait]
    impl ReasoningClient for HangingReasoner {
        async fn complete(&self, _prompt: &str) -> Result<String> {
            let _guard = DropFlag(self.cancelled.clone());
            std::future::pending::<()>().await;
            unreachable!("pending future never completes")
        }
    }

    struct EmptyBackend;

    #[async_trait]
    impl CalendarBackend for EmptyBackend {
        async fn list_events(
            &self,
            _calendar_id: &str,
            _time_min: NaiveDateTime,
            _time_max: NaiveDateTime,
        ) -> Result<Vec<EventRecord>, CalendarError> {
            Ok(Vec::new())
        }

        async fn insert_event(
            &self,
            _calendar_id: &str,
            _summary: &str,
            _start: NaiveDateTime,
            _end: NaiveDateTime,
        ) -> Result<EventReference, CalendarError> {
            Ok(EventReference { id: "created".to_string(), html_link: None })
        }
    }

    fn state_with_script(responses: &[&str]) -> ChatState {
        let gateway = CalendarGateway::new(Arc::new(EmptyBackend));
        let mut registry = ToolRegistry::default();
        registry.register(CheckAvailabilityTool::new(gateway.clone()));
        registry.register(BookAppointmentTool::new(gateway));

        let reasoner = Arc::new(ScriptedReasoner {
            responses: Mutex::new(responses.iter().map(|s| s.to_string()).collect()),
        });

        ChatState {
            runtime: Arc::new(AgentRuntime::new(
                reasoner,
                registry,
                3,
                Duration::from_secs(25),
                330,
            )),
        }
    }

    #[tokio::test]
    async fn missing_message_returns_bad_request() {
        let state = state_with_script(&["Final Answer: never reached"]);

        let result = chat(State(state), Json(ChatRequest { message: None })).await;

        let (status, Json(body)) = result.expect_err("should reject");
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body.error.contains("Invalid request"));
    }

    #[tokio::test]
    async fn empty_message_returns_bad_request() {
        let state = state_with_script(&["Final Answer: never reached"]);

        let result =
            chat(State(state), Json(ChatRequest { message: Some("   ".to_string()) })).await;

        let (status, _) = result.expect_err("should reject");
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn successful_run_returns_the_final_answer() {
        let state = state_with_script(&["Thought: greet\nFinal Answer: Hello!"]);

        let result =
            chat(State(state), Json(ChatRequest { message: Some("hi".to_string()) })).await;

        let Json(body) = result.expect("success");
        assert_eq!(body.response, "Hello!");
    }

    #[tokio::test]
    async fn exhausted_reasoning_budget_maps_to_unprocessable_entity() {
        let step = "Thought: check\nAction: check_availability\nAction Input: {\"date_time\": \"2025-07-04T14:00:00\", \"duration\": \"60\"}";
        let state = state_with_script(&[step, step, step]);

        let result =
            chat(State(state), Json(ChatRequest { message: Some("check 2pm".to_string()) })).await;

        let (status, _) = result.expect_err("budget exhausted");
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[tokio::test]
    async fn deadline_overrun_cancels_reasoning_and_returns_gateway_timeout() {
        let cancelled = Arc::new(AtomicBool::new(false));
        let gateway = CalendarGateway::new(Arc::new(EmptyBackend));
        let mut registry = ToolRegistry::default();
        registry.register(CheckAvailabilityTool::new(gateway.clone()));
        registry.register(BookAppointmentTool::new(gateway));
        let state = ChatState {
            runtime: Arc::new(AgentRuntime::new(
                Arc::new(HangingReasoner { cancelled: cancelled.clone() }),
                registry,
                3,
                Duration::from_millis(20),
                330,
            )),
        };

        let result =
            chat(State(state), Json(ChatRequest { message: Some("book 2pm".to_string()) })).await;

        let (status, Json(body)) = result.expect_err("should time out");
        assert_eq!(status, StatusCode::GATEWAY_TIMEOUT);
        assert!(body.error.contains("timed out"));
        assert!(cancelled.load(Ordering::SeqCst), "in-flight reasoning call must be dropped");
    }

    #[test]
    fn status_mapping_distinguishes_failure_classes() {
        assert_eq!(
            status_for(&AgentError::InvalidRequest("empty".to_string())),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(status_for(&AgentError::RequestTimeout(25)), StatusCode::GATEWAY_TIMEOUT);
        assert_eq!(
            status_for(&AgentError::CalendarBackend("503".to_string())),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            status_for(&AgentError::IterationBudgetExceeded(3)),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(
            status_for(&AgentError::Internal("panic".to_string())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
