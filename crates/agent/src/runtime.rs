//! The bounded reason/act/observe loop.
//!
//! State machine per request: `Reasoning` calls the engine and classifies
//! the step; `Dispatching` resolves and invokes the tool; `Observing`
//! appends the (thought, action, observation) triple and re-enters
//! `Reasoning`; `Finished` and `Failed` are terminal. Both the iteration
//! cap and the request deadline are checked before every reasoning call.
//!
//! The loop is strictly sequential within a request: each observation must
//! be visible to the next reasoning step, so there is no parallel
//! dispatch. Nothing here is shared mutably across requests; the runtime
//! itself is read-only after bootstrap.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use scheduly_core::errors::AgentError;

use crate::input::{normalize, NormalizedInput};
use crate::llm::ReasoningClient;
use crate::protocol::{parse_step, render_prompt, AgentStep, ScratchpadEntry};
use crate::tools::{ToolError, ToolRegistry};

enum LoopState {
    Reasoning,
    Dispatching { thought: String, name: String, args_text: String },
    Observing { entry: ScratchpadEntry },
    Finished(String),
    Failed(AgentError),
}

pub struct AgentRuntime {
    llm: Arc<dyn ReasoningClient>,
    registry: ToolRegistry,
    max_iterations: u32,
    request_timeout: Duration,
    reference_offset_minutes: i32,
}

impl AgentRuntime {
    pub fn new(
        llm: Arc<dyn ReasoningClient>,
        registry: ToolRegistry,
        max_iterations: u32,
        request_timeout: Duration,
        reference_offset_minutes: i32,
    ) -> Self {
        Self { llm, registry, max_iterations, request_timeout, reference_offset_minutes }
    }

    pub fn request_timeout(&self) -> Duration {
        self.request_timeout
    }

    /// Runs one chat message through the full cycle. Validation failures
    /// return before any reasoning or calendar call.
    pub async fn handle_message(&self, message: &str) -> Result<String, AgentError> {
        let normalized = normalize(message, self.reference_offset_minutes)?;
        self.run(&normalized).await
    }

    async fn run(&self, input: &NormalizedInput) -> Result<String, AgentError> {
        let started = Instant::now();
        let mut scratchpad: Vec<ScratchpadEntry> = Vec::new();
        let mut iteration: u32 = 0;
        let mut last_backend_failure: Option<String> = None;
        let mut state = LoopState::Reasoning;

        info!(
            event_name = "agent.loop_started",
            max_iterations = self.max_iterations,
            "orchestration loop started"
        );

        loop {
            state = match state {
                LoopState::Reasoning => {
                    if iteration >= self.max_iterations {
                        // A backend failure that exhausted the budget is
                        // reported as such, not as a generic cap error.
                        let error = match last_backend_failure.take() {
                            Some(message) => AgentError::CalendarBackend(message),
                            None => AgentError::IterationBudgetExceeded(self.max_iterations),
                        };
                        LoopState::Failed(error)
                    } else if started.elapsed() >= self.request_timeout {
                        LoopState::Failed(AgentError::RequestTimeout(
                            self.request_timeout.as_secs(),
                        ))
                    } else {
                        let prompt = render_prompt(&self.registry, &input.context, &scratchpad);
                        match self.llm.complete(&prompt).await {
                            Ok(completion) => self.classify(completion),
                            Err(error) => {
                                LoopState::Failed(AgentError::Reasoning(error.to_string()))
                            }
                        }
                    }
                }

                LoopState::Dispatching { thought, name, args_text } => {
                    let observation = match self.registry.get(&name) {
                        None => {
                            warn!(
                                event_name = "agent.unknown_tool",
                                tool = %name,
                                "reasoning step requested an unknown tool"
                            );
                            format!("Error: unknown tool `{name}`")
                        }
                        Some(tool) => match tool.invoke(&args_text).await {
                            Ok(observation) => observation,
                            Err(ToolError::Input(input_error)) => input_error.observation(),
                            Err(ToolError::Backend(message)) => {
                                last_backend_failure = Some(message.clone());
                                format!("Error: calendar backend failure: {message}")
                            }
                        },
                    };

                    LoopState::Observing {
                        entry: ScratchpadEntry {
                            thought,
                            action: name,
                            action_input: args_text,
                            observation,
                        },
                    }
                }

                LoopState::Observing { entry } => {
                    debug!(
                        event_name = "agent.observation_recorded",
                        iteration,
                        action = %entry.action,
                        observation = %entry.observation,
                        "observation appended to scratchpad"
                    );
                    scratchpad.push(entry);
                    iteration += 1;
                    LoopState::Reasoning
                }

                LoopState::Finished(answer) => {
                    info!(
                        event_name = "agent.loop_finished",
                        iterations = iteration,
                        elapsed_ms = started.elapsed().as_millis() as u64,
                        "orchestration loop finished"
                    );
                    return Ok(answer);
                }

                LoopState::Failed(error) => {
                    warn!(
                        event_name = "agent.loop_failed",
                        iterations = iteration,
                        elapsed_ms = started.elapsed().as_millis() as u64,
                        error = %error,
                        "orchestration loop failed"
                    );
                    return Err(error);
                }
            };
        }
    }

    fn classify(&self, completion: String) -> LoopState {
        match parse_step(&completion) {
            AgentStep::FinalAnswer(text) => LoopState::Finished(text),
            AgentStep::ToolCall { thought, name, args_text } => {
                LoopState::Dispatching { thought, name, args_text }
            }
            AgentStep::Malformed { raw } => {
                debug!(
                    event_name = "agent.malformed_step",
                    chars = raw.len(),
                    "unparseable reasoning step fed back for self-correction"
                );
                LoopState::Observing {
                    entry: ScratchpadEntry {
                        thought: String::new(),
                        action: "none".to_string(),
                        action_input: String::new(),
                        observation: "Error: response did not follow the required format. \
                                      Reply with Thought/Action/Action Input or Final Answer."
                            .to_string(),
                    },
                }
            }
        }
    }
}
