//! Agent runtime: the bounded reason/act/observe loop that turns a chat
//! message into validated calendar operations.
//!
//! The cycle per request:
//! 1. **Input normalization** (`input`) - validate the message, stamp it
//!    with the reference-timezone clock.
//! 2. **Reasoning** (`llm`, `protocol`) - one completion call, parsed into
//!    a tagged step (final answer, tool call, or malformed).
//! 3. **Dispatch** (`tools`, `extract`) - look up the tool, extract typed
//!    arguments from its raw input text, invoke it.
//! 4. **Observation** (`runtime`) - append the triple to the scratchpad
//!    and go around again, bounded by the iteration cap and the request
//!    deadline.
//!
//! The reasoning engine is strictly a planner. Availability truth and
//! booking decisions come from the calendar gateway; the engine's claims
//! about a slot are re-verified before any insert.

pub mod extract;
pub mod input;
pub mod llm;
pub mod protocol;
pub mod runtime;
pub mod tools;

pub use llm::{GeminiClient, ReasoningClient};
pub use runtime::AgentRuntime;
pub use tools::{BookAppointmentTool, CheckAvailabilityTool, Tool, ToolError, ToolRegistry};
