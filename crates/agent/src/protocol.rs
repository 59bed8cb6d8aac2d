//! Text protocol between the loop and the reasoning engine.
//!
//! The engine replies in a Thought/Action/Action Input/Final Answer
//! layout. That free-text shape is fragile, so it is parsed here into a
//! tagged step and the rest of the crate only ever sees the variants.

use crate::tools::ToolRegistry;

/// One reasoning turn, already classified.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AgentStep {
    FinalAnswer(String),
    ToolCall { thought: String, name: String, args_text: String },
    /// Neither a final answer nor a well-formed action. Kept with the raw
    /// text so the loop can log it and ask the engine to try again.
    Malformed { raw: String },
}

const FINAL_ANSWER_MARKER: &str = "Final Answer:";
const THOUGHT_MARKER: &str = "Thought:";
const ACTION_MARKER: &str = "Action:";
const ACTION_INPUT_MARKER: &str = "Action Input:";

/// Classifies one completion. A `Final Answer:` appearing before any
/// `Action:` wins; otherwise an `Action:` with its `Action Input:` becomes
/// a tool call; anything else is malformed.
pub fn parse_step(completion: &str) -> AgentStep {
    let final_position = completion.find(FINAL_ANSWER_MARKER);
    let action_position = completion.find(ACTION_MARKER);

    if let Some(final_at) = final_position {
        let action_first = action_position.map(|at| at < final_at).unwrap_or(false);
        if !action_first {
            let text = completion[final_at + FINAL_ANSWER_MARKER.len()..].trim();
            return AgentStep::FinalAnswer(text.to_string());
        }
    }

    let Some(action_at) = action_position else {
        return AgentStep::Malformed { raw: completion.to_string() };
    };

    let thought = completion[..action_at]
        .lines()
        .rev()
        .find_map(|line| line.trim().strip_prefix(THOUGHT_MARKER))
        .map(|text| text.trim().to_string())
        .unwrap_or_default();

    let after_action = &completion[action_at + ACTION_MARKER.len()..];
    let name = after_action.lines().next().unwrap_or_default().trim().to_string();
    if name.is_empty() {
        return AgentStep::Malformed { raw: completion.to_string() };
    }

    let args_text = after_action
        .find(ACTION_INPUT_MARKER)
        .map(|at| {
            let rest = &after_action[at + ACTION_INPUT_MARKER.len()..];
            // Args end where the next protocol marker begins; the engine
            // sometimes echoes an Observation line of its own.
            let end = ["Observation:", THOUGHT_MARKER, FINAL_ANSWER_MARKER]
                .iter()
                .filter_map(|marker| rest.find(marker))
                .min()
                .unwrap_or(rest.len());
            rest[..end].trim().to_string()
        })
        .unwrap_or_default();

    AgentStep::ToolCall { thought, name, args_text }
}

/// Scratchpad entry: one completed think/act/observe round.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ScratchpadEntry {
    pub thought: String,
    pub action: String,
    pub action_input: String,
    pub observation: String,
}

pub fn render_scratchpad(entries: &[ScratchpadEntry]) -> String {
    let mut rendered = String::new();
    for entry in entries {
        rendered.push_str(&format!(
            "Thought: {}\nAction: {}\nAction Input: {}\nObservation: {}\n",
            entry.thought, entry.action, entry.action_input, entry.observation
        ));
    }
    rendered
}

/// Builds the full reasoning prompt: instructions, tool descriptions, the
/// date-stamped user input, and the running scratchpad.
pub fn render_prompt(registry: &ToolRegistry, context: &str, entries: &[ScratchpadEntry]) -> String {
    let tool_lines: Vec<String> = registry
        .iter()
        .map(|tool| format!("- {}: {}", tool.name(), tool.description()))
        .collect();
    let tool_names: Vec<&str> = registry.iter().map(|tool| tool.name()).collect();

    format!(
        "You are an AI assistant that helps users book appointments on their calendar.\n\
         \n\
         Available tools:\n{tools}\n\
         \n\
         Tool names: {tool_names}\n\
         \n\
         {context}\n\
         \n\
         Instructions:\n\
         - Always follow this format:\n\
           Thought: <what you're thinking>\n\
           Action: <tool_name>\n\
           Action Input: <JSON object with inputs>\n\
           Observation: <tool output>\n\
           Thought: <response after observation>\n\
           Final Answer: <natural language reply>\n\
         \n\
         - Booking requests:\n\
           - Extract calendar_id (default: 'primary').\n\
           - Extract date_time (e.g. 'tomorrow at 2 PM') and convert it to ISO 8601 \
           (e.g. '2025-07-04T14:00:00') relative to today's date above.\n\
           - Extract duration in minutes as a string (e.g. '60').\n\
           - Extract description (e.g. 'Meeting with Ashlok').\n\
           - Always call check_availability before calling book_appointment.\n\
           - Only book if the time slot is available.\n\
         \n\
         - Date notes:\n\
           - All date_time values must be ISO format with no trailing 'Z'.\n\
         \n\
         - If any required field is missing, reply:\n\
           Final Answer: Error: Missing required fields (e.g., date, time, duration, description)\n\
         \n\
         {scratchpad}",
        tools = tool_lines.join("\n"),
        tool_names = tool_names.join(", "),
        context = context,
        scratchpad = render_scratchpad(entries),
    )
}
