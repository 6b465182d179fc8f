//! ReAct prompt text
//!
//! The model is asked to alternate `Thought`/`Action`/`Action Input` lines
//! with observations supplied by the client, and to end with a
//! `Final Answer` line.

/// Opening of the system prompt; followed by the tool summary.
pub const PREFIX: &str =
    "Answer the following questions as best you can. You have access to the following tools:";

/// Output format the parser expects.
pub const FORMAT_INSTRUCTIONS: &str = "Use the following format:

Question: the input question you must answer
Thought: you should always think about what to do
Action: Select the tool by returning the name from the list of tools. Do not provide parameters here.
Action Input: the input to the action
Observation: the result of the action
... (this Thought/Action/Action Input/Observation can repeat N times)
Thought: I now know the final answer
Final Answer: the final answer to the original input question";

/// Marker that ends a model turn before an observation.
pub const OBSERVATION_STOP: &str = "\nObservation:";

/// Builds the system prompt for a run.
///
/// # Examples
///
/// ```
/// use mcp_agent_client::prompts::react_prompt::generate_system_prompt;
///
/// let prompt = generate_system_prompt("echo: returns input");
/// assert!(prompt.ends_with("echo: returns input"));
/// ```
pub fn generate_system_prompt(tool_summary: &str) -> String {
    format!("{}\n\n{}", PREFIX, tool_summary)
}

/// Builds the opening user turn: format instructions, the valid tool names
/// and the question.
pub fn generate_question_prompt(tool_names: &[String], question: &str) -> String {
    format!(
        "{}\n\nValid tool names: [{}]\n\nBegin!\n\nQuestion: {}\nThought:",
        FORMAT_INSTRUCTIONS,
        tool_names.join(", "),
        question
    )
}

/// Builds the user turn carrying one observation.
pub fn generate_observation_prompt(observation: &str) -> String {
    format!("Observation: {}\nThought:", observation)
}
