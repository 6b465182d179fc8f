//! Parser for ReAct-formatted model output
//!
//! A model turn is either a tool selection (`Action:` followed by
//! `Action Input:`) or a final answer (`Final Answer:`). Text after a
//! hallucinated `Observation` line is ignored.

use regex::Regex;
use serde_json::Value;

use crate::error::{McpAgentError, Result};

const FINAL_ANSWER: &str = "Final Answer:";

/// A tool selection.
#[derive(Debug, Clone, PartialEq)]
pub struct AgentAction {
    /// Tool name as written by the model
    pub tool: String,
    /// Parsed input; a JSON value when it parses, a string otherwise
    pub input: Value,
    /// Reasoning text preceding the action
    pub thought: String,
    /// The model turn as kept in the transcript
    pub log: String,
}

/// The end of a run.
#[derive(Debug, Clone, PartialEq)]
pub struct AgentFinish {
    /// Final answer text
    pub output: String,
    /// The model turn as kept in the transcript
    pub log: String,
}

/// Outcome of parsing one model turn.
#[derive(Debug, Clone, PartialEq)]
pub enum ParsedTurn {
    /// Run a tool and observe
    Action(AgentAction),
    /// Stop with an answer
    Finish(AgentFinish),
}

/// Compiled ReAct patterns.
#[derive(Debug, Clone)]
pub struct ReactParser {
    action: Regex,
    observation: Regex,
}

impl ReactParser {
    /// Compiles the parser patterns.
    ///
    /// # Errors
    ///
    /// Returns an error if a pattern fails to compile.
    pub fn new() -> Result<Self> {
        Ok(Self {
            action: Regex::new(
                r"(?s)Action\s*\d*\s*:[\s]*(.*?)[\s]*Action\s*\d*\s*Input\s*\d*\s*:[\s]*(.*)",
            )?,
            observation: Regex::new(r"\n\s*Observation\s*\d*\s*:")?,
        })
    }

    /// Parses one model turn.
    ///
    /// # Errors
    ///
    /// Returns [`McpAgentError::AgentParse`] when the text holds both a tool
    /// selection and a final answer, neither, or an empty tool name.
    pub fn parse(&self, text: &str) -> Result<ParsedTurn> {
        let log = match self.observation.find(text) {
            Some(m) => &text[..m.start()],
            None => text,
        }
        .trim_end();

        let action = self.action.captures(log);
        let answer = log.find(FINAL_ANSWER);

        match (action, answer) {
            (Some(_), Some(_)) => Err(parse_error(
                "found both a tool selection and a final answer",
                log,
            )),
            (Some(caps), None) => {
                let tool = caps
                    .get(1)
                    .map(|m| clean_tool_name(m.as_str()))
                    .unwrap_or_default();
                if tool.is_empty() {
                    return Err(parse_error("tool name is empty", log));
                }
                let raw_input = caps.get(2).map(|m| m.as_str()).unwrap_or_default();
                let thought = caps
                    .get(0)
                    .map(|m| strip_thought_label(&log[..m.start()]))
                    .unwrap_or_default();

                Ok(ParsedTurn::Action(AgentAction {
                    tool,
                    input: parse_action_input(raw_input),
                    thought,
                    log: log.to_string(),
                }))
            }
            (None, Some(pos)) => Ok(ParsedTurn::Finish(AgentFinish {
                output: log[pos + FINAL_ANSWER.len()..].trim().to_string(),
                log: log.to_string(),
            })),
            (None, None) => Err(parse_error(
                "expected 'Action:' with 'Action Input:' or 'Final Answer:'",
                log,
            )),
        }
    }
}

fn parse_error(reason: &str, text: &str) -> anyhow::Error {
    let excerpt: String = text.chars().take(200).collect();
    McpAgentError::AgentParse(format!("{}: `{}`", reason, excerpt)).into()
}

fn strip_thought_label(text: &str) -> String {
    let text = text.trim();
    text.strip_prefix("Thought:").unwrap_or(text).trim().to_string()
}

fn clean_tool_name(raw: &str) -> String {
    raw.trim()
        .trim_matches(|c| c == '`' || c == '"' || c == '\'' || c == '*')
        .trim()
        .to_string()
}

fn strip_code_fence(text: &str) -> &str {
    let Some(body) = text.strip_prefix("```") else {
        return text;
    };
    let body = match body.find('\n') {
        Some(newline) => &body[newline + 1..],
        None => body,
    };
    body.strip_suffix("```").unwrap_or(body).trim()
}

/// Interprets an `Action Input` value.
///
/// Code fences are removed and the remainder is parsed as JSON. Input that
/// is not JSON is kept as a string, minus one pair of surrounding quotes.
pub fn parse_action_input(raw: &str) -> Value {
    let text = strip_code_fence(raw.trim()).trim();

    if let Ok(value) = serde_json::from_str::<Value>(text) {
        return value;
    }

    let unquoted = ['"', '\'']
        .iter()
        .find_map(|q| {
            text.strip_prefix(*q)
                .and_then(|rest| rest.strip_suffix(*q))
        })
        .unwrap_or(text);
    Value::String(unquoted.to_string())
}
