//! Per-run transcript of agent steps
//!
//! The transcript is append-only and owned by a single run. It is rendered
//! into alternating assistant/user messages after the opening prompt.

use serde::Serialize;
use serde_json::Value;

use crate::prompts::generate_observation_prompt;
use crate::providers::{Message, TokenUsage};

/// One think/act/observe cycle.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AgentStep {
    /// Reasoning text preceding the action
    pub thought: String,
    /// Tool the model selected
    pub tool: String,
    /// Input passed to the tool
    pub input: Value,
    /// Text fed back to the model
    pub observation: String,
    /// The model turn that produced this step
    #[serde(skip)]
    pub log: String,
}

/// Ordered steps of one run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Transcript {
    steps: Vec<AgentStep>,
    usage: Option<TokenUsage>,
}

impl Transcript {
    /// Creates an empty transcript.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a completed step.
    pub fn push(&mut self, step: AgentStep) {
        self.steps.push(step);
    }

    /// Adds one model turn's token usage to the run total.
    pub fn record_usage(&mut self, usage: &TokenUsage) {
        self.usage = Some(match self.usage {
            Some(total) => TokenUsage::new(
                total.prompt_tokens + usage.prompt_tokens,
                total.completion_tokens + usage.completion_tokens,
            ),
            None => *usage,
        });
    }

    /// Token usage summed over the run, if the provider reported any.
    pub fn usage(&self) -> Option<TokenUsage> {
        self.usage
    }

    /// Steps in execution order.
    pub fn steps(&self) -> &[AgentStep] {
        &self.steps
    }

    /// Number of recorded steps
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    /// Whether no step has been recorded
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Renders the steps as an assistant turn followed by an observation
    /// turn for each step.
    pub fn to_messages(&self) -> Vec<Message> {
        self.steps
            .iter()
            .flat_map(|step| {
                [
                    Message::assistant(step.log.clone()),
                    Message::user(generate_observation_prompt(&step.observation)),
                ]
            })
            .collect()
    }

    /// Consumes the transcript.
    pub fn into_steps(self) -> Vec<AgentStep> {
        self.steps
    }
}
