//! ReAct agent execution loop
//!
//! A run moves between four states:
//!
//! - `Thinking`: ask the model for the next turn and parse it
//! - `Acting`: call the selected tool
//! - `Observing`: record the observation in the transcript
//! - `Done`: return the final answer
//!
//! The run fails when the model produces an unparsable turn, when the
//! iteration cap or the wall-clock budget is exhausted, or when the server
//! channel is lost. Unknown tools and tool failures are fed back to the
//! model as observations.

use std::sync::Arc;
use std::time::{Duration, Instant};

use serde_json::Value;
use tracing::{debug, info, warn};

use crate::agent::parser::{AgentAction, ParsedTurn, ReactParser};
use crate::agent::trace::{AgentStep, Transcript};
use crate::config::AgentConfig;
use crate::error::{kind_of, McpAgentError, Result};
use crate::mcp::ToolDescriptor;
use crate::prompts::{generate_question_prompt, generate_system_prompt, OBSERVATION_STOP};
use crate::providers::{Message, Provider, TokenUsage};
use crate::tools::{ToolRegistry, ToolResult};

/// Result of a completed run.
#[derive(Debug, Clone)]
pub struct AgentResponse {
    /// Final answer text
    pub output: String,
    /// Tool steps taken, in order
    pub steps: Vec<AgentStep>,
    /// Model turns used
    pub iterations: usize,
    /// Token usage summed over all model turns, when the provider reports it
    pub usage: Option<TokenUsage>,
}

enum AgentState {
    Thinking,
    Acting(AgentAction),
    Observing(AgentStep),
    Done(String),
}

/// Runs queries against a provider with a tool registry.
pub struct AgentExecutor {
    provider: Arc<dyn Provider>,
    parser: ReactParser,
    config: AgentConfig,
}

impl AgentExecutor {
    /// Creates an executor.
    ///
    /// # Errors
    ///
    /// Returns [`McpAgentError::Config`] if `max_iterations` is zero.
    pub fn new(provider: Arc<dyn Provider>, config: AgentConfig) -> Result<Self> {
        if config.max_iterations == 0 {
            return Err(
                McpAgentError::Config("max_iterations must be greater than 0".to_string()).into(),
            );
        }
        Ok(Self {
            provider,
            parser: ReactParser::new()?,
            config,
        })
    }

    /// Answers `query` using the tools in `tools`.
    ///
    /// # Errors
    ///
    /// - [`McpAgentError::AgentParse`] for an unparsable model turn
    /// - [`McpAgentError::MaxIterationsExceeded`] when the cap is reached
    /// - [`McpAgentError::AgentTimeout`] when the time budget runs out
    /// - [`McpAgentError::SessionClosed`] and provider errors unchanged
    pub async fn run(&self, tools: &ToolRegistry, query: &str) -> Result<AgentResponse> {
        let budget = Duration::from_secs(self.config.timeout_seconds);
        let started = Instant::now();

        let response = tokio::time::timeout(budget, self.run_loop(tools, query))
            .await
            .map_err(|_| {
                warn!("Agent execution timeout after {:?}", started.elapsed());
                McpAgentError::AgentTimeout(self.config.timeout_seconds)
            })??;

        info!(
            "Agent execution completed in {} iterations, {} seconds",
            response.iterations,
            started.elapsed().as_secs()
        );
        if let Some(usage) = response.usage {
            debug!("Tokens used: {} total", usage.total_tokens);
        }
        Ok(response)
    }

    async fn run_loop(&self, tools: &ToolRegistry, query: &str) -> Result<AgentResponse> {
        let system = Message::system(generate_system_prompt(&tools.summary()));
        let opening = Message::user(generate_question_prompt(&tools.names(), query));
        let stop = vec![OBSERVATION_STOP.to_string()];

        let mut transcript = Transcript::new();
        let mut iterations = 0;
        let mut state = AgentState::Thinking;

        loop {
            state = match state {
                AgentState::Thinking => {
                    if iterations >= self.config.max_iterations {
                        warn!("Maximum iterations ({}) exceeded", self.config.max_iterations);
                        return Err(McpAgentError::MaxIterationsExceeded {
                            limit: self.config.max_iterations,
                            message: "no final answer was produced".to_string(),
                        }
                        .into());
                    }
                    iterations += 1;
                    debug!("Iteration {}/{}", iterations, self.config.max_iterations);

                    let mut messages = vec![system.clone(), opening.clone()];
                    messages.extend(transcript.to_messages());

                    let completion = self.provider.complete(&messages, &stop).await?;
                    debug!(text = %completion.message.content, "Model turn");
                    if let Some(usage) = &completion.usage {
                        transcript.record_usage(usage);
                        debug!(
                            prompt_tokens = usage.prompt_tokens,
                            completion_tokens = usage.completion_tokens,
                            stop_reason = completion.stop_reason.as_deref().unwrap_or("unknown"),
                            "Model turn usage"
                        );
                    } else if let Some(reason) = &completion.stop_reason {
                        debug!(stop_reason = %reason, "Model turn stopped");
                    }

                    match self.parser.parse(&completion.message.content)? {
                        ParsedTurn::Action(action) => AgentState::Acting(action),
                        ParsedTurn::Finish(finish) => AgentState::Done(finish.output),
                    }
                }
                AgentState::Acting(action) => {
                    let observation = self.act(tools, &action).await?;
                    AgentState::Observing(AgentStep {
                        thought: action.thought,
                        tool: action.tool,
                        input: action.input,
                        observation,
                        log: action.log,
                    })
                }
                AgentState::Observing(step) => {
                    transcript.push(step);
                    AgentState::Thinking
                }
                AgentState::Done(output) => {
                    let usage = transcript.usage();
                    return Ok(AgentResponse {
                        output,
                        steps: transcript.into_steps(),
                        iterations,
                        usage,
                    });
                }
            };
        }
    }

    /// Runs one tool and renders the observation.
    async fn act(&self, tools: &ToolRegistry, action: &AgentAction) -> Result<String> {
        let Some(executor) = tools.get(&action.tool) else {
            let err = McpAgentError::UnknownTool(action.tool.clone());
            warn!("{}", err);
            return Ok(ToolResult::error(format!(
                "{}. Valid tools are: [{}]",
                err,
                tools.names().join(", ")
            ))
            .to_observation());
        };

        let args = match coerce_arguments(executor.descriptor(), action.input.clone()) {
            Ok(args) => args,
            Err(message) => return Ok(ToolResult::error(message).to_observation()),
        };

        debug!(tool = %action.tool, %args, "Executing tool");
        match executor.execute(args).await {
            Ok(result) => {
                let original_len = result.output.len();
                let result = result.truncate_if_needed(self.config.max_observation_bytes);
                if result.truncated {
                    debug!(
                        "Tool output truncated from {} to {} bytes",
                        original_len, self.config.max_observation_bytes
                    );
                }
                Ok(result.to_observation())
            }
            Err(err) => match kind_of(&err) {
                Some(McpAgentError::ToolInvocation { .. }) => {
                    warn!("{}", err);
                    Ok(ToolResult::error(err.to_string()).to_observation())
                }
                _ => Err(err),
            },
        }
    }
}

/// Shapes model-provided input into tool arguments.
///
/// Objects pass through. A bare value is wrapped as the only property of a
/// single-parameter tool; an empty input becomes `{}` for tools without
/// parameters.
fn coerce_arguments(descriptor: &ToolDescriptor, input: Value) -> std::result::Result<Value, String> {
    if input.is_object() {
        return Ok(input);
    }

    let params = descriptor.parameter_names();
    let empty = input.is_null() || input.as_str().is_some_and(|s| s.trim().is_empty());

    match params.as_slice() {
        [] if empty => Ok(Value::Object(Default::default())),
        [only] => {
            let mut map = serde_json::Map::new();
            map.insert(only.clone(), input);
            Ok(Value::Object(map))
        }
        _ => Err(format!(
            "input for tool '{}' must be a JSON object with fields: [{}]",
            descriptor.name,
            params.join(", ")
        )),
    }
}
