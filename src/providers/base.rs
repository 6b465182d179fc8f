//! Provider trait and conversation types
//!
//! The agent talks to the language model through [`Provider::complete`],
//! passing the whole conversation each turn. Providers are stateless
//! between calls.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Message structure for conversation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// Role of the message sender (system, user, assistant)
    pub role: String,
    /// Content of the message
    pub content: String,
}

impl Message {
    /// Creates a new user message
    ///
    /// # Examples
    ///
    /// ```
    /// use mcp_agent_client::providers::Message;
    ///
    /// let msg = Message::user("What is the weather in Paris?");
    /// assert_eq!(msg.role, "user");
    /// ```
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }

    /// Creates a new assistant message
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: "assistant".to_string(),
            content: content.into(),
        }
    }

    /// Creates a new system message
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }
}

/// Token usage information
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TokenUsage {
    /// Number of tokens in the prompt
    pub prompt_tokens: usize,
    /// Number of tokens in the completion
    pub completion_tokens: usize,
    /// Total tokens used (prompt + completion)
    pub total_tokens: usize,
}

impl TokenUsage {
    /// Create a new TokenUsage instance
    ///
    /// # Examples
    ///
    /// ```
    /// use mcp_agent_client::providers::TokenUsage;
    ///
    /// let usage = TokenUsage::new(100, 50);
    /// assert_eq!(usage.total_tokens, 150);
    /// ```
    pub fn new(prompt_tokens: usize, completion_tokens: usize) -> Self {
        Self {
            prompt_tokens,
            completion_tokens,
            total_tokens: prompt_tokens + completion_tokens,
        }
    }
}

/// Response from a completion request
#[derive(Debug, Clone)]
pub struct CompletionResponse {
    /// The response message from the model
    pub message: Message,
    /// Optional token usage information
    pub usage: Option<TokenUsage>,
    /// Why generation stopped, as reported by the provider
    pub stop_reason: Option<String>,
}

impl CompletionResponse {
    /// Wraps a message with no usage information.
    pub fn new(message: Message) -> Self {
        Self {
            message,
            usage: None,
            stop_reason: None,
        }
    }

    /// Attaches token usage.
    pub fn with_usage(mut self, usage: TokenUsage) -> Self {
        self.usage = Some(usage);
        self
    }

    /// Attaches the stop reason.
    pub fn with_stop_reason(mut self, reason: impl Into<String>) -> Self {
        self.stop_reason = Some(reason.into());
        self
    }
}

/// Language model backend used by the agent.
#[async_trait]
pub trait Provider: Send + Sync {
    /// Completes a conversation.
    ///
    /// `stop` lists extra sequences at which generation must end, on top of
    /// any configured by the provider itself.
    ///
    /// # Errors
    ///
    /// Returns [`crate::error::McpAgentError::Provider`] if the call fails
    /// or the reply carries no text.
    async fn complete(&self, messages: &[Message], stop: &[String]) -> Result<CompletionResponse>;

    /// Identifier of the model behind this provider.
    fn model_id(&self) -> &str;
}

/// Folds a conversation into the shape chat APIs accept.
///
/// System messages are collected separately and joined with blank lines.
/// Consecutive messages with the same role are merged, and a leading
/// assistant message is dropped so the turn list starts with the user.
pub fn normalize_conversation(messages: &[Message]) -> (Option<String>, Vec<Message>) {
    let mut system = Vec::new();
    let mut turns: Vec<Message> = Vec::new();

    for message in messages {
        if message.role == "system" {
            system.push(message.content.as_str());
            continue;
        }
        if turns.is_empty() && message.role == "assistant" {
            tracing::warn!("Dropping leading assistant message");
            continue;
        }
        match turns.last_mut() {
            Some(last) if last.role == message.role => {
                last.content.push_str("\n\n");
                last.content.push_str(&message.content);
            }
            _ => turns.push(message.clone()),
        }
    }

    let system = if system.is_empty() {
        None
    } else {
        Some(system.join("\n\n"))
    };
    (system, turns)
}
