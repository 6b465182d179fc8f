//! Language model providers
//!
//! Amazon Bedrock is the only backend; the agent depends on the
//! [`Provider`] trait so tests can script model replies.

pub mod base;
pub mod bedrock;

pub use base::{normalize_conversation, CompletionResponse, Message, Provider, TokenUsage};
pub use bedrock::{build_client, BedrockProvider, InferenceSettings};
