//! Model families and their inference-parameter tables
//!
//! A Bedrock model identifier is resolved to a [`ModelFamily`] once, by
//! substring, in a fixed order: `titan`, `ai21`, `claude`, `command`,
//! `stability`, `mixtral`. Each family accepts a closed set of inference
//! parameter names.

use std::fmt;

use serde_json::{Map, Value};

use crate::error::{McpAgentError, Result};

/// Model families supported by the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelFamily {
    /// Amazon Titan text models
    Titan,
    /// AI21 Labs Jurassic models
    Jurassic,
    /// Anthropic Claude models
    Claude,
    /// Cohere Command models
    Command,
    /// Stability AI image models
    Stability,
    /// Mistral Mixtral models
    Mixtral,
}

/// Inference settings with a provider-neutral meaning.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommonParameter {
    /// Sampling temperature
    Temperature,
    /// Nucleus sampling mass
    TopP,
    /// Maximum generated tokens
    MaxTokens,
    /// Sequences that stop generation
    StopSequences,
}

const TITAN_PARAMS: &[&str] = &["temperature", "topP", "maxTokenCount", "stopSequences"];

const JURASSIC_PARAMS: &[&str] = &[
    "temperature",
    "topP",
    "maxTokens",
    "stopSequences",
    "presencePenalty",
    "countPenalty",
    "frequencyPenalty",
    "applyToWhitespaces",
    "applyToPunctuation",
    "applyToNumbers",
    "applyToStopwords",
    "applyToEmojis",
];

const CLAUDE_PARAMS: &[&str] = &[
    "temperature",
    "topP",
    "topK",
    "max_tokens_to_sample",
    "stop_sequences",
];

const COMMAND_PARAMS: &[&str] = &[
    "temperature",
    "p",
    "k",
    "return_likelihoods",
    "stream",
    "max_tokens",
    "stop_sequences",
    "num_generations",
];

const STABILITY_PARAMS: &[&str] = &["cfg_scale", "steps"];

const MIXTRAL_PARAMS: &[&str] = &["max_tokens", "stop", "temperature", "top_p", "top_k"];

const PROBE_PROMPT: &str = "How are you?";

impl ModelFamily {
    /// Substring resolution order.
    const LOOKUP: [(&'static str, ModelFamily); 6] = [
        ("titan", ModelFamily::Titan),
        ("ai21", ModelFamily::Jurassic),
        ("claude", ModelFamily::Claude),
        ("command", ModelFamily::Command),
        ("stability", ModelFamily::Stability),
        ("mixtral", ModelFamily::Mixtral),
    ];

    /// Resolves the family of `model_id`.
    ///
    /// # Errors
    ///
    /// Returns [`McpAgentError::UnsupportedModel`] when no family matches.
    pub fn from_model_id(model_id: &str) -> Result<Self> {
        Self::LOOKUP
            .iter()
            .find(|(needle, _)| model_id.contains(needle))
            .map(|(_, family)| *family)
            .ok_or_else(|| McpAgentError::UnsupportedModel(model_id.to_string()).into())
    }

    /// Inference parameter names this family accepts.
    pub fn allowed_parameters(&self) -> &'static [&'static str] {
        match self {
            ModelFamily::Titan => TITAN_PARAMS,
            ModelFamily::Jurassic => JURASSIC_PARAMS,
            ModelFamily::Claude => CLAUDE_PARAMS,
            ModelFamily::Command => COMMAND_PARAMS,
            ModelFamily::Stability => STABILITY_PARAMS,
            ModelFamily::Mixtral => MIXTRAL_PARAMS,
        }
    }

    /// `false` for image-only families.
    pub fn generates_text(&self) -> bool {
        !matches!(self, ModelFamily::Stability)
    }

    /// Maps a family-specific parameter name to its common meaning, if it
    /// has one.
    pub fn common_parameter(&self, key: &str) -> Option<CommonParameter> {
        use CommonParameter::*;
        match (self, key) {
            (ModelFamily::Stability, _) => None,
            (_, "temperature") => Some(Temperature),
            (ModelFamily::Command, "p") | (ModelFamily::Mixtral, "top_p") => Some(TopP),
            (ModelFamily::Titan | ModelFamily::Jurassic | ModelFamily::Claude, "topP") => {
                Some(TopP)
            }
            (ModelFamily::Titan, "maxTokenCount")
            | (ModelFamily::Jurassic, "maxTokens")
            | (ModelFamily::Claude, "max_tokens_to_sample")
            | (ModelFamily::Command | ModelFamily::Mixtral, "max_tokens") => Some(MaxTokens),
            (ModelFamily::Titan | ModelFamily::Jurassic, "stopSequences")
            | (ModelFamily::Claude | ModelFamily::Command, "stop_sequences")
            | (ModelFamily::Mixtral, "stop") => Some(StopSequences),
            _ => None,
        }
    }

    /// Smallest native request body that exercises `InvokeModel` for this
    /// family.
    pub fn access_probe_body(&self) -> Value {
        match self {
            ModelFamily::Titan => serde_json::json!({
                "inputText": PROBE_PROMPT,
                "textGenerationConfig": { "maxTokenCount": 64, "temperature": 0.5 }
            }),
            ModelFamily::Jurassic => serde_json::json!({
                "prompt": PROBE_PROMPT,
                "maxTokens": 64,
                "temperature": 0.5
            }),
            ModelFamily::Claude => serde_json::json!({
                "anthropic_version": "bedrock-2023-05-31",
                "max_tokens": 64,
                "temperature": 0.5,
                "system": "You are a helpful assistant.",
                "messages": [{ "role": "user", "content": PROBE_PROMPT }]
            }),
            ModelFamily::Command => serde_json::json!({
                "prompt": PROBE_PROMPT,
                "max_tokens": 64,
                "temperature": 0.5
            }),
            ModelFamily::Stability => serde_json::json!({
                "text_prompts": [{ "text": PROBE_PROMPT, "cfg_scale": 10, "steps": 1 }]
            }),
            ModelFamily::Mixtral => serde_json::json!({
                "prompt": format!("<s>[INST] {} [/INST]", PROBE_PROMPT),
                "max_tokens": 64,
                "temperature": 0.5
            }),
        }
    }
}

impl fmt::Display for ModelFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ModelFamily::Titan => "Amazon Titan",
            ModelFamily::Jurassic => "AI21 Labs Jurassic",
            ModelFamily::Claude => "Anthropic Claude",
            ModelFamily::Command => "Cohere Command",
            ModelFamily::Stability => "Stability AI",
            ModelFamily::Mixtral => "Mistral Mixtral",
        };
        f.write_str(name)
    }
}

/// Checks every key of `params` against the family table of `model_id`.
///
/// Keys are checked in map order; the first unknown key is reported.
///
/// # Errors
///
/// - [`McpAgentError::UnsupportedModel`] when the model matches no family.
/// - [`McpAgentError::InvalidParameter`] naming the first rejected key.
pub fn validate_inference_parameters(model_id: &str, params: &Map<String, Value>) -> Result<()> {
    let family = ModelFamily::from_model_id(model_id)?;
    let allowed = family.allowed_parameters();

    match params.keys().find(|key| !allowed.contains(&key.as_str())) {
        Some(key) => Err(McpAgentError::InvalidParameter {
            key: key.clone(),
            model_id: model_id.to_string(),
        }
        .into()),
        None => Ok(()),
    }
}
