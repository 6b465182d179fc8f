//! Amazon Bedrock provider
//!
//! Chat turns go through the Converse API so every text model family shares
//! one request shape. Configured inference parameters are validated against
//! the model family first. Parameters with a common meaning go into the
//! inference configuration; the rest are forwarded untouched as additional
//! model request fields.
//!
//! Access probes use `InvokeModel` with the family's native body.

use std::collections::HashMap;

use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_credential_types::Credentials;
use aws_sdk_bedrockruntime::config::Region;
use aws_sdk_bedrockruntime::error::DisplayErrorContext;
use aws_sdk_bedrockruntime::primitives::Blob;
use aws_sdk_bedrockruntime::types::{
    ContentBlock, ConversationRole, ConverseOutput, InferenceConfiguration,
    Message as BedrockMessage, SystemContentBlock,
};
use aws_sdk_bedrockruntime::Client;
use aws_smithy_types::{Document, Number};
use serde_json::{Map, Value};

use crate::config::BedrockConfig;
use crate::error::{McpAgentError, Result};
use crate::models::{
    validate_inference_parameters, CommonParameter, InvokeError, ModelFamily, ModelInvoker,
};
use crate::providers::base::{
    normalize_conversation, CompletionResponse, Message, Provider, TokenUsage,
};

/// Builds a Bedrock runtime client.
///
/// Static credentials are used when both the access key and the secret are
/// configured; otherwise the default AWS credential chain applies. Region
/// and endpoint fall back to the environment when unset.
pub async fn build_client(config: &BedrockConfig) -> Client {
    let mut loader = aws_config::defaults(BehaviorVersion::latest());

    if let Some(region) = config.region.as_deref().filter(|r| !r.is_empty()) {
        loader = loader.region(Region::new(region.to_string()));
    }

    if let (Some(key_id), Some(secret)) = (&config.access_key_id, &config.secret_access_key) {
        let creds = Credentials::new(
            key_id,
            secret,
            config.session_token.clone(),
            None,
            "mcp-agent-client",
        );
        loader = loader.credentials_provider(creds);
    }

    if let Some(endpoint) = config.endpoint_url.as_deref().filter(|e| !e.is_empty()) {
        loader = loader.endpoint_url(endpoint);
    }

    let shared = loader.load().await;
    tracing::debug!(
        region = ?shared.region().map(|r| r.as_ref().to_string()),
        "Bedrock client initialised"
    );
    Client::new(&shared)
}

/// Inference settings split by where Converse expects them.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct InferenceSettings {
    /// Sampling temperature
    pub temperature: Option<f32>,
    /// Nucleus sampling mass
    pub top_p: Option<f32>,
    /// Maximum generated tokens
    pub max_tokens: Option<i32>,
    /// Configured stop sequences
    pub stop_sequences: Vec<String>,
    /// Family-specific fields forwarded as-is
    pub additional: Map<String, Value>,
}

impl InferenceSettings {
    /// Validates `params` for `model_id` and splits them.
    ///
    /// # Errors
    ///
    /// - [`McpAgentError::UnsupportedModel`] or [`McpAgentError::InvalidParameter`]
    ///   from validation.
    /// - [`McpAgentError::Config`] when a common parameter has the wrong type.
    pub fn from_parameters(model_id: &str, params: &Map<String, Value>) -> Result<Self> {
        validate_inference_parameters(model_id, params)?;
        let family = ModelFamily::from_model_id(model_id)?;

        let mut settings = Self::default();
        for (key, value) in params {
            match family.common_parameter(key) {
                Some(CommonParameter::Temperature) => {
                    settings.temperature = Some(as_f32(key, value)?);
                }
                Some(CommonParameter::TopP) => {
                    settings.top_p = Some(as_f32(key, value)?);
                }
                Some(CommonParameter::MaxTokens) => {
                    let tokens = value
                        .as_i64()
                        .and_then(|v| i32::try_from(v).ok())
                        .filter(|v| *v > 0)
                        .ok_or_else(|| type_error(key, "a positive integer"))?;
                    settings.max_tokens = Some(tokens);
                }
                Some(CommonParameter::StopSequences) => {
                    settings.stop_sequences = as_string_list(key, value)?;
                }
                None => {
                    settings.additional.insert(key.clone(), value.clone());
                }
            }
        }
        Ok(settings)
    }

    fn to_inference_configuration(&self, extra_stop: &[String]) -> InferenceConfiguration {
        let mut stop: Vec<String> = self.stop_sequences.clone();
        for sequence in extra_stop {
            if !stop.contains(sequence) {
                stop.push(sequence.clone());
            }
        }

        InferenceConfiguration::builder()
            .set_temperature(self.temperature)
            .set_top_p(self.top_p)
            .set_max_tokens(self.max_tokens)
            .set_stop_sequences(if stop.is_empty() { None } else { Some(stop) })
            .build()
    }
}

fn type_error(key: &str, expected: &str) -> anyhow::Error {
    McpAgentError::Config(format!("inference parameter '{}' must be {}", key, expected)).into()
}

fn as_f32(key: &str, value: &Value) -> Result<f32> {
    value
        .as_f64()
        .map(|v| v as f32)
        .ok_or_else(|| type_error(key, "a number"))
}

fn as_string_list(key: &str, value: &Value) -> Result<Vec<String>> {
    match value {
        Value::String(s) => Ok(vec![s.clone()]),
        Value::Array(items) => items
            .iter()
            .map(|item| {
                item.as_str()
                    .map(str::to_string)
                    .ok_or_else(|| type_error(key, "a string or a list of strings"))
            })
            .collect(),
        _ => Err(type_error(key, "a string or a list of strings")),
    }
}

/// Converts JSON into a Smithy document.
pub fn json_to_document(value: &Value) -> Document {
    match value {
        Value::Null => Document::Null,
        Value::Bool(b) => Document::Bool(*b),
        Value::Number(n) => {
            if let Some(u) = n.as_u64() {
                Document::Number(Number::PosInt(u))
            } else if let Some(i) = n.as_i64() {
                Document::Number(Number::NegInt(i))
            } else {
                Document::Number(Number::Float(n.as_f64().unwrap_or_default()))
            }
        }
        Value::String(s) => Document::String(s.clone()),
        Value::Array(items) => Document::Array(items.iter().map(json_to_document).collect()),
        Value::Object(map) => Document::Object(
            map.iter()
                .map(|(k, v)| (k.clone(), json_to_document(v)))
                .collect::<HashMap<_, _>>(),
        ),
    }
}

fn to_bedrock_messages(turns: &[Message]) -> Result<Vec<BedrockMessage>> {
    turns
        .iter()
        .map(|turn| {
            let role = match turn.role.as_str() {
                "assistant" => ConversationRole::Assistant,
                _ => ConversationRole::User,
            };
            BedrockMessage::builder()
                .role(role)
                .content(ContentBlock::Text(turn.content.clone()))
                .build()
                .map_err(|e| McpAgentError::Provider(format!("invalid message: {}", e)).into())
        })
        .collect()
}

/// Bedrock-backed [`Provider`] and [`ModelInvoker`].
pub struct BedrockProvider {
    client: Client,
    model_id: String,
    settings: InferenceSettings,
}

impl std::fmt::Debug for BedrockProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BedrockProvider")
            .field("model_id", &self.model_id)
            .field("settings", &self.settings)
            .finish()
    }
}

impl BedrockProvider {
    /// Creates a provider for the configured model.
    ///
    /// # Errors
    ///
    /// Fails when the inference parameters are rejected for the model, or
    /// when the model family does not generate text.
    pub async fn new(config: &BedrockConfig) -> Result<Self> {
        let settings =
            InferenceSettings::from_parameters(&config.model_id, &config.inference_parameters)?;
        let family = ModelFamily::from_model_id(&config.model_id)?;
        if !family.generates_text() {
            return Err(McpAgentError::Provider(format!(
                "{} models do not generate text: {}",
                family, config.model_id
            ))
            .into());
        }

        let client = build_client(config).await;
        tracing::info!(model = %config.model_id, family = %family, "Bedrock provider ready");

        Ok(Self {
            client,
            model_id: config.model_id.clone(),
            settings,
        })
    }
}

#[async_trait]
impl Provider for BedrockProvider {
    async fn complete(&self, messages: &[Message], stop: &[String]) -> Result<CompletionResponse> {
        let (system, turns) = normalize_conversation(messages);
        let bedrock_messages = to_bedrock_messages(&turns)?;

        let mut request = self
            .client
            .converse()
            .model_id(&self.model_id)
            .set_messages(Some(bedrock_messages))
            .inference_config(self.settings.to_inference_configuration(stop));

        if let Some(system) = system {
            request = request.system(SystemContentBlock::Text(system));
        }
        if !self.settings.additional.is_empty() {
            request = request.additional_model_request_fields(json_to_document(&Value::Object(
                self.settings.additional.clone(),
            )));
        }

        tracing::debug!(model = %self.model_id, turns = turns.len(), "Sending Converse request");
        let response = request.send().await.map_err(|e| {
            McpAgentError::Provider(format!("Bedrock request failed: {}", DisplayErrorContext(&e)))
        })?;

        let text = match response.output() {
            Some(ConverseOutput::Message(message)) => message
                .content()
                .iter()
                .filter_map(|block| block.as_text().ok())
                .cloned()
                .collect::<Vec<_>>()
                .join(""),
            _ => {
                return Err(
                    McpAgentError::Provider("Bedrock reply carried no message".to_string()).into(),
                )
            }
        };

        let mut completion = CompletionResponse::new(Message::assistant(text))
            .with_stop_reason(response.stop_reason().as_str());
        if let Some(usage) = response.usage() {
            completion = completion.with_usage(TokenUsage::new(
                usage.input_tokens().max(0) as usize,
                usage.output_tokens().max(0) as usize,
            ));
        }
        Ok(completion)
    }

    fn model_id(&self) -> &str {
        &self.model_id
    }
}

#[async_trait]
impl ModelInvoker for BedrockProvider {
    async fn invoke(&self, model_id: &str, body: Value) -> std::result::Result<(), InvokeError> {
        let payload = serde_json::to_vec(&body).map_err(|e| InvokeError::Other(e.to_string()))?;

        self.client
            .invoke_model()
            .model_id(model_id)
            .content_type("application/json")
            .accept("application/json")
            .body(Blob::new(payload))
            .send()
            .await
            .map(|_| ())
            .map_err(|err| {
                let denied = err
                    .as_service_error()
                    .map(|e| e.is_access_denied_exception())
                    .unwrap_or(false);
                let detail = DisplayErrorContext(&err).to_string();
                if denied {
                    InvokeError::AccessDenied(detail)
                } else {
                    InvokeError::Other(detail)
                }
            })
    }
}
