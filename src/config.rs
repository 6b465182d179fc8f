//! Configuration management for mcp-agent-client
//!
//! Configuration is loaded from a YAML file, then overridden by
//! `MCP_AGENT_*` environment variables, then by CLI flags.

use crate::error::{McpAgentError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Model provider configuration
    #[serde(default)]
    pub provider: BedrockConfig,
    /// Agent loop configuration
    #[serde(default)]
    pub agent: AgentConfig,
    /// MCP server launch and session configuration
    #[serde(default)]
    pub mcp: McpConfig,
}

/// Amazon Bedrock provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BedrockConfig {
    /// Bedrock model identifier used by the agent
    #[serde(default = "default_model_id")]
    pub model_id: String,

    /// AWS region; when unset the SDK's default region chain is used
    #[serde(default)]
    pub region: Option<String>,

    /// Optional endpoint override (useful for tests and local mocks)
    #[serde(default)]
    pub endpoint_url: Option<String>,

    /// Static access key; when unset the SDK's default credential chain is used
    #[serde(default)]
    pub access_key_id: Option<String>,

    /// Static secret key, paired with `access_key_id`
    #[serde(default)]
    pub secret_access_key: Option<String>,

    /// Optional session token for temporary credentials
    #[serde(default)]
    pub session_token: Option<String>,

    /// Inference parameters sent with every model call
    #[serde(default = "default_inference_parameters")]
    pub inference_parameters: serde_json::Map<String, serde_json::Value>,

    /// Check that the configured model is accessible at startup
    #[serde(default = "default_check_model_access")]
    pub check_model_access: bool,
}

fn default_model_id() -> String {
    "anthropic.claude-3-sonnet-20240229-v1:0".to_string()
}

fn default_inference_parameters() -> serde_json::Map<String, serde_json::Value> {
    let mut params = serde_json::Map::new();
    params.insert("temperature".to_string(), serde_json::json!(0));
    params
}

fn default_check_model_access() -> bool {
    true
}

impl Default for BedrockConfig {
    fn default() -> Self {
        Self {
            model_id: default_model_id(),
            region: None,
            endpoint_url: None,
            access_key_id: None,
            secret_access_key: None,
            session_token: None,
            inference_parameters: default_inference_parameters(),
            check_model_access: default_check_model_access(),
        }
    }
}

/// Agent loop configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Maximum number of think/act cycles per query
    #[serde(default = "default_max_iterations")]
    pub max_iterations: usize,

    /// Wall-clock budget for one query
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,

    /// Observations longer than this are truncated before reaching the model
    #[serde(default = "default_max_observation_bytes")]
    pub max_observation_bytes: usize,
}

fn default_max_iterations() -> usize {
    15
}

fn default_timeout() -> u64 {
    300
}

fn default_max_observation_bytes() -> usize {
    16 * 1024
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            max_iterations: default_max_iterations(),
            timeout_seconds: default_timeout(),
            max_observation_bytes: default_max_observation_bytes(),
        }
    }
}

/// MCP server launch and session configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct McpConfig {
    /// Interpreter used for `.py` server scripts
    #[serde(default = "default_python_command")]
    pub python_command: String,

    /// Interpreter used for `.js` server scripts
    #[serde(default = "default_node_command")]
    pub node_command: String,

    /// Extra environment variables passed to the server process
    #[serde(default)]
    pub env: HashMap<String, String>,

    /// Deadline for the initialize exchange
    #[serde(default = "default_handshake_timeout")]
    pub handshake_timeout_seconds: u64,

    /// Deadline for every other request
    #[serde(default = "default_request_timeout")]
    pub request_timeout_seconds: u64,

    /// Time the server gets to exit on its own after stdin closes
    #[serde(default = "default_shutdown_grace")]
    pub shutdown_grace_seconds: u64,
}

fn default_python_command() -> String {
    "python".to_string()
}

fn default_node_command() -> String {
    "node".to_string()
}

fn default_handshake_timeout() -> u64 {
    30
}

fn default_request_timeout() -> u64 {
    120
}

fn default_shutdown_grace() -> u64 {
    2
}

impl Default for McpConfig {
    fn default() -> Self {
        Self {
            python_command: default_python_command(),
            node_command: default_node_command(),
            env: HashMap::new(),
            handshake_timeout_seconds: default_handshake_timeout(),
            request_timeout_seconds: default_request_timeout(),
            shutdown_grace_seconds: default_shutdown_grace(),
        }
    }
}

impl Config {
    /// Load configuration from file with environment and CLI overrides
    ///
    /// A missing file is not an error; defaults are used instead.
    ///
    /// # Errors
    ///
    /// Returns error if the file exists but cannot be read or parsed
    pub fn load(path: &str, cli: &crate::cli::Cli) -> Result<Self> {
        let mut config = if Path::new(path).exists() {
            Self::from_file(path)?
        } else {
            tracing::warn!("Config file not found at {}, using defaults", path);
            Self::default()
        };

        config.apply_env_vars();
        config.apply_cli_overrides(cli);

        Ok(config)
    }

    fn from_file(path: &str) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| McpAgentError::Config(format!("Failed to read config file: {}", e)))?;
        serde_yaml::from_str(&contents)
            .map_err(|e| McpAgentError::Config(format!("Failed to parse config: {}", e)).into())
    }

    fn apply_env_vars(&mut self) {
        if let Ok(model_id) = std::env::var("MCP_AGENT_MODEL_ID") {
            self.provider.model_id = model_id;
        }

        if let Ok(region) = std::env::var("MCP_AGENT_REGION") {
            self.provider.region = Some(region);
        }

        if let Ok(python) = std::env::var("MCP_AGENT_PYTHON") {
            self.mcp.python_command = python;
        }

        if let Ok(node) = std::env::var("MCP_AGENT_NODE") {
            self.mcp.node_command = node;
        }

        if let Ok(max_iterations) = std::env::var("MCP_AGENT_MAX_ITERATIONS") {
            if let Ok(value) = max_iterations.parse() {
                self.agent.max_iterations = value;
            } else {
                tracing::warn!("Invalid MCP_AGENT_MAX_ITERATIONS: {}", max_iterations);
            }
        }

        if let Ok(timeout) = std::env::var("MCP_AGENT_TIMEOUT_SECONDS") {
            if let Ok(value) = timeout.parse() {
                self.agent.timeout_seconds = value;
            } else {
                tracing::warn!("Invalid MCP_AGENT_TIMEOUT_SECONDS: {}", timeout);
            }
        }

        if let Ok(timeout) = std::env::var("MCP_AGENT_HANDSHAKE_TIMEOUT_SECONDS") {
            if let Ok(value) = timeout.parse() {
                self.mcp.handshake_timeout_seconds = value;
            } else {
                tracing::warn!("Invalid MCP_AGENT_HANDSHAKE_TIMEOUT_SECONDS: {}", timeout);
            }
        }
    }

    fn apply_cli_overrides(&mut self, cli: &crate::cli::Cli) {
        if let Some(model) = &cli.model {
            self.provider.model_id = model.clone();
        }

        if cli.skip_access_check {
            self.provider.check_model_access = false;
        }

        if cli.verbose {
            tracing::debug!("Verbose mode enabled");
        }
    }

    /// Validate the configuration
    ///
    /// # Errors
    ///
    /// Returns [`McpAgentError::Config`] naming the first invalid field
    pub fn validate(&self) -> Result<()> {
        if self.provider.model_id.trim().is_empty() {
            return Err(McpAgentError::Config("provider.model_id cannot be empty".into()).into());
        }

        if self.provider.access_key_id.is_some() != self.provider.secret_access_key.is_some() {
            return Err(McpAgentError::Config(
                "provider.access_key_id and provider.secret_access_key must be set together"
                    .to_string(),
            )
            .into());
        }

        if self.agent.max_iterations == 0 {
            return Err(McpAgentError::Config(
                "agent.max_iterations must be greater than 0".to_string(),
            )
            .into());
        }

        if self.agent.max_iterations > 1000 {
            return Err(McpAgentError::Config(
                "agent.max_iterations must be less than or equal to 1000".to_string(),
            )
            .into());
        }

        if self.agent.timeout_seconds == 0 {
            return Err(McpAgentError::Config(
                "agent.timeout_seconds must be greater than 0".to_string(),
            )
            .into());
        }

        if self.agent.max_observation_bytes == 0 {
            return Err(McpAgentError::Config(
                "agent.max_observation_bytes must be greater than 0".to_string(),
            )
            .into());
        }

        if self.mcp.python_command.trim().is_empty() || self.mcp.node_command.trim().is_empty() {
            return Err(McpAgentError::Config(
                "mcp.python_command and mcp.node_command cannot be empty".to_string(),
            )
            .into());
        }

        if self.mcp.handshake_timeout_seconds == 0 || self.mcp.request_timeout_seconds == 0 {
            return Err(McpAgentError::Config(
                "mcp timeouts must be greater than 0".to_string(),
            )
            .into());
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    fn cli(args: &[&str]) -> crate::cli::Cli {
        use clap::Parser;
        let mut full = vec!["mcp-agent-client"];
        full.extend_from_slice(args);
        full.push("server.py");
        crate::cli::Cli::try_parse_from(full).unwrap()
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(
            config.provider.model_id,
            "anthropic.claude-3-sonnet-20240229-v1:0"
        );
        assert_eq!(config.agent.max_iterations, 15);
        assert_eq!(config.mcp.python_command, "python");
        assert_eq!(config.mcp.node_command, "node");
        assert_eq!(
            config.provider.inference_parameters.get("temperature"),
            Some(&serde_json::json!(0))
        );
        assert!(config.provider.check_model_access);
    }

    #[test]
    fn test_config_validation_success() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn test_config_validation_zero_max_iterations() {
        let mut config = Config::default();
        config.agent.max_iterations = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_validation_max_iterations_too_large() {
        let mut config = Config::default();
        config.agent.max_iterations = 1001;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_validation_half_credentials() {
        let mut config = Config::default();
        config.provider.access_key_id = Some("AKIA".to_string());
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("access_key_id"));
    }

    #[test]
    fn test_config_validation_empty_interpreter() {
        let mut config = Config::default();
        config.mcp.node_command = "  ".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_from_yaml() {
        let yaml = r#"
provider:
  model_id: amazon.titan-text-express-v1
  region: eu-west-1
  inference_parameters:
    temperature: 0.2
    maxTokenCount: 512
agent:
  max_iterations: 5
mcp:
  python_command: python3
  env:
    API_KEY: secret
"#;
        let config: Config = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.provider.model_id, "amazon.titan-text-express-v1");
        assert_eq!(config.provider.region.as_deref(), Some("eu-west-1"));
        assert_eq!(config.provider.inference_parameters.len(), 2);
        assert_eq!(config.agent.max_iterations, 5);
        assert_eq!(config.agent.timeout_seconds, 300);
        assert_eq!(config.mcp.python_command, "python3");
        assert_eq!(config.mcp.node_command, "node");
        assert_eq!(config.mcp.env.get("API_KEY").map(String::as_str), Some("secret"));
    }

    #[test]
    #[serial]
    fn test_load_nonexistent_file_uses_defaults() {
        let config = Config::load("nonexistent.yaml", &cli(&[])).unwrap();
        assert_eq!(config.agent.max_iterations, 15);
    }

    #[test]
    #[serial]
    fn test_load_reads_file_and_applies_cli_overrides() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        std::fs::write(&path, "agent:\n  max_iterations: 7\n").unwrap();

        let config = Config::load(
            path.to_str().unwrap(),
            &cli(&["--model", "mistral.mixtral-8x7b-instruct-v0:1", "--skip-access-check"]),
        )
        .unwrap();

        assert_eq!(config.agent.max_iterations, 7);
        assert_eq!(config.provider.model_id, "mistral.mixtral-8x7b-instruct-v0:1");
        assert!(!config.provider.check_model_access);
    }

    #[test]
    #[serial]
    fn test_load_invalid_yaml_is_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        std::fs::write(&path, "agent: [unclosed").unwrap();

        let err = Config::load(path.to_str().unwrap(), &cli(&[])).unwrap_err();
        assert!(err.to_string().contains("Failed to parse config"));
    }

    #[test]
    #[serial]
    fn test_apply_env_vars_overrides_fields() {
        std::env::set_var("MCP_AGENT_MAX_ITERATIONS", "3");
        std::env::set_var("MCP_AGENT_PYTHON", "python3.12");
        std::env::set_var("MCP_AGENT_REGION", "us-west-2");

        let mut config = Config::default();
        config.apply_env_vars();

        std::env::remove_var("MCP_AGENT_MAX_ITERATIONS");
        std::env::remove_var("MCP_AGENT_PYTHON");
        std::env::remove_var("MCP_AGENT_REGION");

        assert_eq!(config.agent.max_iterations, 3);
        assert_eq!(config.mcp.python_command, "python3.12");
        assert_eq!(config.provider.region.as_deref(), Some("us-west-2"));
    }

    #[test]
    #[serial]
    fn test_apply_env_vars_ignores_unparsable_numbers() {
        std::env::set_var("MCP_AGENT_TIMEOUT_SECONDS", "soon");

        let mut config = Config::default();
        config.apply_env_vars();

        std::env::remove_var("MCP_AGENT_TIMEOUT_SECONDS");

        assert_eq!(config.agent.timeout_seconds, 300);
    }
}
