//! Error types for mcp-agent-client
//!
//! All failure kinds surfaced by the client are variants of
//! [`McpAgentError`]. Functions return [`Result`] (an `anyhow` alias) and
//! callers that need to branch on the kind use `downcast_ref`.

use thiserror::Error;

/// Main error type for mcp-agent-client operations
#[derive(Error, Debug)]
pub enum McpAgentError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Server script suffix is neither `.py` nor `.js`
    #[error("Server script must be a .py or .js file: {0}")]
    UnsupportedScriptKind(String),

    /// Failure to spawn or talk to the server process
    #[error("Transport error: {0}")]
    Transport(String),

    /// The initialize exchange did not complete successfully
    #[error("Handshake failed: {0}")]
    Handshake(String),

    /// An operation was attempted before `initialize()` succeeded
    #[error("Session is not initialized")]
    SessionNotInitialized,

    /// The duplex channel to the server is gone; the session is terminal
    #[error("Session closed: {0}")]
    SessionClosed(String),

    /// No response arrived for a request within its deadline
    #[error("Request timed out: {method}")]
    RequestTimeout {
        /// JSON-RPC method that timed out
        method: String,
    },

    /// The server answered a request with a JSON-RPC error object
    #[error("JSON-RPC error {code}: {message}")]
    Rpc {
        /// JSON-RPC error code
        code: i64,
        /// Error message sent by the server
        message: String,
    },

    /// A tool call was answered with an error or with `isError: true`
    #[error("Tool '{tool}' failed: {detail}")]
    ToolInvocation {
        /// Name of the tool that was called
        tool: String,
        /// Server-provided failure detail
        detail: String,
    },

    /// The model selected a tool the server does not expose
    #[error("Unknown tool: {0}")]
    UnknownTool(String),

    /// Model output was neither a tool selection nor a final answer
    #[error("Could not parse model output: {0}")]
    AgentParse(String),

    /// Agent exceeded maximum iteration limit
    #[error("Agent exceeded maximum iterations: limit={limit}, {message}")]
    MaxIterationsExceeded {
        /// The configured iteration limit
        limit: usize,
        /// Additional context about the failure
        message: String,
    },

    /// Agent run exceeded its wall-clock budget
    #[error("Agent timed out after {0} seconds")]
    AgentTimeout(u64),

    /// An inference parameter is not accepted by the model family
    #[error("'{key}' is not a valid inference parameter for model: {model_id}")]
    InvalidParameter {
        /// Offending parameter name
        key: String,
        /// Model identifier it was checked against
        model_id: String,
    },

    /// The model identifier matches no known model family
    #[error("Unsupported model: {0}")]
    UnsupportedModel(String),

    /// Provider-related errors (API calls, authentication, etc.)
    #[error("Provider error: {0}")]
    Provider(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// YAML parsing errors
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

/// Result type alias for mcp-agent-client operations
pub type Result<T> = anyhow::Result<T>;

/// Returns the [`McpAgentError`] carried by `err`, if any.
pub fn kind_of(err: &anyhow::Error) -> Option<&McpAgentError> {
    err.downcast_ref::<McpAgentError>()
}

/// Returns `true` when `err` means the server channel is unusable.
pub fn is_session_closed(err: &anyhow::Error) -> bool {
    matches!(kind_of(err), Some(McpAgentError::SessionClosed(_)))
}
