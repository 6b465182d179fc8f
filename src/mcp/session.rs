//! MCP client session
//!
//! [`McpSession`] owns the JSON-RPC client for one server connection and
//! enforces the session lifecycle:
//!
//! ```text
//! Uninitialized --initialize()--> Initialized --channel lost / close()--> Closed
//! ```
//!
//! Every round trip holds the session's call lock, so at most one request is
//! outstanding and a second caller waits until the first response arrives.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use crate::config::McpConfig;
use crate::error::{kind_of, McpAgentError, Result};
use crate::mcp::client::{start_read_loop, JsonRpcClient};
use crate::mcp::transport::Transport;
use crate::mcp::types::{
    CallToolParams, CallToolResponse, ClientCapabilities, Implementation, InitializeParams,
    InitializeResponse, ListToolsParams, ListToolsResponse, ToolDescriptor,
    LATEST_PROTOCOL_VERSION, METHOD_INITIALIZE, METHOD_INITIALIZED, METHOD_TOOLS_CALL,
    METHOD_TOOLS_LIST, SUPPORTED_PROTOCOL_VERSIONS,
};
use crate::resources::ManagedResource;

/// Request deadlines applied by a session.
#[derive(Debug, Clone, Copy)]
pub struct SessionTimeouts {
    /// Deadline for the `initialize` exchange
    pub handshake: Duration,
    /// Deadline for every other request
    pub request: Duration,
}

impl From<&McpConfig> for SessionTimeouts {
    fn from(config: &McpConfig) -> Self {
        Self {
            handshake: Duration::from_secs(config.handshake_timeout_seconds),
            request: Duration::from_secs(config.request_timeout_seconds),
        }
    }
}

#[derive(Debug, Clone)]
enum SessionState {
    Uninitialized,
    Initializing,
    Initialized(Box<InitializeResponse>),
    Closed,
}

/// A protocol session with one MCP server.
#[derive(Debug)]
pub struct McpSession {
    client: Arc<JsonRpcClient>,
    state: std::sync::Mutex<SessionState>,
    call_lock: tokio::sync::Mutex<()>,
    cancel: CancellationToken,
    reader: std::sync::Mutex<Option<tokio::task::JoinHandle<()>>>,
    timeouts: SessionTimeouts,
}

impl McpSession {
    /// Wraps `transport` in a session and starts its read loop.
    ///
    /// The session starts `Uninitialized`; call [`McpSession::initialize`]
    /// before anything else.
    pub fn start(transport: Arc<dyn Transport>, timeouts: SessionTimeouts) -> Arc<Self> {
        let client = Arc::new(JsonRpcClient::new(transport));
        let cancel = CancellationToken::new();
        let reader = start_read_loop(Arc::clone(&client), cancel.clone());

        Arc::new(Self {
            client,
            state: std::sync::Mutex::new(SessionState::Uninitialized),
            call_lock: tokio::sync::Mutex::new(()),
            cancel,
            reader: std::sync::Mutex::new(Some(reader)),
            timeouts,
        })
    }

    /// Performs the capability handshake.
    ///
    /// Sends `initialize`, checks the negotiated protocol version and then
    /// sends `notifications/initialized`. May be called once; a failed
    /// handshake leaves the session closed.
    ///
    /// # Errors
    ///
    /// Returns [`McpAgentError::Handshake`] on timeout, malformed reply,
    /// error reply, unsupported version, lost channel or a repeated call.
    pub async fn initialize(&self) -> Result<InitializeResponse> {
        self.transition_to_initializing()?;

        let _turn = self.call_lock.lock().await;
        match self.handshake().await {
            Ok(response) => {
                tracing::info!(
                    server = %response.server_info.name,
                    version = %response.server_info.version,
                    protocol = %response.protocol_version,
                    "MCP session initialized"
                );
                self.set_state(SessionState::Initialized(Box::new(response.clone())));
                Ok(response)
            }
            Err(e) => {
                self.set_state(SessionState::Closed);
                Err(e)
            }
        }
    }

    async fn handshake(&self) -> Result<InitializeResponse> {
        let params = InitializeParams {
            protocol_version: LATEST_PROTOCOL_VERSION.to_string(),
            capabilities: ClientCapabilities::default(),
            client_info: Implementation::this_client(),
        };

        let response: InitializeResponse = self
            .client
            .request(METHOD_INITIALIZE, params, self.timeouts.handshake)
            .await
            .map_err(|e| McpAgentError::Handshake(self.describe_handshake_failure(&e)))?;

        if !SUPPORTED_PROTOCOL_VERSIONS.contains(&response.protocol_version.as_str()) {
            return Err(McpAgentError::Handshake(format!(
                "server selected unsupported protocol version {} (supported: {})",
                response.protocol_version,
                SUPPORTED_PROTOCOL_VERSIONS.join(", ")
            ))
            .into());
        }

        self.client
            .notify(METHOD_INITIALIZED, None)
            .await
            .map_err(|e| McpAgentError::Handshake(format!("{:#}", e)))?;

        Ok(response)
    }

    fn describe_handshake_failure(&self, err: &anyhow::Error) -> String {
        match kind_of(err) {
            Some(McpAgentError::RequestTimeout { .. }) => format!(
                "no reply to initialize within {}s",
                self.timeouts.handshake.as_secs_f32()
            ),
            Some(McpAgentError::Serialization(e)) => format!("malformed initialize reply: {}", e),
            Some(McpAgentError::SessionClosed(_)) => {
                "server exited before completing initialize".to_string()
            }
            _ => format!("{:#}", err),
        }
    }

    /// Fetches the server's tool descriptors, following pagination.
    ///
    /// Always performs a fresh round trip; nothing is cached.
    ///
    /// # Errors
    ///
    /// [`McpAgentError::SessionNotInitialized`] before the handshake,
    /// [`McpAgentError::SessionClosed`] once the channel is gone.
    pub async fn list_tools(&self) -> Result<Vec<ToolDescriptor>> {
        self.ensure_ready()?;
        let _turn = self.call_lock.lock().await;

        let mut tools = Vec::new();
        let mut cursor: Option<String> = None;
        loop {
            let page: ListToolsResponse = self
                .round_trip(
                    METHOD_TOOLS_LIST,
                    ListToolsParams {
                        cursor: cursor.clone(),
                    },
                )
                .await?;
            tools.extend(page.tools);

            match page.next_cursor {
                Some(next) if !next.is_empty() && Some(&next) != cursor.as_ref() => {
                    cursor = Some(next)
                }
                _ => break,
            }
        }

        tracing::debug!(count = tools.len(), "Listed MCP tools");
        Ok(tools)
    }

    /// Calls a tool by name with `arguments` forwarded unchanged.
    ///
    /// # Errors
    ///
    /// - [`McpAgentError::ToolInvocation`] when the server answers with an
    ///   error, flags the result with `isError`, sends a malformed result, or
    ///   does not answer in time.
    /// - [`McpAgentError::SessionClosed`] once the channel is gone.
    /// - [`McpAgentError::SessionNotInitialized`] before the handshake.
    pub async fn invoke_tool(&self, name: &str, arguments: Value) -> Result<CallToolResponse> {
        self.ensure_ready()?;
        let _turn = self.call_lock.lock().await;

        let params = CallToolParams {
            name: name.to_string(),
            arguments: Some(arguments),
        };

        let outcome: Result<CallToolResponse> = self.round_trip(METHOD_TOOLS_CALL, params).await;
        let failure = |detail: String| -> anyhow::Error {
            McpAgentError::ToolInvocation {
                tool: name.to_string(),
                detail,
            }
            .into()
        };

        match outcome {
            Ok(response) if response.is_error() => {
                let text = response.text();
                Err(failure(if text.trim().is_empty() {
                    "tool reported an error".to_string()
                } else {
                    text
                }))
            }
            Ok(response) => Ok(response),
            Err(e) => match kind_of(&e) {
                Some(McpAgentError::Rpc { message, .. }) => Err(failure(message.clone())),
                Some(McpAgentError::RequestTimeout { .. }) => Err(failure(format!(
                    "no response within {}s",
                    self.timeouts.request.as_secs()
                ))),
                Some(McpAgentError::Serialization(err)) => {
                    Err(failure(format!("malformed tool result: {}", err)))
                }
                _ => Err(e),
            },
        }
    }

    /// The server's `initialize` reply, once the handshake has succeeded.
    pub fn server_info(&self) -> Option<InitializeResponse> {
        match self.state() {
            SessionState::Initialized(response) => Some(*response),
            _ => None,
        }
    }

    /// `true` once the session can no longer be used.
    pub fn is_closed(&self) -> bool {
        matches!(self.state(), SessionState::Closed) || self.client.is_closed()
    }

    /// Marks the session closed and stops its read loop. Idempotent.
    pub async fn close(&self) {
        self.set_state(SessionState::Closed);
        self.cancel.cancel();

        let reader = self.reader.lock().ok().and_then(|mut guard| guard.take());
        if let Some(reader) = reader {
            if tokio::time::timeout(Duration::from_secs(5), reader)
                .await
                .is_err()
            {
                tracing::warn!("MCP read loop did not stop in time");
            }
        }
    }

    /// Wraps this session as a [`ManagedResource`] that closes it.
    pub fn resource(self: &Arc<Self>) -> SessionResource {
        SessionResource(Arc::clone(self))
    }

    async fn round_trip<P, R>(&self, method: &str, params: P) -> Result<R>
    where
        P: serde::Serialize + Send,
        R: serde::de::DeserializeOwned,
    {
        let result = self
            .client
            .request(method, params, self.timeouts.request)
            .await;
        if let Err(e) = &result {
            if crate::error::is_session_closed(e) {
                tracing::warn!(method, "MCP session closed: {:#}", e);
                self.set_state(SessionState::Closed);
            }
        }
        result
    }

    fn ensure_ready(&self) -> Result<()> {
        if self.client.is_closed() {
            self.set_state(SessionState::Closed);
        }
        match self.state() {
            SessionState::Initialized(_) => Ok(()),
            SessionState::Closed => {
                Err(McpAgentError::SessionClosed("session is closed".to_string()).into())
            }
            SessionState::Uninitialized | SessionState::Initializing => {
                Err(McpAgentError::SessionNotInitialized.into())
            }
        }
    }

    fn transition_to_initializing(&self) -> Result<()> {
        let mut state = self
            .state
            .lock()
            .map_err(|_| McpAgentError::Handshake("session state poisoned".to_string()))?;
        match *state {
            SessionState::Uninitialized => {
                *state = SessionState::Initializing;
                Ok(())
            }
            SessionState::Closed => {
                Err(McpAgentError::Handshake("session is closed".to_string()).into())
            }
            SessionState::Initializing | SessionState::Initialized(_) => Err(
                McpAgentError::Handshake("initialize may only be called once".to_string()).into(),
            ),
        }
    }

    fn state(&self) -> SessionState {
        self.state
            .lock()
            .map(|s| s.clone())
            .unwrap_or(SessionState::Closed)
    }

    fn set_state(&self, next: SessionState) {
        if let Ok(mut state) = self.state.lock() {
            *state = next;
        }
    }
}

/// [`ManagedResource`] handle that closes an [`McpSession`].
pub struct SessionResource(Arc<McpSession>);

#[async_trait]
impl ManagedResource for SessionResource {
    fn label(&self) -> &str {
        "mcp session"
    }

    async fn release(self: Box<Self>) -> Result<()> {
        self.0.close().await;
        Ok(())
    }
}
