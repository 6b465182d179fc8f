//! Client controller
//!
//! Owns the server connection and everything acquired for it, runs the
//! query loop and tears the connection down exactly once.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::agent::AgentExecutor;
use crate::config::Config;
use crate::console::{Console, InputSource, QUERY_PROMPT};
use crate::error::{McpAgentError, Result};
use crate::mcp::transport::stdio::StdioTransport;
use crate::mcp::{McpSession, ServerEndpoint, SessionTimeouts};
use crate::models::{validate_models_access, ModelInvoker};
use crate::providers::Provider;
use crate::resources::{ReleaseReport, ResourceStack};
use crate::tools::ToolRegistry;

/// An interactive MCP client session.
pub struct McpClient {
    config: Config,
    provider: Arc<dyn Provider>,
    session: Option<Arc<McpSession>>,
    resources: ResourceStack,
    console: Console,
}

impl std::fmt::Debug for McpClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("McpClient")
            .field("model", &self.provider.model_id())
            .field("connected", &self.session.is_some())
            .field("resources", &self.resources)
            .finish()
    }
}

impl McpClient {
    /// Creates a client that is not yet connected.
    pub fn new(config: Config, provider: Arc<dyn Provider>, console: Console) -> Self {
        Self {
            config,
            provider,
            session: None,
            resources: ResourceStack::new(),
            console,
        }
    }

    /// Launches the server script, performs the handshake and lists the
    /// server's tools.
    ///
    /// Whatever was acquired before a failure stays on the resource stack
    /// and is released by [`McpClient::shutdown`].
    ///
    /// # Errors
    ///
    /// - [`McpAgentError::UnsupportedScriptKind`] before anything is spawned
    /// - [`McpAgentError::Transport`] if the interpreter cannot be started
    /// - [`McpAgentError::Handshake`] if initialization fails
    pub async fn connect(&mut self, script: &Path) -> Result<Vec<String>> {
        if self.session.is_some() {
            return Err(McpAgentError::Config("client is already connected".to_string()).into());
        }

        let endpoint = ServerEndpoint::resolve(script, &self.config.mcp)?;
        info!(command = %endpoint.display_command(), "Starting MCP server");

        let transport = StdioTransport::spawn(
            &endpoint,
            Duration::from_secs(self.config.mcp.shutdown_grace_seconds),
            &mut self.resources,
        )?;
        let session = McpSession::start(transport, SessionTimeouts::from(&self.config.mcp));
        self.resources.push(session.resource());
        self.session = Some(Arc::clone(&session));

        session.initialize().await?;

        let names: Vec<String> = session
            .list_tools()
            .await?
            .into_iter()
            .map(|tool| tool.name)
            .collect();
        self.console.connected(&names);
        Ok(names)
    }

    /// Answers one query with a fresh tool snapshot.
    ///
    /// # Errors
    ///
    /// Returns [`McpAgentError::SessionNotInitialized`] before `connect`,
    /// otherwise any session, provider or agent failure.
    pub async fn process_query(&self, query: &str) -> Result<String> {
        let session = self
            .session
            .as_ref()
            .ok_or(McpAgentError::SessionNotInitialized)?;

        let tools = ToolRegistry::from_session(session).await?;
        debug!(tools = tools.len(), "Tool registry rebuilt");

        let agent = AgentExecutor::new(Arc::clone(&self.provider), self.config.agent.clone())?;
        let response = agent.run(&tools, query).await?;
        Ok(response.output)
    }

    /// Reads queries until `quit`, end of input or interrupt.
    ///
    /// Errors from a single query are printed and the loop continues.
    ///
    /// # Errors
    ///
    /// Returns an error only if reading input fails.
    pub async fn run(&mut self, input: &mut dyn InputSource) -> Result<()> {
        self.console.banner();

        while let Some(line) = input.read_line(QUERY_PROMPT)? {
            let query = line.trim();
            if query.is_empty() {
                continue;
            }
            if query.eq_ignore_ascii_case("quit") {
                debug!("Quit requested");
                break;
            }

            match self.process_query(query).await {
                Ok(answer) => self.console.answer(&answer),
                Err(err) => {
                    warn!("Query failed: {:#}", err);
                    self.console.error(&err);
                }
            }
        }
        Ok(())
    }

    /// Releases the session, channel and server process, newest first.
    ///
    /// Calling it again does nothing.
    pub async fn shutdown(&mut self) -> ReleaseReport {
        self.session = None;
        let report = self.resources.release_all().await;
        for (label, error) in &report.failures {
            warn!(resource = %label, "Release failed: {}", error);
        }
        if !report.is_empty() {
            info!(released = ?report.released, "Client shut down");
        }
        report
    }

    /// Labels of the resources currently held, oldest first.
    pub fn held_resources(&self) -> Vec<String> {
        self.resources.labels()
    }
}

/// Connects, runs the query loop, and always shuts down afterwards.
///
/// # Errors
///
/// Returns the connect or input error, after teardown.
pub async fn run_client(
    config: Config,
    provider: Arc<dyn Provider>,
    script: &Path,
    input: &mut dyn InputSource,
    console: Console,
) -> Result<()> {
    let mut client = McpClient::new(config, provider, console);

    let outcome = async {
        client.connect(script).await?;
        client.run(input).await
    }
    .await;

    client.shutdown().await;
    outcome
}

/// Probes `model_ids` and warns about the ones that cannot be used.
///
/// Never fails; probe errors are logged.
pub async fn warn_on_inaccessible_models(invoker: &dyn ModelInvoker, model_ids: &[String]) {
    match validate_models_access(invoker, model_ids).await {
        Ok(denied) if denied.is_empty() => debug!("All configured models are accessible"),
        Ok(denied) => warn!(
            "The following models are not accessible with the current credentials: {}",
            denied.join(", ")
        ),
        Err(err) => warn!("Model access check failed: {:#}", err),
    }
}
