//! Stdio transport for MCP child-process servers
//!
//! [`StdioTransport::spawn`] launches the server described by a
//! [`ServerEndpoint`] and talks newline-delimited JSON over its pipes:
//!
//! - outbound messages are written to the child's stdin followed by `\n`;
//! - inbound messages are read from the child's stdout, one per line;
//! - stderr lines are logged at `debug` and never treated as errors.
//!
//! The child process and the channel are both registered with the caller's
//! [`ResourceStack`]. The child is registered straight after `spawn`, so a
//! failure while wiring the pipes still terminates it.

use std::collections::HashMap;
use std::pin::Pin;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::Stream;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::{mpsc, Mutex};

use crate::error::{McpAgentError, Result};
use crate::mcp::endpoint::ServerEndpoint;
use crate::mcp::transport::Transport;
use crate::resources::{ManagedResource, ResourceStack};

/// Stdio-based MCP transport that drives a child process.
#[derive(Debug)]
pub struct StdioTransport {
    /// Sender side of the stdin channel; `None` once closed.
    stdin_tx: std::sync::Mutex<Option<mpsc::UnboundedSender<String>>>,
    /// Shared receiver for stdout lines (one JSON message per line).
    stdout_rx: Arc<Mutex<mpsc::UnboundedReceiver<String>>>,
    /// Process id, for logging.
    pid: Option<u32>,
}

impl StdioTransport {
    /// Spawn the server process and wire up its stdio pipes.
    ///
    /// The child's environment is cleared and replaced with
    /// [`ServerEndpoint::environment`]. Acquired resources are pushed onto
    /// `resources` in the order child process, then channel.
    ///
    /// # Errors
    ///
    /// Returns [`McpAgentError::Transport`] if the process cannot be spawned
    /// or if a stdio pipe is unavailable.
    pub fn spawn(
        endpoint: &ServerEndpoint,
        shutdown_grace: Duration,
        resources: &mut ResourceStack,
    ) -> Result<Arc<Self>> {
        Self::spawn_command(
            &endpoint.command,
            &endpoint.args(),
            &endpoint.environment(),
            shutdown_grace,
            resources,
        )
    }

    fn spawn_command(
        executable: &str,
        args: &[String],
        env: &HashMap<String, String>,
        shutdown_grace: Duration,
        resources: &mut ResourceStack,
    ) -> Result<Arc<Self>> {
        let mut cmd = Command::new(executable);
        cmd.args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .env_clear()
            .envs(env)
            .kill_on_drop(true);

        let mut child = cmd.spawn().map_err(|e| {
            McpAgentError::Transport(format!(
                "failed to spawn MCP server `{}`: {}",
                executable, e
            ))
        })?;

        let pid = child.id();
        let stdin = child.stdin.take();
        let stdout = child.stdout.take();
        let stderr = child.stderr.take();
        resources.push(ChildProcess {
            label: format!("server process {}", executable),
            child,
            grace: shutdown_grace,
        });

        let stdin = stdin.ok_or_else(|| {
            McpAgentError::Transport("child stdin unavailable after spawn".into())
        })?;
        let stdout = stdout.ok_or_else(|| {
            McpAgentError::Transport("child stdout unavailable after spawn".into())
        })?;
        let stderr = stderr.ok_or_else(|| {
            McpAgentError::Transport("child stderr unavailable after spawn".into())
        })?;

        let (stdin_tx, mut stdin_rx) = mpsc::unbounded_channel::<String>();
        let (stdout_tx, stdout_rx) = mpsc::unbounded_channel::<String>();

        // Dropping the sender ends this task, which drops stdin and gives the
        // child EOF.
        tokio::spawn(async move {
            let mut stdin = stdin;
            while let Some(msg) = stdin_rx.recv().await {
                let line = format!("{}\n", msg);
                if stdin.write_all(line.as_bytes()).await.is_err() {
                    break;
                }
                if stdin.flush().await.is_err() {
                    break;
                }
            }
        });

        tokio::spawn(async move {
            let mut lines = BufReader::new(stdout).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                if stdout_tx.send(line.to_string()).is_err() {
                    break;
                }
            }
            tracing::debug!(pid = ?pid, "MCP server stdout closed");
        });

        tokio::spawn(async move {
            let mut lines = BufReader::new(stderr).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                tracing::debug!(
                    target: "mcp_agent_client::mcp::transport::stdio",
                    "mcp server stderr: {}",
                    line
                );
            }
        });

        let transport = Arc::new(Self {
            stdin_tx: std::sync::Mutex::new(Some(stdin_tx)),
            stdout_rx: Arc::new(Mutex::new(stdout_rx)),
            pid,
        });

        resources.push(ChannelResource {
            transport: Arc::clone(&transport),
        });

        tracing::info!(pid = ?pid, command = %executable, "Started MCP server");
        Ok(transport)
    }

    /// Process id of the server, when the OS reported one.
    pub fn pid(&self) -> Option<u32> {
        self.pid
    }
}

#[async_trait]
impl Transport for StdioTransport {
    async fn send(&self, message: String) -> Result<()> {
        let sender = self
            .stdin_tx
            .lock()
            .map_err(|_| McpAgentError::SessionClosed("stdin lock poisoned".into()))?
            .clone();

        match sender {
            Some(tx) => tx.send(message).map_err(|_| {
                McpAgentError::SessionClosed("server stdin is closed".into()).into()
            }),
            None => Err(McpAgentError::SessionClosed("transport closed".into()).into()),
        }
    }

    fn receive(&self) -> Pin<Box<dyn Stream<Item = String> + Send + '_>> {
        let rx = Arc::clone(&self.stdout_rx);
        Box::pin(futures::stream::unfold(rx, |rx| async move {
            let mut guard = rx.lock().await;
            let item = guard.recv().await?;
            drop(guard);
            Some((item, rx))
        }))
    }

    fn close(&self) {
        if let Ok(mut guard) = self.stdin_tx.lock() {
            if guard.take().is_some() {
                tracing::debug!(pid = ?self.pid, "Closed MCP server stdin");
            }
        }
    }
}

/// Closes the duplex channel when released.
struct ChannelResource {
    transport: Arc<StdioTransport>,
}

#[async_trait]
impl ManagedResource for ChannelResource {
    fn label(&self) -> &str {
        "stdio channel"
    }

    async fn release(self: Box<Self>) -> Result<()> {
        self.transport.close();
        Ok(())
    }
}

/// Terminates the server process when released.
///
/// The child first gets `grace` to exit on its own after stdin closes, then
/// SIGTERM (Unix) and another `grace`, then a hard kill.
struct ChildProcess {
    label: String,
    child: Child,
    grace: Duration,
}

#[async_trait]
impl ManagedResource for ChildProcess {
    fn label(&self) -> &str {
        &self.label
    }

    async fn release(self: Box<Self>) -> Result<()> {
        let ChildProcess {
            label,
            mut child,
            grace,
        } = *self;

        if let Ok(status) = tokio::time::timeout(grace, child.wait()).await {
            tracing::debug!(process = %label, status = ?status, "MCP server exited");
            return Ok(());
        }

        #[cfg(unix)]
        {
            if let Some(pid) = child.id() {
                // SAFETY: pid is a live child obtained from tokio::process::Child.
                unsafe {
                    libc::kill(pid as libc::pid_t, libc::SIGTERM);
                }
                if let Ok(status) = tokio::time::timeout(grace, child.wait()).await {
                    tracing::debug!(process = %label, status = ?status, "MCP server exited after SIGTERM");
                    return Ok(());
                }
            }
        }

        tracing::warn!(process = %label, "MCP server did not exit; killing");
        child
            .kill()
            .await
            .map_err(|e| McpAgentError::Transport(format!("failed to kill {}: {}", label, e)))?;
        Ok(())
    }
}
