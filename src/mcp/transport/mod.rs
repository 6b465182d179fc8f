//! MCP transport abstraction and implementations
//!
//! - [`stdio::StdioTransport`] spawns the server as a child process and
//!   talks newline-delimited JSON over its stdin/stdout pipes.
//! - [`fake::FakeTransport`] is an in-process fake used in tests.
//!
//! Callers `send` a serialized JSON-RPC string and `receive` a stream of
//! serialized JSON-RPC strings, one per logical message. Framing belongs to
//! the concrete implementation.

use std::pin::Pin;

use futures::Stream;

use crate::error::Result;

/// Abstraction over MCP transport implementations.
#[async_trait::async_trait]
pub trait Transport: Send + Sync + std::fmt::Debug {
    /// Send a complete JSON-RPC message string to the remote peer.
    ///
    /// # Errors
    ///
    /// Returns [`crate::error::McpAgentError::SessionClosed`] once the
    /// outbound side has been closed or the peer has gone away.
    async fn send(&self, message: String) -> Result<()>;

    /// Returns a stream of inbound JSON-RPC message strings.
    ///
    /// The stream ends when the peer disconnects. Only one consumer should
    /// poll it at a time.
    fn receive(&self) -> Pin<Box<dyn Stream<Item = String> + Send + '_>>;

    /// Closes the outbound direction. Idempotent.
    fn close(&self);
}

pub mod stdio;

#[cfg(test)]
pub mod fake;
