//! In-process fake transport for unit tests
//!
//! [`FakeTransport::new`] returns the transport plus a
//! [`FakeTransportHandle`] the test uses to read what the client sent and to
//! inject what the "server" replies. Dropping the handle's `inbound_tx`
//! ends the client's receive stream, which is how tests simulate a server
//! that went away.
//!
//! ```text
//! client send() -----> outbound_tx -----> outbound_rx (handle reads)
//! handle inbound_tx ------------------->  inbound_rx  (client receive())
//! ```
//!
//! [`FakeTransportHandle::serve`] turns the handle into a scripted server
//! that answers each request through a closure.

use std::pin::Pin;
use std::sync::Arc;

use futures::Stream;
use serde_json::Value;
use tokio::sync::{mpsc, Mutex};

use crate::error::{McpAgentError, Result};
use crate::mcp::transport::Transport;

/// In-process fake transport.
#[derive(Debug)]
pub struct FakeTransport {
    outbound_tx: std::sync::Mutex<Option<mpsc::UnboundedSender<String>>>,
    inbound_rx: Arc<Mutex<mpsc::UnboundedReceiver<String>>>,
}

impl FakeTransport {
    /// Create a new `(FakeTransport, FakeTransportHandle)` pair.
    pub fn new() -> (Self, FakeTransportHandle) {
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel::<String>();
        let (inbound_tx, inbound_rx) = mpsc::unbounded_channel::<String>();

        let transport = Self {
            outbound_tx: std::sync::Mutex::new(Some(outbound_tx)),
            inbound_rx: Arc::new(Mutex::new(inbound_rx)),
        };

        let handle = FakeTransportHandle {
            outbound_rx,
            inbound_tx,
        };

        (transport, handle)
    }
}

/// The test-side handle for a [`FakeTransport`].
#[derive(Debug)]
pub struct FakeTransportHandle {
    /// Receives messages that the client sent via [`Transport::send`].
    pub outbound_rx: mpsc::UnboundedReceiver<String>,
    /// Sends server messages into the client's [`Transport::receive`] stream.
    pub inbound_tx: mpsc::UnboundedSender<String>,
}

impl FakeTransportHandle {
    /// Waits for the next outbound message and parses it.
    pub async fn next_sent(&mut self) -> Option<Value> {
        let raw = self.outbound_rx.recv().await?;
        serde_json::from_str(&raw).ok()
    }

    /// Injects a JSON value as an inbound message.
    pub fn inject(&self, message: Value) {
        let _ = self.inbound_tx.send(message.to_string());
    }

    /// Injects a successful response for request `id`.
    pub fn respond(&self, id: &Value, result: Value) {
        self.inject(serde_json::json!({ "jsonrpc": "2.0", "id": id, "result": result }));
    }

    /// Spawns a task acting as the server.
    ///
    /// `handler` is called with every outbound request that carries an `id`
    /// (method, params) and returns `Ok(result)` or `Err((code, message))`;
    /// notifications are passed with no reply expected. Returning `None`
    /// leaves the request unanswered. The task ends when the client closes
    /// its outbound side; the inbound side is closed at the same moment.
    pub fn serve<F>(self, mut handler: F) -> tokio::task::JoinHandle<()>
    where
        F: FnMut(&str, &Value) -> Option<std::result::Result<Value, (i64, String)>>
            + Send
            + 'static,
    {
        let FakeTransportHandle {
            mut outbound_rx,
            inbound_tx,
        } = self;

        tokio::spawn(async move {
            while let Some(raw) = outbound_rx.recv().await {
                let Ok(msg) = serde_json::from_str::<Value>(&raw) else {
                    continue;
                };
                let Some(method) = msg.get("method").and_then(Value::as_str) else {
                    continue;
                };
                let params = msg.get("params").cloned().unwrap_or(Value::Null);
                let reply = handler(method, &params);

                let Some(id) = msg.get("id").filter(|id| !id.is_null()) else {
                    continue;
                };
                let response = match reply {
                    Some(Ok(result)) => {
                        serde_json::json!({ "jsonrpc": "2.0", "id": id, "result": result })
                    }
                    Some(Err((code, message))) => serde_json::json!({
                        "jsonrpc": "2.0",
                        "id": id,
                        "error": { "code": code, "message": message }
                    }),
                    None => continue,
                };
                if inbound_tx.send(response.to_string()).is_err() {
                    break;
                }
            }
        })
    }
}

/// A minimal valid `initialize` result.
pub fn initialize_result() -> Value {
    serde_json::json!({
        "protocolVersion": crate::mcp::types::LATEST_PROTOCOL_VERSION,
        "capabilities": { "tools": {} },
        "serverInfo": { "name": "fake-server", "version": "0.0.1" }
    })
}

#[async_trait::async_trait]
impl Transport for FakeTransport {
    async fn send(&self, message: String) -> Result<()> {
        let sender = self
            .outbound_tx
            .lock()
            .map_err(|_| McpAgentError::SessionClosed("fake outbound lock poisoned".into()))?
            .clone();
        match sender {
            Some(tx) => tx.send(message).map_err(|_| {
                McpAgentError::SessionClosed("fake outbound channel closed".into()).into()
            }),
            None => Err(McpAgentError::SessionClosed("transport closed".into()).into()),
        }
    }

    fn receive(&self) -> Pin<Box<dyn Stream<Item = String> + Send + '_>> {
        let rx = Arc::clone(&self.inbound_rx);
        Box::pin(futures::stream::unfold(rx, |rx| async move {
            let mut guard = rx.lock().await;
            let item = guard.recv().await?;
            drop(guard);
            Some((item, rx))
        }))
    }

    fn close(&self) {
        if let Ok(mut guard) = self.outbound_tx.lock() {
            guard.take();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;

    #[tokio::test]
    async fn test_send_is_visible_on_handle() {
        let (transport, mut handle) = FakeTransport::new();
        transport
            .send(r#"{"jsonrpc":"2.0","id":1,"method":"ping"}"#.to_string())
            .await
            .unwrap();
        let sent = handle.next_sent().await.unwrap();
        assert_eq!(sent["method"], "ping");
    }

    #[tokio::test]
    async fn test_dropping_inbound_sender_ends_stream() {
        let (transport, handle) = FakeTransport::new();
        handle.respond(&serde_json::json!(1), serde_json::json!({}));
        drop(handle);

        let mut stream = transport.receive();
        assert!(stream.next().await.is_some());
        assert!(stream.next().await.is_none());
    }

    #[tokio::test]
    async fn test_send_after_close_fails() {
        let (transport, _handle) = FakeTransport::new();
        transport.close();
        let err = transport.send("{}".to_string()).await.unwrap_err();
        assert!(crate::error::is_session_closed(&err));
    }
}
