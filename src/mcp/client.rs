//! Async JSON-RPC 2.0 client over a [`Transport`]
//!
//! [`JsonRpcClient`] assigns request ids, tracks in-flight requests in a
//! pending map and resolves them from a background read loop started with
//! [`start_read_loop`]. The read loop also answers server-initiated `ping`
//! requests and rejects every other server request with `-32601`.
//!
//! When the inbound stream ends or the loop is cancelled, the client is
//! marked closed and every pending request fails with
//! [`McpAgentError::SessionClosed`].

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use futures::StreamExt;
use serde_json::Value;
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;

use crate::error::{McpAgentError, Result};
use crate::mcp::transport::Transport;
use crate::mcp::types::{
    JsonRpcError, JsonRpcRequest, JsonRpcResponse, METHOD_NOT_FOUND, METHOD_PING,
};

/// The pending-response map type: maps request ID to the oneshot sender.
type PendingMap = HashMap<u64, oneshot::Sender<std::result::Result<Value, JsonRpcError>>>;

/// Removes a request's pending entry when the awaiting future ends, whether
/// it completes, fails, or is dropped mid-flight.
struct PendingEntry<'a> {
    pending: &'a Mutex<PendingMap>,
    id: u64,
}

impl Drop for PendingEntry<'_> {
    fn drop(&mut self) {
        self.pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.id);
    }
}

/// Transport-backed async JSON-RPC 2.0 client.
pub struct JsonRpcClient {
    next_id: AtomicU64,
    pending: Mutex<PendingMap>,
    transport: Arc<dyn Transport>,
    closed: AtomicBool,
}

impl std::fmt::Debug for JsonRpcClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JsonRpcClient")
            .field("next_id", &self.next_id.load(Ordering::Relaxed))
            .field("closed", &self.closed.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}

impl JsonRpcClient {
    /// Create a client that writes to `transport`.
    ///
    /// Responses are only delivered once [`start_read_loop`] is running.
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self {
            next_id: AtomicU64::new(1),
            pending: Mutex::new(HashMap::new()),
            transport,
            closed: AtomicBool::new(false),
        }
    }

    fn pending_map(&self) -> MutexGuard<'_, PendingMap> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// `true` once the read loop has stopped.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Send a JSON-RPC request and await the typed response.
    ///
    /// # Errors
    ///
    /// - [`McpAgentError::SessionClosed`] if the transport is gone or the
    ///   read loop exits before the response arrives.
    /// - [`McpAgentError::RequestTimeout`] if no response arrives in time.
    /// - [`McpAgentError::Rpc`] if the server answers with an error object.
    /// - [`McpAgentError::Serialization`] if the result has the wrong shape.
    pub async fn request<P, R>(&self, method: &str, params: P, timeout: Duration) -> Result<R>
    where
        P: serde::Serialize + Send,
        R: serde::de::DeserializeOwned,
    {
        if self.is_closed() {
            return Err(McpAgentError::SessionClosed("connection to server lost".into()).into());
        }

        let id = self.next_id.fetch_add(1, Ordering::SeqCst);

        // Register before sending so the response can never beat us.
        let (tx, rx) = oneshot::channel();
        self.pending_map().insert(id, tx);
        let _entry = PendingEntry {
            pending: &self.pending,
            id,
        };
        if self.is_closed() {
            return Err(McpAgentError::SessionClosed("connection to server lost".into()).into());
        }

        let message = serde_json::to_string(&JsonRpcRequest {
            jsonrpc: "2.0".to_string(),
            id: Some(serde_json::json!(id)),
            method: method.to_string(),
            params: Some(serde_json::to_value(params)?),
        })?;

        tracing::debug!(id, method, "-> MCP request");
        self.transport.send(message).await?;

        let outcome = match tokio::time::timeout(timeout, rx).await {
            Ok(outcome) => outcome,
            Err(_) => {
                return Err(McpAgentError::RequestTimeout {
                    method: method.to_string(),
                }
                .into());
            }
        };

        let rpc_result = outcome.map_err(|_| {
            McpAgentError::SessionClosed("server closed the connection".to_string())
        })?;

        let value = rpc_result.map_err(|e| McpAgentError::Rpc {
            code: e.code,
            message: e.message,
        })?;

        serde_json::from_value(value).map_err(|e| McpAgentError::Serialization(e).into())
    }

    /// Send a JSON-RPC notification (no response expected).
    ///
    /// # Errors
    ///
    /// Returns [`McpAgentError::SessionClosed`] if the transport is gone.
    pub async fn notify(&self, method: &str, params: Option<Value>) -> Result<()> {
        let message = serde_json::to_string(&JsonRpcRequest::notification(method, params))?;
        tracing::debug!(method, "-> MCP notification");
        self.transport.send(message).await
    }

    fn mark_closed(&self) {
        self.closed.store(true, Ordering::SeqCst);
        // Dropping the senders wakes every waiter with SessionClosed.
        self.pending_map().clear();
    }

    async fn reply(&self, response: JsonRpcResponse) {
        match serde_json::to_string(&response) {
            Ok(raw) => {
                if let Err(e) = self.transport.send(raw).await {
                    tracing::debug!("Could not answer server request: {:#}", e);
                }
            }
            Err(e) => tracing::warn!("Failed to serialize reply: {}", e),
        }
    }
}

/// Start the JSON-RPC read loop as a background Tokio task.
///
/// Runs until `cancellation` fires or the transport's inbound stream ends,
/// then marks `client` closed.
pub fn start_read_loop(
    client: Arc<JsonRpcClient>,
    cancellation: CancellationToken,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let transport = Arc::clone(&client.transport);
        let mut inbound = transport.receive();
        loop {
            tokio::select! {
                biased;

                _ = cancellation.cancelled() => break,

                maybe_msg = inbound.next() => match maybe_msg {
                    Some(raw) => dispatch_message(&raw, &client).await,
                    None => {
                        tracing::debug!("MCP read loop: inbound stream ended");
                        break;
                    }
                },
            }
        }
        client.mark_closed();
    })
}

/// Classify and dispatch a single inbound JSON string.
async fn dispatch_message(raw: &str, client: &JsonRpcClient) {
    let value: Value = match serde_json::from_str(raw) {
        Ok(v) => v,
        Err(e) => {
            tracing::warn!("MCP read loop: failed to parse inbound JSON: {e}");
            return;
        }
    };

    let has_id = value.get("id").is_some_and(|id| !id.is_null());
    let has_method = value.get("method").is_some();
    let has_result = value.get("result").is_some();
    let has_error = value.get("error").is_some();

    if has_id && (has_result || has_error) && !has_method {
        handle_response(value, client).await;
    } else if has_id && has_method {
        handle_server_request(value, client).await;
    } else if has_method {
        tracing::debug!(
            method = value["method"].as_str().unwrap_or_default(),
            "MCP server notification"
        );
    } else {
        tracing::debug!(
            "MCP read loop: received unclassifiable message; ignoring. \
             has_id={has_id} has_method={has_method} has_result={has_result} has_error={has_error}"
        );
    }
}

async fn handle_response(value: Value, client: &JsonRpcClient) {
    let id_val = &value["id"];
    let id = match id_val
        .as_u64()
        .or_else(|| id_val.as_str().and_then(|s| s.parse().ok()))
    {
        Some(id) => id,
        None => {
            tracing::warn!("MCP read loop: response has non-integer id: {id_val}");
            return;
        }
    };

    let tx = client.pending_map().remove(&id);
    let Some(tx) = tx else {
        tracing::debug!("MCP read loop: received response for unknown id {id}; ignoring");
        return;
    };

    let outcome = match value.get("error") {
        Some(error_val) => Err(serde_json::from_value::<JsonRpcError>(error_val.clone())
            .unwrap_or_else(|_| JsonRpcError {
                code: -32603,
                message: format!("malformed error object: {error_val}"),
                data: None,
            })),
        None => Ok(value.get("result").cloned().unwrap_or(Value::Null)),
    };

    tracing::debug!(id, ok = outcome.is_ok(), "<- MCP response");
    // The caller may have timed out already.
    let _ = tx.send(outcome);
}

async fn handle_server_request(value: Value, client: &JsonRpcClient) {
    let id = value["id"].clone();
    let method = value["method"].as_str().unwrap_or_default().to_string();

    let response = if method == METHOD_PING {
        JsonRpcResponse::success(id, serde_json::json!({}))
    } else {
        tracing::debug!(method = %method, "Rejecting unsupported server request");
        JsonRpcResponse::failure(
            id,
            JsonRpcError {
                code: METHOD_NOT_FOUND,
                message: format!("Method not found: {method}"),
                data: None,
            },
        )
    };

    client.reply(response).await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mcp::transport::fake::FakeTransport;

    const T: Duration = Duration::from_secs(5);

    fn setup() -> (
        Arc<JsonRpcClient>,
        crate::mcp::transport::fake::FakeTransportHandle,
        CancellationToken,
    ) {
        let (transport, handle) = FakeTransport::new();
        let client = Arc::new(JsonRpcClient::new(Arc::new(transport)));
        let token = CancellationToken::new();
        start_read_loop(Arc::clone(&client), token.clone());
        (client, handle, token)
    }

    #[tokio::test]
    async fn test_request_resolves_matching_response() {
        let (client, mut handle, _token) = setup();

        let call = {
            let client = Arc::clone(&client);
            tokio::spawn(async move {
                client
                    .request::<_, Value>("tools/list", serde_json::json!({}), T)
                    .await
            })
        };

        let sent = handle.next_sent().await.unwrap();
        assert_eq!(sent["method"], "tools/list");
        handle.respond(&sent["id"], serde_json::json!({ "tools": [] }));

        let result = call.await.unwrap().unwrap();
        assert_eq!(result, serde_json::json!({ "tools": [] }));
    }

    #[tokio::test]
    async fn test_error_response_becomes_rpc_error() {
        let (client, mut handle, _token) = setup();

        let call = {
            let client = Arc::clone(&client);
            tokio::spawn(async move {
                client
                    .request::<_, Value>("tools/call", serde_json::json!({}), T)
                    .await
            })
        };

        let sent = handle.next_sent().await.unwrap();
        handle.inject(serde_json::json!({
            "jsonrpc": "2.0",
            "id": sent["id"],
            "error": { "code": -32602, "message": "bad params" }
        }));

        let err = call.await.unwrap().unwrap_err();
        match err.downcast_ref::<McpAgentError>() {
            Some(McpAgentError::Rpc { code, message }) => {
                assert_eq!(*code, -32602);
                assert_eq!(message, "bad params");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_request_times_out() {
        let (client, _handle, _token) = setup();
        let err = client
            .request::<_, Value>("ping", serde_json::json!({}), Duration::from_millis(50))
            .await
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<McpAgentError>(),
            Some(McpAgentError::RequestTimeout { .. })
        ));
        assert!(client.pending_map().is_empty());
    }

    #[tokio::test]
    async fn test_dropped_request_releases_pending_entry() {
        let (client, mut handle, _token) = setup();

        let call = {
            let client = Arc::clone(&client);
            tokio::spawn(async move {
                client
                    .request::<_, Value>("tools/call", serde_json::json!({}), T)
                    .await
            })
        };

        let _ = handle.next_sent().await.unwrap();
        assert_eq!(client.pending_map().len(), 1);

        call.abort();
        assert!(call.await.unwrap_err().is_cancelled());
        assert!(client.pending_map().is_empty());
        assert!(!client.is_closed());
    }

    #[tokio::test]
    async fn test_stream_end_fails_pending_with_session_closed() {
        let (client, mut handle, _token) = setup();

        let call = {
            let client = Arc::clone(&client);
            tokio::spawn(async move {
                client
                    .request::<_, Value>("tools/list", serde_json::json!({}), T)
                    .await
            })
        };

        let _ = handle.next_sent().await.unwrap();
        drop(handle);

        let err = call.await.unwrap().unwrap_err();
        assert!(crate::error::is_session_closed(&err), "{err}");
        assert!(client.is_closed());

        let again = client
            .request::<_, Value>("ping", serde_json::json!({}), T)
            .await
            .unwrap_err();
        assert!(crate::error::is_session_closed(&again));
    }

    #[tokio::test]
    async fn test_server_ping_is_answered() {
        let (_client, mut handle, _token) = setup();
        handle.inject(serde_json::json!({ "jsonrpc": "2.0", "id": 99, "method": "ping" }));

        let reply = tokio::time::timeout(T, handle.next_sent())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(reply["id"], 99);
        assert_eq!(reply["result"], serde_json::json!({}));
    }

    #[tokio::test]
    async fn test_unknown_server_request_gets_method_not_found() {
        let (_client, mut handle, _token) = setup();
        handle.inject(serde_json::json!({
            "jsonrpc": "2.0",
            "id": "s-1",
            "method": "sampling/createMessage",
            "params": {}
        }));

        let reply = tokio::time::timeout(T, handle.next_sent())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(reply["id"], "s-1");
        assert_eq!(reply["error"]["code"], METHOD_NOT_FOUND);
    }

    #[tokio::test]
    async fn test_cancellation_closes_client() {
        let (transport, _handle) = FakeTransport::new();
        let client = Arc::new(JsonRpcClient::new(Arc::new(transport)));
        let token = CancellationToken::new();
        let loop_handle = start_read_loop(Arc::clone(&client), token.clone());

        token.cancel();
        loop_handle.await.unwrap();
        assert!(client.is_closed());
    }

    #[tokio::test]
    async fn test_notify_has_no_id() {
        let (client, mut handle, _token) = setup();
        client
            .notify("notifications/initialized", None)
            .await
            .unwrap();
        let sent = handle.next_sent().await.unwrap();
        assert_eq!(sent["method"], "notifications/initialized");
        assert!(sent.get("id").is_none());
    }
}
