//! Tool executor that forwards calls to an MCP session

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::Result;
use crate::mcp::types::{CallToolResponse, ToolResponseContent};
use crate::mcp::{McpSession, ToolDescriptor};
use crate::tools::{ToolExecutor, ToolResult};

/// Binds one server tool to the session that exposes it.
pub struct McpToolExecutor {
    session: Arc<McpSession>,
    descriptor: Arc<ToolDescriptor>,
}

impl McpToolExecutor {
    /// Binds `descriptor` to `session`.
    pub fn new(session: Arc<McpSession>, descriptor: ToolDescriptor) -> Self {
        Self {
            session,
            descriptor: Arc::new(descriptor),
        }
    }
}

#[async_trait]
impl ToolExecutor for McpToolExecutor {
    fn descriptor(&self) -> &ToolDescriptor {
        &self.descriptor
    }

    async fn execute(&self, args: Value) -> Result<ToolResult> {
        tracing::debug!(tool = %self.descriptor.name, "Invoking MCP tool");
        let response = self
            .session
            .invoke_tool(&self.descriptor.name, args)
            .await?;
        Ok(ToolResult::success(render_response(&response)))
    }
}

/// Renders a tool response as observation text.
///
/// Text items are emitted verbatim, other items as their JSON, one item per
/// line. Structured content is used only when there is no content.
pub fn render_response(response: &CallToolResponse) -> String {
    if response.content.is_empty() {
        return response
            .structured_content
            .as_ref()
            .map(Value::to_string)
            .unwrap_or_default();
    }

    response
        .content
        .iter()
        .map(|item| match item {
            ToolResponseContent::Text { text } => text.clone(),
            ToolResponseContent::Other(raw) => raw.to_string(),
        })
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::McpAgentError;
    use crate::mcp::transport::fake::{initialize_result, FakeTransport};
    use crate::mcp::SessionTimeouts;
    use crate::tools::ToolRegistry;
    use std::time::Duration;

    async fn echo_session() -> Arc<McpSession> {
        let (transport, handle) = FakeTransport::new();
        handle.serve(|method, params| match method {
            "initialize" => Some(Ok(initialize_result())),
            "tools/list" => Some(Ok(serde_json::json!({
                "tools": [
                    {
                        "name": "echo",
                        "description": "returns input",
                        "inputSchema": {
                            "type": "object",
                            "properties": { "text": { "type": "string" } }
                        }
                    },
                    { "name": "explode", "description": "always fails" }
                ]
            }))),
            "tools/call" if params["name"] == "echo" => Some(Ok(serde_json::json!({
                "content": [{ "type": "text", "text": params["arguments"]["text"] }]
            }))),
            "tools/call" => Some(Ok(serde_json::json!({
                "content": [{ "type": "text", "text": "kaboom" }],
                "isError": true
            }))),
            _ => None,
        });

        let session = McpSession::start(
            Arc::new(transport),
            SessionTimeouts {
                handshake: Duration::from_secs(5),
                request: Duration::from_secs(5),
            },
        );
        session.initialize().await.unwrap();
        session
    }

    #[tokio::test]
    async fn test_registry_from_session_binds_every_tool() {
        let session = echo_session().await;
        let registry = ToolRegistry::from_session(&session).await.unwrap();

        assert_eq!(registry.names(), vec!["echo", "explode"]);
        assert_eq!(
            registry.summary(),
            "echo: returns input\nexplode: always fails"
        );
    }

    #[tokio::test]
    async fn test_echo_round_trip_is_unmodified() {
        let session = echo_session().await;
        let registry = ToolRegistry::from_session(&session).await.unwrap();
        let echo = registry.get("echo").unwrap();

        for input in ["hello", "  spaced  ", "multi\nline", "ünïcødé {json: true}"] {
            let result = echo
                .execute(serde_json::json!({ "text": input }))
                .await
                .unwrap();
            assert_eq!(result.output, input);
        }
    }

    #[tokio::test]
    async fn test_tool_failure_surfaces_as_tool_invocation_error() {
        let session = echo_session().await;
        let registry = ToolRegistry::from_session(&session).await.unwrap();

        let err = registry
            .get("explode")
            .unwrap()
            .execute(serde_json::json!({}))
            .await
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<McpAgentError>(),
            Some(McpAgentError::ToolInvocation { .. })
        ));
    }

    #[test]
    fn test_render_response_mixes_text_and_json() {
        let response: CallToolResponse = serde_json::from_value(serde_json::json!({
            "content": [
                { "type": "text", "text": "forecast:" },
                { "type": "image", "data": "AAAA", "mimeType": "image/png" }
            ]
        }))
        .unwrap();

        let rendered = render_response(&response);
        let mut lines = rendered.lines();
        assert_eq!(lines.next(), Some("forecast:"));
        let image: Value = serde_json::from_str(lines.next().unwrap()).unwrap();
        assert_eq!(image["type"], "image");
        assert_eq!(image["mimeType"], "image/png");
        assert_eq!(image["data"], "AAAA");
    }

    #[test]
    fn test_render_response_keeps_resource_link_payload() {
        let response: CallToolResponse = serde_json::from_value(serde_json::json!({
            "content": [{
                "type": "resource_link",
                "uri": "file:///tmp/report.csv",
                "name": "report",
                "mimeType": "text/csv"
            }]
        }))
        .unwrap();

        let rendered = render_response(&response);
        assert!(rendered.contains("file:///tmp/report.csv"), "{rendered}");
        let link: Value = serde_json::from_str(&rendered).unwrap();
        assert_eq!(link["type"], "resource_link");
        assert_eq!(link["name"], "report");
        assert_eq!(link["mimeType"], "text/csv");
    }

    #[test]
    fn test_render_response_falls_back_to_structured_content() {
        let response: CallToolResponse = serde_json::from_value(serde_json::json!({
            "content": [],
            "structuredContent": { "temperature": 21 }
        }))
        .unwrap();
        assert_eq!(render_response(&response), r#"{"temperature":21}"#);
    }
}
