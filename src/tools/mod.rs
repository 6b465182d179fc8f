//! Tool registry for the agent
//!
//! The registry holds one [`ToolExecutor`] per tool exposed by the MCP
//! server, in the order the server listed them. It is rebuilt from the
//! session for every query (see [`ToolRegistry::from_session`]).

pub mod mcp_tool;

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;

use crate::error::Result;
use crate::mcp::{McpSession, ToolDescriptor};

pub use mcp_tool::McpToolExecutor;

/// Rendered outcome of one tool call, as shown to the model.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolResult {
    /// Whether the tool execution succeeded
    pub success: bool,
    /// Output from the tool
    pub output: String,
    /// Error message if execution failed
    pub error: Option<String>,
    /// Whether the output was truncated
    pub truncated: bool,
}

impl ToolResult {
    /// Create a successful tool result
    pub fn success(output: String) -> Self {
        Self {
            success: true,
            output,
            error: None,
            truncated: false,
        }
    }

    /// Create a failed tool result
    pub fn error(error: String) -> Self {
        Self {
            success: false,
            output: String::new(),
            error: Some(error),
            truncated: false,
        }
    }

    /// Cuts the output to at most `max_size` bytes on a char boundary.
    pub fn truncate_if_needed(mut self, max_size: usize) -> Self {
        if self.output.len() > max_size {
            let mut cut = max_size;
            while !self.output.is_char_boundary(cut) {
                cut -= 1;
            }
            self.output.truncate(cut);
            self.output.push_str("\n... (truncated)");
            self.truncated = true;
        }
        self
    }

    /// Text fed back to the model as the observation.
    pub fn to_observation(&self) -> String {
        if self.success {
            self.output.clone()
        } else {
            format!(
                "Error: {}",
                self.error.as_deref().unwrap_or("Unknown error")
            )
        }
    }
}

/// A callable tool bound to the agent.
#[async_trait]
pub trait ToolExecutor: Send + Sync {
    /// Name, description and input schema of the tool.
    fn descriptor(&self) -> &ToolDescriptor;

    /// Executes the tool with the given arguments
    ///
    /// # Errors
    ///
    /// Returns the underlying session or tool failure unchanged; the agent
    /// decides which failures become observations.
    async fn execute(&self, args: serde_json::Value) -> Result<ToolResult>;
}

/// Ordered collection of tool executors.
#[derive(Default)]
pub struct ToolRegistry {
    tools: Vec<Arc<dyn ToolExecutor>>,
    index: HashMap<String, usize>,
}

impl std::fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolRegistry")
            .field("tools", &self.names())
            .finish()
    }
}

impl ToolRegistry {
    /// Create a new empty tool registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a registry from a fresh `list_tools` round trip.
    ///
    /// # Errors
    ///
    /// Propagates the session error from `list_tools`.
    pub async fn from_session(session: &Arc<McpSession>) -> Result<Self> {
        let mut registry = Self::new();
        for descriptor in session.list_tools().await? {
            registry.register(Arc::new(McpToolExecutor::new(
                Arc::clone(session),
                descriptor,
            )));
        }
        Ok(registry)
    }

    /// Registers an executor. A tool with the same name is replaced in place.
    pub fn register(&mut self, executor: Arc<dyn ToolExecutor>) {
        let name = executor.descriptor().name.clone();
        match self.index.get(&name) {
            Some(&slot) => {
                tracing::warn!(tool = %name, "Duplicate tool name; keeping the last definition");
                self.tools[slot] = executor;
            }
            None => {
                self.index.insert(name, self.tools.len());
                self.tools.push(executor);
            }
        }
    }

    /// Get a tool executor by name
    pub fn get(&self, name: &str) -> Option<Arc<dyn ToolExecutor>> {
        self.index.get(name).map(|&slot| Arc::clone(&self.tools[slot]))
    }

    /// Tool names in registration order.
    pub fn names(&self) -> Vec<String> {
        self.tools
            .iter()
            .map(|t| t.descriptor().name.clone())
            .collect()
    }

    /// One `name: description` line per tool, used in the agent prompt.
    pub fn summary(&self) -> String {
        self.tools
            .iter()
            .map(|t| {
                let d = t.descriptor();
                format!("{}: {}", d.name, d.description_text())
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Get the number of registered tools
    pub fn len(&self) -> usize {
        self.tools.len()
    }

    /// Check if the registry is empty
    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}
