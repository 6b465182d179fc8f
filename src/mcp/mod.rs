//! MCP (Model Context Protocol) client support
//!
//! # Module Layout
//!
//! - `types`     -- lifecycle and tool protocol types, JSON-RPC primitives
//! - `endpoint`  -- script suffix to interpreter resolution
//! - `transport` -- `Transport` trait, stdio implementation and test fake
//! - `client`    -- JSON-RPC 2.0 request/response correlation
//! - `session`   -- handshake, tool discovery and tool invocation

pub mod client;
pub mod endpoint;
pub mod session;
pub mod transport;
pub mod types;

pub use endpoint::{ScriptKind, ServerEndpoint};
pub use session::{McpSession, SessionTimeouts};
pub use types::{CallToolResponse, ToolDescriptor};
