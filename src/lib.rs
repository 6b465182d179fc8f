//! mcp-agent-client - an MCP stdio client driven by a ReAct agent
//!
//! The client launches a Python or JavaScript MCP server as a child process,
//! performs the MCP handshake over its stdio, exposes the server's tools to
//! a language-model agent backed by Amazon Bedrock, and answers queries in
//! an interactive loop.
//!
//! # Architecture
//!
//! - `mcp`: transport, JSON-RPC correlation, session lifecycle and protocol types
//! - `tools`: tool registry and the adapter binding server tools to the agent
//! - `agent`: ReAct parsing, transcript and execution loop
//! - `providers`: the `Provider` trait and the Bedrock implementation
//! - `models`: model families, inference parameter validation, access checks
//! - `controller`: connect, query loop and teardown
//! - `resources`: reverse-order, release-once resource stack
//! - `config`, `cli`, `console`, `error`: ambient concerns
//!
//! # Example
//!
//! ```no_run
//! use mcp_agent_client::cli::Cli;
//! use mcp_agent_client::Config;
//!
//! # fn main() -> anyhow::Result<()> {
//! let cli = Cli::parse_args();
//! let config = Config::load("config/config.yaml", &cli)?;
//! config.validate()?;
//! # Ok(())
//! # }
//! ```

pub mod agent;
pub mod cli;
pub mod config;
pub mod console;
pub mod controller;
pub mod error;
pub mod mcp;
pub mod models;
pub mod prompts;
pub mod providers;
pub mod resources;
pub mod tools;

// Re-export commonly used types
pub use agent::{AgentExecutor, AgentResponse};
pub use config::Config;
pub use controller::{run_client, McpClient};
pub use error::{McpAgentError, Result};
