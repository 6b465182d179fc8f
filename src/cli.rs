//! Command-line interface definition for mcp-agent-client
//!
//! A single positional argument names the MCP server script to launch; the
//! remaining flags tune configuration loading and startup checks.

use clap::Parser;
use std::path::PathBuf;

/// mcp-agent-client - chat with an agent that uses an MCP server's tools
///
/// Launches the given Python or JavaScript MCP server over stdio, discovers
/// its tools and answers queries with a ReAct agent backed by Amazon Bedrock.
#[derive(Parser, Debug, Clone)]
#[command(name = "mcp-agent-client")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Path to the MCP server script (.py or .js)
    #[arg(value_name = "SERVER_SCRIPT")]
    pub server_script: PathBuf,

    /// Path to configuration file
    #[arg(short, long, default_value = "config/config.yaml")]
    pub config: Option<String>,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Override the Bedrock model identifier from config
    #[arg(short, long)]
    pub model: Option<String>,

    /// Skip the model access check performed at startup
    #[arg(long)]
    pub skip_access_check: bool,
}

impl Cli {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }
}
