//! mcp-agent-client - interactive MCP client entry point

use std::sync::Arc;

use anyhow::Result;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use mcp_agent_client::cli::Cli;
use mcp_agent_client::config::Config;
use mcp_agent_client::console::{Console, ReadlineInput};
use mcp_agent_client::controller::{run_client, warn_on_inaccessible_models};
use mcp_agent_client::mcp::ScriptKind;
use mcp_agent_client::providers::BedrockProvider;

#[tokio::main]
async fn main() -> Result<()> {
    // Missing .env is fine
    dotenvy::dotenv().ok();

    let cli = Cli::parse_args();
    init_tracing(cli.verbose);

    let config_path = cli.config.as_deref().unwrap_or("config/config.yaml");
    let config = Config::load(config_path, &cli)?;
    config.validate()?;

    ScriptKind::from_path(&cli.server_script)?;

    let provider = Arc::new(BedrockProvider::new(&config.provider).await?);
    if config.provider.check_model_access {
        warn_on_inaccessible_models(provider.as_ref(), &[config.provider.model_id.clone()]).await;
    } else {
        tracing::debug!("Model access check skipped");
    }

    let mut input = ReadlineInput::new()?;
    run_client(
        config,
        provider,
        &cli.server_script,
        &mut input,
        Console::stdout(),
    )
    .await
}

fn init_tracing(verbose: bool) {
    let env_filter = if verbose {
        EnvFilter::new("mcp_agent_client=debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("mcp_agent_client=warn"))
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}
