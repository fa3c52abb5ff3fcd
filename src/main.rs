//! Agent delegation MCP server.

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

use agent_delegate::{AgentMcpServer, DelegateConfig, HttpCompletionClient, ToolRegistry};

/// Agent delegation server - exposes chat-completion agents as tools.
#[derive(Parser, Debug)]
#[command(name = "agent-delegate")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// TOML file listing the agents to expose.
    #[arg(long, env = "AGENT_DELEGATE_CONFIG")]
    config: Option<PathBuf>,

    /// Base URL of the agent deployments (overrides the config file).
    #[arg(long, env = "DIAL_ENDPOINT")]
    endpoint: Option<String>,

    /// API key sent to the agents when a call does not carry one.
    #[arg(long, env = "DIAL_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Output logs as JSON.
    #[arg(long, default_value = "false")]
    json_logs: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Logs go to stderr; stdout carries the protocol
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&args.log_level));

    if args.json_logs {
        fmt()
            .json()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    } else {
        fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    }

    let mut config = match &args.config {
        Some(path) => DelegateConfig::load(path)?,
        None => DelegateConfig::default(),
    };
    if let Some(endpoint) = args.endpoint {
        config.endpoint = endpoint;
    }
    if args.api_key.is_some() {
        config.api_key = args.api_key;
    }

    info!("Agent delegation server starting");
    info!(
        "Endpoint: {} ({} agents)",
        config.endpoint,
        config.agents.len()
    );

    let client = HttpCompletionClient::new(config.endpoint.clone())
        .with_api_version(config.api_version.clone())
        .with_api_key(config.api_key.clone());
    let registry = ToolRegistry::from_config(&config, Arc::new(client));

    let mut server = AgentMcpServer::new(registry);
    server.run_stdio().await?;

    Ok(())
}
