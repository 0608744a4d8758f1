//! glm-mcp stdio server
//!
//! Serves the GLM tools to an MCP client over stdin/stdout.

use clap::Parser;
use glm_mcp::cli::{Cli, Command, generate_config_template};
use glm_mcp::config::{Config, FileConfig};
use glm_mcp::error::AppResult;
use glm_mcp::glm::GlmClient;
use glm_mcp::mcp::McpServer;
use glm_mcp::telemetry;
use glm_mcp::tools::ToolRegistry;
use std::sync::Arc;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        eprintln!("glm-mcp: {}", e);
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> AppResult<()> {
    if let Some(Command::Config { output }) = &cli.command {
        return write_template(output.as_deref());
    }

    // Load configuration
    let file = match &cli.config {
        Some(path) => FileConfig::from_file(path)?,
        None => FileConfig::default(),
    };
    let config = Config::resolve(cli.overrides(), file)?;

    // Initialize telemetry
    telemetry::init(config.log_level());

    tracing::info!(
        base_url = %config.base_url(),
        chat_model = %config.chat_model(),
        image_model = %config.image_model(),
        timeout_seconds = config.timeout().as_secs(),
        "Starting glm-mcp"
    );

    let client = GlmClient::new(config.client_config())?;
    let registry = ToolRegistry::new(Arc::new(client), &config.tool_settings());

    McpServer::new(registry).run_stdio().await
}

fn write_template(output: Option<&str>) -> AppResult<()> {
    let template = generate_config_template();
    match output {
        Some(path) => {
            std::fs::write(path, template)?;
            eprintln!("Wrote configuration template to {}", path);
        }
        None => print!("{}", template),
    }
    Ok(())
}
