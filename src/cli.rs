//! Command-line interface for glm-mcp
//!
//! Provides argument parsing and subcommand handling for the glm-mcp binary.

use crate::config::Overrides;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// MCP server for Z.AI GLM models
#[derive(Parser)]
#[command(name = "glm-mcp")]
#[command(version)]
#[command(about = "MCP server for Z.AI GLM chat, thinking, web search and image generation")]
#[command(
    long_about = "glm-mcp exposes Z.AI GLM models as Model Context Protocol tools over stdio: \
    glm_chat, glm_chat_with_thinking, glm_web_search and glm_image_gen."
)]
pub struct Cli {
    /// Z.AI API key
    #[arg(long, env = "GLM_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    /// Use the coding-plan endpoint
    #[arg(long, conflicts_with = "base_url")]
    pub coding: bool,

    /// Override the API base URL
    #[arg(long)]
    pub base_url: Option<String>,

    /// Default chat model [default: glm-4.7]
    #[arg(long)]
    pub model: Option<String>,

    /// Path to an optional TOML configuration file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Log level written to stderr (trace, debug, info, warn, error)
    #[arg(long)]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand)]
pub enum Command {
    /// Generate a template configuration file
    Config {
        /// Output file path (prints to stdout if not specified)
        #[arg(short, long)]
        output: Option<String>,
    },
}

impl Cli {
    /// Flag and environment values for [`crate::config::Config::resolve`]
    pub fn overrides(&self) -> Overrides {
        Overrides {
            api_key: self.api_key.clone(),
            base_url: self.base_url.clone(),
            coding: self.coding,
            model: self.model.clone(),
            log_level: self.log_level.clone(),
        }
    }
}

/// Generate template configuration content
pub fn generate_config_template() -> &'static str {
    r#"# glm-mcp Configuration
# =====================
#
# Every setting is optional. Command-line flags override values in this file.
# The API key is never read from here: pass --api-key or set GLM_API_KEY.

# ─────────────────────────────────────────────────────────────────────────────
# API
# ─────────────────────────────────────────────────────────────────────────────

[api]
# Use the coding-plan endpoint (https://api.z.ai/api/coding/paas/v4).
# Cannot be combined with base_url.
coding = false

# Explicit API root, e.g. a proxy. Defaults to https://api.z.ai/api/paas/v4
# base_url = "https://api.z.ai/api/paas/v4"

# Model used by glm_chat, glm_chat_with_thinking and glm_web_search when the
# caller does not name one
default_model = "glm-4.7"

# Model used by glm_image_gen when the caller does not name one
# Options: "cogview-4-250304", "glm-image"
image_model = "cogview-4-250304"

# Upstream request timeout in seconds, 1 to 600
timeout_seconds = 120

# ─────────────────────────────────────────────────────────────────────────────
# OBSERVABILITY
# ─────────────────────────────────────────────────────────────────────────────

[observability]
# Log level: "trace", "debug", "info", "warn", "error"
# Logs go to stderr; RUST_LOG takes precedence when set.
log_level = "info"
"#
}
