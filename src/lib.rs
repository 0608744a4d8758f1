//! glm-mcp - Model Context Protocol server for Z.AI GLM models
//!
//! This library exposes four GLM capabilities as MCP tools: chat, chat with
//! thinking, chat with web search and image generation.

pub mod cli;
pub mod config;
pub mod error;
pub mod glm;
pub mod mcp;
pub mod telemetry;
pub mod tools;
