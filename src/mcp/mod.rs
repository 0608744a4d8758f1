//! Model Context Protocol hosting
//!
//! A tools-only MCP server speaking newline-delimited JSON-RPC 2.0 over
//! stdio. stdout carries protocol messages exclusively; logs go to stderr.

pub mod invocation_id;
pub mod protocol;
pub mod server;

pub use invocation_id::InvocationId;
pub use protocol::{CallToolResult, Content, ToolDefinition};
pub use server::{McpServer, SERVER_NAME};
