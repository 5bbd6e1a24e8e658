//! MCP (Model Context Protocol) server.
//!
//! Speaks JSON-RPC 2.0 / NDJSON on stdio and exposes the feedback service
//! as a single tool:
//!
//! - **types**: MCP protocol types (JSON-RPC framing, tool definitions, content)
//! - **tools**: `collect_feedback` definition, argument parsing, result mapping
//! - **server**: McpServer with the read loop, method dispatch, single writer task

pub mod server;
pub mod tools;
pub mod types;

pub use server::McpServer;
