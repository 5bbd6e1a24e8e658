//! Tools this server exposes, and their dispatch.
//!
//! There is one tool, `collect_feedback`. Argument parsing happens on the
//! async side so bad params get a JSON-RPC error; the call itself blocks and
//! is run on the blocking pool by the server.

use crate::error::FeedbackError;
use crate::feedback::{FeedbackItem, FeedbackService};
use crate::mcp::types::{JsonRpcError, McpTool, ToolResult, ToolResultContent, INVALID_PARAMS};
use base64::Engine;
use serde_json::{json, Value};

pub const COLLECT_FEEDBACK: &str = "collect_feedback";

/// A parsed tools/call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToolCall {
    CollectFeedback { timeout_secs: Option<i64> },
}

pub fn tool_definitions() -> Vec<McpTool> {
    vec![McpTool {
        name: COLLECT_FEEDBACK.to_string(),
        description: "Interactive tool for collecting user feedback. Shows a feedback \
                      prompt where the user can provide text and/or images. Returns the \
                      text as a text part and each image as a PNG image part."
            .to_string(),
        input_schema: json!({
            "type": "object",
            "properties": {
                "timeout_seconds": {
                    "type": "integer",
                    "description": "Seconds to wait for the user. 0 or less waits indefinitely. Defaults to the server setting."
                }
            }
        }),
    }]
}

/// Resolve a tool name and its arguments.
pub fn parse_call(name: &str, arguments: Option<&Value>) -> Result<ToolCall, JsonRpcError> {
    match name {
        COLLECT_FEEDBACK => {
            let timeout_secs = match arguments.and_then(|args| args.get("timeout_seconds")) {
                None | Some(Value::Null) => None,
                Some(v) => Some(v.as_i64().ok_or_else(|| {
                    JsonRpcError::new(INVALID_PARAMS, "timeout_seconds must be an integer")
                })?),
            };
            Ok(ToolCall::CollectFeedback { timeout_secs })
        }
        other => Err(JsonRpcError::new(
            INVALID_PARAMS,
            format!("Unknown tool: {}", other),
        )),
    }
}

/// Execute a parsed call. Blocks until the user finishes or the cycle ends.
pub fn run_call(service: &FeedbackService, call: ToolCall) -> ToolResult {
    match call {
        ToolCall::CollectFeedback { timeout_secs } => {
            let secs = timeout_secs.unwrap_or(service.settings().dialog_timeout_secs);
            match service.collect_feedback(secs) {
                Ok(items) => ToolResult::ok(to_content(items)),
                Err(e) => failure_result(&e),
            }
        }
    }
}

/// Domain failure → `isError` tool result.
pub fn failure_result(err: &FeedbackError) -> ToolResult {
    log::error!("[MCP] collect_feedback failed: {}", err);
    ToolResult::error(format!("Feedback collection failed: {}", err))
}

pub fn to_content(items: Vec<FeedbackItem>) -> Vec<ToolResultContent> {
    items
        .into_iter()
        .map(|item| match item {
            FeedbackItem::Text(text) => ToolResultContent::Text { text },
            FeedbackItem::Image { data, mime_type } => ToolResultContent::Image {
                data: base64::engine::general_purpose::STANDARD.encode(data),
                mime_type: mime_type.to_string(),
            },
        })
        .collect()
}
