//! MCP server over NDJSON stdio.
//!
//! Reads one JSON-RPC message per line and writes one response per line.
//! All writes go through a single writer task, so a long-running
//! `tools/call` (spawned, then run on the blocking pool) never stalls
//! `ping` or `tools/list` and never interleaves output.

use crate::error::FeedbackError;
use crate::feedback::FeedbackService;
use crate::mcp::tools;
use crate::mcp::types::{
    CallToolParams, InitializeResult, JsonRpcError, JsonRpcRequest, JsonRpcResponse,
    INTERNAL_ERROR, INVALID_PARAMS, INVALID_REQUEST, METHOD_NOT_FOUND, PARSE_ERROR,
};
use serde::Serialize;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::mpsc;

/// How long queued responses may take to flush once input has closed.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(2);

#[derive(Clone)]
pub struct McpServer {
    service: Arc<FeedbackService>,
}

impl McpServer {
    pub fn new(service: Arc<FeedbackService>) -> Self {
        Self { service }
    }

    /// Serve until `reader` reaches EOF.
    pub async fn serve<R, W>(&self, reader: R, writer: W) -> Result<(), String>
    where
        R: AsyncRead + Unpin,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let (tx, rx) = mpsc::unbounded_channel();
        let writer_task = tokio::spawn(write_responses(writer, rx));

        let mut reader = BufReader::new(reader);
        let mut line = String::new();
        loop {
            line.clear();
            let n = reader
                .read_line(&mut line)
                .await
                .map_err(|e| format!("[MCP] stdin read failed: {}", e))?;
            if n == 0 {
                log::info!("[MCP] stdin closed, stopping server");
                break;
            }
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            self.dispatch_line(trimmed, &tx).await;
        }

        drop(tx);
        if tokio::time::timeout(DRAIN_TIMEOUT, writer_task).await.is_err() {
            log::warn!("[MCP] Pending responses not flushed before shutdown");
        }
        Ok(())
    }

    async fn dispatch_line(&self, line: &str, tx: &mpsc::UnboundedSender<JsonRpcResponse>) {
        let request = match parse_line(line) {
            Ok(request) => request,
            Err(response) => {
                let _ = tx.send(response);
                return;
            }
        };

        if request.method == "tools/call" && !request.is_notification() {
            let server = self.clone();
            let tx = tx.clone();
            tokio::spawn(async move {
                if let Some(response) = server.handle_request(request).await {
                    let _ = tx.send(response);
                }
            });
        } else if let Some(response) = self.handle_request(request).await {
            let _ = tx.send(response);
        }
    }

    /// Handle one request. Notifications return `None`.
    pub async fn handle_request(&self, request: JsonRpcRequest) -> Option<JsonRpcResponse> {
        let Some(id) = request.id else {
            log::debug!("[MCP] Notification: {}", request.method);
            return None;
        };

        log::debug!("[MCP] Request {}: {}", id, request.method);
        let outcome = match request.method.as_str() {
            "initialize" => initialize(request.params.as_ref()),
            "ping" => Ok(json!({})),
            "tools/list" => to_result(&tools::tool_definitions()).map(|tools| json!({ "tools": tools })),
            "tools/call" => self.call_tool(request.params).await,
            other => Err(JsonRpcError::new(
                METHOD_NOT_FOUND,
                format!("Method not found: {}", other),
            )),
        };

        Some(match outcome {
            Ok(result) => JsonRpcResponse::success(id, result),
            Err(error) => {
                log::warn!("[MCP] {}", error);
                JsonRpcResponse::failure(id, error)
            }
        })
    }

    async fn call_tool(&self, params: Option<Value>) -> Result<Value, JsonRpcError> {
        let params: CallToolParams = serde_json::from_value(params.unwrap_or(Value::Null))
            .map_err(|e| {
                JsonRpcError::new(INVALID_PARAMS, format!("Invalid tools/call params: {}", e))
            })?;
        let call = tools::parse_call(&params.name, params.arguments.as_ref())?;
        log::info!("[MCP] tools/call {}", params.name);

        let service = Arc::clone(&self.service);
        let result = match tokio::task::spawn_blocking(move || tools::run_call(&service, call))
            .await
        {
            Ok(result) => result,
            Err(e) => tools::failure_result(&FeedbackError::internal("collect_feedback task", e)),
        };
        to_result(&result)
    }
}

fn initialize(params: Option<&Value>) -> Result<Value, JsonRpcError> {
    let client_version = params
        .and_then(|p| p.get("protocolVersion"))
        .and_then(Value::as_str);
    if let Some(client) = params.and_then(|p| p.get("clientInfo")) {
        log::info!("[MCP] Client connected: {}", client);
    }
    to_result(&InitializeResult::new(client_version))
}

fn to_result<T: Serialize>(value: &T) -> Result<Value, JsonRpcError> {
    serde_json::to_value(value)
        .map_err(|e| JsonRpcError::new(INTERNAL_ERROR, format!("JSON serialize failed: {}", e)))
}

/// Parse one line, or build the error response it deserves.
fn parse_line(line: &str) -> Result<JsonRpcRequest, JsonRpcResponse> {
    let value: Value = serde_json::from_str(line).map_err(|e| {
        log::debug!(
            "[MCP] Unparsable line: {}",
            line.chars().take(100).collect::<String>()
        );
        JsonRpcResponse::failure(
            Value::Null,
            JsonRpcError::new(PARSE_ERROR, format!("Parse error: {}", e)),
        )
    })?;
    let id = value.get("id").cloned().unwrap_or(Value::Null);
    serde_json::from_value(value).map_err(|e| {
        JsonRpcResponse::failure(
            id,
            JsonRpcError::new(INVALID_REQUEST, format!("Invalid request: {}", e)),
        )
    })
}

async fn write_responses<W>(mut writer: W, mut rx: mpsc::UnboundedReceiver<JsonRpcResponse>)
where
    W: AsyncWrite + Unpin,
{
    while let Some(response) = rx.recv().await {
        if let Err(e) = write_message(&mut writer, &response).await {
            log::error!("{}", e);
            break;
        }
    }
}

/// Write a single NDJSON line.
async fn write_message<W>(writer: &mut W, response: &JsonRpcResponse) -> Result<(), String>
where
    W: AsyncWrite + Unpin,
{
    let mut line =
        serde_json::to_string(response).map_err(|e| format!("JSON serialize failed: {}", e))?;
    line.push('\n');
    writer
        .write_all(line.as_bytes())
        .await
        .map_err(|e| format!("[MCP] stdout write failed: {}", e))?;
    writer
        .flush()
        .await
        .map_err(|e| format!("[MCP] stdout flush failed: {}", e))?;
    Ok(())
}
