//! MCP server loop
//!
//! Reads newline-delimited JSON-RPC messages, answers lifecycle and listing
//! requests inline, and runs every `tools/call` on its own task. All
//! responses funnel through one writer task so concurrent calls never
//! interleave bytes on the output.

use super::invocation_id::InvocationId;
use super::protocol::{
    CallToolParams, CancelledParams, INTERNAL_ERROR, INVALID_PARAMS, INVALID_REQUEST,
    IncomingMessage, InitializeParams, InitializeResult, Implementation, JSONRPC_VERSION,
    JsonRpcResponse, ListToolsResult, METHOD_NOT_FOUND, PARSE_ERROR, ServerCapabilities,
    ToolsCapability, negotiate_protocol_version,
};
use crate::error::{AppError, AppResult};
use crate::tools::ToolRegistry;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::{Mutex, mpsc};
use tokio::task::{JoinError, JoinSet};
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

/// Name reported in `initialize`
pub const SERVER_NAME: &str = "glm-mcp-server";

const INSTRUCTIONS: &str =
    "GLM MCP Server: chat, thinking, web search, image generation tools for Z.AI GLM models.";

/// Cancellation handles for running tool calls, keyed by JSON-encoded request id
///
/// Each entry records the invocation that owns it. A client may reuse an id
/// while an earlier call with that id is still running; the later call then
/// owns the entry and the earlier one must leave it alone when it finishes.
type InFlight = Arc<Mutex<HashMap<String, (InvocationId, CancellationToken)>>>;

type Outgoing = mpsc::UnboundedSender<JsonRpcResponse>;

/// MCP server exposing a [`ToolRegistry`]
pub struct McpServer {
    registry: Arc<ToolRegistry>,
    server_info: Implementation,
}

/// State for one connection
struct Session {
    outgoing: Outgoing,
    in_flight: InFlight,
    tasks: JoinSet<()>,
}

impl Session {
    fn send(&self, response: JsonRpcResponse) {
        send(&self.outgoing, response);
    }

    fn reap_finished(&mut self) {
        while let Some(joined) = self.tasks.try_join_next() {
            log_join_failure(joined);
        }
    }
}

impl McpServer {
    pub fn new(registry: ToolRegistry) -> Self {
        Self {
            registry: Arc::new(registry),
            server_info: Implementation {
                name: SERVER_NAME.to_string(),
                version: env!("CARGO_PKG_VERSION").to_string(),
            },
        }
    }

    pub fn server_info(&self) -> &Implementation {
        &self.server_info
    }

    /// Serve on the process's stdin/stdout until stdin closes
    pub async fn run_stdio(&self) -> AppResult<()> {
        tracing::info!(
            server = %self.server_info.name,
            version = %self.server_info.version,
            tools = self.registry.len(),
            "MCP server listening on stdio"
        );
        self.serve(tokio::io::stdin(), tokio::io::stdout()).await
    }

    /// Serve one connection
    ///
    /// Returns once `reader` reaches EOF, every in-flight tool call has
    /// finished and all responses have been written.
    pub async fn serve<R, W>(&self, reader: R, writer: W) -> AppResult<()>
    where
        R: AsyncRead + Unpin,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let (outgoing, incoming) = mpsc::unbounded_channel();
        let writer_task = tokio::spawn(write_responses(writer, incoming));

        let mut session = Session {
            outgoing,
            in_flight: Arc::default(),
            tasks: JoinSet::new(),
        };

        let mut lines = BufReader::new(reader).lines();
        let read_result = loop {
            match lines.next_line().await {
                Ok(Some(line)) => {
                    if line.trim().is_empty() {
                        continue;
                    }
                    self.dispatch(&line, &mut session).await;
                    session.reap_finished();
                }
                Ok(None) => break Ok(()),
                Err(e) => break Err(AppError::Io(e)),
            }
        };

        tracing::debug!(
            in_flight = session.tasks.len(),
            "Input closed, waiting for in-flight tool calls"
        );
        while let Some(joined) = session.tasks.join_next().await {
            log_join_failure(joined);
        }

        // Last sender goes away here, which ends the writer task
        drop(session);
        let write_result = writer_task
            .await
            .map_err(|e| AppError::Io(std::io::Error::other(e)))?;

        read_result?;
        write_result?;

        tracing::info!("MCP server stopped");
        Ok(())
    }

    async fn dispatch(&self, line: &str, session: &mut Session) {
        let message: IncomingMessage = match serde_json::from_str(line) {
            Ok(message) => message,
            Err(e) => {
                tracing::warn!(error = %e, "Received unparseable message");
                session.send(JsonRpcResponse::failure(
                    Value::Null,
                    PARSE_ERROR,
                    format!("Parse error: {}", e),
                ));
                return;
            }
        };

        if message.jsonrpc.as_deref() != Some(JSONRPC_VERSION) {
            session.send(JsonRpcResponse::failure(
                message.id.unwrap_or(Value::Null),
                INVALID_REQUEST,
                "jsonrpc must be \"2.0\"",
            ));
            return;
        }

        match (message.id, message.method) {
            (Some(id), Some(method)) => {
                self.handle_request(id, &method, message.params, session)
                    .await
            }
            (None, Some(method)) => {
                Self::handle_notification(&method, message.params, session).await
            }
            (Some(id), None) => {
                tracing::debug!(id = %id, "Ignoring response to server-initiated request");
            }
            (None, None) => session.send(JsonRpcResponse::failure(
                Value::Null,
                INVALID_REQUEST,
                "message has neither id nor method",
            )),
        }
    }

    async fn handle_request(
        &self,
        id: Value,
        method: &str,
        params: Option<Value>,
        session: &mut Session,
    ) {
        tracing::debug!(id = %id, method, "Received request");

        let response = match method {
            "initialize" => self.initialize(id, params),
            "ping" => JsonRpcResponse::success(id, json!({})),
            "tools/list" => respond(
                id,
                &ListToolsResult {
                    tools: self.registry.definitions(),
                },
            ),
            "tools/call" => return self.call_tool(id, params, session).await,
            other => JsonRpcResponse::failure(
                id,
                METHOD_NOT_FOUND,
                format!("Method not found: {}", other),
            ),
        };

        session.send(response);
    }

    fn initialize(&self, id: Value, params: Option<Value>) -> JsonRpcResponse {
        let params: InitializeParams = match decode_params(params) {
            Ok(params) => params,
            Err(reason) => return JsonRpcResponse::failure(id, INVALID_PARAMS, reason),
        };

        let protocol_version = negotiate_protocol_version(params.protocol_version.as_deref());

        tracing::info!(
            client = params
                .client_info
                .as_ref()
                .map_or("unknown", |info| info.name.as_str()),
            requested_version = ?params.protocol_version,
            protocol_version,
            "Client initialized"
        );

        respond(
            id,
            &InitializeResult {
                protocol_version: protocol_version.to_string(),
                capabilities: ServerCapabilities {
                    tools: Some(ToolsCapability {
                        list_changed: Some(false),
                    }),
                },
                server_info: self.server_info.clone(),
                instructions: Some(INSTRUCTIONS.to_string()),
            },
        )
    }

    async fn call_tool(&self, id: Value, params: Option<Value>, session: &mut Session) {
        let params: CallToolParams = match decode_params(params) {
            Ok(params) => params,
            Err(reason) => {
                session.send(JsonRpcResponse::failure(id, INVALID_PARAMS, reason));
                return;
            }
        };

        let Some(tool) = self.registry.get(&params.name) else {
            tracing::warn!(tool = %params.name, "Unknown tool requested");
            session.send(JsonRpcResponse::failure(
                id,
                INVALID_PARAMS,
                format!("Unknown tool: {}", params.name),
            ));
            return;
        };

        let key = id.to_string();
        let cancel = CancellationToken::new();
        let invocation_id = InvocationId::new();
        let replaced = session
            .in_flight
            .lock()
            .await
            .insert(key.clone(), (invocation_id, cancel.clone()));
        if replaced.is_some() {
            tracing::warn!(request_id = %key, "Request id reused while a call is still running");
        }

        let span = tracing::info_span!(
            "tool_call",
            tool = tool.name(),
            invocation_id = %invocation_id
        );
        let outgoing = session.outgoing.clone();
        let in_flight = Arc::clone(&session.in_flight);

        session.tasks.spawn(
            async move {
                let started = Instant::now();
                tracing::debug!("Tool call started");

                let result = tool.invoke(params.arguments, &cancel).await;
                {
                    let mut running = in_flight.lock().await;
                    if running
                        .get(&key)
                        .is_some_and(|(owner, _)| *owner == invocation_id)
                    {
                        running.remove(&key);
                    }
                }

                let elapsed_ms = started.elapsed().as_millis() as u64;
                if cancel.is_cancelled() {
                    tracing::info!(elapsed_ms, "Tool call cancelled, response suppressed");
                    return;
                }

                tracing::info!(is_error = result.is_error, elapsed_ms, "Tool call finished");
                send(&outgoing, respond(id, &result));
            }
            .instrument(span),
        );
    }

    async fn handle_notification(method: &str, params: Option<Value>, session: &Session) {
        match method {
            "notifications/initialized" => tracing::debug!("Client finished initialization"),
            "notifications/cancelled" => {
                let params: CancelledParams = match decode_params(params) {
                    Ok(params) => params,
                    Err(reason) => {
                        tracing::warn!(%reason, "Malformed cancellation notification");
                        return;
                    }
                };

                let key = params.request_id.to_string();
                match session.in_flight.lock().await.get(&key) {
                    Some((_, token)) => {
                        tracing::info!(
                            request_id = %key,
                            reason = ?params.reason,
                            "Cancelling tool call"
                        );
                        token.cancel();
                    }
                    None => tracing::debug!(
                        request_id = %key,
                        "Cancellation for a request that is not running"
                    ),
                }
            }
            other => tracing::debug!(method = other, "Ignoring notification"),
        }
    }
}

/// Decode request params; absent or null params decode as `{}`
fn decode_params<T: DeserializeOwned>(params: Option<Value>) -> Result<T, String> {
    let value = match params {
        None | Some(Value::Null) => json!({}),
        Some(value) => value,
    };
    serde_json::from_value(value).map_err(|e| format!("Invalid params: {}", e))
}

fn respond<T: Serialize>(id: Value, result: &T) -> JsonRpcResponse {
    match serde_json::to_value(result) {
        Ok(value) => JsonRpcResponse::success(id, value),
        Err(e) => {
            tracing::error!(error = %e, "Failed to encode result");
            JsonRpcResponse::failure(id, INTERNAL_ERROR, format!("Internal error: {}", e))
        }
    }
}

fn send(outgoing: &Outgoing, response: JsonRpcResponse) {
    if outgoing.send(response).is_err() {
        tracing::warn!("Output closed, dropping response");
    }
}

fn log_join_failure(joined: Result<(), JoinError>) {
    if let Err(e) = joined {
        tracing::error!(error = %e, "Tool call task failed");
    }
}

async fn write_responses<W>(
    mut writer: W,
    mut incoming: mpsc::UnboundedReceiver<JsonRpcResponse>,
) -> AppResult<()>
where
    W: AsyncWrite + Unpin,
{
    while let Some(response) = incoming.recv().await {
        let mut line = serde_json::to_vec(&response)?;
        line.push(b'\n');
        writer.write_all(&line).await?;
        writer.flush().await?;
    }
    Ok(())
}
