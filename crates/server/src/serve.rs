//! The serve loop: receive, route, respond.

use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use serde::Deserialize;
use serde_json::Value;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::time::timeout;
use tracing::{debug, error, info, warn};

use protocol::{
    CallToolParams, InitializeResult, JsonRpcError, JsonRpcRequest, JsonRpcResponse,
    ListToolsResult, Outcome, PROTOCOL_VERSION, RequestId, ServerCapabilities, ServerInfo,
    ToolError, ToolsCapability, methods,
};

use crate::error::Result;
use crate::registry::ToolRegistry;

/// Default per-invocation budget.
pub const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(30);

/// A tool server bound to a registry.
///
/// Requests are served strictly one at a time in receipt order: the channel
/// carries at most one in-flight invocation, so the registry never needs a
/// lock and responses can never be reordered.
pub struct ToolServer {
    registry: ToolRegistry,
    name: String,
    call_timeout: Duration,
}

/// What a dispatched frame wants the loop to do.
enum Dispatch {
    Reply(JsonRpcResponse),
    Silent,
    Shutdown,
}

/// A frame with a method but no id.
#[derive(Deserialize)]
struct Notification {
    method: String,
}

impl ToolServer {
    pub fn new(registry: ToolRegistry) -> Self {
        Self {
            registry,
            name: "spyglass".to_string(),
            call_timeout: DEFAULT_CALL_TIMEOUT,
        }
    }

    /// Name advertised during the initialize handshake.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_call_timeout(mut self, call_timeout: Duration) -> Self {
        self.call_timeout = call_timeout;
        self
    }

    /// Serve over the process stdio. Stdout is the protocol channel;
    /// logging must go to stderr.
    pub async fn serve_stdio(self) -> Result<()> {
        let stdin = BufReader::new(tokio::io::stdin());
        let stdout = tokio::io::stdout();
        self.serve(stdin, stdout).await
    }

    /// Serve until EOF, a shutdown notification, or a channel failure.
    pub async fn serve<R, W>(self, mut reader: R, mut writer: W) -> Result<()>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        info!(name = %self.name, tools = self.registry.len(), "serving");

        loop {
            let mut line = String::new();
            let bytes_read = reader.read_line(&mut line).await?;
            if bytes_read == 0 {
                info!("client closed the channel");
                break;
            }

            let line = line.trim();
            if line.is_empty() {
                continue;
            }

            match self.dispatch(line).await {
                Dispatch::Reply(response) => {
                    let response_json = serde_json::to_string(&response)?;
                    writer.write_all(response_json.as_bytes()).await?;
                    writer.write_all(b"\n").await?;
                    writer.flush().await?;
                }
                Dispatch::Silent => {}
                Dispatch::Shutdown => {
                    info!("shutdown requested");
                    break;
                }
            }
        }

        Ok(())
    }

    async fn dispatch(&self, line: &str) -> Dispatch {
        let request: JsonRpcRequest = match serde_json::from_str(line) {
            Ok(request) => request,
            Err(_) => {
                // No id: maybe a notification, which never gets a reply.
                if let Ok(notification) = serde_json::from_str::<Notification>(line) {
                    return self.handle_notification(&notification.method);
                }
                return Dispatch::Reply(JsonRpcResponse::error(
                    RequestId::Null,
                    JsonRpcError::parse_error("unparseable frame"),
                ));
            }
        };

        debug!(method = %request.method, id = %request.id, "request");

        let id = request.id.clone();
        let response = match request.method.as_str() {
            methods::INITIALIZE => JsonRpcResponse::result(id, self.initialize_result()),
            methods::LIST_TOOLS => JsonRpcResponse::result(
                id,
                ListToolsResult {
                    tools: self.registry.list(),
                },
            ),
            methods::CALL_TOOL => {
                let params = request.params.unwrap_or(Value::Null);
                match serde_json::from_value::<CallToolParams>(params) {
                    Ok(params) => {
                        let outcome = self.call_tool(params).await;
                        JsonRpcResponse::result(id, outcome)
                    }
                    // Arguments that don't even form a call are a protocol
                    // fault, not a tool failure.
                    Err(e) => JsonRpcResponse::error(
                        id,
                        JsonRpcError::invalid_params(e.to_string()),
                    ),
                }
            }
            method => {
                JsonRpcResponse::error(id, JsonRpcError::method_not_found(method))
            }
        };

        Dispatch::Reply(response)
    }

    fn handle_notification(&self, method: &str) -> Dispatch {
        match method {
            methods::SHUTDOWN => Dispatch::Shutdown,
            methods::INITIALIZED => Dispatch::Silent,
            other => {
                debug!(method = %other, "ignoring notification");
                Dispatch::Silent
            }
        }
    }

    fn initialize_result(&self) -> InitializeResult {
        InitializeResult {
            protocol_version: PROTOCOL_VERSION.to_string(),
            capabilities: ServerCapabilities {
                tools: Some(ToolsCapability::default()),
            },
            server_info: ServerInfo {
                name: self.name.clone(),
                version: Some(env!("CARGO_PKG_VERSION").to_string()),
            },
        }
    }

    /// Route one invocation: resolve, validate, execute.
    ///
    /// Every failure mode ends in an [`Outcome`], never a crashed loop: an
    /// unknown name is a normal failure the client can recover from without
    /// reconnecting, a panicking handler is contained to its own call, and
    /// a handler still pending at the timeout is abandoned so the client is
    /// not left hanging.
    async fn call_tool(&self, params: CallToolParams) -> Outcome {
        let handler = match self.registry.resolve(&params.name) {
            Ok(handler) => Arc::clone(handler),
            Err(e) => {
                warn!(tool = %params.name, "unknown tool");
                return Outcome::failure(e);
            }
        };

        let arguments = params
            .arguments
            .unwrap_or_else(|| Value::Object(Default::default()));

        let normalized = match handler.validate(arguments) {
            Ok(normalized) => normalized,
            Err(e) => {
                debug!(tool = %params.name, error = %e, "validation rejected");
                return Outcome::failure(e);
            }
        };

        let call = std::panic::AssertUnwindSafe(handler.execute(normalized)).catch_unwind();

        match timeout(self.call_timeout, call).await {
            Err(_) => {
                warn!(tool = %params.name, "tool call timed out");
                Outcome::failure(ToolError::Transport(format!(
                    "tool call timed out after {}s",
                    self.call_timeout.as_secs()
                )))
            }
            Ok(Err(_)) => {
                error!(tool = %params.name, "tool panicked");
                Outcome::failure(ToolError::Internal(format!(
                    "tool '{}' failed unexpectedly",
                    params.name
                )))
            }
            Ok(Ok(Ok(payload))) => Outcome::success(payload),
            Ok(Ok(Err(e))) => {
                debug!(tool = %params.name, error = %e, "tool failed");
                Outcome::failure(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::testing::{EchoTool, PanicTool, SleepyTool};
    use protocol::error_codes;
    use serde_json::json;
    use tokio::io::AsyncReadExt;

    fn test_registry() -> ToolRegistry {
        let mut registry = ToolRegistry::new();
        registry.register(Arc::new(EchoTool { name: "echo" })).unwrap();
        registry.register(Arc::new(PanicTool)).unwrap();
        registry.register(Arc::new(SleepyTool)).unwrap();
        registry
    }

    /// Feed `input` to a serving ToolServer and collect its response lines.
    async fn run_script(server: ToolServer, input: &str) -> Vec<Value> {
        let (client_side, server_side) = tokio::io::duplex(256 * 1024);
        let (server_read, server_write) = tokio::io::split(server_side);

        let task = tokio::spawn(server.serve(BufReader::new(server_read), server_write));

        let (mut client_read, mut client_write) = tokio::io::split(client_side);
        client_write.write_all(input.as_bytes()).await.unwrap();
        client_write.shutdown().await.unwrap();

        let mut output = String::new();
        client_read.read_to_string(&mut output).await.unwrap();
        task.await.unwrap().unwrap();

        output
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect()
    }

    fn request(id: i64, method: &str, params: Value) -> String {
        let mut frame = json!({"jsonrpc": "2.0", "id": id, "method": method});
        if !params.is_null() {
            frame["params"] = params;
        }
        format!("{frame}\n")
    }

    fn call(id: i64, name: &str, arguments: Value) -> String {
        request(id, "tools/call", json!({"name": name, "arguments": arguments}))
    }

    #[tokio::test]
    async fn discovery_is_ordered_and_idempotent() {
        let server = ToolServer::new(test_registry());
        let script = [
            request(1, "tools/list", Value::Null),
            request(2, "tools/list", Value::Null),
        ]
        .concat();

        let responses = run_script(server, &script).await;
        assert_eq!(responses.len(), 2);

        let names: Vec<_> = responses[0]["result"]["tools"]
            .as_array()
            .unwrap()
            .iter()
            .map(|t| t["name"].as_str().unwrap().to_string())
            .collect();
        assert_eq!(names, vec!["echo", "panic", "sleepy"]);
        assert_eq!(responses[0]["result"], responses[1]["result"]);
    }

    #[tokio::test]
    async fn initialize_reports_server_info() {
        let server = ToolServer::new(test_registry()).with_name("lookup");
        let responses = run_script(server, &request(1, "initialize", json!({}))).await;
        assert_eq!(responses[0]["result"]["serverInfo"]["name"], "lookup");
        assert_eq!(
            responses[0]["result"]["protocolVersion"],
            PROTOCOL_VERSION
        );
    }

    #[tokio::test]
    async fn call_routes_to_handler() {
        let server = ToolServer::new(test_registry());
        let responses = run_script(server, &call(1, "echo", json!({"q": "hi"}))).await;
        let result = &responses[0]["result"];
        assert_eq!(result["status"], "success");
        assert_eq!(result["payload"]["echo"]["q"], "hi");
    }

    #[tokio::test]
    async fn unknown_tool_is_a_failure_outcome_not_a_channel_fault() {
        let server = ToolServer::new(test_registry());
        let script = [
            call(1, "no_such_tool", json!({})),
            request(2, "tools/list", Value::Null),
        ]
        .concat();

        let responses = run_script(server, &script).await;
        let result = &responses[0]["result"];
        assert_eq!(result["status"], "failure");
        assert_eq!(result["error"]["kind"], "unknown_tool");

        // The channel stayed usable.
        assert!(responses[1]["result"]["tools"].is_array());
    }

    #[tokio::test]
    async fn validation_failure_is_reported_as_invalid_input() {
        let server = ToolServer::new(test_registry());
        let responses =
            run_script(server, &call(1, "echo", json!({"fail_validation": true}))).await;
        assert_eq!(responses[0]["result"]["error"]["kind"], "invalid_input");
    }

    #[tokio::test]
    async fn panicking_handler_is_wrapped_and_server_survives() {
        let server = ToolServer::new(test_registry());
        let script = [
            call(1, "panic", json!({})),
            call(2, "echo", json!({"still": "alive"})),
        ]
        .concat();

        let responses = run_script(server, &script).await;
        assert_eq!(responses[0]["result"]["error"]["kind"], "internal");
        assert_eq!(responses[1]["result"]["status"], "success");
    }

    #[tokio::test]
    async fn pending_handler_is_abandoned_at_the_timeout() {
        let server =
            ToolServer::new(test_registry()).with_call_timeout(Duration::from_millis(50));
        let responses = run_script(server, &call(1, "sleepy", json!({}))).await;
        let error = &responses[0]["result"]["error"];
        assert_eq!(error["kind"], "transport");
    }

    #[tokio::test]
    async fn malformed_call_params_are_a_protocol_error() {
        let server = ToolServer::new(test_registry());
        let responses = run_script(server, &request(1, "tools/call", json!(42))).await;
        assert_eq!(
            responses[0]["error"]["code"],
            error_codes::INVALID_PARAMS
        );
    }

    #[tokio::test]
    async fn unknown_method_is_method_not_found() {
        let server = ToolServer::new(test_registry());
        let responses = run_script(server, &request(1, "tools/nope", Value::Null)).await;
        assert_eq!(
            responses[0]["error"]["code"],
            error_codes::METHOD_NOT_FOUND
        );
    }

    #[tokio::test]
    async fn unparseable_frame_gets_a_null_id_parse_error() {
        let server = ToolServer::new(test_registry());
        let responses = run_script(server, "this is not json\n").await;
        assert_eq!(responses[0]["error"]["code"], error_codes::PARSE_ERROR);
        assert!(responses[0]["id"].is_null());
    }

    #[tokio::test]
    async fn notifications_get_no_reply() {
        let server = ToolServer::new(test_registry());
        let script = [
            "{\"jsonrpc\":\"2.0\",\"method\":\"notifications/initialized\"}\n".to_string(),
            request(1, "tools/list", Value::Null),
        ]
        .concat();

        let responses = run_script(server, &script).await;
        assert_eq!(responses.len(), 1);
        assert_eq!(responses[0]["id"], 1);
    }

    #[tokio::test]
    async fn shutdown_notification_stops_the_loop() {
        let server = ToolServer::new(test_registry());
        let script = [
            "{\"jsonrpc\":\"2.0\",\"method\":\"shutdown\"}\n".to_string(),
            // Never dispatched: the loop exits first.
            request(1, "tools/list", Value::Null),
        ]
        .concat();

        let responses = run_script(server, &script).await;
        assert!(responses.is_empty());
    }

    #[tokio::test]
    async fn responses_echo_the_request_id() {
        let server = ToolServer::new(test_registry());
        let script = [
            request(41, "tools/list", Value::Null),
            call(42, "echo", json!({})),
        ]
        .concat();

        let responses = run_script(server, &script).await;
        assert_eq!(responses[0]["id"], 41);
        assert_eq!(responses[1]["id"], 42);
    }
}
