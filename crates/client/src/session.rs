//! Session management (spawn, discover, invoke, lifecycle).

use std::collections::{HashMap, HashSet};
use std::process::Stdio;
use std::sync::atomic::{AtomicI64, Ordering};
use std::time::Duration;

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::Mutex;
use tokio::time::timeout;

use protocol::{
    CallToolParams, InitializeParams, InitializeResult, JsonRpcRequest, JsonRpcResponse,
    ListToolsResult, Outcome, RequestId, Tool, methods,
};

use crate::error::{Error, Result};

/// Default timeout for a single request/response round trip.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(15);

/// Maximum response frame size (1MB).
/// Sized for large tool outputs (search results, article summaries).
pub const MAX_FRAME_SIZE: usize = 1024 * 1024;

/// Configuration for connecting to a tool server.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub name: String,
    pub command: String,
    pub args: Vec<String>,
    pub env: HashMap<String, String>,
}

/// A connected session with one tool server.
///
/// The descriptor set cached by [`Session::discover`] is a point-in-time
/// snapshot: immutable for the lifetime of this session, not guaranteed to
/// match what a future session will see.
pub struct Session {
    config: SessionConfig,
    process: Mutex<Child>,
    stdin: Mutex<tokio::process::ChildStdin>,
    stdout: Mutex<BufReader<tokio::process::ChildStdout>>,
    next_id: AtomicI64,
    tools: Mutex<Option<Vec<Tool>>>,
    // Ids of requests abandoned by a local timeout. A late reply carrying
    // one of these is drained and dropped instead of desynchronizing the
    // next call.
    stale: Mutex<HashSet<RequestId>>,
    server_info: Mutex<Option<InitializeResult>>,
    timeout: Duration,
}

impl Session {
    /// Spawn the server process and perform the initialize handshake.
    pub async fn connect(config: SessionConfig) -> Result<Self> {
        let mut cmd = Command::new(&config.command);
        cmd.args(&config.args)
            .envs(&config.env)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true);

        let mut process = cmd.spawn().map_err(Error::Spawn)?;

        let stdin = process
            .stdin
            .take()
            .ok_or_else(|| Error::Spawn(std::io::Error::other("failed to capture stdin")))?;

        let stdout = process
            .stdout
            .take()
            .ok_or_else(|| Error::Spawn(std::io::Error::other("failed to capture stdout")))?;

        let session = Self {
            config,
            process: Mutex::new(process),
            stdin: Mutex::new(stdin),
            stdout: Mutex::new(BufReader::new(stdout)),
            next_id: AtomicI64::new(1),
            tools: Mutex::new(None),
            stale: Mutex::new(HashSet::new()),
            server_info: Mutex::new(None),
            timeout: DEFAULT_TIMEOUT,
        };

        let result: InitializeResult = session
            .request(methods::INITIALIZE, Some(InitializeParams::default()))
            .await?;
        session.notify(methods::INITIALIZED, None::<()>).await?;
        *session.server_info.lock().await = Some(result);

        Ok(session)
    }

    /// Get the configured server name.
    pub fn name(&self) -> &str {
        &self.config.name
    }

    /// Override the per-request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Get server info from the initialize handshake.
    pub async fn server_info(&self) -> Option<InitializeResult> {
        self.server_info.lock().await.clone()
    }

    /// Enumerate the server's tools.
    ///
    /// The first call asks the server; the snapshot is cached and every
    /// later call returns it unchanged, so two `discover()` calls in the
    /// same session always agree.
    pub async fn discover(&self) -> Result<Vec<Tool>> {
        let mut tools = self.tools.lock().await;
        if let Some(cached) = tools.as_ref() {
            return Ok(cached.clone());
        }

        let result: ListToolsResult = self.request(methods::LIST_TOOLS, None::<()>).await?;
        *tools = Some(result.tools.clone());
        Ok(result.tools)
    }

    /// Invoke a tool by name.
    ///
    /// Requires a prior [`Session::discover`]; calling this first is a
    /// usage error ([`Error::NotDiscovered`]). Tool-level failures are
    /// returned inside `Ok(Outcome::Failure { .. })`; an `Err` here always
    /// means the channel itself failed.
    pub async fn invoke(
        &self,
        name: &str,
        arguments: Option<serde_json::Value>,
    ) -> Result<Outcome> {
        if self.tools.lock().await.is_none() {
            return Err(Error::NotDiscovered);
        }

        let params = CallToolParams {
            name: name.to_string(),
            arguments,
        };

        self.request(methods::CALL_TOOL, Some(params)).await
    }

    /// Check if the server process is still running.
    pub async fn is_running(&self) -> bool {
        let mut process = self.process.lock().await;
        matches!(process.try_wait(), Ok(None))
    }

    /// Close the session and terminate the server.
    ///
    /// `kill_on_drop` covers every other exit path, so dropping a `Session`
    /// without calling this cannot leak the child process.
    pub async fn close(self) -> Result<()> {
        // Ask the server to exit cleanly (best effort)
        let _ = self.notify(methods::SHUTDOWN, None::<()>).await;

        let mut process = self.process.lock().await;
        let _ = process.kill().await;

        Ok(())
    }

    // --- Internal methods ---

    fn next_request_id(&self) -> RequestId {
        RequestId::Number(self.next_id.fetch_add(1, Ordering::SeqCst))
    }

    async fn request<P, R>(&self, method: &str, params: Option<P>) -> Result<R>
    where
        P: serde::Serialize,
        R: serde::de::DeserializeOwned,
    {
        let id = self.next_request_id();
        let mut request = JsonRpcRequest::new(id.clone(), method);
        if let Some(p) = params {
            request = request.with_params(p);
        }

        // Send request
        let request_json = serde_json::to_string(&request)?;
        {
            let mut stdin = self.stdin.lock().await;
            stdin.write_all(request_json.as_bytes()).await?;
            stdin.write_all(b"\n").await?;
            stdin.flush().await?;
        }

        // Read the correlated response with timeout; on expiry, remember
        // the id so the late reply can be discarded by the next call.
        let response = match timeout(self.timeout, self.read_response(&id)).await {
            Ok(response) => response?,
            Err(_) => {
                self.stale.lock().await.insert(id);
                return Err(Error::Timeout);
            }
        };

        let result_value = response.into_result()?;
        let result: R = serde_json::from_value(result_value)?;

        Ok(result)
    }

    async fn notify<P>(&self, method: &str, params: Option<P>) -> Result<()>
    where
        P: serde::Serialize,
    {
        // Notifications have no ID
        let notification = serde_json::json!({
            "jsonrpc": "2.0",
            "method": method,
            "params": params.and_then(|p| serde_json::to_value(p).ok())
        });

        let notification_json = serde_json::to_string(&notification)?;
        {
            let mut stdin = self.stdin.lock().await;
            stdin.write_all(notification_json.as_bytes()).await?;
            stdin.write_all(b"\n").await?;
            stdin.flush().await?;
        }

        Ok(())
    }

    async fn read_response(&self, expected: &RequestId) -> Result<JsonRpcResponse> {
        let mut stdout = self.stdout.lock().await;
        let mut stale = self.stale.lock().await;
        read_correlated(&mut *stdout, expected, &mut stale).await
    }
}

/// Read frames until one correlates with `expected`.
///
/// Replies whose id is in the stale set are drained and dropped; any other
/// unexpected id is a hard protocol error.
async fn read_correlated<R>(
    reader: &mut R,
    expected: &RequestId,
    stale: &mut HashSet<RequestId>,
) -> Result<JsonRpcResponse>
where
    R: AsyncBufRead + Unpin,
{
    loop {
        let mut line = String::new();
        let bytes_read = reader.read_line(&mut line).await?;
        if bytes_read == 0 {
            return Err(Error::ServerExited);
        }

        if line.len() > MAX_FRAME_SIZE {
            return Err(Error::FrameTooLarge {
                size: line.len(),
                max: MAX_FRAME_SIZE,
            });
        }

        if line.trim().is_empty() {
            continue;
        }

        let response: JsonRpcResponse = serde_json::from_str(&line)?;

        if stale.remove(&response.id) {
            continue;
        }

        if &response.id == expected {
            return Ok(response);
        }

        return Err(Error::InvalidResponse(format!(
            "response ID mismatch: expected {expected:?}, got {:?}",
            response.id
        )));
    }
}
