use std::collections::HashMap;
use std::process::Stdio;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use async_trait::async_trait;
use serde_json::{Value, json};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, BufWriter};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tokio::sync::{Mutex as AsyncMutex, oneshot};
use tracing::{debug, warn};

use super::error::ToolInvokeError;
use super::interface::{ToolDescriptor, ToolTransport};
use crate::config::ServerConfig;

const PROTOCOL_VERSION: &str = "2025-06-18";

/// Tool server reached over stdio: one child process speaking line-delimited
/// JSON-RPC 2.0. Requests are correlated through a pending map of oneshot
/// channels so the reader task can route responses back to callers.
pub struct StdioToolServer {
    inner: Arc<ServerInner>,
}

struct ServerInner {
    config: ServerConfig,
    child: AsyncMutex<Option<Child>>,
    writer: AsyncMutex<Option<BufWriter<ChildStdin>>>,
    pending: AsyncMutex<HashMap<u64, oneshot::Sender<Result<Value, ToolInvokeError>>>>,
    ready: AtomicBool,
    id_counter: AtomicU64,
}

impl StdioToolServer {
    pub fn new(config: ServerConfig) -> Self {
        Self {
            inner: Arc::new(ServerInner {
                config,
                child: AsyncMutex::new(None),
                writer: AsyncMutex::new(None),
                pending: AsyncMutex::new(HashMap::new()),
                ready: AtomicBool::new(false),
                id_counter: AtomicU64::new(1),
            }),
        }
    }

    /// Kill the child process and fail every in-flight request.
    pub async fn shutdown(&self) {
        self.inner.reset().await;
    }
}

#[async_trait]
impl ToolTransport for StdioToolServer {
    async fn initialize(&self) -> Result<(), ToolInvokeError> {
        self.inner.ensure_running().await?;

        // No lock may be held across the handshake: the reader task's reset
        // runs concurrently when the child dies mid-initialize.
        if self.inner.ready.load(Ordering::Acquire) {
            return Ok(());
        }

        if let Err(err) = self.inner.initialize_sequence().await {
            self.inner.reset().await;
            return Err(err);
        }
        self.inner.ready.store(true, Ordering::Release);
        Ok(())
    }

    async fn list_tools(&self) -> Result<Vec<ToolDescriptor>, ToolInvokeError> {
        let result = self.inner.send_request("tools/list", json!({})).await?;
        Ok(decode_tool_list(&result))
    }

    async fn call_tool(&self, tool: &str, arguments: Value) -> Result<Value, ToolInvokeError> {
        let params = json!({
            "name": tool,
            "arguments": match arguments {
                Value::Null => Value::Object(Default::default()),
                other => other,
            }
        });
        self.inner.send_request("tools/call", params).await
    }
}

impl ServerInner {
    async fn ensure_running(self: &Arc<Self>) -> Result<(), ToolInvokeError> {
        {
            let child = self.child.lock().await;
            if child.is_some() {
                return Ok(());
            }
        }

        let mut command = Command::new(&self.config.command);
        command
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit());
        if let Some(dir) = &self.config.workdir {
            command.current_dir(dir);
        }
        if !self.config.args.is_empty() {
            command.args(&self.config.args);
        }
        for (key, value) in &self.config.env {
            command.env(key, value);
        }

        let mut spawned = command.spawn().map_err(|source| ToolInvokeError::Spawn {
            command: self.config.command.clone(),
            source,
        })?;

        let stdin = spawned
            .stdin
            .take()
            .ok_or_else(|| ToolInvokeError::Transport("failed to capture server stdin".into()))?;
        let stdout = spawned
            .stdout
            .take()
            .ok_or_else(|| ToolInvokeError::Transport("failed to capture server stdout".into()))?;

        {
            let mut writer = self.writer.lock().await;
            *writer = Some(BufWriter::new(stdin));
        }
        {
            let mut child = self.child.lock().await;
            *child = Some(spawned);
        }

        let reader_self = Arc::clone(self);
        tokio::spawn(async move {
            reader_self.reader_loop(stdout).await;
        });

        Ok(())
    }

    async fn initialize_sequence(&self) -> Result<(), ToolInvokeError> {
        let params = json!({
            "protocolVersion": PROTOCOL_VERSION,
            "clientInfo": {
                "name": env!("CARGO_PKG_NAME"),
                "version": env!("CARGO_PKG_VERSION"),
            },
            "capabilities": {}
        });
        self.send_request("initialize", params).await?;
        self.send_notification("notifications/initialized", json!({}))
            .await
    }

    async fn reader_loop(self: Arc<Self>, stdout: ChildStdout) {
        let mut lines = BufReader::new(stdout).lines();
        while let Ok(item) = lines.next_line().await {
            match item {
                Some(raw) => {
                    let trimmed = raw.trim();
                    if trimmed.is_empty() {
                        continue;
                    }
                    match serde_json::from_str::<Value>(trimmed) {
                        Ok(value) => self.route_inbound(value).await,
                        Err(source) => {
                            warn!(line = trimmed, %source, "tool server emitted invalid JSON");
                        }
                    }
                }
                None => break,
            }
        }

        self.reset().await;
    }

    async fn route_inbound(&self, value: Value) {
        match (value.get("id").cloned(), value.get("method").is_some()) {
            (Some(id), true) => self.handle_server_request(id, &value).await,
            (Some(id), false) => self.handle_response(id, value).await,
            (None, true) => {
                let method = value
                    .get("method")
                    .and_then(Value::as_str)
                    .unwrap_or_default();
                debug!(method, "notification from tool server");
            }
            (None, false) => {}
        }
    }

    async fn handle_response(&self, id: Value, value: Value) {
        let Some(key) = id.as_u64() else {
            debug!(?id, "response with non-numeric id from tool server");
            return;
        };

        let responder = {
            let mut pending = self.pending.lock().await;
            pending.remove(&key)
        };

        let Some(sender) = responder else {
            debug!(response_id = key, "response for unknown request");
            return;
        };

        if let Some(error) = value.get("error") {
            let code = error.get("code").and_then(Value::as_i64).unwrap_or(-32000);
            let message = error
                .get("message")
                .and_then(Value::as_str)
                .unwrap_or("unknown error")
                .to_string();
            let _ = sender.send(Err(ToolInvokeError::Rpc { code, message }));
        } else {
            let result = value.get("result").cloned().unwrap_or(Value::Null);
            let _ = sender.send(Ok(result));
        }
    }

    async fn handle_server_request(&self, id: Value, value: &Value) {
        let method = value
            .get("method")
            .and_then(Value::as_str)
            .unwrap_or_default();
        let outcome = match method {
            "ping" => self.send_response(id, json!({})).await,
            other => {
                warn!(method = other, "tool server sent unsupported request");
                let error = json!({
                    "code": -32601,
                    "message": format!("client does not implement method '{other}'"),
                });
                self.send_error(id, error).await
            }
        };
        if let Err(err) = outcome {
            warn!(%err, "failed to answer tool server request");
        }
    }

    async fn send_request(&self, method: &str, params: Value) -> Result<Value, ToolInvokeError> {
        let id = self.id_counter.fetch_add(1, Ordering::SeqCst);
        let (tx, rx) = oneshot::channel();
        {
            let mut pending = self.pending.lock().await;
            pending.insert(id, tx);
        }

        let payload = json!({
            "jsonrpc": "2.0",
            "id": id,
            "method": method,
            "params": params
        });
        if let Err(err) = self.write_message(&payload).await {
            let mut pending = self.pending.lock().await;
            pending.remove(&id);
            return Err(err);
        }

        match rx.await {
            Ok(result) => result,
            Err(_) => Err(ToolInvokeError::Cancelled),
        }
    }

    async fn send_notification(&self, method: &str, params: Value) -> Result<(), ToolInvokeError> {
        let payload = json!({
            "jsonrpc": "2.0",
            "method": method,
            "params": params
        });
        self.write_message(&payload).await
    }

    async fn send_response(&self, id: Value, result: Value) -> Result<(), ToolInvokeError> {
        let payload = json!({
            "jsonrpc": "2.0",
            "id": id,
            "result": result
        });
        self.write_message(&payload).await
    }

    async fn send_error(&self, id: Value, error: Value) -> Result<(), ToolInvokeError> {
        let payload = json!({
            "jsonrpc": "2.0",
            "id": id,
            "error": error
        });
        self.write_message(&payload).await
    }

    async fn write_message(&self, message: &Value) -> Result<(), ToolInvokeError> {
        let encoded = serde_json::to_string(message)?;

        let mut writer = self.writer.lock().await;
        let stream = writer
            .as_mut()
            .ok_or_else(|| ToolInvokeError::Transport("writer not initialised".into()))?;
        stream
            .write_all(encoded.as_bytes())
            .await
            .map_err(|source| ToolInvokeError::Transport(source.to_string()))?;
        stream
            .write_all(b"\n")
            .await
            .map_err(|source| ToolInvokeError::Transport(source.to_string()))?;
        stream
            .flush()
            .await
            .map_err(|source| ToolInvokeError::Transport(source.to_string()))?;
        Ok(())
    }

    async fn reset(&self) {
        {
            let mut writer = self.writer.lock().await;
            *writer = None;
        }
        self.ready.store(false, Ordering::Release);

        let mut child = self.child.lock().await;
        if let Some(mut running) = child.take() {
            if let Err(err) = running.kill().await {
                debug!(%err, "failed to kill tool server (may have already exited)");
            }
            let _ = running.wait().await;
        }
        drop(child);

        let mut pending = self.pending.lock().await;
        for (_, sender) in pending.drain() {
            let _ = sender.send(Err(ToolInvokeError::Terminated));
        }
    }
}

fn decode_tool_list(result: &Value) -> Vec<ToolDescriptor> {
    result
        .get("tools")
        .and_then(Value::as_array)
        .map(|tools| {
            tools
                .iter()
                .filter_map(|tool| {
                    let name = tool.get("name").and_then(Value::as_str)?;
                    let description = tool
                        .get("description")
                        .and_then(Value::as_str)
                        .map(str::to_string);
                    let schema = tool.get("inputSchema").cloned().unwrap_or(Value::Null);
                    Some(ToolDescriptor::from_input_schema(
                        name.to_string(),
                        description,
                        &schema,
                    ))
                })
                .collect()
        })
        .unwrap_or_default()
}
