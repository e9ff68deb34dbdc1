//! Tool-session gateway: MCP client over a child process's stdio
//!
//! Frames are newline-delimited JSON-RPC 2.0 messages. One session is opened
//! per run, shared by every scenario, and shut down by the runner on every
//! exit path.

use std::process::Stdio;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use mcptest_common::ToolServerSettings;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tokio::sync::Mutex;
use tracing::{debug, info, trace, warn};

use crate::error::{E2eError, E2eResult};
use crate::message::{MessagePart, Tool, ToolOutput};

/// MCP protocol revision sent in the initialize handshake
pub const PROTOCOL_VERSION: &str = "2024-11-05";

const CLIENT_NAME: &str = "mcptest";

/// How long `shutdown` waits for the server to exit after stdin closes
const SHUTDOWN_GRACE: Duration = Duration::from_secs(2);

/// Catalogue and invocation surface the agent needs from a tool server
#[async_trait]
pub trait ToolHost: Send + Sync {
    /// Tools advertised by the server
    fn tools(&self) -> &[Tool];

    /// Invoke one tool. Tool-level failures come back as an error
    /// [`ToolOutput`]; only transport failures are `Err`.
    async fn call_tool(&self, name: &str, arguments: Value) -> E2eResult<ToolOutput>;
}

#[derive(Debug, Serialize)]
struct JsonRpcRequest<'a> {
    jsonrpc: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    id: Option<u64>,
    method: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    params: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct JsonRpcMessage {
    #[serde(default)]
    id: Option<Value>,
    #[serde(default)]
    method: Option<String>,
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<JsonRpcError>,
}

#[derive(Debug, Deserialize)]
struct JsonRpcError {
    code: i64,
    message: String,
}

#[derive(Debug, Deserialize)]
struct ListToolsResult {
    #[serde(default)]
    tools: Vec<Tool>,
    #[serde(rename = "nextCursor", default)]
    next_cursor: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CallToolResult {
    #[serde(default)]
    content: Vec<Value>,
    #[serde(rename = "isError", default)]
    is_error: bool,
}

/// Identity reported by the server during the handshake
#[derive(Debug, Clone, Default)]
pub struct ServerInfo {
    pub name: String,
    pub version: String,
    pub protocol_version: String,
}

struct Pipes {
    stdin: Option<ChildStdin>,
    stdout: BufReader<ChildStdout>,
}

/// A live connection to the tool server process
pub struct McpSession {
    child: Mutex<Child>,
    pipes: Mutex<Pipes>,
    next_id: AtomicU64,
    server_info: ServerInfo,
    tools: Vec<Tool>,
}

impl McpSession {
    /// Spawn the server, perform the initialize handshake and load the tool
    /// catalogue. Any failure here is a session error.
    pub async fn open(settings: &ToolServerSettings) -> E2eResult<Self> {
        let mut cmd = Command::new(&settings.command);
        cmd.args(&settings.args)
            .envs(&settings.env)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true);
        if let Some(cwd) = &settings.cwd {
            cmd.current_dir(cwd);
        }

        info!(
            "Starting tool server: {} {}",
            settings.command,
            settings.args.join(" ")
        );

        let mut child = cmd.spawn().map_err(|e| {
            E2eError::Session(format!("failed to spawn {}: {}", settings.command, e))
        })?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| E2eError::Session("tool server stdin unavailable".to_string()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| E2eError::Session("tool server stdout unavailable".to_string()))?;

        let mut session = Self {
            child: Mutex::new(child),
            pipes: Mutex::new(Pipes {
                stdin: Some(stdin),
                stdout: BufReader::new(stdout),
            }),
            next_id: AtomicU64::new(1),
            server_info: ServerInfo::default(),
            tools: Vec::new(),
        };

        match session.handshake().await {
            Ok(()) => Ok(session),
            Err(e) => {
                session.shutdown().await;
                Err(match e {
                    E2eError::Session(_) => e,
                    other => E2eError::Session(format!("handshake failed: {}", other)),
                })
            }
        }
    }

    async fn handshake(&mut self) -> E2eResult<()> {
        let result = self
            .request(
                "initialize",
                Some(json!({
                    "protocolVersion": PROTOCOL_VERSION,
                    "capabilities": {},
                    "clientInfo": { "name": CLIENT_NAME, "version": env!("CARGO_PKG_VERSION") },
                })),
            )
            .await?;

        self.server_info = ServerInfo {
            name: result["serverInfo"]["name"].as_str().unwrap_or_default().to_string(),
            version: result["serverInfo"]["version"].as_str().unwrap_or_default().to_string(),
            protocol_version: result["protocolVersion"].as_str().unwrap_or_default().to_string(),
        };
        debug!(
            "Tool server {} {} (protocol {})",
            self.server_info.name, self.server_info.version, self.server_info.protocol_version
        );

        self.notify("notifications/initialized", None).await?;

        let mut tools = Vec::new();
        let mut cursor: Option<String> = None;
        loop {
            let params = cursor.as_ref().map(|c| json!({ "cursor": c }));
            let page: ListToolsResult = serde_json::from_value(self.request("tools/list", params).await?)
                .map_err(|e| E2eError::Session(format!("invalid tools/list result: {}", e)))?;
            tools.extend(page.tools);
            match page.next_cursor {
                Some(next) if !next.is_empty() => cursor = Some(next),
                _ => break,
            }
        }

        info!("Tool server ready with {} tools", tools.len());
        self.tools = tools;
        Ok(())
    }

    pub fn server_info(&self) -> &ServerInfo {
        &self.server_info
    }

    /// Send a request and wait for the response with the matching id.
    /// Transport failures are `Err`; a JSON-RPC error reply is `Ok(Err(..))`.
    async fn exchange(
        &self,
        method: &str,
        params: Option<Value>,
    ) -> E2eResult<Result<Value, JsonRpcError>> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let mut pipes = self.pipes.lock().await;

        write_frame(
            &mut pipes,
            &JsonRpcRequest { jsonrpc: "2.0", id: Some(id), method, params },
        )
        .await?;

        loop {
            let message = read_frame(&mut pipes).await?;

            // Server-initiated request
            if let (Some(server_method), Some(server_id)) = (&message.method, &message.id) {
                let reply = if server_method == "ping" {
                    json!({ "jsonrpc": "2.0", "id": server_id, "result": {} })
                } else {
                    json!({
                        "jsonrpc": "2.0",
                        "id": server_id,
                        "error": { "code": -32601, "message": format!("method not found: {}", server_method) },
                    })
                };
                write_frame(&mut pipes, &reply).await?;
                continue;
            }

            // Notification
            if message.method.is_some() {
                continue;
            }

            if message.id.as_ref().and_then(Value::as_u64) != Some(id) {
                warn!("Ignoring response with unexpected id: {:?}", message.id);
                continue;
            }

            return Ok(match message.error {
                Some(error) => Err(error),
                None => Ok(message.result.unwrap_or(Value::Null)),
            });
        }
    }

    async fn request(&self, method: &str, params: Option<Value>) -> E2eResult<Value> {
        self.exchange(method, params).await?.map_err(|error| {
            E2eError::Session(format!("{} failed ({}): {}", method, error.code, error.message))
        })
    }

    async fn notify(&self, method: &str, params: Option<Value>) -> E2eResult<()> {
        let mut pipes = self.pipes.lock().await;
        write_frame(&mut pipes, &JsonRpcRequest { jsonrpc: "2.0", id: None, method, params }).await
    }

    /// Close stdin, give the server a moment to exit, then kill it
    pub async fn shutdown(&self) {
        self.pipes.lock().await.stdin.take();

        let mut child = self.child.lock().await;
        match tokio::time::timeout(SHUTDOWN_GRACE, child.wait()).await {
            Ok(Ok(status)) => debug!("Tool server exited: {}", status),
            Ok(Err(e)) => warn!("Waiting for tool server failed: {}", e),
            Err(_) => {
                debug!("Tool server still running after {:?}, killing", SHUTDOWN_GRACE);
                if let Err(e) = child.kill().await {
                    warn!("Failed to kill tool server: {}", e);
                }
            }
        }
        info!("Tool session closed");
    }
}

#[async_trait]
impl ToolHost for McpSession {
    fn tools(&self) -> &[Tool] {
        &self.tools
    }

    async fn call_tool(&self, name: &str, arguments: Value) -> E2eResult<ToolOutput> {
        trace!("tools/call {} {}", name, arguments);
        let params = json!({ "name": name, "arguments": arguments });

        let result = match self.exchange("tools/call", Some(params)).await? {
            Ok(result) => result,
            // The call itself failed; the model sees the message and may react
            Err(error) => {
                return Ok(ToolOutput::error(format!("{} (code {})", error.message, error.code)));
            }
        };

        let result: CallToolResult = serde_json::from_value(result)
            .map_err(|e| E2eError::Session(format!("tool server sent invalid tools/call result: {}", e)))?;

        Ok(ToolOutput {
            parts: result.content.into_iter().map(content_to_part).collect(),
            is_error: result.is_error,
        })
    }
}

/// Map one MCP content item onto a message part
pub fn content_to_part(content: Value) -> MessagePart {
    match content["type"].as_str() {
        Some("text") => match content["text"].as_str() {
            Some(text) => MessagePart::Text(text.to_string()),
            None => MessagePart::Other(content),
        },
        Some("image") => match (content["data"].as_str(), content["mimeType"].as_str()) {
            (Some(data), Some(mime)) => MessagePart::Image {
                data: data.to_string(),
                mime_type: mime.to_string(),
            },
            (Some(data), None) => MessagePart::Image {
                data: data.to_string(),
                mime_type: "image/png".to_string(),
            },
            _ => MessagePart::Other(content),
        },
        _ => MessagePart::Other(content),
    }
}

async fn write_frame<T: Serialize>(pipes: &mut Pipes, frame: &T) -> E2eResult<()> {
    let line = serde_json::to_string(frame)?;
    trace!("MCP -> {}", line);

    let stdin = pipes
        .stdin
        .as_mut()
        .ok_or_else(|| E2eError::Session("tool server stdin already closed".to_string()))?;
    send_line(stdin, &line)
        .await
        .map_err(|e| E2eError::Session(format!("tool server write failed: {}", e)))
}

async fn send_line(stdin: &mut ChildStdin, line: &str) -> std::io::Result<()> {
    stdin.write_all(line.as_bytes()).await?;
    stdin.write_all(b"\n").await?;
    stdin.flush().await
}

async fn read_frame(pipes: &mut Pipes) -> E2eResult<JsonRpcMessage> {
    loop {
        let mut line = String::new();
        let read = pipes
            .stdout
            .read_line(&mut line)
            .await
            .map_err(|e| E2eError::Session(format!("tool server read failed: {}", e)))?;
        if read == 0 {
            return Err(E2eError::Session("tool server closed the connection".to_string()));
        }

        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        trace!("MCP <- {}", line);

        return serde_json::from_str(line)
            .map_err(|e| E2eError::Session(format!("tool server sent invalid frame: {}", e)));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_to_part() {
        assert_eq!(
            content_to_part(json!({"type": "text", "text": "clicked"})),
            MessagePart::Text("clicked".to_string())
        );
        assert_eq!(
            content_to_part(json!({"type": "image", "data": "iVBO", "mimeType": "image/jpeg"})),
            MessagePart::Image { data: "iVBO".to_string(), mime_type: "image/jpeg".to_string() }
        );
        let resource = json!({"type": "resource", "resource": {"uri": "file:///x"}});
        assert_eq!(content_to_part(resource.clone()), MessagePart::Other(resource));
    }

    #[test]
    fn test_request_frame_shape() {
        let frame = JsonRpcRequest { jsonrpc: "2.0", id: None, method: "notifications/initialized", params: None };
        assert_eq!(
            serde_json::to_string(&frame).unwrap(),
            r#"{"jsonrpc":"2.0","method":"notifications/initialized"}"#
        );
    }
}
