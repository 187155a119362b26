//! Stdio transport: a tool server spoken to as a child process over its
//! stdin/stdout, framed as one JSON object per line.

use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::process::{Child, ChildStdin, Command};
use tracing::warn;

use toolfabric_config::ServerSpec;

use super::Client;
use crate::error::{FabricError, FabricResult};
use crate::protocol::{Request, RequestParams, Response, WireToolInfo};
use crate::types::ToolInfo;

pub struct StdioClient {
    server_name: String,
    command: String,
    args: Vec<String>,
    env: Vec<(String, String)>,
    child: Option<Child>,
    stdin: Option<ChildStdin>,
    lines: Option<Lines<BufReader<tokio::process::ChildStdout>>>,
    next_id: u64,
}

impl StdioClient {
    pub fn new(spec: &ServerSpec) -> Self {
        StdioClient {
            server_name: spec.name.clone(),
            command: spec.command.clone().unwrap_or_default(),
            args: spec.args.clone(),
            env: spec.env_pairs(),
            child: None,
            stdin: None,
            lines: None,
            next_id: 0,
        }
    }

    async fn roundtrip(&mut self, deadline: Duration, params: RequestParams) -> FabricResult<Value> {
        let id = self.next_id;
        self.next_id += 1;

        let request = Request { id, params };
        let mut line = serde_json::to_string(&request).map_err(|e| FabricError::CallFailed {
            server: self.server_name.clone(),
            tool: "<protocol>".to_string(),
            reason: format!("failed to encode request: {e}"),
        })?;
        line.push('\n');

        let stdin = self.stdin.as_mut().ok_or_else(|| FabricError::CallFailed {
            server: self.server_name.clone(),
            tool: "<protocol>".to_string(),
            reason: "client is not connected".to_string(),
        })?;

        tokio::time::timeout(deadline, stdin.write_all(line.as_bytes()))
            .await
            .map_err(|_| FabricError::CallTimeout {
                server: self.server_name.clone(),
                tool: "<protocol>".to_string(),
                deadline_ms: deadline.as_millis() as u64,
            })?
            .map_err(|e| FabricError::CallFailed {
                server: self.server_name.clone(),
                tool: "<protocol>".to_string(),
                reason: format!("failed to write request: {e}"),
            })?;

        let lines = self.lines.as_mut().ok_or_else(|| FabricError::CallFailed {
            server: self.server_name.clone(),
            tool: "<protocol>".to_string(),
            reason: "client is not connected".to_string(),
        })?;

        let next_line = tokio::time::timeout(deadline, lines.next_line())
            .await
            .map_err(|_| FabricError::CallTimeout {
                server: self.server_name.clone(),
                tool: "<protocol>".to_string(),
                deadline_ms: deadline.as_millis() as u64,
            })?
            .map_err(|e| FabricError::CallFailed {
                server: self.server_name.clone(),
                tool: "<protocol>".to_string(),
                reason: format!("failed to read response: {e}"),
            })?
            .ok_or_else(|| FabricError::CallFailed {
                server: self.server_name.clone(),
                tool: "<protocol>".to_string(),
                reason: "server closed the connection".to_string(),
            })?;

        let response: Response =
            serde_json::from_str(&next_line).map_err(|e| FabricError::CallFailed {
                server: self.server_name.clone(),
                tool: "<protocol>".to_string(),
                reason: format!("malformed response line: {e}"),
            })?;

        if let Some(message) = response.error {
            return Err(FabricError::RemoteError {
                server: self.server_name.clone(),
                tool: "<protocol>".to_string(),
                message,
            });
        }

        Ok(response.result.unwrap_or(Value::Null))
    }
}

#[async_trait]
impl Client for StdioClient {
    async fn connect(&mut self, deadline: Duration) -> FabricResult<()> {
        let mut cmd = Command::new(&self.command);
        cmd.args(&self.args)
            .envs(self.env.iter().cloned())
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true);

        let mut child = tokio::time::timeout(deadline, async { cmd.spawn() })
            .await
            .map_err(|_| FabricError::ConnectFailed {
                server: self.server_name.clone(),
                reason: "timed out spawning process".to_string(),
            })?
            .map_err(|e| FabricError::ConnectFailed {
                server: self.server_name.clone(),
                reason: format!("failed to spawn '{}': {e}", self.command),
            })?;

        let stdin = child.stdin.take().ok_or_else(|| FabricError::ConnectFailed {
            server: self.server_name.clone(),
            reason: "failed to capture child stdin".to_string(),
        })?;
        let stdout = child.stdout.take().ok_or_else(|| FabricError::ConnectFailed {
            server: self.server_name.clone(),
            reason: "failed to capture child stdout".to_string(),
        })?;

        self.stdin = Some(stdin);
        self.lines = Some(BufReader::new(stdout).lines());
        self.child = Some(child);
        Ok(())
    }

    async fn list_tools(&mut self, deadline: Duration) -> FabricResult<Vec<ToolInfo>> {
        let result = self.roundtrip(deadline, RequestParams::ListTools).await.map_err(|e| {
            retag_as_list_failed(e, &self.server_name)
        })?;
        let wire: Vec<WireToolInfo> =
            serde_json::from_value(result).map_err(|e| FabricError::ListFailed {
                server: self.server_name.clone(),
                reason: format!("malformed tool list: {e}"),
            })?;
        Ok(wire
            .into_iter()
            .map(|t| ToolInfo {
                name: t.name,
                description: t.description,
                input_schema: t.input_schema,
            })
            .collect())
    }

    async fn call_tool(
        &mut self,
        deadline: Duration,
        tool_name: &str,
        params: Value,
    ) -> FabricResult<String> {
        let result = self
            .roundtrip(
                deadline,
                RequestParams::CallTool {
                    name: tool_name.to_string(),
                    arguments: params,
                },
            )
            .await
            .map_err(|e| retag_tool_name(e, tool_name))?;

        Ok(match result {
            Value::String(s) => s,
            other => other.to_string(),
        })
    }

    async fn close(&mut self) {
        self.stdin = None;
        self.lines = None;
        if let Some(mut child) = self.child.take() {
            if let Err(e) = child.start_kill() {
                warn!(server = %self.server_name, error = %e, "stdio client: failed to kill child process");
            }
            let _ = child.wait().await;
        }
    }
}

fn retag_as_list_failed(err: FabricError, server: &str) -> FabricError {
    match err {
        FabricError::RemoteError { message, .. } => FabricError::ListFailed {
            server: server.to_string(),
            reason: message,
        },
        FabricError::CallFailed { reason, .. } => FabricError::ListFailed {
            server: server.to_string(),
            reason,
        },
        FabricError::CallTimeout { deadline_ms, .. } => FabricError::ListFailed {
            server: server.to_string(),
            reason: format!("timed out after {deadline_ms}ms"),
        },
        other => other,
    }
}

fn retag_tool_name(err: FabricError, tool_name: &str) -> FabricError {
    match err {
        FabricError::RemoteError { server, message, .. } => FabricError::RemoteError {
            server,
            tool: tool_name.to_string(),
            message,
        },
        FabricError::CallFailed { server, reason, .. } => FabricError::CallFailed {
            server,
            tool: tool_name.to_string(),
            reason,
        },
        FabricError::CallTimeout {
            server,
            deadline_ms,
            ..
        } => FabricError::CallTimeout {
            server,
            tool: tool_name.to_string(),
            deadline_ms,
        },
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use toolfabric_config::{Lifecycle, Transport};

    fn spec_with_script(script: &str) -> ServerSpec {
        ServerSpec {
            name: "echo".to_string(),
            transport: Transport::Stdio,
            command: Some("sh".to_string()),
            args: vec!["-c".to_string(), script.to_string()],
            env: Vec::new(),
            url: None,
            lifecycle: Lifecycle::Persistent,
            meta: Default::default(),
        }
    }

    /// A trivial shell responder: reads one request line and always replies
    /// with a one-tool list.
    const LIST_TOOLS_SCRIPT: &str = r#"
        read line
        printf '{"id":0,"result":[{"name":"echo_tool","description":"echoes","input_schema":{}}]}\n'
    "#;

    #[tokio::test]
    async fn connect_list_tools_roundtrip() {
        let spec = spec_with_script(LIST_TOOLS_SCRIPT);
        let mut client = StdioClient::new(&spec);
        client.connect(Duration::from_secs(5)).await.unwrap();
        let tools = client.list_tools(Duration::from_secs(5)).await.unwrap();
        assert_eq!(tools.len(), 1);
        assert_eq!(tools[0].name, "echo_tool");
        client.close().await;
    }

    #[tokio::test]
    async fn remote_error_surfaces_as_remote_error() {
        let script = r#"
            read line
            printf '{"id":0,"error":"boom"}\n'
        "#;
        let spec = spec_with_script(script);
        let mut client = StdioClient::new(&spec);
        client.connect(Duration::from_secs(5)).await.unwrap();
        let err = client
            .call_tool(Duration::from_secs(5), "whatever", Value::Null)
            .await
            .unwrap_err();
        assert!(matches!(err, FabricError::RemoteError { .. }));
        client.close().await;
    }

    #[tokio::test]
    async fn connect_failure_on_missing_binary() {
        let mut spec = spec_with_script("");
        spec.command = Some("/nonexistent/binary-that-does-not-exist".to_string());
        spec.args = Vec::new();
        let mut client = StdioClient::new(&spec);
        let err = client.connect(Duration::from_secs(2)).await.unwrap_err();
        assert!(matches!(err, FabricError::ConnectFailed { .. }));
    }

    #[tokio::test]
    async fn call_tool_times_out_against_a_hanging_server() {
        // Never reads the request line, so the response read blocks forever.
        let spec = spec_with_script("sleep 30");
        let mut client = StdioClient::new(&spec);
        client.connect(Duration::from_millis(500)).await.unwrap();
        let err = client
            .call_tool(Duration::from_millis(200), "whatever", Value::Null)
            .await
            .unwrap_err();
        assert!(matches!(err, FabricError::CallTimeout { .. }));
        client.close().await;
    }

    #[tokio::test]
    async fn close_is_idempotent() {
        let spec = spec_with_script(LIST_TOOLS_SCRIPT);
        let mut client = StdioClient::new(&spec);
        client.connect(Duration::from_secs(5)).await.unwrap();
        client.close().await;
        client.close().await;
    }
}
