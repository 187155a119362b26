//! SSE transport: a tool server spoken to over an HTTP streaming endpoint.
//!
//! Full SSE framing is intentionally not implemented here; this speaks the
//! fabric's fixed request/response shapes as one HTTP POST per call, which
//! keeps the crate self-contained without an external streaming library.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use url::Url;

use toolfabric_config::ServerSpec;

use super::Client;
use crate::error::{FabricError, FabricResult};
use crate::protocol::{Request, RequestParams, Response, WireToolInfo};
use crate::types::ToolInfo;

pub struct SseClient {
    server_name: String,
    url: Url,
    http: reqwest::Client,
    next_id: u64,
}

impl SseClient {
    pub fn new(spec: &ServerSpec) -> FabricResult<Self> {
        let raw_url = spec.url.clone().unwrap_or_default();
        let url = Url::parse(&raw_url).map_err(|_| FabricError::UnknownTransport {
            server: spec.name.clone(),
        })?;
        Ok(SseClient {
            server_name: spec.name.clone(),
            url,
            http: reqwest::Client::new(),
            next_id: 0,
        })
    }

    async fn roundtrip(&mut self, deadline: Duration, params: RequestParams) -> FabricResult<Value> {
        let id = self.next_id;
        self.next_id += 1;
        let request = Request { id, params };

        let response = tokio::time::timeout(
            deadline,
            self.http.post(self.url.clone()).json(&request).send(),
        )
        .await
        .map_err(|_| FabricError::CallTimeout {
            server: self.server_name.clone(),
            tool: "<protocol>".to_string(),
            deadline_ms: deadline.as_millis() as u64,
        })?
        .map_err(|e| FabricError::CallFailed {
            server: self.server_name.clone(),
            tool: "<protocol>".to_string(),
            reason: format!("http request failed: {e}"),
        })?;

        let body: Response = response.json().await.map_err(|e| FabricError::CallFailed {
            server: self.server_name.clone(),
            tool: "<protocol>".to_string(),
            reason: format!("malformed sse response: {e}"),
        })?;

        if let Some(message) = body.error {
            return Err(FabricError::RemoteError {
                server: self.server_name.clone(),
                tool: "<protocol>".to_string(),
                message,
            });
        }

        Ok(body.result.unwrap_or(Value::Null))
    }
}

#[async_trait]
impl Client for SseClient {
    async fn connect(&mut self, _deadline: Duration) -> FabricResult<()> {
        // The streaming session is opened lazily on first request; there is
        // no separate handshake to perform here beyond url validation,
        // already done in `new`.
        Ok(())
    }

    async fn list_tools(&mut self, deadline: Duration) -> FabricResult<Vec<ToolInfo>> {
        let result = self
            .roundtrip(deadline, RequestParams::ListTools)
            .await
            .map_err(|e| match e {
                FabricError::RemoteError { message, .. } => FabricError::ListFailed {
                    server: self.server_name.clone(),
                    reason: message,
                },
                FabricError::CallFailed { reason, .. } => FabricError::ListFailed {
                    server: self.server_name.clone(),
                    reason,
                },
                FabricError::CallTimeout { deadline_ms, .. } => FabricError::ListFailed {
                    server: self.server_name.clone(),
                    reason: format!("timed out after {deadline_ms}ms"),
                },
                other => other,
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
            .map_err(|e| match e {
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
            })?;

        Ok(match result {
            Value::String(s) => s,
            other => other.to_string(),
        })
    }

    async fn close(&mut self) {
        // No persistent resource to release: the reqwest client and any
        // open stream are dropped with `self`.
    }
}
