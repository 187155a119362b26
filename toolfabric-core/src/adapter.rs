//! Tool Adapter — the call-path object that turns an agent invocation into
//! either a reused persistent connection or a freshly-spawned transient
//! one, under a bounded per-call deadline.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::Mutex;
use tracing::{error, warn};

use toolfabric_config::{Lifecycle, ServerSpec};

use crate::registry::Tool;
use crate::transport::{build_client, Client};
use crate::types::{qualified_tool_name, ToolInfo, ToolResult};

/// Default per-call deadline when the caller does not impose a tighter one.
pub const DEFAULT_CALL_DEADLINE: Duration = Duration::from_secs(60);

/// One (server, discovered tool) pair, installed into the [`crate::registry::Registry`].
pub struct ToolAdapter {
    server_name: String,
    tool_info: ToolInfo,
    spec: Arc<ServerSpec>,
    lifecycle: Lifecycle,
    /// Borrowed reference to the Manager-owned shared client, present only
    /// for persistent servers. The adapter must never close this client —
    /// the Manager exclusively owns its lifetime.
    shared_client: Option<Arc<Mutex<Box<dyn Client>>>>,
    qualified_name: String,
}

impl ToolAdapter {
    pub fn new(
        server_name: String,
        tool_info: ToolInfo,
        spec: Arc<ServerSpec>,
        lifecycle: Lifecycle,
        shared_client: Option<Arc<Mutex<Box<dyn Client>>>>,
    ) -> Self {
        let qualified_name = qualified_tool_name(&server_name, &tool_info.name);
        ToolAdapter {
            server_name,
            tool_info,
            spec,
            lifecycle,
            shared_client,
            qualified_name,
        }
    }

    fn effective_deadline(&self, caller_deadline: Duration) -> Duration {
        caller_deadline.min(DEFAULT_CALL_DEADLINE)
    }

    async fn execute_persistent(&self, deadline: Duration, args: Value) -> Result<String, String> {
        let Some(client) = &self.shared_client else {
            return Err("persistent adapter has no shared client".to_string());
        };
        let mut guard = client.lock().await;
        guard
            .call_tool(deadline, &self.tool_info.name, args)
            .await
            .map_err(|e| e.to_string())
    }

    async fn execute_per_call(&self, deadline: Duration, args: Value) -> Result<String, String> {
        let mut client = build_client(&self.spec).map_err(|e| e.to_string())?;
        let result = async {
            client.connect(deadline).await.map_err(|e| e.to_string())?;
            client
                .call_tool(deadline, &self.tool_info.name, args)
                .await
                .map_err(|e| e.to_string())
        }
        .await;
        // Guaranteed release on every exit path, including a failed connect.
        client.close().await;
        result
    }
}

#[async_trait]
impl Tool for ToolAdapter {
    fn name(&self) -> &str {
        &self.qualified_name
    }

    fn description(&self) -> &str {
        &self.tool_info.description
    }

    fn input_schema(&self) -> &Value {
        &self.tool_info.input_schema
    }

    async fn execute(&self, deadline: Duration, args_json: &str) -> ToolResult {
        let args = if args_json.trim().is_empty() {
            Value::Object(Default::default())
        } else {
            match serde_json::from_str::<Value>(args_json) {
                Ok(Value::Null) => Value::Object(Default::default()),
                Ok(v @ Value::Object(_)) => v,
                Ok(other) => {
                    warn!(tool = %self.qualified_name, "adapter: args_json was not an object");
                    other
                }
                Err(e) => {
                    return ToolResult::Error(format!("invalid arguments: {e}"));
                }
            }
        };

        let deadline = self.effective_deadline(deadline);

        let outcome = match self.lifecycle {
            Lifecycle::Persistent => self.execute_persistent(deadline, args).await,
            Lifecycle::PerCall => self.execute_per_call(deadline, args).await,
        };

        match outcome {
            Ok(output) => ToolResult::Output(output),
            Err(reason) => {
                error!(tool = %self.qualified_name, error = %reason, "adapter: tool call failed");
                ToolResult::Error(reason)
            }
        }
    }

    async fn close(&self) {
        // The adapter never owns the shared client for a persistent server;
        // per_call clients are built and closed within a single `execute`.
    }
}
