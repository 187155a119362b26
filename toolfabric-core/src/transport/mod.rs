//! Transport Client — a handle to one tool server, stdio subprocess or SSE
//! endpoint.
//!
//! A single [`Client`] is safe for sequential use only; callers (the
//! Manager, for a persistent server's shared client) must serialize
//! outstanding requests per client — see [`crate::adapter`].

mod sse;
mod stdio;

use std::time::Duration;

use async_trait::async_trait;
use toolfabric_config::{ServerSpec, Transport as TransportKind};

use crate::error::{FabricError, FabricResult};
use crate::types::ToolInfo;

pub use sse::SseClient;
pub use stdio::StdioClient;

/// Operations every transport (stdio subprocess, SSE endpoint) implements.
#[async_trait]
pub trait Client: Send {
    async fn connect(&mut self, deadline: Duration) -> FabricResult<()>;
    async fn list_tools(&mut self, deadline: Duration) -> FabricResult<Vec<ToolInfo>>;
    async fn call_tool(
        &mut self,
        deadline: Duration,
        tool_name: &str,
        params: serde_json::Value,
    ) -> FabricResult<String>;

    /// Idempotent; for stdio also terminates the child process. Safe on a
    /// never-connected or already-closed handle. Best-effort: any error is
    /// logged but never propagated.
    async fn close(&mut self);
}

/// Builds the right [`Client`] implementation for `spec`'s transport.
/// Fails with [`FabricError::UnknownTransport`] for any value outside
/// {stdio, sse} — unreachable today since [`TransportKind`] is a closed
/// enum, kept for forward compatibility with new transport kinds.
pub fn build_client(spec: &ServerSpec) -> FabricResult<Box<dyn Client>> {
    match spec.transport {
        TransportKind::Stdio => Ok(Box::new(StdioClient::new(spec))),
        TransportKind::Sse => Ok(Box::new(SseClient::new(spec)?)),
    }
}

#[allow(dead_code)]
fn unknown_transport(server: &str) -> FabricError {
    FabricError::UnknownTransport {
        server: server.to_string(),
    }
}
