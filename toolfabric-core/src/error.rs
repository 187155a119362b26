//! Unified error handling for the tool fabric's core.
//!
//! Per-server faults (connect, list, call) never abort a batch operation —
//! the Manager records them as notices. Only [`ConfigError`] from the config
//! layer is fatal to `Reload`.

use thiserror::Error;
use toolfabric_config::ConfigError;

pub type FabricResult<T> = Result<T, FabricError>;

#[derive(Debug, Error)]
pub enum FabricError {
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    #[error("unknown transport for server '{server}'")]
    UnknownTransport { server: String },

    #[error("failed to connect to server '{server}': {reason}")]
    ConnectFailed { server: String, reason: String },

    #[error("failed to list tools on server '{server}': {reason}")]
    ListFailed { server: String, reason: String },

    #[error("failed to call tool '{tool}' on server '{server}': {reason}")]
    CallFailed {
        server: String,
        tool: String,
        reason: String,
    },

    #[error("server '{server}' reported a tool-level error for '{tool}': {message}")]
    RemoteError {
        server: String,
        tool: String,
        message: String,
    },

    #[error("tool '{0}' not found")]
    ToolNotFound(String),

    #[error("call to '{tool}' on server '{server}' timed out after {deadline_ms}ms")]
    CallTimeout {
        server: String,
        tool: String,
        deadline_ms: u64,
    },

    #[error("scanner could not read '{path}': {reason}")]
    ScanIoError { path: String, reason: String },
}
