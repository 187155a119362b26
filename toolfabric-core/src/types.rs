//! Core data types shared across the registry, adapter, and manager.

use serde_json::Value;

/// A capability discovered on a tool server.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolInfo {
    pub name: String,
    pub description: String,
    pub input_schema: Value,
}

/// The outcome of an adapter's `Execute` call, surfaced to the agent.
/// Tool-level and transport-level failures both land in `Error`, never as a
/// thrown exception.
#[derive(Debug, Clone, PartialEq)]
pub enum ToolResult {
    Output(String),
    Error(String),
}

impl ToolResult {
    pub fn is_error(&self) -> bool {
        matches!(self, ToolResult::Error(_))
    }
}

/// Registry key: `"mcp_" + server_name + "__" + tool_name"`.
///
/// The double-underscore separator is mandatory: tools are expected to
/// contain single underscores, server names may contain hyphens, so this
/// scheme cannot collide for any server/tool name free of the `__` sequence.
pub fn qualified_tool_name(server_name: &str, tool_name: &str) -> String {
    format!("mcp_{server_name}__{tool_name}")
}

/// Prefix used to find every qualified name belonging to one server.
pub fn server_prefix(server_name: &str) -> String {
    format!("mcp_{server_name}__")
}
