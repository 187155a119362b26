//! The minimal JSON-line wire protocol spoken between the Transport Client
//! and a tool server subprocess or SSE endpoint: one JSON object per line,
//! in both directions, so the crate is self-contained and testable without
//! depending on a real MCP server implementation.

use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "method", content = "params", rename_all = "snake_case")]
pub enum RequestParams {
    ListTools,
    CallTool { name: String, arguments: Value },
}

#[derive(Debug, Clone, Serialize)]
pub struct Request {
    pub id: u64,
    #[serde(flatten)]
    pub params: RequestParams,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Response {
    pub id: u64,
    #[serde(default)]
    pub result: Option<Value>,
    #[serde(default)]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WireToolInfo {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default = "default_schema", rename = "input_schema")]
    pub input_schema: Value,
}

fn default_schema() -> Value {
    Value::Null
}
