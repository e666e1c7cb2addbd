//! Plugin protocol definitions
//!
//! Defines the JSON request/response lines exchanged with out-of-process
//! plugins over stdin/stdout.

use crate::tools::ToolResult;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// What the plugin is asked to do
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestKind {
    /// Run one of the plugin's tools
    Invoke,
    /// Load hook
    Load,
    /// Unload hook
    Unload,
}

/// Request sent to a plugin
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PluginRequest {
    /// Request ID for correlation
    pub id: String,
    pub kind: RequestKind,
    /// Tool name to invoke
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool: Option<String>,
    /// Parameters passed to the tool
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub params: Value,
}

/// Response from a plugin: a tool result tagged with the request ID
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PluginResponse {
    /// Request ID this responds to
    pub id: String,
    #[serde(flatten)]
    pub result: ToolResult,
}

impl PluginRequest {
    /// Create a tool invocation request
    pub fn invoke(tool: &str, params: Value) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            kind: RequestKind::Invoke,
            tool: Some(tool.to_string()),
            params,
        }
    }

    /// Create a load or unload hook request
    pub fn hook(kind: RequestKind) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            kind,
            tool: None,
            params: Value::Null,
        }
    }
}

impl PluginResponse {
    pub fn new(id: &str, result: ToolResult) -> Self {
        Self {
            id: id.to_string(),
            result,
        }
    }
}
