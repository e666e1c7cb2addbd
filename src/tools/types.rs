//! Tool definitions and results
//!
//! Defines the shape of a tool, its asynchronous handler and the result
//! format returned across the UI boundary.

use crate::error::ToolError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

/// Asynchronous tool handler
#[async_trait]
pub trait ToolHandler: Send + Sync {
    /// Run the tool with the caller's parameter object
    async fn call(&self, params: Value) -> Result<ToolResult, ToolError>;
}

#[async_trait]
impl<F, Fut> ToolHandler for F
where
    F: Fn(Value) -> Fut + Send + Sync,
    Fut: Future<Output = Result<ToolResult, ToolError>> + Send + 'static,
{
    async fn call(&self, params: Value) -> Result<ToolResult, ToolError> {
        (self)(params).await
    }
}

/// A named, schema-described unit of work
#[derive(Clone)]
pub struct Tool {
    /// Unique tool name (registry key)
    pub name: String,
    /// Human-readable description
    pub description: String,
    /// JSON-Schema-like parameter description, stored as given
    pub parameters: Value,
    /// Handler invoked by `ToolRegistry::execute`
    pub handler: Arc<dyn ToolHandler>,
}

impl Tool {
    /// Create a tool from any handler
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        parameters: impl Into<Value>,
        handler: impl ToolHandler + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            parameters: parameters.into(),
            handler: Arc::new(handler),
        }
    }

    /// Create a tool from an async closure
    pub fn from_fn<F, Fut>(
        name: impl Into<String>,
        description: impl Into<String>,
        parameters: impl Into<Value>,
        handler: F,
    ) -> Self
    where
        F: Fn(Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<ToolResult, ToolError>> + Send + 'static,
    {
        Self::new(name, description, parameters, handler)
    }

    /// Handler-free view for enumeration and prompts
    pub fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: self.name.clone(),
            description: self.description.clone(),
            parameters: self.parameters.clone(),
        }
    }
}

impl fmt::Debug for Tool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Tool")
            .field("name", &self.name)
            .field("description", &self.description)
            .field("parameters", &self.parameters)
            .finish_non_exhaustive()
    }
}

/// Serializable tool description
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    #[serde(default = "empty_object_schema")]
    pub parameters: Value,
}

fn empty_object_schema() -> Value {
    serde_json::json!({ "type": "object", "properties": {}, "required": [] })
}

/// Result of a tool execution
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolResult {
    /// Whether the operation succeeded
    pub success: bool,
    /// Result data (if success)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    /// Error message (if failure)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Human-readable summary
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl ToolResult {
    /// Create a success result
    pub fn success(data: Value) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
            message: None,
        }
    }

    /// Create a success result with a summary
    pub fn success_with_message(data: Value, message: impl Into<String>) -> Self {
        Self::success(data).with_message(message)
    }

    /// Create a success result that only carries a summary
    pub fn message_only(message: impl Into<String>) -> Self {
        Self {
            success: true,
            data: None,
            error: None,
            message: Some(message.into()),
        }
    }

    /// Create a failure result
    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(error.into()),
            message: None,
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }
}

/// Read-only accessors over a tool's parameter object
#[derive(Debug, Clone, Copy)]
pub struct Params<'a>(&'a Value);

impl<'a> Params<'a> {
    pub fn new(value: &'a Value) -> Self {
        Self(value)
    }

    /// Get a string parameter
    pub fn get_str(&self, name: &str) -> Option<&'a str> {
        self.0.get(name).and_then(|v| v.as_str())
    }

    /// Get a required string parameter
    pub fn require_str(&self, name: &str) -> Result<&'a str, ToolError> {
        self.get_str(name)
            .ok_or_else(|| ToolError::InvalidParams(format!("Missing required parameter: {}", name)))
    }

    /// Get a boolean parameter with default
    pub fn get_bool(&self, name: &str, default: bool) -> bool {
        self.0.get(name).and_then(|v| v.as_bool()).unwrap_or(default)
    }

    /// Get a non-negative integer parameter
    ///
    /// Accepts floats as well, since JSON callers often send `10.0`.
    pub fn get_u64(&self, name: &str) -> Option<u64> {
        let value = self.0.get(name)?;
        value
            .as_u64()
            .or_else(|| value.as_f64().filter(|f| *f >= 0.0).map(|f| f as u64))
    }

    /// Get a list of strings, skipping non-string elements
    pub fn get_str_list(&self, name: &str) -> Vec<&'a str> {
        self.0
            .get(name)
            .and_then(|v| v.as_array())
            .map(|items| items.iter().filter_map(|i| i.as_str()).collect())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_tool_result_success() {
        let result = ToolResult::success_with_message(json!({"location": "Oslo"}), "ok");

        assert!(result.success);
        assert_eq!(result.data.unwrap()["location"], "Oslo");
        assert!(result.error.is_none());
        assert_eq!(result.message.as_deref(), Some("ok"));
    }

    #[test]
    fn test_tool_result_failure() {
        let result = ToolResult::failure("File not found");

        assert!(!result.success);
        assert!(result.data.is_none());
        assert_eq!(result.error, Some("File not found".to_string()));
    }

    #[test]
    fn test_tool_result_wire_shape() {
        let json = serde_json::to_value(ToolResult::failure("boom")).unwrap();
        assert_eq!(json, json!({ "success": false, "error": "boom" }));

        let json = serde_json::to_value(ToolResult::message_only("done")).unwrap();
        assert_eq!(json, json!({ "success": true, "message": "done" }));
    }

    #[test]
    fn test_tool_result_parse_minimal() {
        let result: ToolResult = serde_json::from_str(r#"{"success": true}"#).unwrap();
        assert!(result.success);
        assert!(result.data.is_none());
    }

    #[tokio::test]
    async fn test_closure_handler() {
        let tool = Tool::from_fn("echo", "Echo input", json!({"type": "object"}), |params| async move {
            Ok(ToolResult::success(params))
        });

        let result = tool.handler.call(json!({"a": 1})).await.unwrap();
        assert_eq!(result.data, Some(json!({"a": 1})));
        assert_eq!(tool.definition().name, "echo");
    }

    #[test]
    fn test_params_accessors() {
        let value = json!({
            "path": "/tmp/test",
            "flag": true,
            "limit": 10.0,
            "labels": ["bug", 3, "ui"],
        });
        let params = Params::new(&value);

        assert_eq!(params.get_str("path"), Some("/tmp/test"));
        assert!(params.get_bool("flag", false));
        assert!(params.get_bool("missing", true));
        assert_eq!(params.get_u64("limit"), Some(10));
        assert_eq!(params.get_str_list("labels"), vec!["bug", "ui"]);
        assert!(params.require_str("missing").is_err());
    }

    #[test]
    fn test_definition_default_parameters() {
        let def: ToolDefinition =
            serde_json::from_str(r#"{"name": "ping", "description": "Ping"}"#).unwrap();
        assert_eq!(def.parameters["type"], "object");
    }
}
