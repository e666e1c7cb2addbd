//! Parameter schema builders
//!
//! Tools carry their parameter schema as raw JSON so that plugin manifests
//! can pass anything through. These types are a typed way to write the
//! same JSON from Rust.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Parameter type (string, number, boolean, array, object)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParameterType {
    String,
    Number,
    Boolean,
    Array,
    Object,
}

/// Schema of a single parameter
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParameterSchema {
    #[serde(rename = "type")]
    pub param_type: ParameterType,
    pub description: String,
    #[serde(rename = "enum", skip_serializing_if = "Option::is_none")]
    pub allowed: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub items: Option<Box<ParameterSchema>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub properties: Option<BTreeMap<String, ParameterSchema>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub required: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<serde_json::Value>,
}

/// Top-level schema of a tool's parameter object
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolSchema {
    #[serde(rename = "type")]
    pub schema_type: String,
    pub properties: BTreeMap<String, ParameterSchema>,
    pub required: Vec<String>,
}

impl ParameterSchema {
    fn new(param_type: ParameterType, description: &str) -> Self {
        Self {
            param_type,
            description: description.to_string(),
            allowed: None,
            items: None,
            properties: None,
            required: None,
            default: None,
        }
    }

    pub fn string(description: &str) -> Self {
        Self::new(ParameterType::String, description)
    }

    pub fn number(description: &str) -> Self {
        Self::new(ParameterType::Number, description)
    }

    pub fn boolean(description: &str) -> Self {
        Self::new(ParameterType::Boolean, description)
    }

    /// Array whose elements follow `items`
    pub fn array(description: &str, items: ParameterSchema) -> Self {
        let mut schema = Self::new(ParameterType::Array, description);
        schema.items = Some(Box::new(items));
        schema
    }

    /// Restrict a string parameter to a fixed set of values
    pub fn one_of(mut self, values: &[&str]) -> Self {
        self.allowed = Some(values.iter().map(|v| v.to_string()).collect());
        self
    }

    pub fn with_default(mut self, value: serde_json::Value) -> Self {
        self.default = Some(value);
        self
    }
}

impl ToolSchema {
    /// Empty object schema
    pub fn object() -> Self {
        Self {
            schema_type: "object".to_string(),
            properties: BTreeMap::new(),
            required: vec![],
        }
    }

    /// Add an optional property
    pub fn property(mut self, name: &str, schema: ParameterSchema) -> Self {
        self.properties.insert(name.to_string(), schema);
        self
    }

    /// Add a required property
    pub fn required_property(mut self, name: &str, schema: ParameterSchema) -> Self {
        self.properties.insert(name.to_string(), schema);
        self.required.push(name.to_string());
        self
    }
}

impl From<ToolSchema> for serde_json::Value {
    fn from(schema: ToolSchema) -> Self {
        // Plain structs of strings and maps always serialize
        serde_json::to_value(schema).unwrap_or_else(|_| serde_json::json!({ "type": "object" }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_schema_shape() {
        let schema: serde_json::Value = ToolSchema::object()
            .required_property("repo", ParameterSchema::string("Repository"))
            .property(
                "state",
                ParameterSchema::string("PR state")
                    .one_of(&["open", "closed", "all"])
                    .with_default(json!("open")),
            )
            .into();

        assert_eq!(schema["type"], "object");
        assert_eq!(schema["required"], json!(["repo"]));
        assert_eq!(schema["properties"]["repo"]["type"], "string");
        assert_eq!(schema["properties"]["state"]["enum"], json!(["open", "closed", "all"]));
        assert_eq!(schema["properties"]["state"]["default"], "open");
        // Unset optionals are omitted
        assert!(schema["properties"]["repo"].get("enum").is_none());
    }

    #[test]
    fn test_array_items() {
        let schema = ParameterSchema::array("Labels", ParameterSchema::string("Label"));
        let value = serde_json::to_value(&schema).unwrap();

        assert_eq!(value["type"], "array");
        assert_eq!(value["items"]["type"], "string");
    }
}
