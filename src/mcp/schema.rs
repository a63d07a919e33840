//! MCP schema types.

use serde::{Deserialize, Serialize};

use crate::tools::AgentToolParameters;

/// Schema for a tool exposed by an MCP server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct McpToolSchema {
    pub name: String,
    pub description: Option<String>,
    pub input_schema: serde_json::Value,
}

impl McpToolSchema {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: Some(description.into()),
            input_schema: serde_json::json!({ "type": "object", "properties": {} }),
        }
    }

    /// Parameters in the shape providers expect. Servers may omit `type` or
    /// `properties`; both are filled in.
    pub fn parameters(&self) -> AgentToolParameters {
        let mut schema = match &self.input_schema {
            serde_json::Value::Object(map) => map.clone(),
            _ => serde_json::Map::new(),
        };
        schema
            .entry("type")
            .or_insert_with(|| serde_json::Value::String("object".into()));
        schema
            .entry("properties")
            .or_insert_with(|| serde_json::json!({}));
        AgentToolParameters::from_schema(serde_json::Value::Object(schema))
    }
}
