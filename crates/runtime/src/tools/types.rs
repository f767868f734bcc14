//! Tool-related conversions.

use std::collections::HashMap;

use serde_json::{Map, Value, json};

use super::ToolError;
use crate::model::ToolSpec;

/// Key-value arguments for a tool invocation.
///
/// `null` means "no arguments"; anything other than an object is rejected.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ToolArguments(pub Option<Map<String, Value>>);

impl TryFrom<Value> for ToolArguments {
    type Error = ToolError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        match value {
            Value::Null => Ok(Self(None)),
            Value::Object(map) => Ok(Self(Some(map))),
            other => Err(ToolError::InvalidInput(format!(
                "tool arguments must be an object, got {other}"
            ))),
        }
    }
}

impl ToolArguments {
    /// Insert a key, creating the argument map if needed.
    pub fn insert(&mut self, key: impl Into<String>, value: Value) {
        self.0
            .get_or_insert_with(Map::new)
            .insert(key.into(), value);
    }

    /// Arguments as prompt template variables: strings pass through, other
    /// values are rendered as JSON.
    pub fn to_prompt_arguments(&self) -> Option<HashMap<String, String>> {
        self.0.as_ref().map(|map| {
            map.iter()
                .map(|(key, value)| {
                    let rendered = match value {
                        Value::String(s) => s.clone(),
                        other => other.to_string(),
                    };
                    (key.clone(), rendered)
                })
                .collect()
        })
    }

    pub fn into_value(self) -> Option<Value> {
        self.0.map(Value::Object)
    }
}

impl From<mcp::Tool> for ToolSpec {
    fn from(tool: mcp::Tool) -> Self {
        // The completion API only accepts object schemas.
        let schema = match tool.input_schema {
            Value::Object(map) if map.get("type").and_then(Value::as_str) == Some("object") => {
                Value::Object(map)
            }
            _ => json!({"type": "object", "properties": {}}),
        };

        Self {
            name: tool.name,
            description: tool.description.unwrap_or_default(),
            schema,
        }
    }
}
