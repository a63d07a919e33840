//! Typed access to tool call arguments.

use crate::error::ParleyError;

/// Wrapper around tool call arguments providing typed extraction.
#[derive(Debug, Clone)]
pub struct ToolArguments {
    value: serde_json::Value,
}

impl ToolArguments {
    /// Wrap raw arguments. Providers sometimes send the object as a JSON
    /// string; those are parsed here so handlers always see an object.
    pub fn new(value: serde_json::Value) -> Self {
        let value = match value {
            serde_json::Value::String(raw) => {
                let trimmed = raw.trim();
                if trimmed.is_empty() {
                    serde_json::json!({})
                } else {
                    serde_json::from_str(trimmed).unwrap_or(serde_json::Value::String(raw))
                }
            }
            serde_json::Value::Null => serde_json::json!({}),
            other => other,
        };
        Self { value }
    }

    /// Get the raw JSON value.
    pub fn raw(&self) -> &serde_json::Value {
        &self.value
    }

    /// Get a string argument by key.
    pub fn get_str(&self, key: &str) -> Result<&str, ParleyError> {
        self.value
            .get(key)
            .and_then(|v| v.as_str())
            .ok_or_else(|| ParleyError::InvalidArgument(format!("Missing string argument: {key}")))
    }

    /// Get an optional string argument.
    pub fn get_str_opt(&self, key: &str) -> Option<&str> {
        self.value.get(key).and_then(|v| v.as_str())
    }

    /// Get an optional integer argument.
    pub fn get_u64_opt(&self, key: &str) -> Option<u64> {
        self.value.get(key).and_then(|v| v.as_u64())
    }

    /// Deserialize the entire arguments into a typed struct.
    pub fn deserialize<T: serde::de::DeserializeOwned>(&self) -> Result<T, ParleyError> {
        serde_json::from_value(self.value.clone()).map_err(|e| {
            ParleyError::InvalidArgument(format!("Failed to deserialize arguments: {e}"))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn string_encoded_arguments_are_parsed() {
        let args = ToolArguments::new(json!("{\"path\": \"a.txt\"}"));
        assert_eq!(args.get_str("path").unwrap(), "a.txt");
    }

    #[test]
    fn null_and_blank_become_empty_object() {
        assert_eq!(ToolArguments::new(serde_json::Value::Null).raw(), &json!({}));
        assert_eq!(ToolArguments::new(json!("  ")).raw(), &json!({}));
    }

    #[test]
    fn missing_key_is_invalid_argument() {
        let err = ToolArguments::new(json!({})).get_str("path").unwrap_err();
        assert!(matches!(err, ParleyError::InvalidArgument(_)));
    }

    #[test]
    fn deserializes_typed_struct() {
        #[derive(serde::Deserialize)]
        struct Args {
            path: String,
            limit: Option<u64>,
        }
        let args: Args = ToolArguments::new(json!({"path": "x", "limit": 3}))
            .deserialize()
            .unwrap();
        assert_eq!(args.path, "x");
        assert_eq!(args.limit, Some(3));
    }
}
