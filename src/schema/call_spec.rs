//! Call specification derivation.

use super::Schema;
use crate::error::{Error, ErrorContext};
use crate::types::tool::{FunctionDefinition, ToolDefinition};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

static NAME_RULE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z0-9_]{1,64}$").expect("tool name pattern is a valid regex")
});

/// Root keys that describe the document rather than the arguments.
const DOCUMENT_KEYS: [&str; 3] = ["$schema", "title", "$id"];

/// Machine-readable description of a tool, handed to the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallSpec {
    pub name: String,
    pub description: String,
    /// JSON-Schema object for the call arguments
    pub parameters: Value,
}

impl CallSpec {
    /// Provider-neutral `{"type": "function", "function": {...}}` definition.
    pub fn to_tool_definition(&self) -> ToolDefinition {
        ToolDefinition {
            tool_type: "function".to_string(),
            function: FunctionDefinition {
                name: self.name.clone(),
                description: Some(self.description.clone()),
                parameters: Some(self.parameters.clone()),
            },
        }
    }
}

/// Check a tool name against `[A-Za-z0-9_]{1,64}`.
pub fn validate_name(name: &str) -> crate::Result<()> {
    if NAME_RULE.is_match(name) {
        Ok(())
    } else {
        Err(Error::schema_with_context(
            format!("invalid tool name '{}': expected [A-Za-z0-9_]{{1,64}}", name),
            ErrorContext::new()
                .with_field_path("name")
                .with_source("call_spec"),
        ))
    }
}

/// Derive the call specification for a schema-backed tool.
///
/// Pure and deterministic: the same inputs always render byte-identical
/// output. Fails when the schema root is not an object of fields, since call
/// arguments are always a JSON object. An empty `description` falls back to
/// the schema's own description.
pub fn to_call_spec(
    name: impl Into<String>,
    description: impl Into<String>,
    schema: &Schema,
) -> crate::Result<CallSpec> {
    let name = name.into();
    validate_name(&name)?;

    if !schema.is_object_root() {
        return Err(Error::schema_with_context(
            "call arguments must be described by an object schema",
            ErrorContext::new()
                .with_details(format!("root type: {}", schema.document().get("type").unwrap_or(&Value::Null)))
                .with_source("call_spec"),
        ));
    }

    let mut parameters = schema.to_json_schema();
    let mut description = description.into();
    if let Some(map) = parameters.as_object_mut() {
        for key in DOCUMENT_KEYS {
            map.remove(key);
        }
        let own = map.remove("description");
        if description.trim().is_empty() {
            if let Some(Value::String(own)) = own {
                description = own;
            }
        }
        map.entry("properties")
            .or_insert_with(|| Value::Object(serde_json::Map::new()));
    }

    Ok(CallSpec {
        name,
        description,
        parameters,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::FieldType;
    use serde_json::json;

    fn weather_schema() -> Schema {
        Schema::builder()
            .title("WeatherArgs")
            .description("Arguments for the weather lookup")
            .required("city", FieldType::String, "City name")
            .optional("unit", FieldType::Enum(vec!["c".into(), "f".into()]), "Unit")
            .build()
    }

    #[test]
    fn test_call_spec_shape() {
        let spec = to_call_spec("get_weather", "Current weather", &weather_schema()).unwrap();
        assert_eq!(spec.name, "get_weather");
        assert_eq!(spec.description, "Current weather");
        assert_eq!(spec.parameters["type"], "object");
        assert_eq!(spec.parameters["required"], json!(["city"]));
        assert_eq!(spec.parameters["properties"]["city"]["description"], "City name");
        assert!(spec.parameters.get("title").is_none());
        assert!(spec.parameters.get("description").is_none());
    }

    #[test]
    fn test_empty_description_uses_schema_description() {
        let spec = to_call_spec("get_weather", "", &weather_schema()).unwrap();
        assert_eq!(spec.description, "Arguments for the weather lookup");
    }

    #[test]
    fn test_call_spec_is_deterministic() {
        let a = to_call_spec("get_weather", "d", &weather_schema()).unwrap();
        let b = to_call_spec("get_weather", "d", &weather_schema()).unwrap();
        assert_eq!(
            serde_json::to_string(&a).unwrap(),
            serde_json::to_string(&b).unwrap()
        );
    }

    #[test]
    fn test_rejects_non_object_root() {
        let schema = Schema::from_json(json!({"type": "array", "items": {"type": "string"}}));
        let err = to_call_spec("list", "d", &schema).unwrap_err();
        assert!(matches!(err, Error::Schema { .. }));
    }

    #[test]
    fn test_rejects_bad_names() {
        let schema = weather_schema();
        assert!(to_call_spec("", "d", &schema).is_err());
        assert!(to_call_spec("get-weather", "d", &schema).is_err());
        assert!(to_call_spec("a".repeat(65), "d", &schema).is_err());
        assert!(to_call_spec("a".repeat(64), "d", &schema).is_ok());
    }

    #[test]
    fn test_tool_definition_wire_form() {
        let spec = to_call_spec("get_weather", "Current weather", &weather_schema()).unwrap();
        let def = serde_json::to_value(spec.to_tool_definition()).unwrap();
        assert_eq!(def["type"], "function");
        assert_eq!(def["function"]["name"], "get_weather");
        assert_eq!(def["function"]["parameters"]["type"], "object");
    }
}
