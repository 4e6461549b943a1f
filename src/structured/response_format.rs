//! Response-format hint for structured output.
//!
//! Travels on [`ChatRequest::response_format`](crate::transport::ChatRequest)
//! so transports with a native JSON mode can enable it. The extractor never
//! relies on it: output is always located and validated locally.

use crate::schema::Schema;
use serde_json::{json, Value};

/// Output shape requested from the model.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum ResponseFormat {
    /// Free text; no hint is sent
    #[default]
    Text,
    /// Any JSON object
    JsonObject,
    /// JSON conforming to `schema`
    JsonSchema {
        name: String,
        schema: Value,
        strict: bool,
    },
}

impl ResponseFormat {
    pub fn json_schema(name: impl Into<String>, schema: Value, strict: bool) -> Self {
        ResponseFormat::JsonSchema {
            name: name.into(),
            schema,
            strict,
        }
    }

    /// Non-strict schema hint named after the schema title.
    ///
    /// Providers only accept `[A-Za-z0-9_-]` names; anything else falls back
    /// to `"response"`.
    ///
    /// ```
    /// use ai_fncall::schema::{FieldType, Schema};
    /// use ai_fncall::structured::ResponseFormat;
    ///
    /// let schema = Schema::builder()
    ///     .title("Stats")
    ///     .required("median", FieldType::Number, "Median")
    ///     .build();
    /// let hint = ResponseFormat::for_schema(&schema).to_openai().unwrap();
    /// assert_eq!(hint["json_schema"]["name"], "Stats");
    /// ```
    pub fn for_schema(schema: &Schema) -> Self {
        let name = schema
            .document()
            .get("title")
            .and_then(Value::as_str)
            .filter(|t| !t.is_empty())
            .filter(|t| t.chars().all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-'))
            .unwrap_or("response");
        Self::json_schema(name, schema.to_json_schema(), false)
    }

    pub fn is_text(&self) -> bool {
        matches!(self, ResponseFormat::Text)
    }

    /// OpenAI `response_format` value; `None` for [`ResponseFormat::Text`].
    pub fn to_openai(&self) -> Option<Value> {
        match self {
            ResponseFormat::Text => None,
            ResponseFormat::JsonObject => Some(json!({"type": "json_object"})),
            ResponseFormat::JsonSchema {
                name,
                schema,
                strict,
            } => Some(json!({
                "type": "json_schema",
                "json_schema": {"name": name, "strict": strict, "schema": schema}
            })),
        }
    }
}
