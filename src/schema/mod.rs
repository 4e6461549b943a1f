//! Schema 适配层：将结构化 schema 转换为调用规格并校验模型参数。
//!
//! # Schema Adapter
//!
//! A [`Schema`] is a JSON-Schema document describing a value type. It can be
//! authored three ways:
//!
//! | Constructor | Source |
//! |-------------|--------|
//! | [`Schema::builder`] | Field DSL (name, type, description, optionality, nesting) |
//! | [`Schema::from_type`] | Derived from a Rust type via `schemars` |
//! | [`Schema::from_json`] | A hand-written JSON-Schema document |
//!
//! The rest of the crate only relies on two capabilities: rendering to a call
//! specification ([`to_call_spec`]) and validate-and-coerce ([`Schema::validate`]).
//!
//! ```rust
//! use ai_fncall::schema::{FieldType, Schema};
//! use serde_json::json;
//!
//! let schema = Schema::builder()
//!     .required("city", FieldType::String, "City name")
//!     .optional("days", FieldType::Integer, "Forecast length")
//!     .build();
//!
//! let value = schema.validate(&json!({"city": "Oslo", "days": "3"})).unwrap();
//! assert_eq!(value, json!({"city": "Oslo", "days": 3}));
//! ```

pub mod call_spec;
pub mod validator;

pub use call_spec::{to_call_spec, CallSpec};
pub use validator::SchemaValidator;

use crate::error::{Error, ErrorContext};
use crate::structured::ValidationFailure;
use serde_json::{json, Map, Value};

/// A structural description of a value type, held as a JSON-Schema document.
#[derive(Debug, Clone, PartialEq)]
pub struct Schema {
    document: Value,
}

impl Schema {
    /// Wrap an existing JSON-Schema document.
    pub fn from_json(document: Value) -> Self {
        Self { document }
    }

    /// Derive the schema of a Rust type.
    pub fn from_type<T: schemars::JsonSchema>() -> crate::Result<Self> {
        let root = schemars::schema_for!(T);
        let document = serde_json::to_value(&root).map_err(|e| {
            Error::schema_with_context(
                format!("failed to render schema: {}", e),
                ErrorContext::new().with_source(std::any::type_name::<T>()),
            )
        })?;
        Ok(Self { document })
    }

    pub fn builder() -> SchemaBuilder {
        SchemaBuilder::new()
    }

    /// Render the JSON-Schema document.
    pub fn to_json_schema(&self) -> Value {
        self.document.clone()
    }

    pub fn document(&self) -> &Value {
        &self.document
    }

    /// Whether the root is an object-of-fields shape.
    pub fn is_object_root(&self) -> bool {
        let doc = &self.document;
        let is_object = doc.get("type").and_then(|t| t.as_str()) == Some("object");
        let properties_ok = match doc.get("properties") {
            None => true,
            Some(p) => p.is_object(),
        };
        is_object && properties_ok
    }

    /// Validate `raw` and return the coerced value.
    ///
    /// Extra properties are accepted unless the schema sets
    /// `additionalProperties: false`.
    pub fn validate(&self, raw: &Value) -> Result<Value, ValidationFailure> {
        SchemaValidator::lenient(&self.document).validate(raw)
    }

    /// Validate and deserialize into `T`.
    ///
    /// A value that passes the schema but does not fit `T` is reported as a
    /// root-level validation failure.
    pub fn validate_into<T: serde::de::DeserializeOwned>(
        &self,
        raw: &Value,
    ) -> Result<T, ValidationFailure> {
        let value = self.validate(raw)?;
        serde_json::from_value(value)
            .map_err(|e| ValidationFailure::single("", format!("cannot decode value: {}", e)))
    }
}

impl From<Value> for Schema {
    fn from(document: Value) -> Self {
        Self::from_json(document)
    }
}

/// Type of a single field.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldType {
    String,
    Integer,
    Number,
    Boolean,
    /// String restricted to the listed values
    Enum(Vec<String>),
    Array(Box<FieldType>),
    /// Nested object; the schema must have an object root
    Object(Box<Schema>),
    /// Unconstrained JSON value
    Any,
}

impl FieldType {
    pub fn array_of(item: FieldType) -> Self {
        FieldType::Array(Box::new(item))
    }

    pub fn object(schema: Schema) -> Self {
        FieldType::Object(Box::new(schema))
    }

    fn to_json(&self, defs: &mut Definitions) -> Value {
        match self {
            FieldType::String => json!({"type": "string"}),
            FieldType::Integer => json!({"type": "integer"}),
            FieldType::Number => json!({"type": "number"}),
            FieldType::Boolean => json!({"type": "boolean"}),
            FieldType::Enum(values) => json!({"type": "string", "enum": values}),
            FieldType::Array(item) => json!({"type": "array", "items": item.to_json(defs)}),
            FieldType::Object(schema) => defs.hoist(schema.to_json_schema()),
            FieldType::Any => json!({}),
        }
    }
}

/// Definitions lifted out of nested schemas into the root document.
///
/// A nested document's local `$ref`s point at its own root; once embedded
/// they must point at the outer one. Same-named definitions are shared when
/// identical; otherwise the nested set is renamed with a numeric suffix.
#[derive(Debug, Default)]
struct Definitions {
    entries: Map<String, Value>,
}

impl Definitions {
    /// Move `doc`'s definitions into `self` and return it with refs rewritten.
    fn hoist(&mut self, mut doc: Value) -> Value {
        let mut nested: Vec<(&'static str, String, Value)> = Vec::new();
        if let Some(map) = doc.as_object_mut() {
            map.remove("$schema");
            for key in ["definitions", "$defs"] {
                if let Some(Value::Object(found)) = map.remove(key) {
                    nested.extend(found.into_iter().map(|(name, def)| (key, name, def)));
                }
            }
        }
        if nested.is_empty() {
            return doc;
        }

        let mut suffix = 1;
        loop {
            let renames: Vec<(String, String)> = nested
                .iter()
                .map(|(key, name, _)| {
                    let target = if suffix == 1 {
                        name.clone()
                    } else {
                        format!("{}_{}", name, suffix)
                    };
                    (format!("#/{}/{}", key, name), target)
                })
                .collect();
            let refs: Vec<(String, String)> = renames
                .iter()
                .map(|(from, target)| (from.clone(), format!("#/definitions/{}", target)))
                .collect();

            let placed: Vec<(String, Value)> = nested
                .iter()
                .zip(&renames)
                .map(|((_, _, def), (_, target))| {
                    let mut def = def.clone();
                    rewrite_refs(&mut def, &refs);
                    (target.clone(), def)
                })
                .collect();

            let fits = placed
                .iter()
                .all(|(name, def)| self.entries.get(name).map_or(true, |existing| existing == def));
            if fits {
                rewrite_refs(&mut doc, &refs);
                self.entries.extend(placed);
                return doc;
            }
            suffix += 1;
        }
    }

    fn into_value(self) -> Option<Value> {
        (!self.entries.is_empty()).then(|| Value::Object(self.entries))
    }
}

/// Point every local `$ref` in `value` that starts with a `from` at its `to`.
fn rewrite_refs(value: &mut Value, refs: &[(String, String)]) {
    match value {
        Value::Object(map) => {
            for (key, child) in map.iter_mut() {
                if key == "$ref" {
                    if let Value::String(reference) = child {
                        if let Some(rewritten) = rewrite_ref(reference, refs) {
                            *reference = rewritten;
                        }
                    }
                } else {
                    rewrite_refs(child, refs);
                }
            }
        }
        Value::Array(items) => items.iter_mut().for_each(|item| rewrite_refs(item, refs)),
        _ => {}
    }
}

fn rewrite_ref(reference: &str, refs: &[(String, String)]) -> Option<String> {
    refs.iter().find_map(|(from, to)| {
        let rest = reference.strip_prefix(from.as_str())?;
        (rest.is_empty() || rest.starts_with('/')).then(|| format!("{}{}", to, rest))
    })
}

/// One named field of an object schema.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldSchema {
    pub field_type: FieldType,
    pub description: Option<String>,
    pub optional: bool,
}

impl FieldSchema {
    pub fn new(field_type: FieldType) -> Self {
        Self {
            field_type,
            description: None,
            optional: false,
        }
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn optional(mut self) -> Self {
        self.optional = true;
        self
    }

    fn to_json(&self, defs: &mut Definitions) -> Value {
        let mut doc = self.field_type.to_json(defs);
        if let (Some(desc), Some(map)) = (&self.description, doc.as_object_mut()) {
            map.insert("description".into(), desc.clone().into());
        }
        doc
    }
}

/// Builder for object schemas with customization options.
#[derive(Debug, Clone)]
pub struct SchemaBuilder {
    title: Option<String>,
    description: Option<String>,
    fields: Vec<(String, FieldSchema)>,
    additional_properties: bool,
}

impl Default for SchemaBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl SchemaBuilder {
    pub fn new() -> Self {
        Self {
            title: None,
            description: None,
            fields: Vec::new(),
            additional_properties: false,
        }
    }

    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Add a field. A later field with the same name replaces the earlier one.
    pub fn field(mut self, name: impl Into<String>, field: FieldSchema) -> Self {
        let name = name.into();
        self.fields.retain(|(n, _)| n != &name);
        self.fields.push((name, field));
        self
    }

    pub fn required(
        self,
        name: impl Into<String>,
        field_type: FieldType,
        description: impl Into<String>,
    ) -> Self {
        self.field(name, FieldSchema::new(field_type).description(description))
    }

    pub fn optional(
        self,
        name: impl Into<String>,
        field_type: FieldType,
        description: impl Into<String>,
    ) -> Self {
        self.field(
            name,
            FieldSchema::new(field_type).description(description).optional(),
        )
    }

    pub fn additional_properties(mut self, allowed: bool) -> Self {
        self.additional_properties = allowed;
        self
    }

    pub fn build(self) -> Schema {
        let mut map = Map::new();
        map.insert("type".into(), json!("object"));

        let mut defs = Definitions::default();
        let mut properties = Map::new();
        let mut required = Vec::new();
        for (name, field) in &self.fields {
            properties.insert(name.clone(), field.to_json(&mut defs));
            if !field.optional {
                required.push(Value::String(name.clone()));
            }
        }
        map.insert("properties".into(), properties.into());

        if !required.is_empty() {
            map.insert("required".into(), required.into());
        }

        if !self.additional_properties {
            map.insert("additionalProperties".into(), json!(false));
        }

        if let Some(definitions) = defs.into_value() {
            map.insert("definitions".into(), definitions);
        }

        if let Some(title) = self.title {
            map.insert("title".into(), title.into());
        }
        if let Some(desc) = self.description {
            map.insert("description".into(), desc.into());
        }

        Schema::from_json(map.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_required_follows_declaration_order() {
        let schema = Schema::builder()
            .required("zeta", FieldType::String, "last letter")
            .optional("alpha", FieldType::Integer, "first letter")
            .required("beta", FieldType::Boolean, "second letter")
            .build();

        let doc = schema.to_json_schema();
        assert_eq!(doc["type"], "object");
        assert_eq!(doc["required"], json!(["zeta", "beta"]));
        assert_eq!(doc["properties"]["alpha"]["description"], "first letter");
        assert_eq!(doc["additionalProperties"], false);
    }

    #[test]
    fn test_builder_nested_object_and_array() {
        let point = Schema::builder()
            .required("x", FieldType::Number, "x")
            .required("y", FieldType::Number, "y")
            .build();
        let schema = Schema::builder()
            .required("path", FieldType::array_of(FieldType::object(point)), "points")
            .build();

        let doc = schema.to_json_schema();
        assert_eq!(doc["properties"]["path"]["type"], "array");
        assert_eq!(doc["properties"]["path"]["items"]["type"], "object");
        assert_eq!(
            doc["properties"]["path"]["items"]["required"],
            json!(["x", "y"])
        );
    }

    #[test]
    fn test_builder_replaces_duplicate_field() {
        let schema = Schema::builder()
            .required("a", FieldType::String, "first")
            .optional("a", FieldType::Integer, "second")
            .build();
        let doc = schema.to_json_schema();
        assert_eq!(doc["properties"]["a"]["type"], "integer");
        assert!(doc.get("required").is_none());
    }

    #[test]
    fn test_conflicting_definitions_are_renamed() {
        let point = |field: &str, kind: &str, defs_key: &str| {
            Schema::from_json(json!({
                "type": "object",
                "properties": {"at": {"$ref": format!("#/{}/Point", defs_key)}},
                defs_key: {"Point": {
                    "type": "object",
                    "properties": {field: {"type": kind}},
                    "required": [field]
                }}
            }))
        };
        let schema = Schema::builder()
            .required("grid", FieldType::object(point("x", "integer", "definitions")), "grid")
            .required("label", FieldType::object(point("name", "string", "$defs")), "label")
            .required("again", FieldType::object(point("x", "integer", "definitions")), "same")
            .build();

        let doc = schema.to_json_schema();
        assert_eq!(doc["properties"]["grid"]["properties"]["at"]["$ref"], "#/definitions/Point");
        assert_eq!(doc["properties"]["label"]["properties"]["at"]["$ref"], "#/definitions/Point_2");
        assert_eq!(doc["properties"]["again"]["properties"]["at"]["$ref"], "#/definitions/Point");
        assert_eq!(doc["definitions"].as_object().unwrap().len(), 2);

        let input = json!({
            "grid": {"at": {"x": 1}},
            "label": {"at": {"name": "n"}},
            "again": {"at": {"x": 2}}
        });
        assert_eq!(schema.validate(&input).unwrap(), input);
    }

    #[test]
    fn test_object_root_detection() {
        assert!(Schema::from_json(json!({"type": "object"})).is_object_root());
        assert!(!Schema::from_json(json!({"type": "string"})).is_object_root());
        assert!(!Schema::from_json(json!({"type": "object", "properties": []})).is_object_root());
    }

    #[derive(schemars::JsonSchema, serde::Deserialize, Debug, PartialEq)]
    struct Forecast {
        /// City name
        city: String,
        days: Option<u32>,
    }

    #[test]
    fn test_from_type_and_validate_into() {
        let schema = Schema::from_type::<Forecast>().unwrap();
        assert!(schema.is_object_root());
        assert_eq!(schema.document()["required"], json!(["city"]));

        let forecast: Forecast = schema.validate_into(&json!({"city": "Oslo"})).unwrap();
        assert_eq!(
            forecast,
            Forecast {
                city: "Oslo".into(),
                days: None
            }
        );
    }
}
