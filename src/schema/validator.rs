//! Validate-and-coerce for JSON-Schema documents.
//!
//! Supports:
//! - Type validation (single types and type lists, `nullable`)
//! - Field constraints (minLength, maxLength, pattern, minimum, maximum, enum, const)
//! - Array constraints (minItems, maxItems, items)
//! - Nested validation (objects, arrays, local `$ref`, allOf, anyOf, oneOf)
//! - Additional properties control
//!
//! Coercions applied where the schema allows them: numeric strings become
//! numbers, integral floats become integers, `"true"`/`"false"` become booleans,
//! and `null` for an optional property that does not accept null is dropped.
//! Coercion is idempotent, so validating an already validated value yields the
//! same value.

use crate::structured::{ValidationFailure, ValidationIssue};
use regex::Regex;
use serde_json::{Map, Number, Value};

const MAX_DEPTH: usize = 128;

/// Validator bound to one root document (for `$ref` resolution).
pub struct SchemaValidator<'a> {
    root: &'a Value,
    /// Whether objects reject unknown properties when the schema is silent
    strict: bool,
}

impl<'a> SchemaValidator<'a> {
    pub fn new(root: &'a Value, strict: bool) -> Self {
        Self { root, strict }
    }

    pub fn strict(root: &'a Value) -> Self {
        Self::new(root, true)
    }

    pub fn lenient(root: &'a Value) -> Self {
        Self::new(root, false)
    }

    /// Validate `data` against the root document.
    pub fn validate(&self, data: &Value) -> Result<Value, ValidationFailure> {
        let mut failure = ValidationFailure::new();
        let coerced = self.check(data, self.root, "", &mut failure, 0);
        if failure.is_empty() {
            Ok(coerced)
        } else {
            Err(failure)
        }
    }

    fn check(
        &self,
        data: &Value,
        schema: &Value,
        path: &str,
        failure: &mut ValidationFailure,
        depth: usize,
    ) -> Value {
        if depth > MAX_DEPTH {
            failure.push(ValidationIssue::new(path, "Schema nesting too deep"));
            return data.clone();
        }

        let schema = match schema {
            Value::Bool(true) => return data.clone(),
            Value::Bool(false) => {
                failure.push(ValidationIssue::new(path, "No value is allowed here"));
                return data.clone();
            }
            Value::Object(map) => map,
            // Not a schema; accept anything
            _ => return data.clone(),
        };

        if let Some(reference) = schema.get("$ref").and_then(|r| r.as_str()) {
            return match self.resolve(reference) {
                Some(target) => self.check(data, target, path, failure, depth + 1),
                None => {
                    failure.push(ValidationIssue::new(
                        path,
                        format!("Unresolvable schema reference: {}", reference),
                    ));
                    data.clone()
                }
            };
        }

        let is_nullable = schema
            .get("nullable")
            .and_then(|n| n.as_bool())
            .unwrap_or(false);
        if is_nullable && data.is_null() {
            return Value::Null;
        }

        let mut value = data.clone();

        if let Some(all_of) = schema.get("allOf").and_then(|a| a.as_array()) {
            for sub in all_of {
                value = self.check(&value, sub, path, failure, depth + 1);
            }
        }

        for keyword in ["anyOf", "oneOf"] {
            if let Some(options) = schema.get(keyword).and_then(|a| a.as_array()) {
                match self.first_match(&value, options, path, depth) {
                    Some(matched) => value = matched,
                    None => {
                        failure.push(
                            ValidationIssue::new(path, "Value does not match any allowed schema")
                                .with_value(value.clone()),
                        );
                        return value;
                    }
                }
            }
        }

        let types = declared_types(schema.get("type"));
        if !types.is_empty() {
            match coerce_to_types(&value, &types) {
                Some(coerced) => value = coerced,
                None => {
                    failure.push(
                        ValidationIssue::new(
                            path,
                            format!(
                                "Expected type '{}', got '{}'",
                                types.join("' or '"),
                                type_name(&value)
                            ),
                        )
                        .with_value(value.clone()),
                    );
                    return value;
                }
            }
        }

        if let Some(expected) = schema.get("const") {
            if &value != expected {
                failure.push(ValidationIssue::new(
                    path,
                    format!("Value must equal {}", expected),
                ));
            }
        }

        if let Some(enum_values) = schema.get("enum").and_then(|e| e.as_array()) {
            self.validate_enum(&value, enum_values, path, failure);
        }

        match value {
            Value::String(s) => {
                self.validate_string(&s, schema, path, failure);
                Value::String(s)
            }
            Value::Number(n) => {
                if let Some(num) = n.as_f64() {
                    self.validate_number(num, schema, path, failure);
                }
                Value::Number(n)
            }
            Value::Array(mut items) => {
                self.validate_array(&mut items, schema, path, failure, depth);
                Value::Array(items)
            }
            Value::Object(obj) => {
                Value::Object(self.validate_object(obj, schema, path, failure, depth))
            }
            other => other,
        }
    }

    fn first_match(
        &self,
        data: &Value,
        options: &[Value],
        path: &str,
        depth: usize,
    ) -> Option<Value> {
        options.iter().find_map(|option| {
            let mut scratch = ValidationFailure::new();
            let coerced = self.check(data, option, path, &mut scratch, depth + 1);
            scratch.is_empty().then_some(coerced)
        })
    }

    /// Resolve a local reference such as `#/definitions/Point` or `#/$defs/Point`.
    fn resolve(&self, reference: &str) -> Option<&'a Value> {
        let pointer = reference.strip_prefix('#')?;
        if pointer.is_empty() {
            return Some(self.root);
        }
        self.root.pointer(pointer)
    }

    fn validate_string(
        &self,
        s: &str,
        schema: &Map<String, Value>,
        path: &str,
        failure: &mut ValidationFailure,
    ) {
        let length = s.chars().count();

        if let Some(min_length) = schema.get("minLength").and_then(|m| m.as_u64()) {
            if (length as u64) < min_length {
                failure.push(ValidationIssue::new(
                    path,
                    format!("String too short (minimum {} characters)", min_length),
                ));
            }
        }

        if let Some(max_length) = schema.get("maxLength").and_then(|m| m.as_u64()) {
            if (length as u64) > max_length {
                failure.push(ValidationIssue::new(
                    path,
                    format!("String too long (maximum {} characters)", max_length),
                ));
            }
        }

        if let Some(pattern) = schema.get("pattern").and_then(|p| p.as_str()) {
            // Invalid regex in the schema: skip the constraint
            if let Ok(re) = Regex::new(pattern) {
                if !re.is_match(s) {
                    failure.push(ValidationIssue::new(
                        path,
                        format!("String does not match pattern '{}'", pattern),
                    ));
                }
            }
        }
    }

    fn validate_number(
        &self,
        value: f64,
        schema: &Map<String, Value>,
        path: &str,
        failure: &mut ValidationFailure,
    ) {
        if let Some(minimum) = schema.get("minimum").and_then(|m| m.as_f64()) {
            if value < minimum {
                failure.push(ValidationIssue::new(
                    path,
                    format!("Value below minimum ({})", minimum),
                ));
            }
        }

        if let Some(maximum) = schema.get("maximum").and_then(|m| m.as_f64()) {
            if value > maximum {
                failure.push(ValidationIssue::new(
                    path,
                    format!("Value above maximum ({})", maximum),
                ));
            }
        }

        if let Some(bound) = schema.get("exclusiveMinimum").and_then(|m| m.as_f64()) {
            if value <= bound {
                failure.push(ValidationIssue::new(
                    path,
                    format!("Value must be greater than {}", bound),
                ));
            }
        }

        if let Some(bound) = schema.get("exclusiveMaximum").and_then(|m| m.as_f64()) {
            if value >= bound {
                failure.push(ValidationIssue::new(
                    path,
                    format!("Value must be less than {}", bound),
                ));
            }
        }
    }

    fn validate_array(
        &self,
        items: &mut [Value],
        schema: &Map<String, Value>,
        path: &str,
        failure: &mut ValidationFailure,
        depth: usize,
    ) {
        if let Some(min_items) = schema.get("minItems").and_then(|m| m.as_u64()) {
            if (items.len() as u64) < min_items {
                failure.push(ValidationIssue::new(
                    path,
                    format!("Array too short (minimum {} items)", min_items),
                ));
            }
        }

        if let Some(max_items) = schema.get("maxItems").and_then(|m| m.as_u64()) {
            if (items.len() as u64) > max_items {
                failure.push(ValidationIssue::new(
                    path,
                    format!("Array too long (maximum {} items)", max_items),
                ));
            }
        }

        match schema.get("items") {
            // Tuple form: one schema per position
            Some(Value::Array(per_position)) => {
                for (i, (item, item_schema)) in items.iter_mut().zip(per_position).enumerate() {
                    let item_path = format!("{}[{}]", path, i);
                    *item = self.check(item, item_schema, &item_path, failure, depth + 1);
                }
            }
            Some(item_schema) => {
                for (i, item) in items.iter_mut().enumerate() {
                    let item_path = format!("{}[{}]", path, i);
                    *item = self.check(item, item_schema, &item_path, failure, depth + 1);
                }
            }
            None => {}
        }
    }

    fn validate_object(
        &self,
        obj: Map<String, Value>,
        schema: &Map<String, Value>,
        path: &str,
        failure: &mut ValidationFailure,
        depth: usize,
    ) -> Map<String, Value> {
        let required: Vec<&str> = schema
            .get("required")
            .and_then(|r| r.as_array())
            .map(|arr| arr.iter().filter_map(|v| v.as_str()).collect())
            .unwrap_or_default();

        for prop_name in &required {
            if !obj.contains_key(*prop_name) {
                failure.push(ValidationIssue::new(
                    join_path(path, prop_name),
                    format!("Missing required property: {}", prop_name),
                ));
            }
        }

        let empty = Map::new();
        let properties = schema
            .get("properties")
            .and_then(|p| p.as_object())
            .unwrap_or(&empty);

        let additional = schema.get("additionalProperties");
        let additional_allowed = additional
            .and_then(|a| a.as_bool())
            .unwrap_or(!self.strict);
        let additional_schema = additional.filter(|a| !a.is_boolean());

        let mut out = Map::new();

        for (key, value) in obj {
            let prop_path = join_path(path, &key);
            if let Some(prop_schema) = properties.get(&key) {
                if value.is_null() && !required.contains(&key.as_str()) {
                    let mut scratch = ValidationFailure::new();
                    let coerced = self.check(&value, prop_schema, &prop_path, &mut scratch, depth + 1);
                    if scratch.is_empty() {
                        out.insert(key, coerced);
                    }
                    continue;
                }
                let coerced = self.check(&value, prop_schema, &prop_path, failure, depth + 1);
                out.insert(key, coerced);
            } else if let Some(extra_schema) = additional_schema {
                let coerced = self.check(&value, extra_schema, &prop_path, failure, depth + 1);
                out.insert(key, coerced);
            } else if additional_allowed {
                out.insert(key, value);
            } else {
                failure.push(ValidationIssue::new(
                    prop_path,
                    format!("Additional property not allowed: {}", key),
                ));
            }
        }

        out
    }

    fn validate_enum(
        &self,
        data: &Value,
        enum_values: &[Value],
        path: &str,
        failure: &mut ValidationFailure,
    ) {
        if !enum_values.contains(data) {
            let allowed: Vec<String> = enum_values
                .iter()
                .map(|v| match v {
                    Value::String(s) => format!("\"{}\"", s),
                    _ => v.to_string(),
                })
                .collect();
            failure.push(
                ValidationIssue::new(
                    path,
                    format!("Value not in allowed enum values: {}", allowed.join(", ")),
                )
                .with_value(data.clone()),
            );
        }
    }
}

fn join_path(path: &str, key: &str) -> String {
    if path.is_empty() {
        key.to_string()
    } else {
        format!("{}.{}", path, key)
    }
}

fn declared_types(type_decl: Option<&Value>) -> Vec<&str> {
    match type_decl {
        Some(Value::String(t)) => vec![t.as_str()],
        Some(Value::Array(ts)) => ts.iter().filter_map(|t| t.as_str()).collect(),
        _ => Vec::new(),
    }
}

fn type_name(data: &Value) -> &'static str {
    match data {
        Value::String(_) => "string",
        Value::Number(n) => {
            if n.is_i64() || n.is_u64() {
                "integer"
            } else {
                "number"
            }
        }
        Value::Bool(_) => "boolean",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
        Value::Null => "null",
    }
}

fn matches_type(data: &Value, expected: &str) -> bool {
    match expected {
        "string" => data.is_string(),
        "integer" => data.is_i64() || data.is_u64(),
        "number" => data.is_number(),
        "boolean" => data.is_boolean(),
        "array" => data.is_array(),
        "object" => data.is_object(),
        "null" => data.is_null(),
        _ => true, // Unknown type, accept anything
    }
}

/// Returns the value (possibly coerced) if it fits one of the types.
fn coerce_to_types(data: &Value, types: &[&str]) -> Option<Value> {
    if types.iter().any(|t| matches_type(data, t)) {
        return Some(data.clone());
    }
    types.iter().find_map(|t| coerce(data, t))
}

fn coerce(data: &Value, expected: &str) -> Option<Value> {
    match (expected, data) {
        ("integer", Value::Number(n)) => integral(n.as_f64()?),
        ("integer", Value::String(s)) => {
            let s = s.trim();
            if let Ok(i) = s.parse::<i64>() {
                return Some(Value::Number(i.into()));
            }
            integral(s.parse::<f64>().ok()?)
        }
        ("number", Value::String(s)) => {
            let s = s.trim();
            if let Ok(i) = s.parse::<i64>() {
                return Some(Value::Number(i.into()));
            }
            let f = s.parse::<f64>().ok()?;
            Number::from_f64(f).map(Value::Number)
        }
        ("boolean", Value::String(s)) => match s.as_str() {
            "true" => Some(Value::Bool(true)),
            "false" => Some(Value::Bool(false)),
            _ => None,
        },
        _ => None,
    }
}

fn integral(f: f64) -> Option<Value> {
    if f.is_finite() && f.fract() == 0.0 && f.abs() < 9.0e15 {
        Some(Value::Number((f as i64).into()))
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn validate(schema: &Value, data: Value) -> Result<Value, ValidationFailure> {
        SchemaValidator::lenient(schema).validate(&data)
    }

    #[test]
    fn test_string_length() {
        let schema = json!({"type": "string", "minLength": 3, "maxLength": 5});
        assert!(validate(&schema, json!("abcd")).is_ok());
        let err = validate(&schema, json!("ab")).unwrap_err();
        assert!(err.messages()[0].contains("too short"));
        let err = validate(&schema, json!("abcdef")).unwrap_err();
        assert!(err.messages()[0].contains("too long"));
    }

    #[test]
    fn test_numeric_string_coercion() {
        let schema = json!({"type": "number"});
        assert_eq!(validate(&schema, json!("70.5")).unwrap(), json!(70.5));
        assert_eq!(validate(&schema, json!(" 3 ")).unwrap(), json!(3));

        let schema = json!({"type": "integer"});
        assert_eq!(validate(&schema, json!("42")).unwrap(), json!(42));
        assert_eq!(validate(&schema, json!(4.0)).unwrap(), json!(4));
        assert!(validate(&schema, json!(4.5)).is_err());
        assert!(validate(&schema, json!("forty")).is_err());
    }

    #[test]
    fn test_strings_are_not_coerced_from_numbers() {
        let schema = json!({"type": "string"});
        let err = validate(&schema, json!(12)).unwrap_err();
        assert_eq!(err.messages(), vec!["$: Expected type 'string', got 'integer'"]);
    }

    #[test]
    fn test_boolean_coercion() {
        let schema = json!({"type": "boolean"});
        assert_eq!(validate(&schema, json!("true")).unwrap(), json!(true));
        assert!(validate(&schema, json!("yes")).is_err());
    }

    #[test]
    fn test_type_list_and_nullable() {
        let schema = json!({"type": ["integer", "null"]});
        assert_eq!(validate(&schema, Value::Null).unwrap(), Value::Null);
        assert_eq!(validate(&schema, json!("7")).unwrap(), json!(7));

        let schema = json!({"type": "string", "nullable": true});
        assert_eq!(validate(&schema, Value::Null).unwrap(), Value::Null);
    }

    #[test]
    fn test_required_and_nested_paths_in_order() {
        let schema = json!({
            "type": "object",
            "properties": {
                "user": {
                    "type": "object",
                    "properties": {"name": {"type": "string"}, "age": {"type": "integer"}},
                    "required": ["name"]
                },
                "tags": {"type": "array", "items": {"type": "string"}}
            },
            "required": ["user", "id"]
        });
        let err = validate(&schema, json!({"user": {"age": "x"}, "tags": ["a", 1]})).unwrap_err();
        assert_eq!(
            err.messages(),
            vec![
                "id: Missing required property: id",
                "tags[1]: Expected type 'string', got 'integer'",
                "user.name: Missing required property: name",
                "user.age: Expected type 'integer', got 'string'",
            ]
        );
    }

    #[test]
    fn test_additional_properties() {
        let schema = json!({
            "type": "object",
            "properties": {"name": {"type": "string"}},
            "additionalProperties": false
        });
        let err = validate(&schema, json!({"name": "a", "extra": 1})).unwrap_err();
        assert!(err.messages()[0].contains("Additional property not allowed"));

        let open = json!({"type": "object", "properties": {"name": {"type": "string"}}});
        assert!(validate(&open, json!({"name": "a", "extra": 1})).is_ok());
        assert!(SchemaValidator::strict(&open)
            .validate(&json!({"name": "a", "extra": 1}))
            .is_err());

        let typed = json!({"type": "object", "additionalProperties": {"type": "integer"}});
        assert_eq!(
            validate(&typed, json!({"n": "5"})).unwrap(),
            json!({"n": 5})
        );
    }

    #[test]
    fn test_optional_null_is_dropped() {
        let schema = json!({
            "type": "object",
            "properties": {"city": {"type": "string"}, "days": {"type": "integer"}},
            "required": ["city"]
        });
        assert_eq!(
            validate(&schema, json!({"city": "Oslo", "days": null})).unwrap(),
            json!({"city": "Oslo"})
        );
        assert!(validate(&schema, json!({"city": null})).is_err());
    }

    #[test]
    fn test_refs_and_any_of() {
        let schema = json!({
            "type": "object",
            "properties": {
                "origin": {"$ref": "#/definitions/Point"},
                "target": {"anyOf": [{"$ref": "#/definitions/Point"}, {"type": "null"}]}
            },
            "required": ["origin"],
            "definitions": {
                "Point": {
                    "type": "object",
                    "properties": {"x": {"type": "number"}, "y": {"type": "number"}},
                    "required": ["x", "y"]
                }
            }
        });
        let value = validate(&schema, json!({"origin": {"x": "1", "y": 2}, "target": null})).unwrap();
        assert_eq!(value, json!({"origin": {"x": 1, "y": 2}, "target": null}));

        let err = validate(&schema, json!({"origin": {"x": 1}})).unwrap_err();
        assert_eq!(err.messages(), vec!["origin.y: Missing required property: y"]);

        let broken = json!({"$ref": "#/definitions/Missing"});
        assert!(validate(&broken, json!(1)).is_err());
    }

    #[test]
    fn test_all_of_applies_each_schema() {
        let schema = json!({"allOf": [{"type": "integer"}, {"minimum": 10}]});
        assert_eq!(validate(&schema, json!("12")).unwrap(), json!(12));
        assert!(validate(&schema, json!("5")).is_err());
    }

    #[test]
    fn test_enum_and_const() {
        let schema = json!({"type": "string", "enum": ["c", "f"]});
        assert!(validate(&schema, json!("c")).is_ok());
        let err = validate(&schema, json!("k")).unwrap_err();
        assert!(err.messages()[0].contains("not in allowed enum"));

        let schema = json!({"const": "fixed"});
        assert!(validate(&schema, json!("other")).is_err());
    }

    #[test]
    fn test_revalidation_is_idempotent() {
        let schema = json!({
            "type": "object",
            "properties": {
                "n": {"type": "integer"},
                "f": {"type": "number"},
                "b": {"type": "boolean"},
                "o": {"type": "string"}
            },
            "required": ["n"]
        });
        let first = validate(&schema, json!({"n": "3", "f": "2.5", "b": "false", "o": null})).unwrap();
        let reparsed: Value = serde_json::from_str(&serde_json::to_string(&first).unwrap()).unwrap();
        let second = validate(&schema, reparsed).unwrap();
        assert_eq!(first, second);
    }
}
