//! A small evaluator for the JSON-Schema subset used by tool descriptors.
//!
//! Supported keywords: `type` (single or list), `required`, `properties`,
//! `additionalProperties: false`, `enum`, `pattern`, `minLength`/`maxLength`,
//! `minimum`/`maximum`/`exclusiveMinimum`/`exclusiveMaximum`, `items`,
//! `minItems`/`maxItems`, and local `$ref`s of the form `#/$defs/<name>`.
//! Other keywords (`default`, `description`, `format`, ...) are ignored.

use regex::Regex;
use serde_json::{Map, Value};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{field}: {message}")]
pub struct ValidationError {
    /// Dotted path of the offending field, e.g. `dataRef.type` or `scopes[1]`.
    pub field: String,
    pub message: String,
}

impl ValidationError {
    pub fn new(field: &str, message: impl Into<String>) -> Self {
        Self {
            field: if field.is_empty() { "arguments".to_string() } else { field.to_string() },
            message: message.into(),
        }
    }
}

/// Validate `value` against `schema`. The first violation wins.
pub fn validate(schema: &Value, value: &Value) -> Result<(), ValidationError> {
    Validator { root: schema }.check(schema, value, "")
}

/// Schema that accepts everything.
static ANY: Value = Value::Bool(true);

struct Validator<'a> {
    root: &'a Value,
}

impl<'a> Validator<'a> {
    fn resolve(&self, schema: &'a Value) -> &'a Value {
        let Some(reference) = schema.get("$ref").and_then(|r| r.as_str()) else {
            return schema;
        };
        // Unresolvable references impose no constraint.
        reference
            .strip_prefix("#/")
            .and_then(|pointer| self.root.pointer(&format!("/{pointer}")))
            .unwrap_or(&ANY)
    }

    fn check(&self, schema: &'a Value, value: &Value, path: &str) -> Result<(), ValidationError> {
        let schema = self.resolve(schema);
        let Some(rules) = schema.as_object() else {
            return Ok(());
        };

        if let Some(expected) = rules.get("type") {
            check_type(expected, value, path)?;
        }

        if let Some(allowed) = rules.get("enum").and_then(|e| e.as_array()) {
            if !allowed.contains(value) {
                let options: Vec<String> = allowed.iter().map(|v| v.to_string()).collect();
                return Err(ValidationError::new(
                    path,
                    format!("value {value} is not one of [{}]", options.join(", ")),
                ));
            }
        }

        match value {
            Value::String(s) => check_string(rules, s, path)?,
            Value::Number(_) => check_number(rules, value, path)?,
            Value::Array(items) => self.check_array(rules, items, path)?,
            Value::Object(map) => self.check_object(rules, map, path)?,
            _ => {}
        }
        Ok(())
    }

    fn check_object(
        &self,
        rules: &'a Map<String, Value>,
        map: &Map<String, Value>,
        path: &str,
    ) -> Result<(), ValidationError> {
        if let Some(required) = rules.get("required").and_then(|r| r.as_array()) {
            for field in required.iter().filter_map(|f| f.as_str()) {
                if !map.contains_key(field) || map[field].is_null() {
                    return Err(ValidationError::new(
                        &join(path, field),
                        "required field is missing",
                    ));
                }
            }
        }

        let properties = rules.get("properties").and_then(|p| p.as_object());
        for (key, child) in map {
            match properties.and_then(|p| p.get(key)) {
                Some(child_schema) => self.check(child_schema, child, &join(path, key))?,
                None if rules.get("additionalProperties") == Some(&Value::Bool(false)) => {
                    return Err(ValidationError::new(&join(path, key), "unexpected field"));
                }
                None => {}
            }
        }
        Ok(())
    }

    fn check_array(
        &self,
        rules: &'a Map<String, Value>,
        items: &[Value],
        path: &str,
    ) -> Result<(), ValidationError> {
        if let Some(min) = rules.get("minItems").and_then(|m| m.as_u64()) {
            if (items.len() as u64) < min {
                return Err(ValidationError::new(path, format!("expected at least {min} items")));
            }
        }
        if let Some(max) = rules.get("maxItems").and_then(|m| m.as_u64()) {
            if items.len() as u64 > max {
                return Err(ValidationError::new(path, format!("expected at most {max} items")));
            }
        }
        if let Some(item_schema) = rules.get("items") {
            for (i, item) in items.iter().enumerate() {
                self.check(item_schema, item, &format!("{path}[{i}]"))?;
            }
        }
        Ok(())
    }
}

fn join(path: &str, key: &str) -> String {
    if path.is_empty() {
        key.to_string()
    } else {
        format!("{path}.{key}")
    }
}

fn type_matches(name: &str, value: &Value) -> bool {
    match name {
        "string" => value.is_string(),
        "integer" => value.is_i64() || value.is_u64(),
        "number" => value.is_number(),
        "boolean" => value.is_boolean(),
        "object" => value.is_object(),
        "array" => value.is_array(),
        "null" => value.is_null(),
        _ => true,
    }
}

fn check_type(expected: &Value, value: &Value, path: &str) -> Result<(), ValidationError> {
    let names: Vec<&str> = match expected {
        Value::String(s) => vec![s.as_str()],
        Value::Array(list) => list.iter().filter_map(|v| v.as_str()).collect(),
        _ => return Ok(()),
    };
    if names.iter().any(|n| type_matches(n, value)) {
        return Ok(());
    }
    Err(ValidationError::new(
        path,
        format!("expected {}, got {}", names.join(" or "), json_type_name(value)),
    ))
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(n) if n.is_f64() => "number",
        Value::Number(_) => "integer",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn check_string(rules: &Map<String, Value>, s: &str, path: &str) -> Result<(), ValidationError> {
    let len = s.chars().count() as u64;
    if let Some(min) = rules.get("minLength").and_then(|m| m.as_u64()) {
        if len < min {
            return Err(ValidationError::new(path, format!("must be at least {min} characters")));
        }
    }
    if let Some(max) = rules.get("maxLength").and_then(|m| m.as_u64()) {
        if len > max {
            return Err(ValidationError::new(path, format!("must be at most {max} characters")));
        }
    }
    if let Some(pattern) = rules.get("pattern").and_then(|p| p.as_str()) {
        let re = Regex::new(pattern)
            .map_err(|e| ValidationError::new(path, format!("schema pattern is invalid: {e}")))?;
        if !re.is_match(s) {
            return Err(ValidationError::new(path, format!("does not match pattern {pattern}")));
        }
    }
    Ok(())
}

fn check_number(rules: &Map<String, Value>, value: &Value, path: &str) -> Result<(), ValidationError> {
    let Some(n) = value.as_f64() else {
        return Ok(());
    };
    let bound = |key: &str| rules.get(key).and_then(|b| b.as_f64());

    if let Some(min) = bound("minimum") {
        if n < min {
            return Err(ValidationError::new(path, format!("must be >= {min}")));
        }
    }
    if let Some(max) = bound("maximum") {
        if n > max {
            return Err(ValidationError::new(path, format!("must be <= {max}")));
        }
    }
    if let Some(min) = bound("exclusiveMinimum") {
        if n <= min {
            return Err(ValidationError::new(path, format!("must be > {min}")));
        }
    }
    if let Some(max) = bound("exclusiveMaximum") {
        if n >= max {
            return Err(ValidationError::new(path, format!("must be < {max}")));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn refactor_schema() -> Value {
        json!({
            "type": "object",
            "required": ["filePath", "functionName", "refactorType"],
            "properties": {
                "filePath": {"type": "string", "minLength": 1},
                "functionName": {"type": "string", "minLength": 1},
                "refactorType": {"type": "string", "enum": ["rename", "extract", "inline", "introduceParam"]},
                "range": {"$ref": "#/$defs/range"},
                "preview": {"type": "boolean"}
            },
            "$defs": {
                "range": {
                    "type": "object",
                    "required": ["startLine"],
                    "properties": {"startLine": {"type": "integer", "minimum": 1}}
                }
            }
        })
    }

    #[test]
    fn accepts_valid_arguments() {
        let args = json!({"filePath": "src/A.kt", "functionName": "load", "refactorType": "rename"});
        assert!(validate(&refactor_schema(), &args).is_ok());
    }

    #[test]
    fn missing_required_field_is_named() {
        let args = json!({"filePath": "src/A.kt", "refactorType": "rename"});
        let err = validate(&refactor_schema(), &args).unwrap_err();
        assert_eq!(err.field, "functionName");
        assert!(err.to_string().contains("functionName"));
    }

    #[test]
    fn enum_and_length_violations() {
        let bad_enum = json!({"filePath": "a", "functionName": "f", "refactorType": "explode"});
        let err = validate(&refactor_schema(), &bad_enum).unwrap_err();
        assert_eq!(err.field, "refactorType");

        let empty = json!({"filePath": "", "functionName": "f", "refactorType": "inline"});
        assert_eq!(validate(&refactor_schema(), &empty).unwrap_err().field, "filePath");
    }

    #[test]
    fn type_mismatch() {
        let args = json!({"filePath": "a", "functionName": "f", "refactorType": "inline", "preview": "yes"});
        let err = validate(&refactor_schema(), &args).unwrap_err();
        assert_eq!(err.field, "preview");
        assert!(err.message.contains("expected boolean"));
    }

    #[test]
    fn refs_resolve_into_defs() {
        let args = json!({
            "filePath": "a", "functionName": "f", "refactorType": "extract",
            "range": {"startLine": 0}
        });
        let err = validate(&refactor_schema(), &args).unwrap_err();
        assert_eq!(err.field, "range.startLine");

        let dangling = json!({"type": "object", "properties": {"x": {"$ref": "#/$defs/nope"}}});
        assert!(validate(&dangling, &json!({"x": 42})).is_ok());
    }

    #[test]
    fn patterns_are_searched() {
        let schema = json!({
            "type": "object",
            "properties": {"classType": {"type": "string", "pattern": "^(activity|fragment|class)$"}}
        });
        assert!(validate(&schema, &json!({"classType": "fragment"})).is_ok());
        let err = validate(&schema, &json!({"classType": "widget"})).unwrap_err();
        assert_eq!(err.field, "classType");
    }

    #[test]
    fn array_items_and_nested_required() {
        let schema = json!({
            "type": "object",
            "required": ["scopes", "dataRef"],
            "properties": {
                "scopes": {"type": "array", "items": {"type": "string", "enum": ["files", "database", "cloud"]}},
                "dataRef": {
                    "type": "object",
                    "required": ["type", "value"],
                    "properties": {"type": {"type": "string", "enum": ["inline", "path", "uri"]}}
                }
            }
        });
        let err = validate(&schema, &json!({"scopes": ["files", "moon"], "dataRef": {"type": "inline", "value": "x"}}))
            .unwrap_err();
        assert_eq!(err.field, "scopes[1]");

        let err = validate(&schema, &json!({"scopes": [], "dataRef": {"type": "inline"}})).unwrap_err();
        assert_eq!(err.field, "dataRef.value");
    }

    #[test]
    fn numeric_ranges() {
        let schema = json!({"type": "object", "properties": {
            "coverageGoal": {"type": "number", "minimum": 0, "maximum": 100},
            "maxFindings": {"type": "integer", "minimum": 1}
        }});
        assert!(validate(&schema, &json!({"coverageGoal": 80.5, "maxFindings": 3})).is_ok());
        assert_eq!(validate(&schema, &json!({"coverageGoal": 101})).unwrap_err().field, "coverageGoal");
        assert_eq!(validate(&schema, &json!({"maxFindings": 0})).unwrap_err().field, "maxFindings");
        assert_eq!(validate(&schema, &json!({"maxFindings": 2.5})).unwrap_err().field, "maxFindings");
    }

    #[test]
    fn closed_objects_reject_unknown_fields() {
        let schema = json!({"type": "object", "additionalProperties": false, "properties": {"a": {}}});
        assert!(validate(&schema, &json!({"a": 1})).is_ok());
        assert_eq!(validate(&schema, &json!({"b": 1})).unwrap_err().field, "b");
    }

    #[test]
    fn non_object_arguments_are_rejected() {
        let err = validate(&json!({"type": "object"}), &json!([1, 2])).unwrap_err();
        assert_eq!(err.field, "arguments");
    }
}
