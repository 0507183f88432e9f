//! JSON-Schema argument validator (component C).
//!
//! Supports the keyword subset tool input schemas actually use: `type`,
//! `properties`, `required`, `additionalProperties`, `items`, `enum`,
//! `minimum`/`maximum`/`minLength`/`maxLength`, `oneOf`. Unknown keywords are
//! ignored. Produces an ordered list of failures rather than failing fast, so
//! a caller can report everything wrong with one call.

use serde_json::Value;
use std::collections::HashSet;

#[derive(Debug, Clone, PartialEq)]
pub struct ValidationFailure {
    pub path: String,
    pub message: String,
}

/// Validates `value` against `schema`, rooted at `#root`. Returns an empty
/// vec on success. Calling this twice with the same inputs yields an
/// identical list (invariant 8) — the function has no side effects.
pub fn validate(schema: &Value, value: &Value) -> Vec<ValidationFailure> {
    let mut failures = Vec::new();
    validate_at(schema, value, "#root", &mut failures);
    failures
}

fn validate_at(schema: &Value, value: &Value, path: &str, failures: &mut Vec<ValidationFailure>) {
    let Some(schema_obj) = schema.as_object() else {
        return;
    };

    if let Some(variants) = schema_obj.get("oneOf").and_then(Value::as_array) {
        let matches_any = variants.iter().any(|variant| {
            let mut sub_failures = Vec::new();
            validate_at(variant, value, path, &mut sub_failures);
            sub_failures.is_empty()
        });
        if !matches_any {
            failures.push(ValidationFailure {
                path: path.to_string(),
                message: format!(
                    "Value `{}` does not match any schema in oneOf at path {path}",
                    compact(value)
                ),
            });
        }
        return;
    }

    if let Some(type_str) = schema_obj.get("type").and_then(Value::as_str) {
        if !matches_type(type_str, value) {
            failures.push(ValidationFailure {
                path: path.to_string(),
                message: format!(
                    "Value `{}` is not of type `{}` at path {path}",
                    compact(value),
                    type_label(type_str)
                ),
            });
            return;
        }
    }

    if let Some(allowed) = schema_obj.get("enum").and_then(Value::as_array) {
        if !allowed.contains(value) {
            failures.push(ValidationFailure {
                path: path.to_string(),
                message: format!(
                    "Value `{}` is not one of the allowed enum values at path {path}",
                    compact(value)
                ),
            });
        }
    }

    if let Some(n) = value.as_f64() {
        if let Some(min) = schema_obj.get("minimum").and_then(Value::as_f64) {
            if n < min {
                failures.push(ValidationFailure {
                    path: path.to_string(),
                    message: format!("Value `{}` is less than minimum {min} at path {path}", compact(value)),
                });
            }
        }
        if let Some(max) = schema_obj.get("maximum").and_then(Value::as_f64) {
            if n > max {
                failures.push(ValidationFailure {
                    path: path.to_string(),
                    message: format!("Value `{}` is greater than maximum {max} at path {path}", compact(value)),
                });
            }
        }
    }

    if let Some(s) = value.as_str() {
        if let Some(min_len) = schema_obj.get("minLength").and_then(Value::as_u64) {
            if (s.chars().count() as u64) < min_len {
                failures.push(ValidationFailure {
                    path: path.to_string(),
                    message: format!("Value `{}` is shorter than minLength {min_len} at path {path}", compact(value)),
                });
            }
        }
        if let Some(max_len) = schema_obj.get("maxLength").and_then(Value::as_u64) {
            if (s.chars().count() as u64) > max_len {
                failures.push(ValidationFailure {
                    path: path.to_string(),
                    message: format!("Value `{}` is longer than maxLength {max_len} at path {path}", compact(value)),
                });
            }
        }
    }

    match value {
        Value::Object(map) => {
            if let Some(required) = schema_obj.get("required").and_then(Value::as_array) {
                for name in required.iter().filter_map(Value::as_str) {
                    if !map.contains_key(name) {
                        failures.push(ValidationFailure {
                            path: path.to_string(),
                            message: format!("Required property \"{name}\" is missing at path {path}"),
                        });
                    }
                }
            }

            let mut known_properties = HashSet::new();
            if let Some(properties) = schema_obj.get("properties").and_then(Value::as_object) {
                for (key, subschema) in properties {
                    known_properties.insert(key.as_str());
                    if let Some(subvalue) = map.get(key) {
                        let subpath = format!("{path}[\"{key}\"]");
                        validate_at(subschema, subvalue, &subpath, failures);
                    }
                }
            }

            match schema_obj.get("additionalProperties") {
                Some(Value::Bool(false)) => {
                    for key in map.keys() {
                        if !known_properties.contains(key.as_str()) {
                            failures.push(ValidationFailure {
                                path: path.to_string(),
                                message: format!("Additional property \"{key}\" is not allowed at path {path}"),
                            });
                        }
                    }
                }
                Some(schema @ Value::Object(_)) => {
                    for (key, subvalue) in map {
                        if !known_properties.contains(key.as_str()) {
                            let subpath = format!("{path}[\"{key}\"]");
                            validate_at(schema, subvalue, &subpath, failures);
                        }
                    }
                }
                _ => {}
            }
        }
        Value::Array(items) => {
            if let Some(item_schema) = schema_obj.get("items") {
                for (index, item) in items.iter().enumerate() {
                    let subpath = format!("{path}[{index}]");
                    validate_at(item_schema, item, &subpath, failures);
                }
            }
        }
        _ => {}
    }
}

fn matches_type(type_name: &str, value: &Value) -> bool {
    match type_name {
        "object" => value.is_object(),
        "array" => value.is_array(),
        "string" => value.is_string(),
        "integer" => value.is_i64() || value.is_u64() || value.as_f64().is_some_and(|f| f.fract() == 0.0),
        "number" => value.is_number(),
        "boolean" => value.is_boolean(),
        "null" => value.is_null(),
        _ => true,
    }
}

fn type_label(type_name: &str) -> String {
    let mut chars = type_name.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}

fn compact(value: &Value) -> String {
    serde_json::to_string(value).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn echo_schema() -> Value {
        json!({
            "type": "object",
            "properties": {"message": {"type": "string"}},
            "required": ["message"]
        })
    }

    #[test]
    fn missing_required_property_matches_exact_wording() {
        let failures = validate(&echo_schema(), &json!({}));
        assert_eq!(failures.len(), 1);
        assert_eq!(
            failures[0].message,
            "Required property \"message\" is missing at path #root"
        );
    }

    #[test]
    fn wrong_type_matches_exact_wording() {
        let failures = validate(&echo_schema(), &json!({"message": 123}));
        assert_eq!(failures.len(), 1);
        assert_eq!(
            failures[0].message,
            "Value `123` is not of type `String` at path #root[\"message\"]"
        );
    }

    #[test]
    fn validation_is_idempotent() {
        let value = json!({"message": 123});
        assert_eq!(validate(&echo_schema(), &value), validate(&echo_schema(), &value));
    }

    #[test]
    fn valid_value_produces_no_failures() {
        assert!(validate(&echo_schema(), &json!({"message": "hi"})).is_empty());
    }

    #[test]
    fn additional_properties_false_rejects_unknown_keys() {
        let schema = json!({
            "type": "object",
            "properties": {"a": {"type": "string"}},
            "additionalProperties": false
        });
        let failures = validate(&schema, &json!({"a": "x", "b": "y"}));
        assert_eq!(failures.len(), 1);
        assert!(failures[0].message.contains("\"b\""));
    }

    #[test]
    fn array_items_validated_with_indexed_path() {
        let schema = json!({"type": "array", "items": {"type": "integer"}});
        let failures = validate(&schema, &json!([1, "two", 3]));
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].path, "#root[1]");
    }
}
