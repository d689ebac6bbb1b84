//! Check proposed tool arguments against the tool's JSON Schema.
//!
//! Covers the subset of JSON Schema the concierge tools declare: top-level
//! object type, required fields, per-property primitive types, and
//! `additionalProperties: false`.

use serde_json::Value;

/// Validate tool arguments against a JSON Schema.
///
/// Returns `Err(message)` describing the first violation found.
pub fn validate_arguments(args: &Value, schema: &Value) -> Result<(), String> {
    if schema.get("type").and_then(Value::as_str) == Some("object") && !args.is_object() {
        return Err(format!(
            "expected object arguments, got {}",
            json_type_name(args)
        ));
    }

    let Some(obj) = args.as_object() else {
        return Ok(());
    };

    if let Some(required) = schema.get("required").and_then(Value::as_array) {
        for name in required.iter().filter_map(Value::as_str) {
            if !obj.contains_key(name) {
                return Err(format!("missing required field '{name}'"));
            }
        }
    }

    let properties = schema.get("properties").and_then(Value::as_object);
    let closed = schema.get("additionalProperties") == Some(&Value::Bool(false));

    for (key, value) in obj {
        let prop_schema = properties.and_then(|p| p.get(key));
        match prop_schema {
            Some(prop) => {
                if let Some(expected) = prop.get("type") {
                    if !type_matches(value, expected) {
                        return Err(format!(
                            "field '{key}' expected type {}, got {}",
                            expected,
                            json_type_name(value)
                        ));
                    }
                }
            }
            None if closed => return Err(format!("unknown field '{key}'")),
            None => {}
        }
    }

    Ok(())
}

/// `type` may be a single name or a list such as `["string", "null"]`.
fn type_matches(value: &Value, expected: &Value) -> bool {
    match expected {
        Value::String(name) => value_matches_type(value, name),
        Value::Array(names) => names
            .iter()
            .filter_map(Value::as_str)
            .any(|name| value_matches_type(value, name)),
        _ => true,
    }
}

fn value_matches_type(value: &Value, expected: &str) -> bool {
    match expected {
        "string" => value.is_string(),
        "number" => value.is_number(),
        "integer" => value.is_i64() || value.is_u64(),
        "boolean" => value.is_boolean(),
        "object" => value.is_object(),
        "array" => value.is_array(),
        "null" => value.is_null(),
        _ => true,
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
