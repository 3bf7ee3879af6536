//! Core types shared by attributes, links and proxies.

use serde_json::Value;

/// Prefix reserved for special keys such as `$uri`, `$ref` and `$date`.
pub const SENTINEL: char = '$';

/// Header carrying the total number of items for list responses.
pub const TOTAL_COUNT_HEADER: &str = "x-total-count";

/// Field holding the canonical URI of a resource instance.
pub const URI_KEY: &str = "$uri";

/// Returns the JSON type name for error messages.
pub fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// A primitive JSON Schema type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JsonType {
    Null,
    Boolean,
    Integer,
    Number,
    String,
    Array,
    Object,
}

impl JsonType {
    /// Parse a `type` keyword value.
    ///
    /// Returns `None` for unknown names (caller should error).
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "null" => Some(JsonType::Null),
            "boolean" => Some(JsonType::Boolean),
            "integer" => Some(JsonType::Integer),
            "number" => Some(JsonType::Number),
            "string" => Some(JsonType::String),
            "array" => Some(JsonType::Array),
            "object" => Some(JsonType::Object),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            JsonType::Null => "null",
            JsonType::Boolean => "boolean",
            JsonType::Integer => "integer",
            JsonType::Number => "number",
            JsonType::String => "string",
            JsonType::Array => "array",
            JsonType::Object => "object",
        }
    }

    /// Whether `value` is an instance of this type.
    pub fn matches(&self, value: &Value) -> bool {
        match (self, value) {
            (JsonType::Null, Value::Null)
            | (JsonType::Boolean, Value::Bool(_))
            | (JsonType::Number, Value::Number(_))
            | (JsonType::String, Value::String(_))
            | (JsonType::Array, Value::Array(_))
            | (JsonType::Object, Value::Object(_)) => true,
            (JsonType::Integer, Value::Number(n)) => {
                n.is_i64() || n.is_u64() || n.as_f64().is_some_and(|f| f.fract() == 0.0)
            }
            _ => false,
        }
    }
}

/// Read the `type` keyword of a schema fragment.
///
/// Accepts a single name or an array of names and defaults to `object`.
pub fn types_for(fragment: &Value) -> Vec<JsonType> {
    match fragment.get("type") {
        Some(Value::String(s)) => JsonType::parse(s).into_iter().collect(),
        Some(Value::Array(names)) => names
            .iter()
            .filter_map(|n| n.as_str().and_then(JsonType::parse))
            .collect(),
        _ => vec![JsonType::Object],
    }
}

/// Shape of the value a link returns, fixed when the link is built.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReturnShape {
    Void,
    Object,
    List,
}

impl ReturnShape {
    /// Classify a `targetSchema` fragment.
    pub fn from_target_schema(target: Option<&Value>) -> Self {
        let Some(target) = target.filter(|t| t.as_object().is_some_and(|m| !m.is_empty())) else {
            return ReturnShape::Void;
        };
        if target.get("type").is_some() {
            return match types_for(target).first() {
                Some(JsonType::Array) => ReturnShape::List,
                Some(JsonType::Null) => ReturnShape::Void,
                _ => ReturnShape::Object,
            };
        }
        ReturnShape::Object
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ReturnShape::Void => "void",
            ReturnShape::Object => "object",
            ReturnShape::List => "list",
        }
    }
}

/// Whether a fragment is the self reference `{"$ref": "#"}`.
pub fn is_self_ref(fragment: &Value) -> bool {
    fragment.get("$ref").and_then(Value::as_str) == Some("#")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn types_default_to_object() {
        assert_eq!(types_for(&json!({})), vec![JsonType::Object]);
        assert_eq!(
            types_for(&json!({ "type": ["string", "null"] })),
            vec![JsonType::String, JsonType::Null]
        );
    }

    #[test]
    fn integer_matches_integral_numbers_only() {
        assert!(JsonType::Integer.matches(&json!(5)));
        assert!(JsonType::Integer.matches(&json!(5.0)));
        assert!(!JsonType::Integer.matches(&json!(5.5)));
        assert!(!JsonType::Integer.matches(&json!("5")));
        assert!(JsonType::Number.matches(&json!(5.5)));
    }

    #[test]
    fn return_shape_from_target_schema() {
        assert_eq!(ReturnShape::from_target_schema(None), ReturnShape::Void);
        assert_eq!(
            ReturnShape::from_target_schema(Some(&json!({}))),
            ReturnShape::Void
        );
        assert_eq!(
            ReturnShape::from_target_schema(Some(&json!({ "$ref": "#" }))),
            ReturnShape::Object
        );
        assert_eq!(
            ReturnShape::from_target_schema(Some(&json!({ "type": "array", "items": {} }))),
            ReturnShape::List
        );
        assert_eq!(
            ReturnShape::from_target_schema(Some(&json!({ "type": "null" }))),
            ReturnShape::Void
        );
        assert_eq!(
            ReturnShape::from_target_schema(Some(&json!({ "type": "integer" }))),
            ReturnShape::Object
        );
    }
}
