//! Session value model
//!
//! The shapes a PHP session can hold after `php_serialize`: scalars, lists and
//! ordered associative arrays.

use indexmap::IndexMap;
use serde::Serialize;

/// Decoded session: field name to value, in the order PHP wrote them
pub type SessionRecord = IndexMap<String, PhpValue>;

/// A single PHP value
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum PhpValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    /// Array with keys exactly `0..n-1` in order (a PHP list)
    Sequence(Vec<PhpValue>),
    /// Any other array, or an object with its class name dropped
    Map(IndexMap<String, PhpValue>),
}

impl PhpValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            PhpValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            PhpValue::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            PhpValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn is_string(&self) -> bool {
        matches!(self, PhpValue::String(_))
    }

    /// Name of the variant, for logs and error messages
    pub fn kind(&self) -> &'static str {
        match self {
            PhpValue::Null => "null",
            PhpValue::Bool(_) => "bool",
            PhpValue::Int(_) => "int",
            PhpValue::Float(_) => "float",
            PhpValue::String(_) => "string",
            PhpValue::Sequence(_) => "sequence",
            PhpValue::Map(_) => "map",
        }
    }
}

impl From<&str> for PhpValue {
    fn from(value: &str) -> Self {
        PhpValue::String(value.to_string())
    }
}

impl From<String> for PhpValue {
    fn from(value: String) -> Self {
        PhpValue::String(value)
    }
}

impl From<i64> for PhpValue {
    fn from(value: i64) -> Self {
        PhpValue::Int(value)
    }
}

impl From<f64> for PhpValue {
    fn from(value: f64) -> Self {
        PhpValue::Float(value)
    }
}

impl From<bool> for PhpValue {
    fn from(value: bool) -> Self {
        PhpValue::Bool(value)
    }
}

impl<T: Into<PhpValue>> From<Vec<T>> for PhpValue {
    fn from(values: Vec<T>) -> Self {
        PhpValue::Sequence(values.into_iter().map(Into::into).collect())
    }
}

impl From<serde_json::Value> for PhpValue {
    fn from(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => PhpValue::Null,
            serde_json::Value::Bool(b) => PhpValue::Bool(b),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => PhpValue::Int(i),
                None => PhpValue::Float(n.as_f64().unwrap_or(f64::NAN)),
            },
            serde_json::Value::String(s) => PhpValue::String(s),
            serde_json::Value::Array(items) => {
                PhpValue::Sequence(items.into_iter().map(PhpValue::from).collect())
            }
            serde_json::Value::Object(fields) => PhpValue::Map(
                fields
                    .into_iter()
                    .map(|(k, v)| (k, PhpValue::from(v)))
                    .collect(),
            ),
        }
    }
}

impl From<&PhpValue> for serde_json::Value {
    fn from(value: &PhpValue) -> Self {
        match value {
            PhpValue::Null => serde_json::Value::Null,
            PhpValue::Bool(b) => serde_json::Value::Bool(*b),
            PhpValue::Int(i) => serde_json::Value::from(*i),
            // Non-finite floats have no JSON form
            PhpValue::Float(f) => serde_json::Number::from_f64(*f)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            PhpValue::String(s) => serde_json::Value::String(s.clone()),
            PhpValue::Sequence(items) => {
                serde_json::Value::Array(items.iter().map(serde_json::Value::from).collect())
            }
            PhpValue::Map(fields) => serde_json::Value::Object(
                fields
                    .iter()
                    .map(|(k, v)| (k.clone(), serde_json::Value::from(v)))
                    .collect(),
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_from_json_keeps_integers() {
        let value = PhpValue::from(json!({"b": 1, "a": [true, 2.5, null]}));
        let PhpValue::Map(fields) = value else {
            panic!("Expected map");
        };
        assert_eq!(fields.len(), 2);
        assert_eq!(fields["b"], PhpValue::Int(1));
        assert_eq!(
            fields["a"],
            PhpValue::Sequence(vec![
                PhpValue::Bool(true),
                PhpValue::Float(2.5),
                PhpValue::Null
            ])
        );
    }

    #[test]
    fn test_to_json_maps_non_finite_float_to_null() {
        assert_eq!(
            serde_json::Value::from(&PhpValue::Float(f64::INFINITY)),
            serde_json::Value::Null
        );
    }

    #[test]
    fn test_serialize_is_untagged() {
        let value = PhpValue::from(vec!["a", "b"]);
        assert_eq!(serde_json::to_string(&value).unwrap(), r#"["a","b"]"#);
    }
}
