//! JSON sub-field handling
//!
//! The PHP application stores some session fields as JSON strings. After a
//! blob is decoded those strings are parsed opportunistically; a field that
//! does not parse is left as the original string and nothing is reported.

use crate::types::{PhpValue, SessionRecord};
use std::collections::BTreeSet;
use tracing::trace;

fn is_json_field(key: &str, known: &BTreeSet<String>, prefix: Option<&str>) -> bool {
    known.contains(key) || prefix.is_some_and(|p| !p.is_empty() && key.starts_with(p))
}

/// A session field that was parsed from a JSON string
#[derive(Debug, Clone, PartialEq)]
pub struct JsonField {
    /// Field name
    pub key: String,
    /// Stored JSON text
    raw: String,
    /// Value as handed to the caller
    parsed: PhpValue,
}

impl JsonField {
    /// The JSON text the field held when it was loaded
    pub fn raw(&self) -> &str {
        &self.raw
    }
}

/// Parse JSON-holding string fields in place.
///
/// A field qualifies when its name is in `known` or starts with `prefix`.
/// Returns the replaced fields together with their original JSON text.
pub fn decode_json_fields(
    record: &mut SessionRecord,
    known: &BTreeSet<String>,
    prefix: Option<&str>,
) -> Vec<JsonField> {
    let mut decoded = Vec::new();

    for (key, value) in record.iter_mut() {
        if !is_json_field(key, known, prefix) {
            continue;
        }
        let PhpValue::String(raw) = value else {
            continue;
        };

        match serde_json::from_str::<serde_json::Value>(raw) {
            Ok(parsed) => {
                let parsed = PhpValue::from(parsed);
                let raw = std::mem::replace(value, parsed.clone());
                if let PhpValue::String(raw) = raw {
                    decoded.push(JsonField {
                        key: key.clone(),
                        raw,
                        parsed,
                    });
                }
            }
            Err(e) => {
                trace!(field = %key, error = %e, "Field is not JSON, keeping raw string");
            }
        }
    }

    decoded
}

/// Turn fields previously parsed by [`decode_json_fields`] back into JSON strings.
///
/// An unchanged field gets its original JSON text back byte for byte. A
/// changed field is serialized again, unless the caller replaced it with a
/// plain string, which is stored as given. Removed fields stay removed.
pub fn encode_json_fields(record: &mut SessionRecord, fields: &[JsonField]) {
    for field in fields {
        let Some(value) = record.get_mut(field.key.as_str()) else {
            continue;
        };
        if *value == field.parsed {
            *value = PhpValue::String(field.raw.clone());
            continue;
        }
        if value.is_string() {
            continue;
        }
        let json = serde_json::Value::from(&*value).to_string();
        *value = PhpValue::String(json);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn known(fields: &[&str]) -> BTreeSet<String> {
        fields.iter().map(|f| f.to_string()).collect()
    }

    #[test]
    fn test_known_field_list_is_decoded() {
        let mut record = SessionRecord::new();
        record.insert("cart".to_string(), PhpValue::from(r#"["a","b"]"#));

        let decoded = decode_json_fields(&mut record, &known(&["cart"]), None);

        assert_eq!(decoded.len(), 1);
        assert_eq!(decoded[0].key, "cart");
        assert_eq!(decoded[0].raw(), r#"["a","b"]"#);
        assert_eq!(record["cart"], PhpValue::from(vec!["a", "b"]));
    }

    #[test]
    fn test_invalid_json_stays_string() {
        let mut record = SessionRecord::new();
        record.insert("cart".to_string(), PhpValue::from("not json"));

        let decoded = decode_json_fields(&mut record, &known(&["cart"]), None);

        assert!(decoded.is_empty());
        assert_eq!(record["cart"], PhpValue::from("not json"));
    }

    #[test]
    fn test_prefix_match_and_unrelated_fields() {
        let mut record = SessionRecord::new();
        record.insert("trace_list_home".to_string(), PhpValue::from(r#"{"n":1}"#));
        record.insert("plain".to_string(), PhpValue::from(r#"{"n":1}"#));
        record.insert("trace_list_count".to_string(), PhpValue::Int(3));

        decode_json_fields(&mut record, &BTreeSet::new(), Some("trace_list_"));

        assert!(matches!(record["trace_list_home"], PhpValue::Map(_)));
        assert_eq!(record["plain"], PhpValue::from(r#"{"n":1}"#));
        assert_eq!(record["trace_list_count"], PhpValue::Int(3));
    }

    #[test]
    fn test_prefix_disabled() {
        let mut record = SessionRecord::new();
        record.insert("trace_list_home".to_string(), PhpValue::from("[1]"));

        decode_json_fields(&mut record, &BTreeSet::new(), None);

        assert_eq!(record["trace_list_home"], PhpValue::from("[1]"));
    }

    #[test]
    fn test_encode_restores_json_strings() {
        let mut record = SessionRecord::new();
        record.insert("cart".to_string(), PhpValue::from(r#"["a","b"]"#));
        record.insert("ga_data".to_string(), PhpValue::from("[1]"));
        let decoded = decode_json_fields(&mut record, &known(&["cart", "ga_data"]), None);

        if let PhpValue::Sequence(items) = &mut record["cart"] {
            items.push(PhpValue::from("c"));
        }
        record.insert("ga_data".to_string(), PhpValue::from("replaced"));
        encode_json_fields(&mut record, &decoded);

        assert_eq!(record["cart"], PhpValue::from(r#"["a","b","c"]"#));
        assert_eq!(record["ga_data"], PhpValue::from("replaced"));
    }

    #[test]
    fn test_untouched_fields_keep_their_json_text() {
        let mut record = SessionRecord::new();
        record.insert("greeting".to_string(), PhpValue::from(r#""hello""#));
        record.insert("score".to_string(), PhpValue::from("1e2"));
        record.insert("spaced".to_string(), PhpValue::from(r#"{ "b": 1, "a": 2 }"#));
        let original = record.clone();
        let decoded = decode_json_fields(
            &mut record,
            &known(&["greeting", "score", "spaced"]),
            None,
        );

        assert_eq!(record["greeting"], PhpValue::from("hello"));
        assert_eq!(record["score"], PhpValue::Float(100.0));
        encode_json_fields(&mut record, &decoded);

        assert_eq!(record, original);
    }

    #[test]
    fn test_object_keys_keep_stored_order() {
        let mut record = SessionRecord::new();
        record.insert("ga_data".to_string(), PhpValue::from(r#"{"b":1,"a":2}"#));

        let decoded = decode_json_fields(&mut record, &known(&["ga_data"]), None);

        let PhpValue::Map(fields) = &record["ga_data"] else {
            panic!("Expected a map");
        };
        let keys: Vec<&str> = fields.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["b", "a"]);

        if let PhpValue::Map(fields) = &mut record["ga_data"] {
            fields.insert("c".to_string(), PhpValue::Int(3));
        }
        encode_json_fields(&mut record, &decoded);
        assert_eq!(record["ga_data"], PhpValue::from(r#"{"b":1,"a":2,"c":3}"#));
    }
}
