//! Integration tests for phpsess-core

use indexmap::IndexMap;
use phpsess_core::{
    decode, decode_json_fields, encode, sanitize_session_id, PhpValue, SessionConfig,
    SessionError, SessionRecord,
};
use std::io::Write;
use std::time::Duration;

fn sample_records() -> Vec<SessionRecord> {
    let mut nested = IndexMap::new();
    nested.insert("sku".to_string(), PhpValue::from("A-1"));
    nested.insert("qty".to_string(), PhpValue::Int(2));
    nested.insert("price".to_string(), PhpValue::Float(19.5));
    nested.insert("42".to_string(), PhpValue::Bool(true));

    let mut deep = IndexMap::new();
    deep.insert(
        "level1".to_string(),
        PhpValue::Sequence(vec![PhpValue::Map(nested.clone()), PhpValue::Null]),
    );

    let mut records = Vec::new();
    records.push(SessionRecord::new());

    let mut scalars = SessionRecord::new();
    scalars.insert("i".to_string(), PhpValue::Int(i64::MIN));
    scalars.insert("j".to_string(), PhpValue::Int(i64::MAX));
    scalars.insert("f".to_string(), PhpValue::Float(-0.000123));
    scalars.insert("b".to_string(), PhpValue::Bool(false));
    scalars.insert("s".to_string(), PhpValue::from("multi\nline \"quoted\" ; {braces} 日本"));
    scalars.insert("empty".to_string(), PhpValue::from(""));
    records.push(scalars);

    let mut composite = SessionRecord::new();
    composite.insert("cart".to_string(), PhpValue::Map(nested));
    composite.insert("deep".to_string(), PhpValue::Map(deep));
    composite.insert("list".to_string(), PhpValue::from(vec![1i64, 2, 3]));
    composite.insert("7".to_string(), PhpValue::from("int-keyed top level"));
    records.push(composite);

    records
}

#[test]
fn test_round_trip_over_supported_values() {
    for record in sample_records() {
        let blob = encode(&record);
        assert_eq!(decode(&blob).unwrap(), record, "blob: {}", blob.escape_ascii());
    }
}

#[test]
fn test_decode_then_encode_preserves_php_bytes() {
    let php_written: &[u8] = br#"a:3:{s:7:"user_id";i:42;s:11:"scart_items";s:9:"["a","b"]";s:5:"flags";a:2:{i:0;b:1;i:1;b:0;}}"#;
    let record = decode(php_written).unwrap();
    assert_eq!(encode(&record), php_written.to_vec());
}

#[test]
fn test_json_sub_decode_on_stored_blob() {
    let config = SessionConfig::default();
    let blob = br#"a:2:{s:11:"scart_items";s:9:"["a","b"]";s:7:"ga_data";s:8:"not json";}"#;
    let mut record = decode(blob).unwrap();

    decode_json_fields(&mut record, config.json_fields(), config.json_prefix());

    assert_eq!(record["scart_items"], PhpValue::from(vec!["a", "b"]));
    assert_eq!(record["ga_data"], PhpValue::from("not json"));
}

#[test]
fn test_sanitizer_examples() {
    assert!(sanitize_session_id(Some("a1b2c3d4e5f6g7h8i9j0k1l2m3n4o5p6")).is_some());
    assert!(sanitize_session_id(Some("abc123")).is_none());
    assert!(sanitize_session_id(Some("abc123<script>")).is_none());
}

#[test]
fn test_load_config_from_file() {
    let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
    writeln!(
        file,
        r#"
session_expire = 3600
lock_timeout = 2.5
session_prefix = "APP_SESSION:"
json_fields = ["cart"]
json_prefix = ""
"#
    )
    .unwrap();

    let config = SessionConfig::load(Some(file.path())).unwrap();

    assert_eq!(config.session_expire(), 3600);
    assert_eq!(config.lock_timeout(), Duration::from_millis(2500));
    assert_eq!(config.session_prefix(), "APP_SESSION:");
    assert_eq!(config.lock_suffix(), "_LOCK");
    assert_eq!(config.json_fields().len(), 1);
    assert_eq!(config.json_prefix(), None);
}

#[test]
fn test_load_config_rejects_invalid_file_values() {
    let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
    writeln!(file, "session_expire = 0").unwrap();

    match SessionConfig::load(Some(file.path())) {
        Err(SessionError::Config { field, .. }) => assert_eq!(field, "session_expire"),
        other => panic!("Expected Config error, got {:?}", other),
    }
}

#[test]
fn test_load_config_missing_file() {
    let result = SessionConfig::load(Some(std::path::Path::new("/nonexistent/phpsess.toml")));
    assert!(matches!(result, Err(SessionError::Config { .. })));
}
