//! Tests for text frame decoding

use super::*;
use serde_json::json;

// ============================================================================
// Plain JSON records
// ============================================================================

#[test]
fn test_record_with_topic() {
    let record = decode_text(r#"{"topic":"imu","time":1200,"x":0.5}"#).unwrap();

    assert_eq!(record.topic(), Some("imu"));
    assert_eq!(record.server_time, Some(1200));
    assert_eq!(record.payload, json!({"topic": "imu", "time": 1200, "x": 0.5}));
    assert!(record.is_dispatchable());
}

#[test]
fn test_record_without_topic_is_not_dispatchable() {
    let record = decode_text(r#"{"value": 3}"#).unwrap();

    assert_eq!(record.topic, None);
    assert_eq!(record.server_time, None);
    assert_eq!(record.payload, json!({"value": 3}));
    assert!(!record.is_dispatchable());
}

#[test]
fn test_non_string_topic_is_ignored() {
    let record = decode_text(r#"{"topic": 7}"#).unwrap();
    assert_eq!(record.topic, None);
}

#[test]
fn test_empty_topic_is_ignored() {
    let record = decode_text(r#"{"topic": "", "time": 3, "x": 1}"#).unwrap();

    assert_eq!(record.topic, None);
    assert_eq!(record.server_time, Some(3));
    assert!(!record.is_dispatchable());

    let legacy = decode_text(r#"{"NewDatapoint": {"topic": "", "time": 4}}"#).unwrap();
    assert_eq!(legacy.topic, None);
}

#[test]
fn test_non_object_values_decode() {
    let record = decode_text("[1, 2, 3]").unwrap();
    assert_eq!(record.topic, None);
    assert_eq!(record.payload, json!([1, 2, 3]));

    let record = decode_text("42").unwrap();
    assert_eq!(record.payload, json!(42));
}

#[test]
fn test_malformed_text() {
    let err = decode_text("{not json").unwrap_err();
    assert!(matches!(err, DecodeError::MalformedText(_)));

    let err = decode_text("").unwrap_err();
    assert!(matches!(err, DecodeError::MalformedText(_)));
}

// ============================================================================
// Legacy nested shape
// ============================================================================

#[test]
fn test_legacy_nested_frame_is_unwrapped() {
    let frame = r#"{"NewDatapoint":{"topic":"imu","time":5,"data_json":"[[0,\"{\\\"x\\\":1}\"]]"}}"#;
    let record = decode_text(frame).unwrap();

    assert_eq!(record, Record::new(Some("imu".into()), Some(5), json!({"x": 1})));
}

#[test]
fn test_legacy_nested_structure_survives() {
    let inner = json!({"pose": {"position": {"x": 1.0, "y": 2.0, "z": 3.0}}}).to_string();
    let data_json = json!([[100, inner]]).to_string();
    let frame = json!({"NewDatapoint": {"topic": "test/topic", "time": 100, "data_json": data_json}});

    let record = decode_text(&frame.to_string()).unwrap();

    assert_eq!(record.topic(), Some("test/topic"));
    assert_eq!(record.payload["pose"]["position"]["z"], json!(3.0));
}

#[test]
fn test_data_json_without_wrapper() {
    let frame = json!({"topic": "gps", "time": 9, "data_json": "[[1,\"{\\\"lat\\\":52.1}\"]]"});
    let record = decode_text(&frame.to_string()).unwrap();

    assert_eq!(record.topic(), Some("gps"));
    assert_eq!(record.server_time, Some(9));
    assert_eq!(record.payload, json!({"lat": 52.1}));
}

#[test]
fn test_legacy_outer_layer_failure_falls_back() {
    let frame = json!({"NewDatapoint": {"topic": "imu", "time": 5, "data_json": "not json"}});
    let record = decode_text(&frame.to_string()).unwrap();

    assert_eq!(record.topic(), Some("imu"));
    assert_eq!(record.server_time, Some(5));
    assert_eq!(record.payload, frame);
}

#[test]
fn test_legacy_inner_layer_failure_falls_back() {
    let frame = json!({"NewDatapoint": {"topic": "imu", "time": 5, "data_json": "[[0,\"{broken\"]]"}});
    let record = decode_text(&frame.to_string()).unwrap();

    assert_eq!(record.payload, frame);
}

#[test]
fn test_legacy_wrong_pair_shape_falls_back() {
    for data_json in ["[]", "[0]", "[[0]]", "[[0, 1]]", "{}"] {
        let frame = json!({"NewDatapoint": {"topic": "imu", "data_json": data_json}});
        let record = decode_text(&frame.to_string()).unwrap();
        assert_eq!(record.payload, frame, "data_json = {data_json}");
    }
}

#[test]
fn test_wrapper_without_data_json_keeps_outer_value() {
    let frame = json!({"NewDatapoint": {"topic": "imu", "time": 11}});
    let record = decode_text(&frame.to_string()).unwrap();

    assert_eq!(record.topic(), Some("imu"));
    assert_eq!(record.server_time, Some(11));
    assert_eq!(record.payload, frame);
}

#[test]
fn test_large_unsigned_time_is_dropped() {
    let record = decode_text(r#"{"topic":"a","time":18446744073709551615}"#).unwrap();
    assert_eq!(record.server_time, None);
}
