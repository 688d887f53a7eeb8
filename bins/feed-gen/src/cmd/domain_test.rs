//! Tests for synthetic sample frames

use super::*;
use frame_codec::{decode_binary, decode_text};

#[test]
fn test_sample_components() {
    let sample = Sample::sine(0.5);

    assert_eq!(sample.pose.position.x, 0.5f64.sin());
    assert_eq!(sample.velocity.y, 0.5f64.cos());
    assert_eq!(sample.acceleration.z, 0.5f64.tan());
}

#[test]
fn test_columns_are_flattened_in_order() {
    let names: Vec<String> = Sample::sine(1.0).columns().into_iter().map(|(n, _)| n).collect();

    assert_eq!(names.len(), 12);
    assert_eq!(names[0], "pose.position.x");
    assert_eq!(names[5], "pose.rotation.z");
    assert_eq!(names[6], "velocity.x");
    assert_eq!(names[11], "acceleration.z");
}

#[test]
fn test_legacy_frame_decodes_to_nested_payload() {
    let sample = Sample::sine(2.0);
    let text = legacy_frame("test/topic", 2000, &sample).unwrap();

    let record = decode_text(&text).unwrap();

    assert_eq!(record.topic(), Some("test/topic"));
    assert_eq!(record.server_time, Some(2000));
    let x = record.payload["pose"]["position"]["x"].as_f64().unwrap();
    assert!((x - 2.0f64.sin()).abs() < 1e-12);
    let mut keys: Vec<&str> = record.payload.as_object().unwrap().keys().map(String::as_str).collect();
    keys.sort_unstable();
    assert_eq!(keys, ["acceleration", "pose", "velocity"]);
}

#[test]
fn test_arrow_frame_decodes_to_flat_payload() {
    let sample = Sample::sine(2.0);
    let bytes = arrow_frame("test/topic", 2000, &sample).unwrap();
    assert!(bytes.starts_with(b"ARROW1"));

    let record = decode_binary(&bytes).unwrap();

    assert_eq!(record.topic(), Some("test/topic"));
    assert_eq!(record.server_time, Some(2000));
    let payload = record.payload.as_object().unwrap();
    assert_eq!(payload.len(), 12);
    assert_eq!(payload["pose.position.x"], serde_json::json!(2.0f64.sin()));
    assert_eq!(payload["acceleration.y"], serde_json::json!(2.0f64.cos()));
}
