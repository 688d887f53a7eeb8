//! Tests for connection manager state handling (no network)

use super::*;
use crate::error::ConfigError;
use frame_codec::arrow::array::{Float64Array, StringArray, UInt64Array};
use frame_codec::arrow::datatypes::{DataType, Field, Schema};
use frame_codec::arrow::record_batch::RecordBatch;
use frame_codec::{IpcLayout, encode_ipc};
use telemetry_api::DecodeError;

fn manager() -> ConnectionManager {
    ConnectionManager::new(EndpointConfig::new("127.0.0.1", 3030))
}

/// Перевести manager в состояние открытой сессии без транспорта.
fn force_open(manager: &ConnectionManager, epoch: u64) {
    let mut core = manager.shared.lock();
    core.epoch = epoch;
    core.state = ConnectionState::Open;
    core.ready_state = ReadyState::Open;
}

fn text(topic: &str, seq: u64) -> String {
    format!(r#"{{"topic":"{topic}","time":{seq},"seq":{seq}}}"#)
}

fn empty_batch_bytes() -> Vec<u8> {
    let schema = Arc::new(Schema::new(vec![
        Field::new("topic", DataType::Utf8, false),
        Field::new("time", DataType::UInt64, false),
        Field::new("x", DataType::Float64, false),
    ]));
    let batch = RecordBatch::try_new(
        schema,
        vec![
            Arc::new(StringArray::from(Vec::<&str>::new())),
            Arc::new(UInt64Array::from(Vec::<u64>::new())),
            Arc::new(Float64Array::from(Vec::<f64>::new())),
        ],
    )
    .unwrap();
    encode_ipc(&batch, IpcLayout::File).unwrap()
}

// ============================================================================
// Initial state / disconnect
// ============================================================================

#[test]
fn test_initial_snapshot() {
    let snapshot = manager().snapshot();

    assert_eq!(snapshot.state, ConnectionState::Disconnected);
    assert_eq!(snapshot.ready_state.code(), -1);
    assert_eq!(snapshot.message_count, 0);
    assert_eq!(snapshot.message_rate, 0);
    assert!(snapshot.topics.is_empty());
    assert!(snapshot.latest.is_none());
    assert_eq!(snapshot.connected_at_ms, None);
    assert_eq!(snapshot.endpoint.port, 3030);
}

#[test]
fn test_disconnect_when_disconnected_is_noop() {
    let manager = manager();
    let before = manager.snapshot();

    manager.disconnect();
    manager.disconnect();

    assert_eq!(*manager.snapshot(), *before);
    assert_eq!(manager.state(), ConnectionState::Disconnected);
}

#[test]
fn test_disconnect_in_error_state_keeps_error() {
    let manager = manager();
    manager.shared.lock().state = ConnectionState::Error;

    manager.disconnect();

    assert_eq!(manager.state(), ConnectionState::Error);
}

// ============================================================================
// connect() rejections
// ============================================================================

#[test]
fn test_config_error_leaves_state_unchanged() {
    let manager = ConnectionManager::new(EndpointConfig::new("127.0.0.1", 0));

    let err = manager.connect().unwrap_err();

    assert!(matches!(err, ClientError::Config(ConfigError::InvalidPort)));
    let snapshot = manager.snapshot();
    assert_eq!(snapshot.state, ConnectionState::Disconnected);
    assert_eq!(snapshot.ready_state, ReadyState::Uninstantiated);
    assert_eq!(snapshot.epoch, 0);
}

#[test]
fn test_connect_outside_runtime() {
    let manager = manager();

    assert!(matches!(manager.connect(), Err(ClientError::NoRuntime)));
    assert_eq!(manager.state(), ConnectionState::Disconnected);
}

#[tokio::test]
async fn test_second_connect_while_connecting_is_ignored() {
    let manager = manager();

    manager.connect().unwrap();
    manager.connect().unwrap();

    let snapshot = manager.snapshot();
    assert_eq!(snapshot.state, ConnectionState::Connecting);
    assert_eq!(snapshot.ready_state, ReadyState::Connecting);
    assert_eq!(snapshot.epoch, 1);
    assert!(snapshot.connected_at_ms.is_some());
}

#[tokio::test]
async fn test_connect_resets_previous_stream() {
    let manager = manager();
    force_open(&manager, 0);
    assert!(manager.shared.ingest(0, Frame::Text(&text("A", 1))));
    manager.shared.lock().state = ConnectionState::Disconnected;

    manager.connect().unwrap();

    let snapshot = manager.snapshot();
    assert_eq!(snapshot.message_count, 0);
    assert!(snapshot.topics.is_empty());
    assert!(snapshot.latest.is_none());
}

// ============================================================================
// Epoch guard
// ============================================================================

#[test]
fn test_stale_epoch_events_are_discarded() {
    let manager = manager();
    force_open(&manager, 2);

    assert!(!manager.shared.ingest(1, Frame::Text(&text("old", 1))));
    assert!(!manager.shared.tick(1));
    manager.shared.closed(1);
    manager.shared.failed(1, "late failure");

    let snapshot = manager.snapshot();
    assert_eq!(snapshot.message_count, 0);
    assert!(snapshot.topics.is_empty());

    assert!(manager.shared.ingest(2, Frame::Text(&text("new", 1))));
    let snapshot = manager.snapshot();
    assert_eq!(snapshot.state, ConnectionState::Open);
    assert_eq!(snapshot.message_count, 1);
    assert_eq!(snapshot.topic_names().collect::<Vec<_>>(), vec!["new"]);
}

#[test]
fn test_ingest_updates_cache_counter_and_rate() {
    let manager = manager();
    force_open(&manager, 1);

    for (seq, topic) in ["A", "B", "A", "C", "B"].into_iter().enumerate() {
        assert!(manager.shared.ingest(1, Frame::Text(&text(topic, seq as u64))));
    }

    let snapshot = manager.snapshot();
    assert_eq!(snapshot.topics.len(), 3);
    assert_eq!(snapshot.message_count, 5);
    assert_eq!(snapshot.message_rate, 5);
    assert_eq!(snapshot.topic("A").unwrap().record.server_time, Some(2));
    assert_eq!(snapshot.latest.as_ref().unwrap().topic(), Some("B"));
    assert_eq!(snapshot.latest.as_ref().unwrap().server_time, Some(4));
}

#[tokio::test]
async fn test_decode_failure_is_reported_not_counted() {
    let manager = manager();
    let mut events = manager.subscribe();
    force_open(&manager, 1);
    let bytes = empty_batch_bytes();

    assert!(manager.shared.ingest(1, Frame::Binary(&bytes)));
    assert!(manager.shared.ingest(1, Frame::Text("{oops")));

    match events.recv().await.unwrap() {
        TelemetryEvent::DecodeFailed {
            error, frame_kind, ..
        } => {
            assert_eq!(error, DecodeError::EmptyBatch);
            assert_eq!(frame_kind, "binary");
        }
        other => panic!("unexpected event: {other:?}"),
    }
    assert!(matches!(
        events.recv().await.unwrap(),
        TelemetryEvent::DecodeFailed {
            error: DecodeError::MalformedText(_),
            ..
        }
    ));

    let snapshot = manager.snapshot();
    assert_eq!(snapshot.message_count, 0);
    assert!(snapshot.latest.is_none());
}

#[tokio::test]
async fn test_closed_and_failed_transitions() {
    let manager = manager();
    force_open(&manager, 1);
    let mut watch = manager.watch();

    manager.shared.closed(1);
    assert!(watch.has_changed().unwrap());
    let snapshot = watch.borrow_and_update().clone();
    assert_eq!(snapshot.state, ConnectionState::Disconnected);
    assert_eq!(snapshot.ready_state, ReadyState::Closed);

    force_open(&manager, 1);
    manager.shared.failed(1, "connection reset");
    assert_eq!(manager.state(), ConnectionState::Error);
    assert_eq!(manager.ready_state().code(), 3);
}

// ============================================================================
// Configuration / clear
// ============================================================================

#[test]
fn test_endpoint_changes_only_while_idle() {
    let manager = manager();
    manager.set_address("10.1.1.1").unwrap();
    manager.set_port(9000).unwrap();
    manager.set_path("/spam").unwrap();
    assert_eq!(manager.snapshot().endpoint.url_string(), "ws://10.1.1.1:9000/spam");

    force_open(&manager, 1);
    let err = manager.set_port(1).unwrap_err();
    assert!(matches!(err, ClientError::Busy(ConnectionState::Open)));
    assert_eq!(manager.endpoint().port, 9000);

    manager.shared.lock().state = ConnectionState::Error;
    manager.set_endpoint(EndpointConfig::default()).unwrap();
    assert_eq!(manager.endpoint(), EndpointConfig::default());
}

#[tokio::test]
async fn test_clear_resets_stream_and_notifies() {
    let manager = manager();
    force_open(&manager, 1);
    manager.shared.ingest(1, Frame::Text(&text("A", 1)));
    let mut events = manager.subscribe();

    manager.clear();

    assert!(matches!(events.recv().await, Some(TelemetryEvent::Cleared)));
    let snapshot = manager.snapshot();
    assert_eq!(snapshot.state, ConnectionState::Open);
    assert_eq!(snapshot.message_count, 0);
    assert!(snapshot.topics.is_empty());
}
