use std::sync::Arc;

use serde::Serialize;
use tokio::sync::broadcast;

use telemetry_api::{ConnectionState, DecodeError, ReadyState, Record, TopicEntry};
use topic_engine::TopicMap;

use crate::config::EndpointConfig;

// ═══════════════════════════════════════════════════════════════
//  TelemetrySnapshot — pull-сторона
// ═══════════════════════════════════════════════════════════════

/// Согласованный срез всего, что видит потребитель.
///
/// Собирается под lock'ом manager'а целиком, поэтому topics, latest
/// и счётчики всегда относятся к одному моменту.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TelemetrySnapshot {
    pub state: ConnectionState,
    pub ready_state: ReadyState,
    pub endpoint: Arc<EndpointConfig>,
    pub topics: Arc<TopicMap>,
    pub latest: Option<Arc<Record>>,
    pub message_count: u64,
    /// Сообщений за последнюю секунду.
    pub message_rate: usize,
    /// Unix ms последнего `connect()`.
    pub connected_at_ms: Option<i64>,
    pub epoch: u64,
}

impl TelemetrySnapshot {
    pub fn is_connected(&self) -> bool {
        self.state == ConnectionState::Open
    }

    pub fn uptime_ms(&self, now_ms: i64) -> Option<i64> {
        self.connected_at_ms.map(|at| (now_ms - at).max(0))
    }

    pub fn topic(&self, topic: &str) -> Option<&TopicEntry> {
        self.topics.get(topic)
    }

    pub fn topic_names(&self) -> impl Iterator<Item = &str> {
        self.topics.keys().map(String::as_str)
    }
}

// ═══════════════════════════════════════════════════════════════
//  TelemetryEvent — push-сторона
// ═══════════════════════════════════════════════════════════════

#[derive(Debug, Clone)]
pub enum TelemetryEvent {
    StateChanged {
        state: ConnectionState,
        ready_state: ReadyState,
        epoch: u64,
    },
    Record {
        record: Arc<Record>,
        message_count: u64,
        message_rate: usize,
    },
    RateTick {
        message_rate: usize,
    },
    /// Frame не декодировался. Счётчик сообщений не изменился.
    DecodeFailed {
        error: DecodeError,
        frame_kind: &'static str,
        frame_len: usize,
    },
    /// Cache и счётчики сброшены (новый `connect()` или явный `clear()`).
    Cleared,
}

/// Подписка на события manager'а.
///
/// Медленный подписчик теряет старые события, а не тормозит приём;
/// сколько потеряно: `skipped()`.
pub struct Subscription {
    rx: broadcast::Receiver<TelemetryEvent>,
    skipped: u64,
}

impl Subscription {
    pub(crate) fn new(rx: broadcast::Receiver<TelemetryEvent>) -> Self {
        Self { rx, skipped: 0 }
    }

    /// Следующее событие. `None`: manager уничтожен.
    pub async fn recv(&mut self) -> Option<TelemetryEvent> {
        loop {
            match self.rx.recv().await {
                Ok(event) => return Some(event),
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    tracing::warn!(skipped = n, "subscriber lagged, events dropped");
                    self.skipped += n;
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    pub fn skipped(&self) -> u64 {
        self.skipped
    }
}
