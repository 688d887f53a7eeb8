use std::sync::Arc;

use serde::Serialize;

// ════════════════════════════════════════════════════════════════
//  Record
// ════════════════════════════════════════════════════════════════

/// Декодированная запись телеметрии.
///
/// Неизменяема после декодирования: дальше по системе ходит как
/// `Arc<Record>` (topic cache, latest slot, события подписчикам).
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Record {
    /// Ключ демультиплексирования. `None`: запись попадает только
    /// в latest slot, но не в per-topic cache.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub topic: Option<String>,
    /// Серверное время (ms-подобные часы источника).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub server_time: Option<i64>,
    /// JSON-дерево (text frame) или плоский объект колонок (binary frame).
    pub payload: serde_json::Value,
}

impl Record {
    pub fn new(
        topic: Option<String>,
        server_time: Option<i64>,
        payload: serde_json::Value,
    ) -> Self {
        Self {
            topic,
            server_time,
            payload,
        }
    }

    pub fn topic(&self) -> Option<&str> {
        self.topic.as_deref()
    }

    /// Есть ли topic, под которым запись кладётся в cache.
    pub fn is_dispatchable(&self) -> bool {
        self.topic.is_some()
    }
}

// ════════════════════════════════════════════════════════════════
//  TopicEntry
// ════════════════════════════════════════════════════════════════

/// Последняя запись topic'а и момент её приёма.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct TopicEntry {
    pub record: Arc<Record>,
    /// Wall-clock время приёма, Unix ms.
    pub received_at_ms: i64,
}

// ════════════════════════════════════════════════════════════════
//  Connection State
// ════════════════════════════════════════════════════════════════

/// Состояние соединения с точки зрения connection manager'а.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connecting,
    Open,
    Closing,
    /// Транспорт упал. Терминально для сессии: нужен новый `connect()`.
    Error,
}

impl ConnectionState {
    /// `connect()` игнорируется в этих состояниях.
    pub fn is_active(&self) -> bool {
        matches!(self, ConnectionState::Connecting | ConnectionState::Open)
    }
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConnectionState::Disconnected => write!(f, "disconnected"),
            ConnectionState::Connecting => write!(f, "connecting"),
            ConnectionState::Open => write!(f, "open"),
            ConnectionState::Closing => write!(f, "closing"),
            ConnectionState::Error => write!(f, "error"),
        }
    }
}

// ════════════════════════════════════════════════════════════════
//  Ready State
// ════════════════════════════════════════════════════════════════

/// Низкоуровневый код состояния транспорта (нумерация WebSocket readyState).
///
/// Хранится отдельно от `ConnectionState` для отладки: `-1` значит,
/// что транспорт ни разу не создавался.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
#[serde(into = "i8")]
pub enum ReadyState {
    #[default]
    Uninstantiated,
    Connecting,
    Open,
    Closing,
    Closed,
}

impl ReadyState {
    pub fn code(self) -> i8 {
        match self {
            ReadyState::Uninstantiated => -1,
            ReadyState::Connecting => 0,
            ReadyState::Open => 1,
            ReadyState::Closing => 2,
            ReadyState::Closed => 3,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            ReadyState::Uninstantiated => "UNINSTANTIATED",
            ReadyState::Connecting => "CONNECTING",
            ReadyState::Open => "OPEN",
            ReadyState::Closing => "CLOSING",
            ReadyState::Closed => "CLOSED",
        }
    }
}

impl From<ReadyState> for i8 {
    fn from(state: ReadyState) -> Self {
        state.code()
    }
}

impl std::fmt::Display for ReadyState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.label(), self.code())
    }
}
