use telemetry_api::ConnectionState;

/// Ошибка конфигурации endpoint'а. `connect()` отклоняется, состояние
/// manager'а не меняется.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("address is empty")]
    EmptyAddress,

    #[error("invalid address '{0}': expected a bare host name or IP")]
    InvalidAddress(String),

    #[error("port must be in 1..=65535")]
    InvalidPort,

    #[error("invalid url '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },
}

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("config: {0}")]
    Config(#[from] ConfigError),

    /// Endpoint меняется только в `Disconnected` / `Error`.
    #[error("endpoint cannot change while {0}")]
    Busy(ConnectionState),

    #[error("connect() must be called from within a Tokio runtime")]
    NoRuntime,
}
