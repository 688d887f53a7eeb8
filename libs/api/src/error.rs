/// Ошибка декодирования одного frame'а.
///
/// Per-frame и не фатальна: соединение остаётся открытым, счётчики
/// не трогаются, ошибка уходит подписчикам как диагностика.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DecodeError {
    #[error("malformed text frame: {0}")]
    MalformedText(String),

    #[error("malformed binary frame: {0}")]
    MalformedBinary(String),

    #[error("columnar batch has no rows")]
    EmptyBatch,
}

impl From<serde_json::Error> for DecodeError {
    fn from(e: serde_json::Error) -> Self {
        DecodeError::MalformedText(e.to_string())
    }
}
