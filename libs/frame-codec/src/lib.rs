//! Декодер frame'ов телеметрии.
//!
//! Два формата живут на одном транспорте: text frame: JSON
//! (включая legacy-обёртку `NewDatapoint` с дважды закодированным
//! `data_json`), binary frame: Arrow IPC batch с колонками
//! `topic` + `time` + произвольные скаляры.
//!
//! Декодер чистый: без состояния, без I/O.

mod arrow_ipc;
mod scalar;
mod text;

pub use arrow_ipc::{IpcLayout, TIME_COLUMN, TOPIC_COLUMN, decode_binary, encode_ipc, record_from_row};
pub use text::{LEGACY_DATA_KEY, LEGACY_WRAPPER_KEY, decode_text};

pub use arrow;

use telemetry_api::{DecodeError, Record};

/// Сырой frame, как его объявил транспорт.
#[derive(Debug, Clone, Copy)]
pub enum Frame<'a> {
    Text(&'a str),
    Binary(&'a [u8]),
}

impl Frame<'_> {
    pub fn kind(&self) -> &'static str {
        match self {
            Frame::Text(_) => "text",
            Frame::Binary(_) => "binary",
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Frame::Text(t) => t.len(),
            Frame::Binary(b) => b.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Декодировать frame в `Record`.
///
/// Text → JSON, Binary → Arrow IPC. Ошибка типизирована и не фатальна
/// для соединения.
pub fn decode(frame: Frame<'_>) -> Result<Record, DecodeError> {
    match frame {
        Frame::Text(text) => decode_text(text),
        Frame::Binary(bytes) => decode_binary(bytes),
    }
}
