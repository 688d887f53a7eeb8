use serde_json::Value;

use telemetry_api::{DecodeError, Record};

/// Ключ legacy-обёртки: `{"NewDatapoint": {topic, time, data_json}}`.
pub const LEGACY_WRAPPER_KEY: &str = "NewDatapoint";

/// Зарезервированное поле с дважды закодированным payload:
/// JSON-строка вида `[[ignored, "<inner json>"], ...]`.
pub const LEGACY_DATA_KEY: &str = "data_json";

// ═══════════════════════════════════════════════════════════════
//  Text frame → Record
// ═══════════════════════════════════════════════════════════════

/// Декодировать text frame.
///
/// - невалидный JSON → `MalformedText`;
/// - `topic`/`time` берутся из datapoint-объекта (пустой topic
///   считается отсутствующим) (содержимое
///   `NewDatapoint`, если обёртка есть, иначе сам верхний объект);
/// - если в datapoint есть `data_json`, payload: распакованный
///   внутренний JSON; при любой ошибке распаковки payload остаётся
///   внешним значением без изменений, а декодирование считается успешным.
pub fn decode_text(text: &str) -> Result<Record, DecodeError> {
    let value: Value = serde_json::from_str(text)?;

    let (topic, server_time, unwrapped) = {
        let datapoint = datapoint_of(&value);
        let topic = datapoint
            .get("topic")
            .and_then(Value::as_str)
            .filter(|topic| !topic.is_empty())
            .map(str::to_owned);
        let server_time = datapoint.get("time").and_then(json_time);
        let unwrapped = datapoint
            .get(LEGACY_DATA_KEY)
            .and_then(Value::as_str)
            .map(unwrap_legacy);
        (topic, server_time, unwrapped)
    };

    let payload = match unwrapped {
        Some(Ok(inner)) => inner,
        Some(Err(reason)) => {
            tracing::debug!(topic = ?topic, %reason, "legacy payload unwrap failed, keeping outer value");
            value
        }
        None => value,
    };

    Ok(Record::new(topic, server_time, payload))
}

fn datapoint_of(value: &Value) -> &Value {
    match value.get(LEGACY_WRAPPER_KEY) {
        Some(inner @ Value::Object(_)) => inner,
        _ => value,
    }
}

fn json_time(value: &Value) -> Option<i64> {
    value
        .as_i64()
        .or_else(|| value.as_u64().and_then(|v| i64::try_from(v).ok()))
}

/// Снять оба слоя кодирования: строка → массив пар → строка → JSON.
fn unwrap_legacy(data_json: &str) -> Result<Value, String> {
    let pairs: Value =
        serde_json::from_str(data_json).map_err(|e| format!("{LEGACY_DATA_KEY}: {e}"))?;

    let inner = pairs
        .as_array()
        .and_then(|items| items.first())
        .and_then(Value::as_array)
        .and_then(|pair| pair.get(1))
        .and_then(Value::as_str)
        .ok_or_else(|| format!("{LEGACY_DATA_KEY} is not an array of [_, \"<json>\"] pairs"))?;

    serde_json::from_str(inner).map_err(|e| format!("inner payload: {e}"))
}

#[cfg(test)]
#[path = "text_test.rs"]
mod tests;
