/// Наибольшее целое, которое потребитель с f64-числами получит без потерь
/// (2^53 − 1). Целые шире этого диапазона отдаются десятичной строкой.
pub const MAX_SAFE_INTEGER: u64 = (1 << 53) - 1;

/// Текущее Unix-время в миллисекундах.
pub fn now_ms() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as i64
}

/// Целое в JSON: число, если влезает в safe-диапазон, иначе строка.
pub fn safe_int_value_i64(v: i64) -> serde_json::Value {
    if v.unsigned_abs() <= MAX_SAFE_INTEGER {
        serde_json::Value::from(v)
    } else {
        serde_json::Value::String(v.to_string())
    }
}

/// То же для беззнаковых.
pub fn safe_int_value_u64(v: u64) -> serde_json::Value {
    if v <= MAX_SAFE_INTEGER {
        serde_json::Value::from(v)
    } else {
        serde_json::Value::String(v.to_string())
    }
}
