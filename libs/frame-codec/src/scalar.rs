use arrow::array::{Array, AsArray};
use arrow::datatypes::{
    DataType, Float16Type, Float32Type, Float64Type, Int8Type, Int16Type, Int32Type, Int64Type,
    UInt8Type, UInt16Type, UInt32Type, UInt64Type,
};
use arrow::util::display::{ArrayFormatter, FormatOptions};
use base64::Engine;
use serde_json::Value;

use telemetry_api::{DecodeError, safe_int_value_i64, safe_int_value_u64};

/// Значение ячейки `row` колонки как JSON.
///
/// Целые шире 2^53 − 1 → десятичная строка, binary → base64,
/// struct/list → объект/массив, прочие типы → display-форматтер Arrow.
pub(crate) fn value_at(array: &dyn Array, row: usize) -> Result<Value, DecodeError> {
    if array.is_null(row) {
        return Ok(Value::Null);
    }

    let value = match array.data_type() {
        DataType::Null => Value::Null,
        DataType::Boolean => Value::Bool(array.as_boolean().value(row)),

        DataType::Int8 => Value::from(array.as_primitive::<Int8Type>().value(row)),
        DataType::Int16 => Value::from(array.as_primitive::<Int16Type>().value(row)),
        DataType::Int32 => Value::from(array.as_primitive::<Int32Type>().value(row)),
        DataType::Int64 => safe_int_value_i64(array.as_primitive::<Int64Type>().value(row)),
        DataType::UInt8 => Value::from(array.as_primitive::<UInt8Type>().value(row)),
        DataType::UInt16 => Value::from(array.as_primitive::<UInt16Type>().value(row)),
        DataType::UInt32 => Value::from(array.as_primitive::<UInt32Type>().value(row)),
        DataType::UInt64 => safe_int_value_u64(array.as_primitive::<UInt64Type>().value(row)),

        DataType::Float16 => float_value(array.as_primitive::<Float16Type>().value(row).to_f64()),
        DataType::Float32 => float_value(f64::from(array.as_primitive::<Float32Type>().value(row))),
        DataType::Float64 => float_value(array.as_primitive::<Float64Type>().value(row)),

        DataType::Utf8 => Value::String(array.as_string::<i32>().value(row).to_owned()),
        DataType::LargeUtf8 => Value::String(array.as_string::<i64>().value(row).to_owned()),

        DataType::Binary => Value::String(
            base64::engine::general_purpose::STANDARD.encode(array.as_binary::<i32>().value(row)),
        ),
        DataType::LargeBinary => Value::String(
            base64::engine::general_purpose::STANDARD.encode(array.as_binary::<i64>().value(row)),
        ),

        DataType::Struct(_) => {
            let strukt = array.as_struct();
            let mut map = serde_json::Map::with_capacity(strukt.num_columns());
            for (field, column) in strukt.fields().iter().zip(strukt.columns()) {
                map.insert(field.name().clone(), value_at(column.as_ref(), row)?);
            }
            Value::Object(map)
        }
        DataType::List(_) => {
            let items = array.as_list::<i32>().value(row);
            list_value(items.as_ref())?
        }
        DataType::LargeList(_) => {
            let items = array.as_list::<i64>().value(row);
            list_value(items.as_ref())?
        }

        _ => {
            let formatter = ArrayFormatter::try_new(array, &FormatOptions::default())
                .map_err(|e| DecodeError::MalformedBinary(e.to_string()))?;
            Value::String(formatter.value(row).to_string())
        }
    };

    Ok(value)
}

fn list_value(items: &dyn Array) -> Result<Value, DecodeError> {
    (0..items.len())
        .map(|i| value_at(items, i))
        .collect::<Result<Vec<_>, _>>()
        .map(Value::Array)
}

/// NaN/inf в JSON не выражаются: отдаём null.
fn float_value(v: f64) -> Value {
    serde_json::Number::from_f64(v)
        .map(Value::Number)
        .unwrap_or(Value::Null)
}
