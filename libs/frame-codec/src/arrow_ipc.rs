use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use arrow::array::{Array, ArrayRef, AsArray, RecordBatch};
use arrow::buffer::Buffer;
use arrow::compute::{CastOptions, cast_with_options};
use arrow::datatypes::{DataType, Int64Type};
use arrow::error::ArrowError;
use arrow::ipc::convert::fb_to_schema;
use arrow::ipc::reader::{FileDecoder, StreamDecoder, read_footer_length};
use arrow::ipc::writer::{FileWriter, StreamWriter};
use arrow::ipc::{Block, root_as_footer};

use telemetry_api::{DecodeError, Record};

use crate::scalar::value_at;

/// Зарезервированная колонка ключа.
pub const TOPIC_COLUMN: &str = "topic";
/// Зарезервированная колонка серверного времени.
pub const TIME_COLUMN: &str = "time";

/// Магия IPC file format (Feather v2). Без неё байты читаются как stream.
const ARROW_FILE_MAGIC: &[u8] = b"ARROW1";
/// `ARROW1` + два байта выравнивания.
const FILE_HEADER_LEN: usize = 8;
/// Длина footer'а (i32) + `ARROW1`.
const FILE_TRAILER_LEN: usize = 10;
/// Continuation marker + длина метаданных.
const MIN_BLOCK_META_LEN: usize = 8;

// ═══════════════════════════════════════════════════════════════
//  Binary frame → Record
// ═══════════════════════════════════════════════════════════════

/// Декодировать binary frame: первый batch IPC-потока, строка 0.
///
/// Длины, объявленные внутри frame'а, сверяются с его реальной длиной
/// до чтения. Паника arrow-декодера становится `MalformedBinary`.
pub fn decode_binary(bytes: &[u8]) -> Result<Record, DecodeError> {
    match panic::catch_unwind(AssertUnwindSafe(|| decode_first_row(bytes))) {
        Ok(result) => result,
        Err(payload) => {
            let reason = panic_reason(payload.as_ref());
            tracing::warn!(len = bytes.len(), %reason, "arrow decoder panicked on corrupt frame");
            Err(DecodeError::MalformedBinary(format!("corrupt IPC frame: {reason}")))
        }
    }
}

fn decode_first_row(bytes: &[u8]) -> Result<Record, DecodeError> {
    let batch = first_batch(bytes)?.ok_or(DecodeError::EmptyBatch)?;
    if batch.num_rows() == 0 {
        return Err(DecodeError::EmptyBatch);
    }
    record_from_row(&batch, 0)
}

fn panic_reason(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_owned()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_owned()
    }
}

fn first_batch(bytes: &[u8]) -> Result<Option<RecordBatch>, DecodeError> {
    if bytes.is_empty() {
        return Err(DecodeError::MalformedBinary("empty frame".into()));
    }
    let buffer = Buffer::from(bytes);
    if bytes.starts_with(ARROW_FILE_MAGIC) {
        file_batch(&buffer)
    } else {
        stream_batch(buffer)
    }
}

/// Stream format. `StreamDecoder` режет сообщения из переданного буфера
/// и никогда не выделяет память под объявленный размер тела.
fn stream_batch(mut buffer: Buffer) -> Result<Option<RecordBatch>, DecodeError> {
    let mut decoder = StreamDecoder::new();
    while !buffer.is_empty() {
        if let Some(batch) = decoder.decode(&mut buffer).map_err(malformed)? {
            return Ok(Some(batch));
        }
    }
    decoder.finish().map_err(malformed)?;
    Ok(None)
}

/// File format: `ARROW1\0\0 <messages> <footer> <footer len: i32> ARROW1`.
fn file_batch(buffer: &Buffer) -> Result<Option<RecordBatch>, DecodeError> {
    let len = buffer.len();
    let trailer_start = len
        .checked_sub(FILE_TRAILER_LEN)
        .filter(|start| *start >= FILE_HEADER_LEN)
        .ok_or_else(|| DecodeError::MalformedBinary(format!("IPC file too short ({len} bytes)")))?;

    let mut trailer = [0u8; FILE_TRAILER_LEN];
    trailer.copy_from_slice(&buffer[trailer_start..]);
    let footer_len = read_footer_length(trailer).map_err(malformed)?;
    let footer_start = trailer_start
        .checked_sub(footer_len)
        .filter(|start| *start >= FILE_HEADER_LEN)
        .ok_or_else(|| {
            DecodeError::MalformedBinary(format!("footer length {footer_len} exceeds frame ({len} bytes)"))
        })?;

    let footer = root_as_footer(&buffer[footer_start..trailer_start])
        .map_err(|e| DecodeError::MalformedBinary(format!("footer: {e:?}")))?;
    let ipc_schema = footer
        .schema()
        .ok_or_else(|| DecodeError::MalformedBinary("footer has no schema".into()))?;
    if !ipc_schema.endianness().equals_to_target_endianness() {
        return Err(DecodeError::MalformedBinary("foreign endianness".into()));
    }

    let mut decoder = FileDecoder::new(Arc::new(fb_to_schema(ipc_schema)), footer.version());
    if let Some(dictionaries) = footer.dictionaries() {
        for block in dictionaries {
            let data = block_data(buffer, footer_start, block)?;
            decoder.read_dictionary(block, &data).map_err(malformed)?;
        }
    }

    let Some(blocks) = footer.recordBatches() else {
        return Ok(None);
    };
    for block in blocks {
        let data = block_data(buffer, footer_start, block)?;
        if let Some(batch) = decoder.read_record_batch(block, &data).map_err(malformed)? {
            return Ok(Some(batch));
        }
    }
    Ok(None)
}

/// Срез блока; блок обязан лежать между заголовком и footer'ом.
fn block_data(buffer: &Buffer, footer_start: usize, block: &Block) -> Result<Buffer, DecodeError> {
    let bounds = || {
        let offset = usize::try_from(block.offset()).ok()?;
        let meta = usize::try_from(block.metaDataLength()).ok()?;
        let body = usize::try_from(block.bodyLength()).ok()?;
        let total = meta.checked_add(body)?;
        let end = offset.checked_add(total)?;
        (offset >= FILE_HEADER_LEN && meta >= MIN_BLOCK_META_LEN && end <= footer_start)
            .then_some((offset, total))
    };
    let (offset, total) = bounds().ok_or_else(|| {
        DecodeError::MalformedBinary(format!(
            "block (offset {}, meta {}, body {}) lies outside the frame",
            block.offset(),
            block.metaDataLength(),
            block.bodyLength()
        ))
    })?;
    Ok(buffer.slice_with_length(offset, total))
}

fn malformed(e: ArrowError) -> DecodeError {
    DecodeError::MalformedBinary(e.to_string())
}

/// Собрать `Record` из одной строки batch'а.
///
/// `topic` и `time` обязаны быть в схеме; все остальные колонки
/// становятся ключами payload.
pub fn record_from_row(batch: &RecordBatch, row: usize) -> Result<Record, DecodeError> {
    if row >= batch.num_rows() {
        return Err(DecodeError::MalformedBinary(format!(
            "row {row} out of range ({} rows)",
            batch.num_rows()
        )));
    }

    let schema = batch.schema();
    let topic_idx = column_index(batch, TOPIC_COLUMN)?;
    let time_idx = column_index(batch, TIME_COLUMN)?;

    let topic = topic_at(batch.column(topic_idx), row)?;
    let server_time = time_at(batch.column(time_idx), row)?;

    let mut payload = serde_json::Map::with_capacity(schema.fields().len().saturating_sub(2));
    for (idx, field) in schema.fields().iter().enumerate() {
        if idx == topic_idx || idx == time_idx {
            continue;
        }
        payload.insert(field.name().clone(), value_at(batch.column(idx).as_ref(), row)?);
    }

    Ok(Record::new(topic, server_time, serde_json::Value::Object(payload)))
}

fn column_index(batch: &RecordBatch, name: &str) -> Result<usize, DecodeError> {
    batch
        .schema()
        .index_of(name)
        .map_err(|_| DecodeError::MalformedBinary(format!("schema has no '{name}' column")))
}

fn topic_at(column: &ArrayRef, row: usize) -> Result<Option<String>, DecodeError> {
    if column.is_null(row) {
        return Ok(None);
    }
    match column.data_type() {
        DataType::Utf8 => Ok(non_empty(column.as_string::<i32>().value(row))),
        DataType::LargeUtf8 => Ok(non_empty(column.as_string::<i64>().value(row))),
        other => Err(DecodeError::MalformedBinary(format!(
            "'{TOPIC_COLUMN}' column must be a string, got {other}"
        ))),
    }
}

/// Пустая строка topic'а означает "без topic'а".
fn non_empty(topic: &str) -> Option<String> {
    (!topic.is_empty()).then(|| topic.to_owned())
}

fn time_at(column: &ArrayRef, row: usize) -> Result<Option<i64>, DecodeError> {
    if !column.data_type().is_integer() {
        return Err(DecodeError::MalformedBinary(format!(
            "'{TIME_COLUMN}' column must be an integer, got {}",
            column.data_type()
        )));
    }
    if column.is_null(row) {
        return Ok(None);
    }
    // UInt64 за пределами i64: ошибка, а не молчаливый null.
    let options = CastOptions {
        safe: false,
        ..Default::default()
    };
    let cell = cast_with_options(&column.slice(row, 1), &DataType::Int64, &options)
        .map_err(|e| DecodeError::MalformedBinary(format!("'{TIME_COLUMN}': {e}")))?;
    Ok(Some(cell.as_primitive::<Int64Type>().value(0)))
}

// ═══════════════════════════════════════════════════════════════
//  RecordBatch → IPC bytes
// ═══════════════════════════════════════════════════════════════

/// Раскладка IPC-байтов.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum IpcLayout {
    /// File format с footer'ом: то, что шлёт bridge.
    #[default]
    File,
    Stream,
}

/// Записать batch одним IPC-сообщением (file или stream).
pub fn encode_ipc(batch: &RecordBatch, layout: IpcLayout) -> Result<Vec<u8>, ArrowError> {
    let schema = batch.schema();
    let mut buffer = Vec::new();
    match layout {
        IpcLayout::File => {
            let mut writer = FileWriter::try_new(&mut buffer, &schema)?;
            writer.write(batch)?;
            writer.finish()?;
        }
        IpcLayout::Stream => {
            let mut writer = StreamWriter::try_new(&mut buffer, &schema)?;
            writer.write(batch)?;
            writer.finish()?;
        }
    }
    Ok(buffer)
}

#[cfg(test)]
#[path = "arrow_ipc_test.rs"]
mod tests;
