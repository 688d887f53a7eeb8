use std::sync::Arc;

use serde::Serialize;
use serde_json::json;

use frame_codec::arrow::array::{ArrayRef, Float64Array, StringArray, UInt64Array};
use frame_codec::arrow::datatypes::{DataType, Field, Schema};
use frame_codec::arrow::record_batch::RecordBatch;
use frame_codec::{IpcLayout, LEGACY_DATA_KEY, LEGACY_WRAPPER_KEY, TIME_COLUMN, TOPIC_COLUMN, encode_ipc};

use super::error::FeedGenError;

// ═══════════════════════════════════════════════════════════════
//  Sample — синусоидальный тестовый сигнал
// ═══════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Vec3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Vec3 {
    pub fn sine(t: f64) -> Self {
        Self {
            x: t.sin(),
            y: t.cos(),
            z: t.tan(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Pose {
    pub position: Vec3,
    pub rotation: Vec3,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Sample {
    pub pose: Pose,
    pub velocity: Vec3,
    pub acceleration: Vec3,
}

impl Sample {
    /// Все компоненты: sin/cos/tan от `t` секунд.
    pub fn sine(t: f64) -> Self {
        let v = Vec3::sine(t);
        Self {
            pose: Pose {
                position: v,
                rotation: v,
            },
            velocity: v,
            acceleration: v,
        }
    }

    /// Плоские колонки: `pose.position.x`, …, `acceleration.z`.
    pub fn columns(&self) -> Vec<(String, f64)> {
        let groups = [
            ("pose.position", self.pose.position),
            ("pose.rotation", self.pose.rotation),
            ("velocity", self.velocity),
            ("acceleration", self.acceleration),
        ];
        groups
            .into_iter()
            .flat_map(|(prefix, v)| {
                [("x", v.x), ("y", v.y), ("z", v.z)]
                    .map(|(axis, value)| (format!("{prefix}.{axis}"), value))
            })
            .collect()
    }
}

// ═══════════════════════════════════════════════════════════════
//  Wire frames
// ═══════════════════════════════════════════════════════════════

/// Legacy text frame: payload дважды закодирован в `data_json`
/// как `[[time, "<sample json>"]]`.
pub fn legacy_frame(topic: &str, time_ms: u64, sample: &Sample) -> Result<String, FeedGenError> {
    let inner = serde_json::to_string(sample)?;
    let data_json = serde_json::to_string(&[(time_ms, inner)])?;
    let frame = json!({
        LEGACY_WRAPPER_KEY: {
            TOPIC_COLUMN: topic,
            TIME_COLUMN: time_ms,
            LEGACY_DATA_KEY: data_json,
        }
    });
    Ok(frame.to_string())
}

/// Binary frame: одна строка, `topic` + `time` + плоские Float64-колонки.
pub fn arrow_frame(topic: &str, time_ms: u64, sample: &Sample) -> Result<Vec<u8>, FeedGenError> {
    let columns = sample.columns();

    let mut fields = Vec::with_capacity(columns.len() + 2);
    fields.push(Field::new(TOPIC_COLUMN, DataType::Utf8, false));
    fields.push(Field::new(TIME_COLUMN, DataType::UInt64, false));

    let mut arrays: Vec<ArrayRef> = Vec::with_capacity(columns.len() + 2);
    arrays.push(Arc::new(StringArray::from(vec![topic])));
    arrays.push(Arc::new(UInt64Array::from(vec![time_ms])));

    for (name, value) in columns {
        fields.push(Field::new(name, DataType::Float64, false));
        arrays.push(Arc::new(Float64Array::from(vec![value])));
    }

    let batch = RecordBatch::try_new(Arc::new(Schema::new(fields)), arrays)?;
    Ok(encode_ipc(&batch, IpcLayout::File)?)
}

#[cfg(test)]
#[path = "domain_test.rs"]
mod tests;
