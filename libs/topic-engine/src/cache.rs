use std::collections::BTreeMap;
use std::sync::Arc;

use telemetry_api::{Record, TopicEntry};

/// topic → последняя запись. Упорядочено по имени topic'а.
pub type TopicMap = BTreeMap<String, TopicEntry>;

// ═══════════════════════════════════════════════════════════════
//  TopicSnapshot
// ═══════════════════════════════════════════════════════════════

/// Неизменяемый срез cache'а.
///
/// Держит `Arc` на ту же карту, что и cache в момент снятия; следующий
/// `upsert` скопирует карту, а не изменит эту.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TopicSnapshot {
    pub topics: Arc<TopicMap>,
    pub latest: Option<Arc<Record>>,
}

impl TopicSnapshot {
    pub fn get(&self, topic: &str) -> Option<&TopicEntry> {
        self.topics.get(topic)
    }

    pub fn len(&self) -> usize {
        self.topics.len()
    }

    pub fn is_empty(&self) -> bool {
        self.topics.is_empty()
    }
}

// ═══════════════════════════════════════════════════════════════
//  TopicCache
// ═══════════════════════════════════════════════════════════════

#[derive(Debug, Default)]
pub struct TopicCache {
    entries: Arc<TopicMap>,
    latest: Option<Arc<Record>>,
}

impl TopicCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Положить запись: замена entry целиком (без merge), latest slot
    /// обновляется всегда, даже для записи без topic'а.
    pub fn upsert(&mut self, record: Arc<Record>, received_at_ms: i64) {
        if let Some(topic) = record.topic() {
            // copy-on-write: выданные snapshot'ы держат старую карту
            Arc::make_mut(&mut self.entries).insert(
                topic.to_owned(),
                TopicEntry {
                    record: Arc::clone(&record),
                    received_at_ms,
                },
            );
        }
        self.latest = Some(record);
    }

    pub fn snapshot(&self) -> TopicSnapshot {
        TopicSnapshot {
            topics: Arc::clone(&self.entries),
            latest: self.latest.clone(),
        }
    }

    pub fn clear(&mut self) {
        if !self.entries.is_empty() {
            tracing::debug!(topics = self.entries.len(), "topic cache cleared");
        }
        self.entries = Arc::default();
        self.latest = None;
    }

    pub fn get(&self, topic: &str) -> Option<&TopicEntry> {
        self.entries.get(topic)
    }

    pub fn latest(&self) -> Option<&Arc<Record>> {
        self.latest.as_ref()
    }

    pub fn topics(&self) -> Vec<String> {
        self.entries.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
#[path = "cache_test.rs"]
mod tests;
