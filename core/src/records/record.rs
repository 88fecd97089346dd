use crate::records::config::DetectorConfig;
use crate::records::event::EventWindow;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Record identity within one audio file.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RecordKey {
    pub receiver_name: String,
    pub source_name: String,
}

impl RecordKey {
    pub fn new(receiver_name: impl Into<String>, source_name: impl Into<String>) -> Self {
        Self {
            receiver_name: receiver_name.into(),
            source_name: source_name.into(),
        }
    }
}

impl fmt::Display for RecordKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.receiver_name, self.source_name)
    }
}

/// Detection result for one (receiver, source) pair in one audio file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AcousticRecord {
    pub receiver_name: String,
    pub source_name: String,
    pub config: DetectorConfig,
    pub windows: Vec<EventWindow>,
    pub audio_file_id: String,
    pub channel: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resample_rate: Option<f64>,
}

impl AcousticRecord {
    pub fn key(&self) -> RecordKey {
        RecordKey::new(&self.receiver_name, &self.source_name)
    }

    pub fn matches(&self, key: &RecordKey) -> bool {
        self.receiver_name == key.receiver_name && self.source_name == key.source_name
    }

    pub fn event_count(&self) -> usize {
        self.windows.len()
    }
}

/// Per-audio-file collection of records, unique by [`RecordKey`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordSet {
    pub audio_file_id: String,
    records: Vec<AcousticRecord>,
}

impl RecordSet {
    pub fn new(audio_file_id: impl Into<String>) -> Self {
        Self {
            audio_file_id: audio_file_id.into(),
            records: Vec::new(),
        }
    }

    pub fn get(&self, key: &RecordKey) -> Option<&AcousticRecord> {
        self.records.iter().find(|record| record.matches(key))
    }

    pub fn contains(&self, key: &RecordKey) -> bool {
        self.get(key).is_some()
    }

    pub fn records(&self) -> &[AcousticRecord] {
        &self.records
    }

    pub fn keys(&self) -> impl Iterator<Item = RecordKey> + '_ {
        self.records.iter().map(AcousticRecord::key)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Appends a new record or replaces the existing one with the same key
    /// in place, keeping insertion order.
    pub(crate) fn upsert(&mut self, record: AcousticRecord) {
        let key = record.key();
        match self.records.iter_mut().find(|existing| existing.matches(&key)) {
            Some(existing) => *existing = record,
            None => self.records.push(record),
        }
    }

    /// True if no two records share a key.
    pub fn is_unique(&self) -> bool {
        let mut keys: Vec<RecordKey> = self.keys().collect();
        let total = keys.len();
        keys.sort();
        keys.dedup();
        keys.len() == total
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::records::config::SliceConfig;

    fn record(receiver: &str, source: &str, windows: usize) -> AcousticRecord {
        AcousticRecord {
            receiver_name: receiver.into(),
            source_name: source.into(),
            config: DetectorConfig::Slice(SliceConfig {
                window_duration: 1.0,
            }),
            windows: (0..windows)
                .map(|i| EventWindow::without_noise(i as f64 + 0.5, i as f64, i as f64 + 1.0))
                .collect(),
            audio_file_id: "file".into(),
            channel: 0,
            resample_rate: None,
        }
    }

    #[test]
    fn upsert_replaces_by_key() {
        let mut set = RecordSet::new("file");
        set.upsert(record("rx1", "ship", 2));
        set.upsert(record("rx2", "ship", 1));
        set.upsert(record("rx1", "ship", 5));
        assert_eq!(set.len(), 2);
        assert!(set.is_unique());
        assert_eq!(set.records()[0].event_count(), 5);
        assert_eq!(set.get(&RecordKey::new("rx2", "ship")).unwrap().event_count(), 1);
    }

    #[test]
    fn key_display() {
        assert_eq!(RecordKey::new("rx1", "ship").to_string(), "rx1/ship");
    }
}
