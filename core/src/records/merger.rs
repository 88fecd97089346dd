use crate::records::config::{ConfigEntry, DetectorConfig};
use crate::records::diagnostic::{Diagnostic, DiagnosticClass};
use crate::records::event::EventWindow;
use crate::records::record::{AcousticRecord, RecordKey, RecordSet};
use std::collections::HashSet;

/// An entry that passed static validation, with its resolved strategy.
#[derive(Debug, Clone)]
pub struct PlannedEntry<'a> {
    pub entry: &'a ConfigEntry,
    pub config: DetectorConfig,
}

impl PlannedEntry<'_> {
    pub fn key(&self) -> RecordKey {
        self.entry.key()
    }
}

/// Execution order for one batch of configurations against one record set.
#[derive(Debug, Default)]
pub struct BatchPlan<'a> {
    /// Non-mirror entries, in submission order.
    pub direct: Vec<PlannedEntry<'a>>,
    /// Mirror entries, deferred until every direct entry has been merged.
    pub mirrors: Vec<PlannedEntry<'a>>,
    /// Entries that failed validation or repeat a key claimed earlier.
    pub dropped: Vec<Diagnostic>,
}

pub struct RecordMerger;

impl RecordMerger {
    /// Inserts or wholesale-replaces the record for `key`.
    pub fn merge(
        mut set: RecordSet,
        key: &RecordKey,
        config: DetectorConfig,
        windows: Vec<EventWindow>,
        channel: u32,
    ) -> RecordSet {
        let resample_rate = match &config {
            DetectorConfig::NeymanPearson(np) => Some(np.resample_rate),
            _ => None,
        };
        let record = AcousticRecord {
            receiver_name: key.receiver_name.clone(),
            source_name: key.source_name.clone(),
            config,
            windows,
            audio_file_id: set.audio_file_id.clone(),
            channel,
            resample_rate,
        };
        set.upsert(record);
        set
    }

    /// Drops invalid entries, then repeated keys (the first valid entry
    /// wins), and moves mirror entries last.
    pub fn plan(entries: &[ConfigEntry]) -> BatchPlan<'_> {
        let mut seen = HashSet::new();
        let mut plan = BatchPlan::default();
        for entry in entries {
            let key = entry.key();
            let config = match entry.resolve() {
                Ok(config) => config,
                Err(error) => {
                    plan.dropped.push(Diagnostic::from_error(key, &error));
                    continue;
                }
            };
            if !seen.insert(key.clone()) {
                plan.dropped.push(Diagnostic::new(
                    key,
                    DiagnosticClass::DuplicateKey,
                    "key already targeted earlier in this batch; configuration dropped",
                ));
                continue;
            }
            let planned = PlannedEntry { entry, config };
            if planned.config.is_mirror() {
                plan.mirrors.push(planned);
            } else {
                plan.direct.push(planned);
            }
        }
        plan
    }
}
