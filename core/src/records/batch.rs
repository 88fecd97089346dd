//! Applies a batch of configurations to one audio file and persists the
//! resulting record set.
//!
//! Entries are planned first (invalid entries and duplicate keys dropped,
//! mirrors deferred), then every direct entry runs against the recording and
//! mirrors copy from the merged set. A failing entry only costs its own record; load and save
//! failures abort the batch and leave the stored set untouched.

use crate::covariance::{ModelCache, TrainingCorpus};
use crate::detectors::{mirror_windows, run_detector, DetectionContext, MirrorOutcome, PulseSchedule};
use crate::prelude::{DetectResult, SampleBuffer};
use crate::records::config::{ConfigEntry, DetectorConfig};
use crate::records::diagnostic::{Diagnostic, DiagnosticClass};
use crate::records::merger::RecordMerger;
use crate::records::record::{RecordKey, RecordSet};
use crate::records::store::RecordStore;
use crate::telemetry::{LogManager, MetricsRecorder};
use std::collections::HashMap;

/// Everything one audio file brings to a batch.
pub struct FileInputs<'a> {
    pub audio_file_id: &'a str,
    pub buffer: &'a SampleBuffer,
    pub pulse: Option<PulseSchedule>,
    /// Training corpora keyed by source name.
    pub corpora: &'a HashMap<String, TrainingCorpus>,
    pub models: &'a ModelCache,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct BatchReport {
    pub audio_file_id: String,
    /// Keys whose record was inserted or replaced, in merge order.
    pub written: Vec<RecordKey>,
    pub diagnostics: Vec<Diagnostic>,
    pub events_written: usize,
    pub persisted: bool,
}

impl BatchReport {
    pub fn failures(&self) -> impl Iterator<Item = &Diagnostic> {
        self.diagnostics.iter().filter(|d| {
            !matches!(d.class, DiagnosticClass::Notice | DiagnosticClass::DuplicateKey)
        })
    }
}

pub fn process_file(
    inputs: &FileInputs<'_>,
    entries: &[ConfigEntry],
    store: &dyn RecordStore,
    metrics: &MetricsRecorder,
) -> DetectResult<BatchReport> {
    let log = LogManager::new();
    let mut set = store
        .load(inputs.audio_file_id)?
        .unwrap_or_else(|| RecordSet::new(inputs.audio_file_id));
    let mut report = BatchReport {
        audio_file_id: inputs.audio_file_id.to_string(),
        ..Default::default()
    };

    let plan = RecordMerger::plan(entries);
    for dropped in &plan.dropped {
        if dropped.class != DiagnosticClass::DuplicateKey {
            metrics.record_error();
        }
    }
    report.diagnostics.extend(plan.dropped);

    for planned in plan.direct {
        let key = planned.key();
        let context = DetectionContext {
            pulse: inputs.pulse,
            corpus: inputs.corpora.get(&planned.entry.source_name),
            models: inputs.models,
        };
        match run_detector(&planned.config, inputs.buffer, &context) {
            Ok(output) => {
                let events = output.windows.len();
                set = RecordMerger::merge(
                    set,
                    &key,
                    planned.config,
                    output.windows,
                    planned.entry.channel,
                );
                metrics.record_processed(events);
                report.events_written += events;
                report.written.push(key);
            }
            Err(error) => {
                metrics.record_error();
                report.diagnostics.push(Diagnostic::from_error(key, &error));
            }
        }
    }

    for planned in plan.mirrors {
        let key = planned.key();
        let windows = match &planned.config {
            DetectorConfig::Mirror(mirror) => match mirror_windows(&set, &key, mirror) {
                MirrorOutcome::Copied(windows) => windows,
                MirrorOutcome::SourceAbsent(source) => {
                    report.diagnostics.push(Diagnostic::new(
                        key.clone(),
                        DiagnosticClass::Notice,
                        format!("mirror source {} has no record; writing no events", source),
                    ));
                    Vec::new()
                }
            },
            _ => Vec::new(),
        };
        let events = windows.len();
        set = RecordMerger::merge(set, &key, planned.config, windows, planned.entry.channel);
        metrics.record_processed(events);
        report.events_written += events;
        report.written.push(key);
    }

    for diagnostic in &report.diagnostics {
        log.diagnostic(diagnostic);
    }

    if !report.written.is_empty() {
        store.save(&set)?;
        metrics.record_persisted();
        report.persisted = true;
    }
    log.record(&format!(
        "{}: {} records written, {} events, {} diagnostics",
        report.audio_file_id,
        report.written.len(),
        report.events_written,
        report.diagnostics.len()
    ));
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prelude::DetectError;
    use crate::records::config::{ConstantRateConfig, MovingAverageConfig, SliceConfig};
    use crate::records::store::{InMemoryStore, JsonFileStore};
    use crate::records::EventWindow;
    use tempfile::tempdir;

    struct FailingStore {
        inner: InMemoryStore,
    }

    impl RecordStore for FailingStore {
        fn load(&self, audio_file_id: &str) -> DetectResult<Option<RecordSet>> {
            self.inner.load(audio_file_id)
        }

        fn save(&self, _set: &RecordSet) -> DetectResult<()> {
            Err(DetectError::PersistenceFailure("disk full".into()))
        }
    }

    fn slice(window: f64) -> DetectorConfig {
        DetectorConfig::Slice(SliceConfig {
            window_duration: window,
        })
    }

    fn run(
        entries: &[ConfigEntry],
        store: &dyn RecordStore,
        pulse: Option<PulseSchedule>,
    ) -> DetectResult<BatchReport> {
        let buffer = SampleBuffer::new(vec![0.0; 4000], 1000.0);
        let corpora = HashMap::new();
        let models = ModelCache::new();
        let inputs = FileInputs {
            audio_file_id: "file-1",
            buffer: &buffer,
            pulse,
            corpora: &corpora,
            models: &models,
        };
        process_file(&inputs, entries, store, &MetricsRecorder::new())
    }

    #[test]
    fn rerun_overwrites_existing_record() {
        let store = InMemoryStore::new();
        run(&[ConfigEntry::detector("rx1", "ship", slice(1.0))], &store, None).unwrap();
        run(&[ConfigEntry::detector("rx1", "ship", slice(2.0))], &store, None).unwrap();
        let set = store.load("file-1").unwrap().unwrap();
        assert_eq!(set.len(), 1);
        let record = set.get(&RecordKey::new("rx1", "ship")).unwrap();
        assert_eq!(record.config, slice(2.0));
        assert_eq!(record.event_count(), 2);
    }

    #[test]
    fn mirror_listed_before_source_still_copies() {
        let store = InMemoryStore::new();
        let entries = vec![
            ConfigEntry::mirror("rx2", "ship", "rx1"),
            ConfigEntry::detector("rx1", "ship", slice(0.5)),
        ];
        let report = run(&entries, &store, None).unwrap();
        assert!(report.diagnostics.is_empty());
        let set = store.load("file-1").unwrap().unwrap();
        let source = set.get(&RecordKey::new("rx1", "ship")).unwrap();
        let mirror = set.get(&RecordKey::new("rx2", "ship")).unwrap();
        assert_eq!(source.windows, mirror.windows);
        assert_eq!(mirror.event_count(), 8);
    }

    #[test]
    fn mirror_of_absent_source_writes_empty_record() {
        let store = InMemoryStore::new();
        let report = run(&[ConfigEntry::mirror("rx2", "ship", "rx9")], &store, None).unwrap();
        assert_eq!(report.diagnostics.len(), 1);
        assert_eq!(report.diagnostics[0].class, DiagnosticClass::Notice);
        let set = store.load("file-1").unwrap().unwrap();
        assert_eq!(set.get(&RecordKey::new("rx2", "ship")).unwrap().event_count(), 0);
    }

    #[test]
    fn duplicate_key_keeps_first_configuration() {
        let store = InMemoryStore::new();
        let entries = vec![
            ConfigEntry::detector("rx1", "ship", slice(1.0)),
            ConfigEntry::detector("rx1", "ship", slice(0.25)),
        ];
        let report = run(&entries, &store, None).unwrap();
        assert_eq!(report.written.len(), 1);
        assert_eq!(report.diagnostics[0].class, DiagnosticClass::DuplicateKey);
        let set = store.load("file-1").unwrap().unwrap();
        assert!(set.is_unique());
        assert_eq!(set.records()[0].config, slice(1.0));
    }

    #[test]
    fn invalid_entry_leaves_its_key_to_a_later_valid_one() {
        let store = InMemoryStore::new();
        let entries = vec![
            ConfigEntry::detector("rx1", "ship", slice(-1.0)),
            ConfigEntry::detector("rx1", "ship", slice(1.0)),
        ];
        let report = run(&entries, &store, None).unwrap();
        assert_eq!(report.written, vec![RecordKey::new("rx1", "ship")]);
        assert_eq!(report.diagnostics.len(), 1);
        assert_eq!(report.diagnostics[0].class, DiagnosticClass::ConfigurationInvalid);
        let set = store.load("file-1").unwrap().unwrap();
        assert_eq!(set.records()[0].config, slice(1.0));
        assert_eq!(set.records()[0].event_count(), 4);
    }

    #[test]
    fn failing_entry_does_not_block_the_rest() {
        let store = InMemoryStore::new();
        let bad = DetectorConfig::MovingAverage(MovingAverageConfig {
            window_duration: -1.0,
            window_offset: 0.0,
            threshold: None,
            cutoff_freqs: None,
        });
        let missing_schedule = DetectorConfig::ConstantRate(ConstantRateConfig {
            window_duration: 0.1,
            window_offset: None,
        });
        let entries = vec![
            ConfigEntry::detector("rx1", "ship", bad),
            ConfigEntry::detector("rx2", "ship", missing_schedule),
            ConfigEntry::detector("rx3", "ship", slice(1.0)),
        ];
        let report = run(&entries, &store, None).unwrap();
        assert_eq!(report.failures().count(), 2);
        assert!(report
            .failures()
            .all(|d| d.class == DiagnosticClass::ConfigurationInvalid));
        let set = store.load("file-1").unwrap().unwrap();
        assert_eq!(set.keys().collect::<Vec<_>>(), vec![RecordKey::new("rx3", "ship")]);
    }

    #[test]
    fn failed_save_leaves_stored_set_untouched() {
        let inner = InMemoryStore::new();
        let before = RecordMerger::merge(
            RecordSet::new("file-1"),
            &RecordKey::new("rx1", "ship"),
            slice(1.0),
            vec![EventWindow::without_noise(0.5, 0.0, 1.0)],
            0,
        );
        inner.save(&before).unwrap();
        let store = FailingStore { inner };
        let err = run(&[ConfigEntry::detector("rx1", "ship", slice(0.5))], &store, None).unwrap_err();
        assert!(err.is_fatal());
        assert_eq!(store.load("file-1").unwrap(), Some(before));
    }

    #[test]
    fn nothing_written_creates_no_file() {
        let dir = tempdir().unwrap();
        let store = JsonFileStore::new(dir.path());
        let entries = vec![ConfigEntry::detector("rx1", "ship", slice(-1.0))];
        let report = run(&entries, &store, None).unwrap();
        assert!(!report.persisted);
        assert!(store.load("file-1").unwrap().is_none());

        let pulse = PulseSchedule {
            first_pulse_s: 0.5,
            pulse_interval_ms: 1000.0,
        };
        let constant = DetectorConfig::ConstantRate(ConstantRateConfig {
            window_duration: 0.2,
            window_offset: Some(0.05),
        });
        let report = run(&[ConfigEntry::detector("rx1", "ship", constant)], &store, Some(pulse)).unwrap();
        assert!(report.persisted);
        assert_eq!(report.events_written, 4);
        assert!(store.path_for("file-1").exists());
    }
}
