use crate::records::config::MirrorConfig;
use crate::records::record::{RecordKey, RecordSet};
use crate::records::EventWindow;

#[derive(Debug, Clone, PartialEq)]
pub enum MirrorOutcome {
    /// Verbatim copy of the source record's windows.
    Copied(Vec<EventWindow>),
    /// The mirrored receiver has no record for this source in the set.
    SourceAbsent(RecordKey),
}

impl MirrorOutcome {
    pub fn into_windows(self) -> Vec<EventWindow> {
        match self {
            MirrorOutcome::Copied(windows) => windows,
            MirrorOutcome::SourceAbsent(_) => Vec::new(),
        }
    }
}

/// Copies the windows recorded for `(mirror_receiver_name, target.source_name)`.
pub fn mirror_windows(set: &RecordSet, target: &RecordKey, config: &MirrorConfig) -> MirrorOutcome {
    let source = RecordKey::new(&config.mirror_receiver_name, &target.source_name);
    match set.get(&source) {
        Some(record) => MirrorOutcome::Copied(record.windows.clone()),
        None => MirrorOutcome::SourceAbsent(source),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::records::config::{DetectorConfig, SliceConfig};
    use crate::records::merger::RecordMerger;

    fn mirror_of(receiver: &str) -> MirrorConfig {
        MirrorConfig {
            mirror_receiver_name: receiver.into(),
        }
    }

    #[test]
    fn copies_source_windows_verbatim() {
        let windows = vec![
            EventWindow::with_preceding_noise(1.25, 1.2, 0.1, 1000.0),
            EventWindow::without_noise(3.0, 2.9, 3.1),
        ];
        let set = RecordMerger::merge(
            RecordSet::new("f"),
            &RecordKey::new("rx1", "boat"),
            DetectorConfig::Slice(SliceConfig {
                window_duration: 0.1,
            }),
            windows.clone(),
            0,
        );
        let outcome = mirror_windows(&set, &RecordKey::new("rx2", "boat"), &mirror_of("rx1"));
        assert_eq!(outcome, MirrorOutcome::Copied(windows));
    }

    #[test]
    fn absent_source_yields_empty_windows() {
        let set = RecordSet::new("f");
        let outcome = mirror_windows(&set, &RecordKey::new("rx2", "boat"), &mirror_of("rx1"));
        assert_eq!(outcome, MirrorOutcome::SourceAbsent(RecordKey::new("rx1", "boat")));
        assert!(outcome.into_windows().is_empty());
    }
}
