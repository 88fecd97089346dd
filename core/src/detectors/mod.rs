//! Detection strategies and the shared post-processing of their candidates.

pub mod constant_rate;
pub mod mirror;
pub mod moving_average;
pub mod neyman_pearson;
pub mod slice;

pub use constant_rate::{ConstantRateDetector, PulseSchedule};
pub use mirror::{mirror_windows, MirrorOutcome};
pub use moving_average::MovingAverageDetector;
pub use neyman_pearson::{NeymanPearsonDetector, TrainedModels};
pub use slice::SliceDetector;

use crate::covariance::{ModelCache, TrainingCorpus};
use crate::prelude::{DetectError, DetectResult, Detector, DetectorOutput, SampleBuffer};
use crate::records::config::DetectorConfig;
use crate::records::EventWindow;
use log::debug;

/// Per-recording inputs some strategies need beyond the samples.
pub struct DetectionContext<'a> {
    pub pulse: Option<PulseSchedule>,
    pub corpus: Option<&'a TrainingCorpus>,
    pub models: &'a ModelCache,
}

/// Runs the non-mirror strategy `config` over `buffer`.
pub fn run_detector(
    config: &DetectorConfig,
    buffer: &SampleBuffer,
    context: &DetectionContext<'_>,
) -> DetectResult<DetectorOutput> {
    config.validate()?;
    let output = match config {
        DetectorConfig::Slice(cfg) => SliceDetector::new(cfg).detect(buffer),
        DetectorConfig::ConstantRate(cfg) => {
            let schedule = context.pulse.ok_or_else(|| {
                DetectError::ConfigurationInvalid(
                    "constant rate detection needs a pulse schedule for this file".into(),
                )
            })?;
            schedule.validate()?;
            ConstantRateDetector::new(cfg, schedule).detect(buffer)
        }
        DetectorConfig::MovingAverage(cfg) => MovingAverageDetector::new(cfg).detect(buffer),
        DetectorConfig::NeymanPearson(cfg) => {
            let models = TrainedModels::for_config(cfg, context.corpus, context.models)?;
            NeymanPearsonDetector::new(cfg, &models)?.detect(buffer)
        }
        DetectorConfig::Mirror(_) => Err(DetectError::ConfigurationInvalid(
            "mirror configurations copy an existing record and run no detector".into(),
        )),
    }?;
    debug!(
        "{}: {} windows ({:?} candidates)",
        config.strategy_name(),
        output.windows.len(),
        output.metadata.candidate_count
    );
    Ok(output)
}

/// A proposed event window with the score used to arbitrate overlaps.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct Candidate {
    pub window: EventWindow,
    pub score: f64,
}

/// Collapses each run of consecutive indices to its highest-scoring item
/// (the earliest on ties). Items must be sorted by index.
pub(crate) fn strongest_in_runs<T>(items: Vec<(usize, f64, T)>) -> Vec<T> {
    let mut kept: Vec<(usize, f64, T)> = Vec::with_capacity(items.len());
    let mut previous: Option<usize> = None;
    for (index, score, item) in items {
        let continues_run = previous.map_or(false, |p| p + 1 == index);
        previous = Some(index);
        match kept.last_mut() {
            Some(best) if continues_run => {
                if score > best.1 {
                    *best = (index, score, item);
                }
            }
            _ => kept.push((index, score, item)),
        }
    }
    kept.into_iter().map(|(_, _, item)| item).collect()
}

/// Orders candidates by start time and resolves overlapping signal windows
/// in favour of the higher score.
pub(crate) fn suppress_overlaps(mut candidates: Vec<Candidate>) -> Vec<EventWindow> {
    candidates.sort_by(|a, b| a.window.signal_start.total_cmp(&b.window.signal_start));
    let mut kept: Vec<Candidate> = Vec::with_capacity(candidates.len());
    for candidate in candidates {
        match kept.last_mut() {
            Some(last) if last.window.overlaps(&candidate.window) => {
                if candidate.score > last.score {
                    *last = candidate;
                }
            }
            _ => kept.push(candidate),
        }
    }
    kept.into_iter().map(|c| c.window).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::records::config::{MirrorConfig, SliceConfig};

    fn candidate(start: f64, score: f64) -> Candidate {
        Candidate {
            window: EventWindow::without_noise(start + 0.05, start, start + 0.1),
            score,
        }
    }

    #[test]
    fn runs_keep_their_strongest_member() {
        let items = vec![(3, 1.0, 'a'), (4, 5.0, 'b'), (5, 2.0, 'c'), (9, 1.0, 'd'), (10, 1.0, 'e')];
        assert_eq!(strongest_in_runs(items), vec!['b', 'd']);
    }

    #[test]
    fn one_survivor_per_run() {
        let items = vec![(0, 5.0, 0), (1, 1.0, 1), (2, 5.0, 2)];
        assert_eq!(strongest_in_runs(items), vec![0]);
        assert!(strongest_in_runs::<u8>(Vec::new()).is_empty());
    }

    #[test]
    fn overlapping_windows_resolve_to_higher_score() {
        let windows = suppress_overlaps(vec![
            candidate(1.0, 2.0),
            candidate(0.95, 3.0),
            candidate(2.0, 1.0),
        ]);
        assert_eq!(windows.len(), 2);
        assert_eq!(windows[0].signal_start, 0.95);
        assert_eq!(windows[1].signal_start, 2.0);
    }

    #[test]
    fn dispatch_rejects_mirror_and_missing_schedule() {
        let cache = ModelCache::new();
        let context = DetectionContext {
            pulse: None,
            corpus: None,
            models: &cache,
        };
        let buffer = SampleBuffer::new(vec![0.0; 1000], 1000.0);
        let mirror = DetectorConfig::Mirror(MirrorConfig {
            mirror_receiver_name: "rx1".into(),
        });
        assert!(run_detector(&mirror, &buffer, &context).is_err());

        let constant = DetectorConfig::ConstantRate(crate::records::config::ConstantRateConfig {
            window_duration: 0.1,
            window_offset: None,
        });
        let err = run_detector(&constant, &buffer, &context).unwrap_err();
        assert!(matches!(err, DetectError::ConfigurationInvalid(_)));

        let slice = DetectorConfig::Slice(SliceConfig {
            window_duration: 0.25,
        });
        assert_eq!(run_detector(&slice, &buffer, &context).unwrap().windows.len(), 4);
    }

    #[test]
    fn dispatch_rejects_windows_that_cannot_hold_their_event() {
        use crate::records::config::{ConstantRateConfig, MovingAverageConfig};
        let cache = ModelCache::new();
        let context = DetectionContext {
            pulse: Some(PulseSchedule {
                first_pulse_s: 0.1,
                pulse_interval_ms: 100.0,
            }),
            corpus: None,
            models: &cache,
        };
        let buffer = SampleBuffer::new(vec![0.0; 1000], 1000.0);

        let late_offset = DetectorConfig::MovingAverage(MovingAverageConfig {
            window_duration: 0.05,
            window_offset: 0.08,
            threshold: None,
            cutoff_freqs: None,
        });
        let err = run_detector(&late_offset, &buffer, &context).unwrap_err();
        assert!(matches!(err, DetectError::ConfigurationInvalid(_)));

        let overlapping = DetectorConfig::ConstantRate(ConstantRateConfig {
            window_duration: 0.15,
            window_offset: None,
        });
        let err = run_detector(&overlapping, &buffer, &context).unwrap_err();
        assert!(matches!(err, DetectError::ConfigurationInvalid(_)));

        let fitting = DetectorConfig::ConstantRate(ConstantRateConfig {
            window_duration: 0.1,
            window_offset: Some(0.1),
        });
        let output = run_detector(&fitting, &buffer, &context).unwrap();
        assert_eq!(output.windows.len(), 9);
        assert!(output.windows.iter().all(EventWindow::is_well_formed));
    }
}
