//! Neyman-Pearson detectors: energy detector (ED) and estimator-correlators
//! for white (ECW) and coloured (ECC) noise.
//!
//! Each kernel is band-limited, resampled to the configured rate and reduced
//! to a test statistic normalized by the recording's noise power. A window is
//! a detection iff at least one kernel fully inside it exceeds the calibrated
//! threshold and passes the minimum-SNR gate; the event is centred on the
//! strongest such kernel.

use crate::covariance::{CorpusRole, CovarianceModel, ModelCache, TrainingCorpus};
use crate::detectors::{suppress_overlaps, Candidate};
use crate::math::special::chi2_isf;
use crate::math::stats::StatsHelper;
use crate::prelude::{DetectError, DetectResult, Detector, DetectorMetadata, DetectorOutput, SampleBuffer};
use crate::processing::filter::{BandFilter, BandLimits};
use crate::processing::resample::LinearResampler;
use crate::records::config::{NeymanPearsonConfig, NeymanPearsonKind};
use crate::records::EventWindow;
use crate::threshold::false_alarm::{correlator_weight, effective_dof};
use crate::threshold::{OperatingCurves, Threshold, ThresholdCalibrator};
use log::debug;
use ndarray::{Array1, Array2};
use std::sync::Arc;

/// SNR assumed for the H1 curves when no minimum SNR is configured.
pub const DEFAULT_DESIGN_SNR_DB: f64 = 0.0;

/// Covariance models shared read-only by every kernel of a recording.
#[derive(Debug, Clone, Default)]
pub struct TrainedModels {
    pub signal: Option<Arc<CovarianceModel>>,
    pub noise: Option<Arc<CovarianceModel>>,
}

impl TrainedModels {
    /// Trains (or fetches from `cache`) the models `config.kind` needs.
    pub fn for_config(
        config: &NeymanPearsonConfig,
        corpus: Option<&TrainingCorpus>,
        cache: &ModelCache,
    ) -> DetectResult<Self> {
        if !config.kind.needs_signal_corpus() {
            return Ok(Self::default());
        }
        let corpus = corpus.ok_or_else(|| {
            DetectError::ConfigurationInvalid(format!(
                "{:?} detector requires a training corpus",
                config.kind
            ))
        })?;
        if (corpus.sample_rate - config.resample_rate).abs() > 1e-6 {
            return Err(DetectError::ConfigurationInvalid(format!(
                "training corpus {} is sampled at {} Hz, detector resamples to {} Hz",
                corpus.id, corpus.sample_rate, config.resample_rate
            )));
        }
        corpus.validate(config.kernel_len(), config.kind.needs_noise_corpus())?;

        let signal = cache.get_or_train(config.estimator, corpus, CorpusRole::Signal)?;
        let noise = if config.kind.needs_noise_corpus() {
            Some(cache.get_or_train(config.estimator, corpus, CorpusRole::Noise)?)
        } else {
            None
        };
        Ok(Self {
            signal: Some(signal),
            noise,
        })
    }
}

/// Decorrelating projection and eigen-weights of the estimator-correlator.
struct Correlator {
    eigenvalues: Vec<f64>,
    eigenvectors: Array2<f64>,
    weights: Array1<f64>,
    whitener: Option<Array2<f64>>,
}

/// Per-kernel outcome.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KernelScore {
    pub start_sample: usize,
    pub statistic: f64,
    pub snr_db: f64,
    pub detected: bool,
}

#[derive(Debug, Clone)]
pub struct KernelScan {
    pub scores: Vec<KernelScore>,
    pub threshold: Option<Threshold>,
    /// Per-sample noise power of the processed kernels.
    pub noise_power: f64,
    /// Chi-squared degrees of freedom of a noise-only kernel energy.
    pub effective_dof: f64,
    pub kernel_samples: usize,
}

pub struct NeymanPearsonDetector<'a> {
    config: &'a NeymanPearsonConfig,
    correlator: Option<Correlator>,
}

impl<'a> NeymanPearsonDetector<'a> {
    pub fn new(config: &'a NeymanPearsonConfig, models: &TrainedModels) -> DetectResult<Self> {
        let kernel_len = config.kernel_len();
        let correlator = match config.kind {
            NeymanPearsonKind::Ed => None,
            NeymanPearsonKind::Ecw | NeymanPearsonKind::Ecc => {
                let signal = models.signal.as_ref().ok_or_else(|| {
                    DetectError::ConfigurationInvalid("missing signal covariance model".into())
                })?;
                if signal.dim() != kernel_len {
                    return Err(DetectError::ConfigurationInvalid(format!(
                        "signal model has dimension {}, kernel has {} samples",
                        signal.dim(),
                        kernel_len
                    )));
                }
                let (model, whitener) = if config.kind == NeymanPearsonKind::Ecc {
                    let noise = models.noise.as_ref().ok_or_else(|| {
                        DetectError::ConfigurationInvalid("missing noise covariance model".into())
                    })?;
                    (signal.prewhitened(noise)?, Some(noise.whitener()))
                } else {
                    (signal.as_ref().clone(), None)
                };
                let snr = design_snr(config);
                let eigenvalues = model.eigen.values.to_vec();
                Some(Correlator {
                    weights: eigenvalues.iter().map(|&l| correlator_weight(l, snr)).collect(),
                    eigenvalues,
                    eigenvectors: model.eigen.vectors.clone(),
                    whitener,
                })
            }
        };
        Ok(Self { config, correlator })
    }

    /// Filters, resamples and scores every kernel of the recording.
    pub fn scan(&self, buffer: &SampleBuffer) -> DetectResult<KernelScan> {
        let fs = buffer.sample_rate;
        let kernel_src = buffer.samples_for(self.config.kernel_duration);
        let kernel_len = self.config.kernel_len();
        if kernel_src == 0 || kernel_len < 2 {
            return Err(DetectError::ConfigurationInvalid(format!(
                "kernel of {}s is too short at {} Hz",
                self.config.kernel_duration, fs
            )));
        }
        let count = buffer.len() / kernel_src;
        let mut scan = KernelScan {
            scores: Vec::new(),
            threshold: None,
            noise_power: 0.0,
            effective_dof: kernel_len as f64,
            kernel_samples: kernel_src,
        };
        if count == 0 {
            return Ok(scan);
        }

        let band = self.effective_band(fs);
        let resampler = LinearResampler::new(kernel_src, kernel_len);
        let whitener = self.correlator.as_ref().and_then(|c| c.whitener.as_ref());
        let dof = kernel_dof(band.as_ref(), fs, kernel_src, &resampler, whitener);

        let mut filter = BandFilter::new(&buffer.samples, fs, band);
        let mut energies = Vec::with_capacity(count);
        let mut raw = Vec::with_capacity(count);
        for k in 0..count {
            let segment = filter.segment(k * kernel_src, kernel_src, kernel_src);
            let mut kernel = Array1::from(resampler.apply(&segment));
            if let Some(whitener) = whitener {
                kernel = whitener.dot(&kernel);
            }
            let energy = kernel.dot(&kernel);
            let statistic = match &self.correlator {
                None => energy,
                Some(correlator) => {
                    let projected = correlator.eigenvectors.t().dot(&kernel);
                    projected
                        .iter()
                        .zip(correlator.weights.iter())
                        .map(|(y, w)| w * y * y)
                        .sum::<f64>()
                }
            };
            energies.push(energy);
            raw.push(statistic);
        }

        let p = kernel_len as f64;
        // kernel energy ~ (p / dof) σ² χ²(dof), σ² being the per-sample noise power
        let chi2_median = chi2_isf(0.5, dof);
        let noise_power = StatsHelper::median(&energies).unwrap_or(0.0) * dof / (p * chi2_median);
        if !(noise_power.is_finite() && noise_power > 0.0) {
            debug!("neyman-pearson: recording carries no noise power");
            return Ok(scan);
        }
        scan.effective_dof = dof;

        let curves = self.curves(dof)?;
        let threshold = ThresholdCalibrator::neyman_pearson(
            &curves,
            self.config.target_pfa,
            self.config.sensitivity,
        );
        let level = threshold.value();
        let statistic_scale = match &self.correlator {
            None => noise_power * p / dof,
            Some(_) => noise_power,
        };

        scan.scores = energies
            .iter()
            .zip(raw.iter())
            .enumerate()
            .map(|(k, (&energy, &stat))| {
                let statistic = stat / statistic_scale;
                let excess = (energy / noise_power - p) / p;
                let snr_db = if excess > 0.0 {
                    10.0 * excess.log10()
                } else {
                    f64::NEG_INFINITY
                };
                let gated = self.config.min_snr_level.map_or(true, |min| snr_db >= min);
                KernelScore {
                    start_sample: k * kernel_src,
                    statistic,
                    snr_db,
                    detected: statistic > level && gated,
                }
            })
            .collect();
        scan.threshold = Some(threshold);
        scan.noise_power = noise_power;
        Ok(scan)
    }

    fn effective_band(&self, source_rate: f64) -> Option<BandLimits> {
        let nyquist = 0.5 * source_rate.min(self.config.resample_rate);
        match self.config.cutoff_freqs {
            Some(band) => Some(band.capped(nyquist)),
            None if self.config.resample_rate < source_rate => Some(BandLimits::new(0.0, nyquist)),
            None => None,
        }
    }

    fn curves(&self, dof: f64) -> DetectResult<OperatingCurves> {
        let snr = design_snr(self.config);
        match &self.correlator {
            None => Ok(OperatingCurves::energy(dof, snr)),
            Some(correlator) => OperatingCurves::estimator_correlator(&correlator.eigenvalues, snr)
                .ok_or_else(|| {
                    DetectError::RuntimeDetectionFailure(
                        "covariance eigenspectrum is degenerate".into(),
                    )
                }),
        }
    }
}

/// Effective degrees of freedom of a noise-only kernel. Unit white noise is
/// pushed through the band mask, the resampling taps and the optional
/// whitener, and the resulting covariance is moment-matched to a chi-squared.
fn kernel_dof(
    band: Option<&BandLimits>,
    fs: f64,
    kernel_src: usize,
    resampler: &LinearResampler,
    whitener: Option<&Array2<f64>>,
) -> f64 {
    let p = resampler.output_len();
    // segments are filtered with one kernel of context on either side
    let autocorrelation = match band {
        Some(band) => band.white_noise_autocorrelation(fs, 3 * kernel_src, kernel_src),
        None => {
            let mut white = vec![0.0; kernel_src];
            white[0] = 1.0;
            white
        }
    };
    let r = autocorrelation.as_slice();
    let taps = resampler.taps();
    let mut covariance = Array2::<f64>::from_shape_fn((p, p), |(j, k)| {
        taps[j]
            .iter()
            .flat_map(|&(a, wa)| {
                taps[k]
                    .iter()
                    .map(move |&(b, wb)| wa * wb * r[a.abs_diff(b)])
            })
            .sum::<f64>()
    });
    if let Some(whitener) = whitener {
        covariance = whitener.dot(&covariance).dot(&whitener.t());
    }
    effective_dof(covariance.view())
        .map(|dof| dof.clamp(1.0, p as f64))
        .unwrap_or(p as f64)
}

fn design_snr(config: &NeymanPearsonConfig) -> f64 {
    let db = config.min_snr_level.unwrap_or(DEFAULT_DESIGN_SNR_DB);
    10f64.powf(db / 10.0)
}

impl Detector for NeymanPearsonDetector<'_> {
    fn name(&self) -> &'static str {
        match self.config.kind {
            NeymanPearsonKind::Ed => "neyman_pearson_ed",
            NeymanPearsonKind::Ecw => "neyman_pearson_ecw",
            NeymanPearsonKind::Ecc => "neyman_pearson_ecc",
        }
    }

    fn detect(&self, buffer: &SampleBuffer) -> DetectResult<DetectorOutput> {
        let scan = self.scan(buffer)?;
        let fs = buffer.sample_rate;
        let window_src = buffer.samples_for(self.config.window_duration).max(1);
        let window_count = buffer.len() / window_src;

        let mut best: Vec<Option<KernelScore>> = vec![None; window_count];
        for score in scan.scores.iter().filter(|s| s.detected) {
            let window = score.start_sample / window_src;
            let contained = score.start_sample + scan.kernel_samples <= (window + 1) * window_src;
            if window >= window_count || !contained {
                continue;
            }
            let slot = &mut best[window];
            if slot.map_or(true, |current| score.statistic > current.statistic) {
                *slot = Some(*score);
            }
        }

        let candidates: Vec<Candidate> = best
            .into_iter()
            .flatten()
            .map(|score| {
                let centre = (score.start_sample as f64 + 0.5 * scan.kernel_samples as f64) / fs;
                Candidate {
                    window: EventWindow::with_preceding_noise(
                        centre,
                        centre - self.config.window_offset,
                        self.config.window_duration,
                        fs,
                    ),
                    score: score.statistic,
                }
            })
            .collect();
        let candidate_count = candidates.len();
        let windows = suppress_overlaps(candidates);

        let mut notes = vec![format!(
            "{} of {} kernels detected, noise power {:.3e}, {:.1} effective dof",
            scan.scores.iter().filter(|s| s.detected).count(),
            scan.scores.len(),
            scan.noise_power,
            scan.effective_dof
        )];
        if let Some(threshold) = &scan.threshold {
            notes.push(threshold.describe());
        }

        Ok(DetectorOutput {
            metadata: DetectorMetadata {
                threshold: scan.threshold.as_ref().map(Threshold::value),
                candidate_count: Some(candidate_count),
                notes,
            },
            windows,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::covariance::EstimatorKind;
    use rand::{rngs::StdRng, Rng, SeedableRng};
    use std::f64::consts::PI;

    fn gaussian(rng: &mut StdRng) -> f64 {
        let u1: f64 = rng.gen_range(f64::EPSILON..1.0);
        let u2: f64 = rng.gen_range(0.0..1.0);
        (-2.0 * u1.ln()).sqrt() * (2.0 * PI * u2).cos()
    }

    fn config(kind: NeymanPearsonKind) -> NeymanPearsonConfig {
        NeymanPearsonConfig {
            kind,
            kernel_duration: 0.008,
            window_duration: 0.064,
            window_offset: 0.016,
            target_pfa: 0.05,
            sensitivity: 1.0,
            min_snr_level: None,
            cutoff_freqs: None,
            estimator: EstimatorKind::OracleApproximating,
            resample_rate: 8000.0,
        }
    }

    fn white_noise(n: usize, sigma: f64, seed: u64) -> Vec<f64> {
        let mut rng = StdRng::seed_from_u64(seed);
        (0..n).map(|_| sigma * gaussian(&mut rng)).collect()
    }

    fn to_buffer(samples: &[f64], fs: f64) -> SampleBuffer {
        SampleBuffer::new(samples.iter().map(|&v| v as f32).collect(), fs)
    }

    fn tone_corpus(rows: usize, len: usize, fs: f64, seed: u64) -> TrainingCorpus {
        let mut rng = StdRng::seed_from_u64(seed);
        let mut signal = Array2::<f64>::zeros((rows, len));
        for mut row in signal.rows_mut() {
            let phase = rng.gen_range(0.0..2.0 * PI);
            let amp = rng.gen_range(0.5..1.5);
            for (i, v) in row.iter_mut().enumerate() {
                *v = amp * (2.0 * PI * 1000.0 * i as f64 / fs + phase).sin();
            }
        }
        let noise = Array2::from_shape_fn((rows, len), |_| gaussian(&mut rng));
        TrainingCorpus::new("tones", fs, signal).with_noise(noise)
    }

    fn add_bursts(samples: &mut [f64], fs: f64, starts: &[usize], len: usize, amp: f64) {
        for &start in starts {
            for i in 0..len {
                samples[start + i] += amp * (2.0 * PI * 1000.0 * i as f64 / fs).sin();
            }
        }
    }

    fn false_alarm_rate(cfg: &NeymanPearsonConfig, seed: u64) -> (f64, KernelScan) {
        let samples = white_noise(64 * 4000, 1.0, seed);
        let detector = NeymanPearsonDetector::new(cfg, &TrainedModels::default()).unwrap();
        let scan = detector.scan(&to_buffer(&samples, 8000.0)).unwrap();
        let level = scan.threshold.as_ref().unwrap().value();
        let alarms = scan.scores.iter().filter(|s| s.statistic > level).count();
        (alarms as f64 / scan.scores.len() as f64, scan)
    }

    #[test]
    fn energy_detector_false_alarm_rate_matches_target() {
        let cfg = config(NeymanPearsonKind::Ed);
        let (rate, scan) = false_alarm_rate(&cfg, 2024);
        assert_eq!(scan.scores.len(), 4000);
        assert_eq!(scan.effective_dof, 64.0);
        assert!((rate - cfg.target_pfa).abs() < 0.015, "false alarm rate {}", rate);
    }

    #[test]
    fn band_limited_energy_detector_keeps_target_rate() {
        let mut cfg = config(NeymanPearsonKind::Ed);
        cfg.cutoff_freqs = Some(BandLimits::new(500.0, 1500.0));
        let (rate, scan) = false_alarm_rate(&cfg, 77);
        assert_eq!(scan.scores.len(), 4000);
        // a 1 kHz band out of 4 kHz leaves roughly a quarter of the samples independent
        assert!(scan.effective_dof > 12.0 && scan.effective_dof < 24.0, "{}", scan.effective_dof);
        assert!((rate - cfg.target_pfa).abs() < 0.015, "false alarm rate {}", rate);
    }

    #[test]
    fn upsampled_energy_detector_keeps_target_rate() {
        let mut cfg = config(NeymanPearsonKind::Ed);
        cfg.resample_rate = 16_000.0;
        let (rate, scan) = false_alarm_rate(&cfg, 78);
        assert_eq!(scan.scores.len(), 4000);
        assert!(scan.effective_dof < 128.0);
        assert!((rate - cfg.target_pfa).abs() < 0.015, "false alarm rate {}", rate);
    }

    #[test]
    fn energy_detector_needs_no_corpus_and_finds_bursts() {
        let fs = 8000.0;
        let mut cfg = config(NeymanPearsonKind::Ed);
        cfg.target_pfa = 1e-4;
        cfg.min_snr_level = Some(0.0);
        let mut samples = white_noise(8000 * 4, 0.05, 3);
        add_bursts(&mut samples, fs, &[8_000, 20_000], 256, 1.0);
        let detector = NeymanPearsonDetector::new(&cfg, &TrainedModels::default()).unwrap();
        let output = detector.detect(&to_buffer(&samples, fs)).unwrap();

        assert_eq!(output.windows.len(), 2, "{:?}", output.metadata.notes);
        assert!((output.windows[0].signal_time - 1.0).abs() < 0.04);
        assert!((output.windows[1].signal_time - 2.5).abs() < 0.04);
        for pair in output.windows.windows(2) {
            assert!(!pair[0].overlaps(&pair[1]));
        }
        for window in &output.windows {
            assert!(window.is_well_formed(), "{:?}", window);
            assert!((window.signal_time - window.signal_start - cfg.window_offset).abs() < 1e-9);
        }
    }

    #[test]
    fn min_snr_gate_suppresses_weak_kernels() {
        let fs = 8000.0;
        let mut cfg = config(NeymanPearsonKind::Ed);
        cfg.min_snr_level = Some(60.0);
        let mut samples = white_noise(8000 * 2, 0.05, 8);
        add_bursts(&mut samples, fs, &[4_000], 256, 1.0);
        let detector = NeymanPearsonDetector::new(&cfg, &TrainedModels::default()).unwrap();
        let output = detector.detect(&to_buffer(&samples, fs)).unwrap();
        assert!(output.windows.is_empty());
    }

    #[test]
    fn white_correlator_detects_trained_tone() {
        let fs = 8000.0;
        let mut cfg = config(NeymanPearsonKind::Ecw);
        cfg.target_pfa = 1e-4;
        cfg.min_snr_level = Some(0.0);
        let corpus = tone_corpus(200, cfg.kernel_len(), fs, 1);
        let cache = ModelCache::new();
        let models = TrainedModels::for_config(&cfg, Some(&corpus), &cache).unwrap();
        let mut samples = white_noise(8000 * 3, 0.05, 4);
        add_bursts(&mut samples, fs, &[12_000], 256, 0.5);
        let detector = NeymanPearsonDetector::new(&cfg, &models).unwrap();
        let output = detector.detect(&to_buffer(&samples, fs)).unwrap();

        assert_eq!(output.windows.len(), 1, "{:?}", output.metadata.notes);
        assert!((output.windows[0].signal_time - 1.5).abs() < 0.04);
    }

    #[test]
    fn coloured_correlator_requires_noise_set() {
        let fs = 8000.0;
        let cfg = config(NeymanPearsonKind::Ecc);
        let mut corpus = tone_corpus(200, cfg.kernel_len(), fs, 1);
        corpus.noise = None;
        let err = TrainedModels::for_config(&cfg, Some(&corpus), &ModelCache::new()).unwrap_err();
        assert!(matches!(err, DetectError::ConfigurationInvalid(_)));
    }

    #[test]
    fn coloured_correlator_detects_trained_tone() {
        let fs = 8000.0;
        let mut cfg = config(NeymanPearsonKind::Ecc);
        cfg.target_pfa = 1e-4;
        cfg.min_snr_level = Some(0.0);
        let corpus = tone_corpus(300, cfg.kernel_len(), fs, 9);
        let models = TrainedModels::for_config(&cfg, Some(&corpus), &ModelCache::new()).unwrap();
        assert!(models.noise.is_some());
        let mut samples = white_noise(8000 * 3, 0.05, 6);
        add_bursts(&mut samples, fs, &[12_000], 256, 0.5);
        let detector = NeymanPearsonDetector::new(&cfg, &models).unwrap();
        let output = detector.detect(&to_buffer(&samples, fs)).unwrap();
        assert_eq!(output.windows.len(), 1, "{:?}", output.metadata.notes);
    }

    #[test]
    fn degenerate_corpus_fails_configuration() {
        let cfg = config(NeymanPearsonKind::Ecw);
        let corpus = TrainingCorpus::new("short", 8000.0, Array2::zeros((10, cfg.kernel_len())));
        let err = TrainedModels::for_config(&cfg, Some(&corpus), &ModelCache::new()).unwrap_err();
        assert!(matches!(err, DetectError::ConfigurationInvalid(_)));
        let err = TrainedModels::for_config(&cfg, None, &ModelCache::new()).unwrap_err();
        assert!(matches!(err, DetectError::ConfigurationInvalid(_)));
    }

    #[test]
    fn silent_recording_yields_no_detections() {
        let cfg = config(NeymanPearsonKind::Ed);
        let detector = NeymanPearsonDetector::new(&cfg, &TrainedModels::default()).unwrap();
        let output = detector.detect(&SampleBuffer::new(vec![0.0; 8000], 8000.0)).unwrap();
        assert!(output.windows.is_empty());
    }

    #[test]
    fn resampling_runs_at_configured_rate() {
        let mut cfg = config(NeymanPearsonKind::Ed);
        cfg.resample_rate = 4000.0;
        let samples = white_noise(16_000, 1.0, 12);
        let detector = NeymanPearsonDetector::new(&cfg, &TrainedModels::default()).unwrap();
        let scan = detector.scan(&to_buffer(&samples, 8000.0)).unwrap();
        assert_eq!(scan.kernel_samples, 64);
        assert_eq!(scan.scores.len(), 250);
        assert!(scan.noise_power > 0.0);
    }
}
