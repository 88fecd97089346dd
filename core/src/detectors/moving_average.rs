use crate::detectors::{strongest_in_runs, suppress_overlaps, Candidate};
use crate::math::stats::StatsHelper;
use crate::prelude::{DetectError, DetectResult, Detector, DetectorMetadata, DetectorOutput, SampleBuffer};
use crate::processing::window_stats::{WindowStatistics, DEFAULT_CHUNK_WINDOWS};
use crate::records::config::MovingAverageConfig;
use crate::records::EventWindow;
use crate::threshold::ThresholdCalibrator;
use log::debug;

/// Smoothing kernel for the peak search, as a fraction of the window length.
const PEAK_KERNEL_DIVISOR: usize = 30;

/// Adaptive detector on the ratio of each window's band-limited RMS to its predecessor's.
pub struct MovingAverageDetector<'a> {
    config: &'a MovingAverageConfig,
    chunk_windows: usize,
}

struct Exceedance {
    peak_sample: usize,
    peak_rms: f64,
}

impl<'a> MovingAverageDetector<'a> {
    pub fn new(config: &'a MovingAverageConfig) -> Self {
        Self {
            config,
            chunk_windows: DEFAULT_CHUNK_WINDOWS,
        }
    }

    pub fn with_chunk_windows(mut self, chunk_windows: usize) -> Self {
        self.chunk_windows = chunk_windows.max(1);
        self
    }
}

/// `rms[i] / rms[i - 1]`, with the first window and non-finite ratios set to zero.
pub fn rms_ratios(rms: &[f64]) -> Vec<f64> {
    let mut ratios = Vec::with_capacity(rms.len());
    for (i, &value) in rms.iter().enumerate() {
        let ratio = if i == 0 { 0.0 } else { value / rms[i - 1] };
        ratios.push(if ratio.is_finite() { ratio } else { 0.0 });
    }
    ratios
}

impl Detector for MovingAverageDetector<'_> {
    fn name(&self) -> &'static str {
        "moving_average"
    }

    fn detect(&self, buffer: &SampleBuffer) -> DetectResult<DetectorOutput> {
        let fs = buffer.sample_rate;
        let window_len = buffer.samples_for(self.config.window_duration);
        if window_len == 0 {
            return Err(DetectError::ConfigurationInvalid(format!(
                "window of {}s is shorter than one sample at {} Hz",
                self.config.window_duration, fs
            )));
        }
        let count = buffer.len() / window_len;
        if count < 2 {
            return Ok(DetectorOutput {
                metadata: DetectorMetadata {
                    notes: vec!["recording shorter than two windows".into()],
                    ..Default::default()
                },
                ..Default::default()
            });
        }

        let mut stats = WindowStatistics::with_chunk(
            &buffer.samples,
            fs,
            self.config.cutoff_freqs,
            self.chunk_windows,
        );
        let rms = stats.window_rms(window_len, count)?;
        let ratios = rms_ratios(&rms);
        let threshold = ThresholdCalibrator::moving_average(self.config.threshold, &ratios);
        let level = threshold.value();
        debug!("moving average: {}", threshold.describe());

        let kernel = (window_len / PEAK_KERNEL_DIVISOR).max(1) | 1;
        let mut exceeding = Vec::new();
        for (index, &ratio) in ratios.iter().enumerate() {
            if ratio <= level {
                continue;
            }
            let filtered = stats.filtered_window(index * window_len, window_len);
            let smoothed = StatsHelper::moving_rms(&filtered, kernel);
            if let Some(peak) = StatsHelper::argmax(&smoothed) {
                exceeding.push((
                    index,
                    smoothed[peak],
                    Exceedance {
                        peak_sample: index * window_len + peak,
                        peak_rms: smoothed[peak],
                    },
                ));
            }
        }
        let candidate_count = exceeding.len();

        let candidates = strongest_in_runs(exceeding)
            .into_iter()
            .map(|hit| {
                let peak_time = hit.peak_sample as f64 / fs;
                Candidate {
                    window: EventWindow::with_preceding_noise(
                        peak_time,
                        peak_time - self.config.window_offset,
                        self.config.window_duration,
                        fs,
                    ),
                    score: hit.peak_rms,
                }
            })
            .collect();
        let windows = suppress_overlaps(candidates);

        Ok(DetectorOutput {
            metadata: DetectorMetadata {
                threshold: Some(level),
                candidate_count: Some(candidate_count),
                notes: vec![
                    threshold.describe(),
                    format!("{} of {} windows exceeded", candidate_count, count),
                ],
            },
            windows,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{rngs::StdRng, Rng, SeedableRng};

    fn gaussian(rng: &mut StdRng) -> f64 {
        let u1: f64 = rng.gen_range(f64::EPSILON..1.0);
        let u2: f64 = rng.gen_range(0.0..1.0);
        (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos()
    }

    fn noise(n: usize, sigma: f64, seed: u64) -> Vec<f64> {
        let mut rng = StdRng::seed_from_u64(seed);
        (0..n).map(|_| sigma * gaussian(&mut rng)).collect()
    }

    fn config(threshold: Option<f64>, offset: f64) -> MovingAverageConfig {
        MovingAverageConfig {
            window_duration: 0.05,
            window_offset: offset,
            threshold,
            cutoff_freqs: None,
        }
    }

    #[test]
    fn detects_two_pulses_and_aligns_to_peak() {
        let fs = 8000.0;
        let mut samples = noise(160_000, 0.01, 42);
        let centers = [40_200usize, 98_560usize];
        for &c in &centers {
            for (i, s) in samples.iter_mut().enumerate() {
                let d = (i as f64 - c as f64) / 16.0;
                *s += (-d * d).exp();
            }
        }
        let buffer = SampleBuffer::new(samples.iter().map(|&v| v as f32).collect(), fs);
        let cfg = config(None, 0.01);
        let output = MovingAverageDetector::new(&cfg).detect(&buffer).unwrap();

        assert_eq!(output.windows.len(), 2, "{:?}", output.metadata.notes);
        for (w, &c) in output.windows.iter().zip(centers.iter()) {
            let peak_time = c as f64 / fs;
            assert!((w.signal_start - (peak_time - 0.01)).abs() <= 1.0 / fs + 1e-9);
            assert!((w.signal_duration() - 0.05).abs() < 1e-9);
            assert!(w.noise_end < w.signal_start);
            assert!(w.is_well_formed());
        }
    }

    #[test]
    fn consecutive_exceedances_keep_the_stronger() {
        let fs = 1000.0;
        let mut samples = noise(3000, 0.01, 7);
        let scale = [(10usize, 25.0), (11, 100.0), (12, 400.0)];
        for &(window, gain) in &scale {
            for s in &mut samples[window * 100..(window + 1) * 100] {
                *s *= gain;
            }
        }
        let buffer = SampleBuffer::new(samples.iter().map(|&v| v as f32).collect(), fs);
        let cfg = MovingAverageConfig {
            window_duration: 0.1,
            ..config(Some(1.5), 0.0)
        };
        let output = MovingAverageDetector::new(&cfg).detect(&buffer).unwrap();

        assert_eq!(output.metadata.candidate_count, Some(3));
        assert_eq!(output.windows.len(), 1);
        let w = output.windows[0];
        assert!(w.signal_time >= 1.2 && w.signal_time < 1.3);
    }

    #[test]
    fn offset_of_a_full_window_ends_on_the_peak() {
        let fs = 8000.0;
        let mut samples = noise(80_000, 0.01, 19);
        let centre = 40_200usize;
        for (i, s) in samples.iter_mut().enumerate() {
            let d = (i as f64 - centre as f64) / 16.0;
            *s += (-d * d).exp();
        }
        let buffer = SampleBuffer::new(samples.iter().map(|&v| v as f32).collect(), fs);
        let cfg = config(None, 0.05);
        let output = MovingAverageDetector::new(&cfg).detect(&buffer).unwrap();

        assert_eq!(output.windows.len(), 1, "{:?}", output.metadata.notes);
        let w = output.windows[0];
        assert!(w.is_well_formed(), "{:?}", w);
        assert!((w.signal_end - centre as f64 / fs).abs() <= 1.0 / fs + 1e-9);
    }

    #[test]
    fn silent_buffer_has_no_detections() {
        let buffer = SampleBuffer::new(vec![0.0; 8000], 8000.0);
        let cfg = config(None, 0.01);
        let output = MovingAverageDetector::new(&cfg).detect(&buffer).unwrap();
        assert!(output.windows.is_empty());
        assert!(output.metadata.threshold.unwrap().is_finite());
    }

    #[test]
    fn ratios_never_carry_nan() {
        let ratios = rms_ratios(&[0.0, 0.0, 1.0, 2.0]);
        assert_eq!(ratios, vec![0.0, 0.0, 0.0, 2.0]);
    }

    #[test]
    fn chunking_does_not_change_detections() {
        let fs = 2000.0;
        let mut samples = noise(40_000, 0.01, 5);
        for (i, s) in samples.iter_mut().enumerate() {
            let d = (i as f64 - 21_050.0) / 10.0;
            *s += 0.5 * (-d * d).exp();
        }
        let buffer = SampleBuffer::new(samples.iter().map(|&v| v as f32).collect(), fs);
        let cfg = MovingAverageConfig {
            cutoff_freqs: Some(crate::processing::BandLimits::new(10.0, 600.0)),
            ..config(None, 0.005)
        };
        let a = MovingAverageDetector::new(&cfg).with_chunk_windows(3).detect(&buffer).unwrap();
        let b = MovingAverageDetector::new(&cfg).with_chunk_windows(500).detect(&buffer).unwrap();
        assert_eq!(a.windows, b.windows);
    }
}
