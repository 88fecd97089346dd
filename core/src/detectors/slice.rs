use crate::prelude::{DetectError, DetectResult, Detector, DetectorMetadata, DetectorOutput, SampleBuffer};
use crate::records::config::SliceConfig;
use crate::records::EventWindow;

/// Consecutive fixed-length windows covering the recording.
pub struct SliceDetector<'a> {
    config: &'a SliceConfig,
}

impl<'a> SliceDetector<'a> {
    pub fn new(config: &'a SliceConfig) -> Self {
        Self { config }
    }
}

impl Detector for SliceDetector<'_> {
    fn name(&self) -> &'static str {
        "slice"
    }

    fn detect(&self, buffer: &SampleBuffer) -> DetectResult<DetectorOutput> {
        let width = self.config.window_duration;
        if !(width.is_finite() && width > 0.0) {
            return Err(DetectError::ConfigurationInvalid(format!(
                "window_duration must be positive, got {}",
                width
            )));
        }

        let duration = buffer.duration();
        // tolerate rounding when the file length is an exact multiple
        let count = (duration / width + 1e-9).floor() as usize;
        let windows = (0..count)
            .map(|i| {
                let start = i as f64 * width;
                EventWindow::without_noise(start + 0.5 * width, start, start + width)
            })
            .collect::<Vec<_>>();

        Ok(DetectorOutput {
            metadata: DetectorMetadata {
                candidate_count: Some(windows.len()),
                notes: vec![format!("{} slices of {:.3}s", windows.len(), width)],
                ..Default::default()
            },
            windows,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slices_cover_file_without_gaps() {
        let buffer = SampleBuffer::new(vec![0.0; 10_500], 1000.0);
        let config = SliceConfig {
            window_duration: 2.0,
        };
        let output = SliceDetector::new(&config).detect(&buffer).unwrap();
        assert_eq!(output.windows.len(), 5);
        for (i, w) in output.windows.iter().enumerate() {
            assert!((w.signal_start - 2.0 * i as f64).abs() < 1e-12);
            assert!((w.signal_duration() - 2.0).abs() < 1e-12);
            assert!((w.signal_time - (w.signal_start + 1.0)).abs() < 1e-12);
            assert_eq!(w.noise_start, w.signal_start);
            assert_eq!(w.noise_end, w.signal_start);
        }
        for pair in output.windows.windows(2) {
            assert!((pair[0].signal_end - pair[1].signal_start).abs() < 1e-12);
        }
    }

    #[test]
    fn exact_multiple_keeps_last_window() {
        let buffer = SampleBuffer::new(vec![0.0; 3000], 1000.0);
        let config = SliceConfig {
            window_duration: 0.1,
        };
        let output = SliceDetector::new(&config).detect(&buffer).unwrap();
        assert_eq!(output.windows.len(), 30);
    }

    #[test]
    fn empty_buffer_has_no_slices() {
        let buffer = SampleBuffer::new(Vec::new(), 1000.0);
        let config = SliceConfig {
            window_duration: 1.0,
        };
        assert!(SliceDetector::new(&config).detect(&buffer).unwrap().windows.is_empty());
    }
}
