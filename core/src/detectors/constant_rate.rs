use crate::prelude::{DetectError, DetectResult, Detector, DetectorMetadata, DetectorOutput, SampleBuffer};
use crate::records::config::ConstantRateConfig;
use crate::records::EventWindow;
use serde::{Deserialize, Serialize};

/// Per-file pulse timing resolved from an external pulse table.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PulseSchedule {
    pub first_pulse_s: f64,
    pub pulse_interval_ms: f64,
}

impl PulseSchedule {
    pub fn validate(&self) -> DetectResult<()> {
        if !self.first_pulse_s.is_finite() || self.first_pulse_s < 0.0 {
            return Err(DetectError::ConfigurationInvalid(format!(
                "first pulse time must be non-negative, got {}",
                self.first_pulse_s
            )));
        }
        if !(self.pulse_interval_ms.is_finite() && self.pulse_interval_ms > 0.0) {
            return Err(DetectError::ConfigurationInvalid(format!(
                "pulse interval must be positive, got {}",
                self.pulse_interval_ms
            )));
        }
        Ok(())
    }
}

/// One window per pulse of a fixed-rate source.
pub struct ConstantRateDetector<'a> {
    config: &'a ConstantRateConfig,
    schedule: PulseSchedule,
}

impl<'a> ConstantRateDetector<'a> {
    pub fn new(config: &'a ConstantRateConfig, schedule: PulseSchedule) -> Self {
        Self { config, schedule }
    }
}

impl Detector for ConstantRateDetector<'_> {
    fn name(&self) -> &'static str {
        "constant_rate"
    }

    fn detect(&self, buffer: &SampleBuffer) -> DetectResult<DetectorOutput> {
        self.schedule.validate()?;
        let duration = buffer.duration();
        let interval = self.schedule.pulse_interval_ms / 1000.0;
        if self.config.window_duration > interval {
            return Err(DetectError::ConfigurationInvalid(format!(
                "{}s windows overlap at a pulse interval of {}ms",
                self.config.window_duration, self.schedule.pulse_interval_ms
            )));
        }
        let offset = self.config.window_offset.unwrap_or(0.0);

        let mut windows = Vec::new();
        let mut k = 0u64;
        loop {
            // k * interval, not a running sum
            let signal_time = self.schedule.first_pulse_s + k as f64 * interval;
            if signal_time >= duration {
                break;
            }
            windows.push(EventWindow::with_preceding_noise(
                signal_time,
                signal_time - offset,
                self.config.window_duration,
                buffer.sample_rate,
            ));
            k += 1;
        }

        Ok(DetectorOutput {
            metadata: DetectorMetadata {
                candidate_count: Some(windows.len()),
                notes: vec![format!(
                    "{} pulses from {:.3}s every {:.1}ms",
                    windows.len(),
                    self.schedule.first_pulse_s,
                    self.schedule.pulse_interval_ms
                )],
                ..Default::default()
            },
            windows,
        })
    }
}
