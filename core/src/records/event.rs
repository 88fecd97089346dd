use serde::{Deserialize, Serialize};

/// One detected sound event and its paired noise reference, in seconds from file start.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EventWindow {
    pub signal_time: f64,
    pub signal_start: f64,
    pub signal_end: f64,
    pub noise_start: f64,
    pub noise_end: f64,
}

impl EventWindow {
    /// Window without a noise reference (noise bounds collapse onto `signal_start`).
    pub fn without_noise(signal_time: f64, signal_start: f64, signal_end: f64) -> Self {
        Self {
            signal_time,
            signal_start,
            signal_end,
            noise_start: signal_start,
            noise_end: signal_start,
        }
    }

    /// Signal window of `duration` starting at `signal_start` (clamped to the
    /// file start), with an equally long noise window ending one sample
    /// before it. At the very start of a file the noise window is empty.
    pub fn with_preceding_noise(
        signal_time: f64,
        signal_start: f64,
        duration: f64,
        sample_rate: f64,
    ) -> Self {
        let signal_start = signal_start.max(0.0);
        let signal_end = signal_start + duration;
        // rounding in `time - offset + duration` must not push the time past the end
        let signal_time = signal_time.max(signal_start).min(signal_end);
        let sample_period = if sample_rate > 0.0 { 1.0 / sample_rate } else { 0.0 };
        let noise_end = signal_start - sample_period;
        let (noise_start, noise_end) = if noise_end > 0.0 {
            ((noise_end - duration).max(0.0), noise_end)
        } else {
            (0.0, 0.0)
        };
        Self {
            signal_time,
            signal_start,
            signal_end,
            noise_start,
            noise_end,
        }
    }

    pub fn signal_duration(&self) -> f64 {
        self.signal_end - self.signal_start
    }

    pub fn has_noise(&self) -> bool {
        self.noise_end > self.noise_start
    }

    /// True when the two signal windows share any time.
    pub fn overlaps(&self, other: &EventWindow) -> bool {
        self.signal_start < other.signal_end && other.signal_start < self.signal_end
    }

    /// Ordering invariants: start <= time <= end, and a non-empty noise
    /// window ends strictly before the signal starts.
    pub fn is_well_formed(&self) -> bool {
        let ordered = self.signal_start <= self.signal_time && self.signal_time <= self.signal_end;
        let noise_ok = !self.has_noise() || self.noise_end < self.signal_start;
        ordered && noise_ok
    }
}
