pub mod false_alarm;
pub mod histogram;

pub use false_alarm::{calibrate, Calibration, GammaLaw, OperatingCurves, PD_CEILING};
pub use histogram::{auto_threshold, AutoThreshold};

/// Where a detector's decision threshold came from.
#[derive(Debug, Clone, PartialEq)]
pub enum Threshold {
    Explicit(f64),
    Automatic(AutoThreshold),
    FalseAlarm(Calibration),
}

impl Threshold {
    pub fn value(&self) -> f64 {
        match self {
            Threshold::Explicit(value) => *value,
            Threshold::Automatic(auto) => auto.value,
            Threshold::FalseAlarm(cal) => cal.threshold,
        }
    }

    pub fn describe(&self) -> String {
        match self {
            Threshold::Explicit(value) => format!("explicit threshold {:.4}", value),
            Threshold::Automatic(auto) if auto.fallback => {
                format!("automatic threshold fell back to {:.4}", auto.value)
            }
            Threshold::Automatic(auto) => format!(
                "automatic threshold {:.4} (peak {:.3}, tail {:.3}, bin {:.3})",
                auto.value, auto.peak_ratio, auto.tail_ratio, auto.bin_width
            ),
            Threshold::FalseAlarm(cal) => format!(
                "threshold {:.4} (pfa {:.2e}, pd {:.5})",
                cal.threshold, cal.achieved_pfa, cal.achieved_pd
            ),
        }
    }
}

/// Resolves per-strategy decision thresholds.
pub struct ThresholdCalibrator;

impl ThresholdCalibrator {
    /// Explicit ratio when configured, otherwise the histogram procedure.
    pub fn moving_average(explicit: Option<f64>, ratios: &[f64]) -> Threshold {
        match explicit {
            Some(value) => Threshold::Explicit(value),
            None => Threshold::Automatic(auto_threshold(ratios)),
        }
    }

    pub fn neyman_pearson(curves: &OperatingCurves, target_pfa: f64, sensitivity: f64) -> Threshold {
        Threshold::FalseAlarm(calibrate(curves, target_pfa, sensitivity))
    }
}
