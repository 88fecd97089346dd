use crate::covariance::EstimatorKind;
use crate::prelude::{DetectError, DetectResult};
use crate::processing::BandLimits;
use crate::records::record::RecordKey;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SliceConfig {
    pub window_duration: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConstantRateConfig {
    pub window_duration: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub window_offset: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MovingAverageConfig {
    pub window_duration: f64,
    pub window_offset: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub threshold: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cutoff_freqs: Option<BandLimits>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NeymanPearsonKind {
    /// Energy detector.
    Ed,
    /// Estimator-correlator, white noise.
    Ecw,
    /// Estimator-correlator, coloured noise.
    Ecc,
}

impl NeymanPearsonKind {
    pub fn needs_signal_corpus(&self) -> bool {
        !matches!(self, NeymanPearsonKind::Ed)
    }

    pub fn needs_noise_corpus(&self) -> bool {
        matches!(self, NeymanPearsonKind::Ecc)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NeymanPearsonConfig {
    pub kind: NeymanPearsonKind,
    pub kernel_duration: f64,
    pub window_duration: f64,
    pub window_offset: f64,
    pub target_pfa: f64,
    pub sensitivity: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_snr_level: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cutoff_freqs: Option<BandLimits>,
    pub estimator: EstimatorKind,
    pub resample_rate: f64,
}

impl NeymanPearsonConfig {
    /// Kernel length in samples at `resample_rate`.
    pub fn kernel_len(&self) -> usize {
        (self.kernel_duration * self.resample_rate).round().max(0.0) as usize
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MirrorConfig {
    pub mirror_receiver_name: String,
}

/// One detection strategy with only the fields it needs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "strategy", rename_all = "snake_case")]
pub enum DetectorConfig {
    Slice(SliceConfig),
    ConstantRate(ConstantRateConfig),
    MovingAverage(MovingAverageConfig),
    NeymanPearson(NeymanPearsonConfig),
    Mirror(MirrorConfig),
}

fn invalid(message: impl Into<String>) -> DetectError {
    DetectError::ConfigurationInvalid(message.into())
}

fn positive(name: &str, value: f64) -> DetectResult<()> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(invalid(format!("{} must be positive, got {}", name, value)))
    }
}

fn non_negative(name: &str, value: f64) -> DetectResult<()> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(invalid(format!("{} must be non-negative, got {}", name, value)))
    }
}

/// The event time lies `offset` into the window, so it must not pass its end.
fn offset_within(duration: f64, offset: f64) -> DetectResult<()> {
    non_negative("window_offset", offset)?;
    if offset > duration {
        return Err(invalid(format!(
            "window_offset {} exceeds window_duration {}",
            offset, duration
        )));
    }
    Ok(())
}

fn band(limits: &Option<BandLimits>) -> DetectResult<()> {
    match limits {
        Some(limits) if !limits.is_valid() => Err(invalid(format!(
            "cutoff frequencies {:?} are not an increasing non-negative pair",
            limits
        ))),
        _ => Ok(()),
    }
}

impl DetectorConfig {
    pub fn strategy_name(&self) -> &'static str {
        match self {
            DetectorConfig::Slice(_) => "slice",
            DetectorConfig::ConstantRate(_) => "constant_rate",
            DetectorConfig::MovingAverage(_) => "moving_average",
            DetectorConfig::NeymanPearson(_) => "neyman_pearson",
            DetectorConfig::Mirror(_) => "mirror",
        }
    }

    pub fn is_mirror(&self) -> bool {
        matches!(self, DetectorConfig::Mirror(_))
    }

    /// Static range checks that need no per-file inputs.
    pub fn validate(&self) -> DetectResult<()> {
        match self {
            DetectorConfig::Slice(cfg) => positive("window_duration", cfg.window_duration),
            DetectorConfig::ConstantRate(cfg) => {
                positive("window_duration", cfg.window_duration)?;
                match cfg.window_offset {
                    Some(offset) => offset_within(cfg.window_duration, offset),
                    None => Ok(()),
                }
            }
            DetectorConfig::MovingAverage(cfg) => {
                positive("window_duration", cfg.window_duration)?;
                offset_within(cfg.window_duration, cfg.window_offset)?;
                if let Some(threshold) = cfg.threshold {
                    positive("threshold", threshold)?;
                }
                band(&cfg.cutoff_freqs)
            }
            DetectorConfig::NeymanPearson(cfg) => {
                positive("kernel_duration", cfg.kernel_duration)?;
                positive("window_duration", cfg.window_duration)?;
                offset_within(cfg.window_duration, cfg.window_offset)?;
                positive("resample_rate", cfg.resample_rate)?;
                if cfg.window_duration < cfg.kernel_duration {
                    return Err(invalid("window_duration is shorter than kernel_duration"));
                }
                if !(cfg.target_pfa > 0.0 && cfg.target_pfa < 1.0) {
                    return Err(invalid(format!(
                        "target_pfa must lie in (0, 1), got {}",
                        cfg.target_pfa
                    )));
                }
                if !(0.0..=1.0).contains(&cfg.sensitivity) {
                    return Err(invalid(format!(
                        "sensitivity must lie in [0, 1], got {}",
                        cfg.sensitivity
                    )));
                }
                if matches!(cfg.min_snr_level, Some(level) if !level.is_finite()) {
                    return Err(invalid("min_snr_level must be finite"));
                }
                if cfg.kernel_len() < 2 {
                    return Err(invalid("kernel spans fewer than 2 samples at resample_rate"));
                }
                band(&cfg.cutoff_freqs)
            }
            DetectorConfig::Mirror(cfg) => {
                if cfg.mirror_receiver_name.trim().is_empty() {
                    Err(invalid("mirror_receiver_name is empty"))
                } else {
                    Ok(())
                }
            }
        }
    }
}

/// A detector configuration as handed over by the configuration loader,
/// tagged with the record identity it writes to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfigEntry {
    pub receiver_name: String,
    pub source_name: String,
    #[serde(default)]
    pub channel: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detector: Option<DetectorConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mirror_receiver_name: Option<String>,
}

impl ConfigEntry {
    pub fn detector(
        receiver_name: impl Into<String>,
        source_name: impl Into<String>,
        detector: DetectorConfig,
    ) -> Self {
        Self {
            receiver_name: receiver_name.into(),
            source_name: source_name.into(),
            channel: 0,
            detector: Some(detector),
            mirror_receiver_name: None,
        }
    }

    pub fn mirror(
        receiver_name: impl Into<String>,
        source_name: impl Into<String>,
        mirror_receiver_name: impl Into<String>,
    ) -> Self {
        Self {
            receiver_name: receiver_name.into(),
            source_name: source_name.into(),
            channel: 0,
            detector: None,
            mirror_receiver_name: Some(mirror_receiver_name.into()),
        }
    }

    pub fn key(&self) -> RecordKey {
        RecordKey::new(&self.receiver_name, &self.source_name)
    }

    /// Collapses `detector` / `mirror_receiver_name` into one validated strategy.
    pub fn resolve(&self) -> DetectResult<DetectorConfig> {
        let config = match (&self.detector, &self.mirror_receiver_name) {
            (Some(detector), None) => detector.clone(),
            (None, Some(name)) => DetectorConfig::Mirror(MirrorConfig {
                mirror_receiver_name: name.clone(),
            }),
            (Some(_), Some(_)) => {
                return Err(invalid(
                    "both detector and mirror_receiver_name are set",
                ))
            }
            (None, None) => {
                return Err(invalid(
                    "neither detector nor mirror_receiver_name is set",
                ))
            }
        };
        config.validate()?;
        if let DetectorConfig::Mirror(mirror) = &config {
            if mirror.mirror_receiver_name == self.receiver_name {
                return Err(invalid("a receiver cannot mirror itself"));
            }
        }
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn np() -> NeymanPearsonConfig {
        NeymanPearsonConfig {
            kind: NeymanPearsonKind::Ed,
            kernel_duration: 0.01,
            window_duration: 0.1,
            window_offset: 0.02,
            target_pfa: 0.01,
            sensitivity: 1.0,
            min_snr_level: None,
            cutoff_freqs: None,
            estimator: EstimatorKind::LedoitWolf,
            resample_rate: 8000.0,
        }
    }

    #[test]
    fn entry_requires_exactly_one_source() {
        let mut entry = ConfigEntry::detector(
            "rx1",
            "pinger",
            DetectorConfig::Slice(SliceConfig {
                window_duration: 1.0,
            }),
        );
        assert!(entry.resolve().is_ok());
        entry.mirror_receiver_name = Some("rx2".into());
        assert!(matches!(
            entry.resolve(),
            Err(DetectError::ConfigurationInvalid(_))
        ));
        entry.detector = None;
        entry.mirror_receiver_name = None;
        assert!(entry.resolve().is_err());
    }

    #[test]
    fn mirror_entry_resolves_to_mirror_variant() {
        let entry = ConfigEntry::mirror("rx2", "pinger", "rx1");
        assert_eq!(
            entry.resolve().unwrap(),
            DetectorConfig::Mirror(MirrorConfig {
                mirror_receiver_name: "rx1".into()
            })
        );
        assert!(ConfigEntry::mirror("rx1", "pinger", "rx1").resolve().is_err());
    }

    #[test]
    fn non_positive_window_is_rejected() {
        let cfg = DetectorConfig::Slice(SliceConfig {
            window_duration: 0.0,
        });
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn neyman_pearson_ranges_are_checked() {
        assert!(DetectorConfig::NeymanPearson(np()).validate().is_ok());
        let mut bad = np();
        bad.sensitivity = 1.5;
        assert!(DetectorConfig::NeymanPearson(bad).validate().is_err());
        let mut bad = np();
        bad.target_pfa = 0.0;
        assert!(DetectorConfig::NeymanPearson(bad).validate().is_err());
        let mut bad = np();
        bad.window_duration = 0.005;
        assert!(DetectorConfig::NeymanPearson(bad).validate().is_err());
    }

    #[test]
    fn offset_past_window_end_is_rejected() {
        let constant = DetectorConfig::ConstantRate(ConstantRateConfig {
            window_duration: 0.2,
            window_offset: Some(0.5),
        });
        assert!(matches!(
            constant.validate(),
            Err(DetectError::ConfigurationInvalid(_))
        ));
        let constant = DetectorConfig::ConstantRate(ConstantRateConfig {
            window_duration: 0.2,
            window_offset: Some(0.2),
        });
        assert!(constant.validate().is_ok());

        let moving = DetectorConfig::MovingAverage(MovingAverageConfig {
            window_duration: 0.1,
            window_offset: 0.15,
            threshold: None,
            cutoff_freqs: None,
        });
        assert!(matches!(
            moving.validate(),
            Err(DetectError::ConfigurationInvalid(_))
        ));

        let mut cfg = np();
        cfg.window_offset = 0.11;
        assert!(matches!(
            DetectorConfig::NeymanPearson(cfg).validate(),
            Err(DetectError::ConfigurationInvalid(_))
        ));
    }

    #[test]
    fn config_round_trips_through_json_tag() {
        let cfg = DetectorConfig::MovingAverage(MovingAverageConfig {
            window_duration: 0.5,
            window_offset: 0.1,
            threshold: None,
            cutoff_freqs: Some(BandLimits::new(100.0, 2000.0)),
        });
        let json = serde_json::to_string(&cfg).unwrap();
        assert!(json.contains("\"strategy\":\"moving_average\""));
        let back: DetectorConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back, cfg);
    }
}
