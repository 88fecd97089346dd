use crate::records::EventWindow;

/// Decoded mono recording handed to the detectors. Read-only for the core.
#[derive(Debug, Clone)]
pub struct SampleBuffer {
    pub samples: Vec<f32>,
    pub sample_rate: f64,
}

impl SampleBuffer {
    pub fn new(samples: Vec<f32>, sample_rate: f64) -> Self {
        Self {
            samples,
            sample_rate,
        }
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Recording length in seconds.
    pub fn duration(&self) -> f64 {
        if self.sample_rate > 0.0 {
            self.samples.len() as f64 / self.sample_rate
        } else {
            0.0
        }
    }

    /// Number of whole samples spanned by `seconds`.
    pub fn samples_for(&self, seconds: f64) -> usize {
        (seconds * self.sample_rate).round().max(0.0) as usize
    }
}

/// Metadata attached to a detector run, used for diagnostics and telemetry.
#[derive(Debug, Clone, Default)]
pub struct DetectorMetadata {
    pub threshold: Option<f64>,
    pub candidate_count: Option<usize>,
    pub notes: Vec<String>,
}

/// Output produced by each detector.
#[derive(Debug, Clone, Default)]
pub struct DetectorOutput {
    pub windows: Vec<EventWindow>,
    pub metadata: DetectorMetadata,
}

/// Error taxonomy shared by detection, calibration and persistence.
#[derive(thiserror::Error, Debug)]
pub enum DetectError {
    #[error("configuration invalid: {0}")]
    ConfigurationInvalid(String),
    #[error("detection failed: {0}")]
    RuntimeDetectionFailure(String),
    #[error("persistence failed: {0}")]
    PersistenceFailure(String),
    #[error("persistence failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("persistence failed: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl DetectError {
    /// Only persistence failures stop the processing of a file.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            DetectError::PersistenceFailure(_) | DetectError::Io(_) | DetectError::Serialization(_)
        )
    }
}

pub type DetectResult<T> = Result<T, DetectError>;

/// Pure detection strategy: (samples, config, trained statistics) -> event windows.
pub trait Detector {
    fn name(&self) -> &'static str;
    fn detect(&self, buffer: &SampleBuffer) -> DetectResult<DetectorOutput>;
}
