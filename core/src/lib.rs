//! Acoustic event detection core.
//!
//! Detectors turn a decoded recording into event windows, the covariance and
//! threshold modules supply the statistics the Neyman-Pearson detectors need,
//! and the records module merges results into one persisted set per audio file.

pub mod covariance;
pub mod detectors;
pub mod math;
pub mod prelude;
pub mod processing;
pub mod records;
pub mod telemetry;
pub mod threshold;

pub use detectors::{run_detector, DetectionContext, PulseSchedule};
pub use prelude::{DetectError, DetectResult, Detector, DetectorOutput, SampleBuffer};
pub use records::{process_file, BatchReport, EventWindow, FileInputs, RecordSet};
