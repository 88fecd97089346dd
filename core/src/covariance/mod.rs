pub mod cache;
pub mod estimators;
pub mod model;

pub use cache::{CorpusRole, ModelCache};
pub use estimators::{estimate, EstimatorKind, ShrinkageEstimate};
pub use model::{CovarianceModel, TrainingCorpus};
