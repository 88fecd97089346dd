pub mod batch;
pub mod config;
pub mod diagnostic;
pub mod event;
pub mod locks;
pub mod merger;
pub mod record;
pub mod store;

pub use batch::{process_file, BatchReport, FileInputs};
pub use config::{
    ConfigEntry, ConstantRateConfig, DetectorConfig, MirrorConfig, MovingAverageConfig,
    NeymanPearsonConfig, NeymanPearsonKind, SliceConfig,
};
pub use diagnostic::{Diagnostic, DiagnosticClass};
pub use event::EventWindow;
pub use locks::{FileGuard, RecordLocks};
pub use merger::{BatchPlan, PlannedEntry, RecordMerger};
pub use record::{AcousticRecord, RecordKey, RecordSet};
pub use store::{InMemoryStore, JsonFileStore, RecordStore, StagedWrite};
