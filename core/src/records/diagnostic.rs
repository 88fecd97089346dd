use crate::prelude::DetectError;
use crate::records::record::RecordKey;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiagnosticClass {
    ConfigurationInvalid,
    RuntimeDetectionFailure,
    PersistenceFailure,
    /// A later configuration targeted a key already claimed in the batch.
    DuplicateKey,
    /// Informational notes such as an absent mirror source.
    Notice,
}

/// Structured report of something that went wrong (or was skipped) while
/// applying one configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub key: RecordKey,
    pub class: DiagnosticClass,
    pub message: String,
}

impl Diagnostic {
    pub fn new(key: RecordKey, class: DiagnosticClass, message: impl Into<String>) -> Self {
        Self {
            key,
            class,
            message: message.into(),
        }
    }

    pub fn from_error(key: RecordKey, error: &DetectError) -> Self {
        let class = match error {
            DetectError::ConfigurationInvalid(_) => DiagnosticClass::ConfigurationInvalid,
            DetectError::RuntimeDetectionFailure(_) => DiagnosticClass::RuntimeDetectionFailure,
            DetectError::PersistenceFailure(_)
            | DetectError::Io(_)
            | DetectError::Serialization(_) => DiagnosticClass::PersistenceFailure,
        };
        Self::new(key, class, error.to_string())
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{:?}] {}: {}", self.class, self.key, self.message)
    }
}
