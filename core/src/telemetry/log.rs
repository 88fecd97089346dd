use crate::records::diagnostic::{Diagnostic, DiagnosticClass};
use log::{info, warn};

/// Routes detector progress and diagnostics through the `log` facade.
pub struct LogManager {
    target: &'static str,
}

impl LogManager {
    pub fn new() -> Self {
        Self {
            target: "acoustcore",
        }
    }

    pub fn record(&self, message: &str) {
        info!(target: self.target, "{}", message);
    }

    pub fn diagnostic(&self, diagnostic: &Diagnostic) {
        match diagnostic.class {
            DiagnosticClass::Notice => info!(target: self.target, "{}", diagnostic),
            _ => warn!(target: self.target, "{}", diagnostic),
        }
    }
}

impl Default for LogManager {
    fn default() -> Self {
        Self::new()
    }
}
