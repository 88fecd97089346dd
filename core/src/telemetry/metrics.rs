use std::sync::Mutex;

/// Counters shared by every file of a run.
pub struct MetricsRecorder {
    inner: Mutex<Metrics>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Metrics {
    /// Configurations whose record was written.
    pub processed: usize,
    /// Configurations that produced an error diagnostic.
    pub failed: usize,
    pub events_written: usize,
    pub sets_persisted: usize,
}

impl MetricsRecorder {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Metrics::default()),
        }
    }

    pub fn record_processed(&self, events: usize) {
        if let Ok(mut metrics) = self.inner.lock() {
            metrics.processed += 1;
            metrics.events_written += events;
        }
    }

    pub fn record_error(&self) {
        if let Ok(mut metrics) = self.inner.lock() {
            metrics.failed += 1;
        }
    }

    pub fn record_persisted(&self) {
        if let Ok(mut metrics) = self.inner.lock() {
            metrics.sets_persisted += 1;
        }
    }

    pub fn snapshot(&self) -> Metrics {
        self.inner.lock().map(|m| *m).unwrap_or_default()
    }
}

impl Default for MetricsRecorder {
    fn default() -> Self {
        Self::new()
    }
}
