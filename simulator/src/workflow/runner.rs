use crate::generator::profile::{build_recording, build_training_corpus};
use crate::workflow::config::WorkflowConfig;
use acoustcore::covariance::{ModelCache, TrainingCorpus};
use acoustcore::records::{JsonFileStore, RecordLocks};
use acoustcore::telemetry::{Metrics, MetricsRecorder};
use acoustcore::{process_file, BatchReport, FileInputs};
use anyhow::{anyhow, Context};
use log::{info, warn};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Semaphore;

pub struct WorkflowResult {
    pub reports: Vec<BatchReport>,
    pub failed_files: Vec<String>,
    pub metrics: Metrics,
}

#[derive(Clone)]
pub struct Runner {
    inner: Arc<Shared>,
}

struct Shared {
    config: WorkflowConfig,
    store: JsonFileStore,
    locks: RecordLocks,
    models: ModelCache,
    corpora: HashMap<String, TrainingCorpus>,
    metrics: MetricsRecorder,
}

impl Runner {
    pub fn new(config: WorkflowConfig) -> anyhow::Result<Self> {
        let mut corpora = HashMap::new();
        for recipe in &config.corpora {
            let kernel_len = (recipe.kernel_duration * recipe.resample_rate).round() as usize;
            let corpus = build_training_corpus(
                &config.generator,
                &recipe.source_name,
                kernel_len,
                recipe.resample_rate,
                recipe.observations,
            )
            .with_context(|| format!("building training corpus for {}", recipe.source_name))?;
            corpora.insert(recipe.source_name.clone(), corpus);
        }
        Ok(Self {
            inner: Arc::new(Shared {
                store: JsonFileStore::new(&config.output_dir),
                locks: RecordLocks::new(),
                models: ModelCache::new(),
                metrics: MetricsRecorder::new(),
                corpora,
                config,
            }),
        })
    }

    /// Generates file `index` and applies every configured entry to it.
    pub fn execute_file(&self, index: usize) -> anyhow::Result<BatchReport> {
        let shared = &self.inner;
        let recording = build_recording(&shared.config.generator, index)
            .with_context(|| format!("generating recording {}", index))?;
        let _guard = shared.locks.blocking_acquire(&recording.audio_file_id);
        let inputs = FileInputs {
            audio_file_id: &recording.audio_file_id,
            buffer: &recording.buffer,
            pulse: Some(recording.pulse),
            corpora: &shared.corpora,
            models: &shared.models,
        };
        process_file(&inputs, &shared.config.entries, &shared.store, &shared.metrics)
            .with_context(|| format!("processing {}", recording.audio_file_id))
    }

    /// Runs every file on the blocking pool, at most `jobs` at a time.
    pub async fn run_all(&self) -> anyhow::Result<WorkflowResult> {
        let permits = Arc::new(Semaphore::new(self.inner.config.jobs.max(1)));
        let mut handles = Vec::with_capacity(self.inner.config.files);
        for index in 0..self.inner.config.files {
            let permit = permits
                .clone()
                .acquire_owned()
                .await
                .map_err(|e| anyhow!("job limiter closed: {}", e))?;
            let runner = self.clone();
            handles.push(tokio::task::spawn_blocking(move || {
                let _permit = permit;
                runner.execute_file(index)
            }));
        }

        let mut reports = Vec::new();
        let mut failed_files = Vec::new();
        for (index, handle) in handles.into_iter().enumerate() {
            match handle.await.context("joining file worker")? {
                Ok(report) => {
                    info!(
                        "{}: {} records, {} events",
                        report.audio_file_id,
                        report.written.len(),
                        report.events_written
                    );
                    reports.push(report);
                }
                Err(err) => {
                    warn!("file {} failed: {:#}", index, err);
                    failed_files.push(format!("{:#}", err));
                }
            }
        }
        Ok(WorkflowResult {
            reports,
            failed_files,
            metrics: self.inner.metrics.snapshot(),
        })
    }
}
