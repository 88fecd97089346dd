use anyhow::Context;
use clap::Parser;
use serde_json::json;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::PathBuf;
use tokio::runtime::Builder as TokioBuilder;
use workflow::config::WorkflowConfig;
use workflow::runner::Runner;

mod generator;
mod workflow;

#[derive(Parser)]
#[command(author, version, about = "Offline acoustic detection driver over synthetic recordings")]
struct Args {
    /// Load a workflow config from YAML
    #[arg(long)]
    workflow: Option<PathBuf>,
    /// Number of synthetic audio files to generate
    #[arg(long, default_value_t = 4)]
    files: usize,
    /// Files processed concurrently
    #[arg(long, default_value_t = 2)]
    jobs: usize,
    /// Directory receiving one record set per audio file
    #[arg(long, default_value = "tools/data/records")]
    output: PathBuf,
    #[arg(long, default_value_t = 0)]
    seed: u64,
    /// Append a JSON run summary line to this file
    #[arg(long)]
    summary: Option<PathBuf>,
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let args = Args::parse();

    let workflow_config = if let Some(path) = args.workflow {
        WorkflowConfig::load(path)?
    } else {
        WorkflowConfig::from_args(args.files, args.jobs, args.output, args.seed)
    };
    fs::create_dir_all(&workflow_config.output_dir).with_context(|| {
        format!(
            "creating output directory {}",
            workflow_config.output_dir.display()
        )
    })?;

    let runner = Runner::new(workflow_config.clone())?;
    let runtime = TokioBuilder::new_multi_thread()
        .enable_all()
        .build()
        .context("creating worker runtime")?;
    let result = runtime.block_on(runner.run_all())?;

    println!(
        "Processed {} files -> records {}, failed configurations {}, events {}, sets persisted {}",
        result.reports.len(),
        result.metrics.processed,
        result.metrics.failed,
        result.metrics.events_written,
        result.metrics.sets_persisted
    );
    for report in &result.reports {
        for diagnostic in report.failures() {
            println!("  {}: {}", report.audio_file_id, diagnostic);
        }
    }
    for failure in &result.failed_files {
        println!("  file failed: {}", failure);
    }

    if let Some(summary_path) = args.summary {
        if let Some(parent) = summary_path.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&summary_path)
            .with_context(|| format!("opening summary {}", summary_path.display()))?;
        let line = json!({
            "files": result.reports.len(),
            "records": result.metrics.processed,
            "failed": result.metrics.failed,
            "events": result.metrics.events_written,
            "output": workflow_config.output_dir.display().to_string(),
        });
        writeln!(file, "{}", line)?;
    }

    if !result.failed_files.is_empty() {
        anyhow::bail!("{} files could not be persisted", result.failed_files.len());
    }
    Ok(())
}
