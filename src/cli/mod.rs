//! CLI argument parsing and command dispatch

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use evalstream_core::{
    DashboardState, DataSource, JobConfig, JobCoordinator, JobResult, JobSpec, Observer,
    SourceRef, TargetVariant, TaskInvoker,
};
use indicatif::{ProgressBar, ProgressStyle};
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use crate::builtin::{metric_by_name, EchoInvoker};
use crate::sources::FileSource;

#[derive(Parser)]
#[command(name = "evalstream")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run a batch of evaluation jobs
    Run {
        /// Path to the batch file
        #[arg(short, long)]
        config: String,
        /// Cap on simultaneously running jobs
        #[arg(long)]
        max_parallel: Option<usize>,
        /// Write the full results as JSON to this path
        #[arg(short, long)]
        output: Option<String>,
    },
    /// Validate a batch file without running it
    Validate {
        /// Path to the batch file
        #[arg(short, long)]
        config: String,
    },
}

pub async fn dispatch(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Run {
            config,
            max_parallel,
            output,
        } => run(&config, max_parallel, output.as_deref()).await,
        Commands::Validate { config } => validate(&config).await,
    }
}

// ============================================================================
// Batch file format
// ============================================================================

#[derive(Debug, Deserialize)]
struct BatchFile {
    /// Dataset directory, relative to the batch file
    #[serde(default)]
    datasets_dir: Option<String>,
    jobs: Vec<JobEntry>,
}

#[derive(Debug, Deserialize)]
struct JobEntry {
    name: String,
    dataset: String,
    #[serde(default)]
    metrics: Vec<String>,
    #[serde(default)]
    concurrency: Option<usize>,
    #[serde(default)]
    timeout_ms: Option<u64>,
    #[serde(default)]
    tags: Vec<String>,
    #[serde(default)]
    targets: Vec<TargetEntry>,
}

#[derive(Debug, Deserialize)]
struct TargetEntry {
    name: String,
    #[serde(default)]
    options: HashMap<String, Value>,
}

struct LoadedBatch {
    specs: Vec<JobSpec>,
    source: Arc<FileSource>,
    dataset_names: Vec<String>,
}

impl std::fmt::Debug for LoadedBatch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoadedBatch")
            .field(
                "specs",
                &self.specs.iter().map(|s| &s.name).collect::<Vec<_>>(),
            )
            .field("dataset_names", &self.dataset_names)
            .finish()
    }
}

async fn load_batch(path: &str) -> Result<LoadedBatch> {
    let path = Path::new(path);
    let raw = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("failed to read batch file {}", path.display()))?;
    let batch: BatchFile = serde_json::from_str(&raw)
        .with_context(|| format!("failed to parse batch file {}", path.display()))?;

    if batch.jobs.is_empty() {
        bail!("batch file declares no jobs");
    }

    let base = path.parent().unwrap_or_else(|| Path::new("."));
    let root: PathBuf = match &batch.datasets_dir {
        Some(dir) => base.join(dir),
        None => base.to_path_buf(),
    };
    let source = Arc::new(FileSource::new(root));

    let invoker: Arc<dyn TaskInvoker> = Arc::new(EchoInvoker);
    let mut specs = Vec::with_capacity(batch.jobs.len());
    let mut dataset_names = Vec::new();

    for entry in batch.jobs {
        let mut config = JobConfig::new(entry.concurrency.unwrap_or(4));
        if let Some(timeout_ms) = entry.timeout_ms {
            config = config.with_item_timeout(Duration::from_millis(timeout_ms));
        }
        config = config.with_tags(entry.tags);
        config
            .validate()
            .with_context(|| format!("invalid configuration for job {}", entry.name))?;

        let mut spec = JobSpec::new(
            &entry.name,
            SourceRef::Named(entry.dataset.clone()),
            Arc::clone(&invoker),
        )
        .with_config(config);

        for metric_name in &entry.metrics {
            let metric = metric_by_name(metric_name)
                .with_context(|| format!("unknown metric {metric_name} in job {}", entry.name))?;
            spec = spec.with_metric(metric);
        }

        if !entry.targets.is_empty() {
            let targets = entry
                .targets
                .into_iter()
                .map(|t| TargetVariant {
                    name: t.name,
                    options: t.options,
                })
                .collect();
            spec = spec.with_targets(targets);
        }

        if !dataset_names.contains(&entry.dataset) {
            dataset_names.push(entry.dataset.clone());
        }
        specs.push(spec);
    }

    Ok(LoadedBatch {
        specs,
        source,
        dataset_names,
    })
}

// ============================================================================
// Commands
// ============================================================================

async fn run(config: &str, max_parallel: Option<usize>, output: Option<&str>) -> Result<()> {
    let batch = load_batch(config).await?;
    let job_count = batch.specs.len();
    tracing::info!(jobs = job_count, "starting batch run");

    let dashboard = Arc::new(DashboardState::new());
    let coordinator = JobCoordinator::new(batch.source)
        .with_observer(Observer::Dashboard(Arc::clone(&dashboard)));

    let progress = spawn_progress_bar(Arc::clone(&dashboard));

    let outcome = coordinator.run(batch.specs, max_parallel).await;

    progress.abort();
    let _ = progress.await;

    match outcome {
        Ok(results) => {
            print_summary(&results);
            if let Some(path) = output {
                write_results(path, &results).await?;
            }
            Ok(())
        }
        Err(error) => {
            print_summary(&error.completed);
            if let Some(path) = output {
                write_results(path, &error.completed).await?;
            }
            eprintln!();
            eprintln!("{} job(s) failed:", error.failures.len());
            for failure in &error.failures {
                eprintln!("  {}: {}", failure.job, failure.error);
            }
            bail!("batch finished with {} failed job(s)", error.failures.len());
        }
    }
}

async fn validate(config: &str) -> Result<()> {
    let batch = load_batch(config).await?;

    let mut problems = Vec::new();
    for name in &batch.dataset_names {
        if let Err(e) = batch.source.resolve(name).await {
            problems.push(format!("dataset {name}: {e}"));
        }
    }

    if problems.is_empty() {
        println!(
            "ok: {} job(s), {} dataset(s)",
            batch.specs.len(),
            batch.dataset_names.len()
        );
        Ok(())
    } else {
        for problem in &problems {
            eprintln!("error: {problem}");
        }
        bail!("validation failed with {} problem(s)", problems.len());
    }
}

// ============================================================================
// Output
// ============================================================================

fn spawn_progress_bar(dashboard: Arc<DashboardState>) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let bar = ProgressBar::new(0);
        bar.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("#>-"),
        );

        loop {
            let snapshots = dashboard.snapshot();
            let total: usize = snapshots.iter().map(|s| s.total).sum();
            let terminal: usize = snapshots.iter().map(|s| s.terminal()).sum();
            let running: usize = snapshots.iter().map(|s| s.running).sum();

            bar.set_length(total as u64);
            bar.set_position(terminal as u64);
            bar.set_message(format!("{running} running"));

            tokio::time::sleep(Duration::from_millis(100)).await;
        }
    })
}

fn print_summary(results: &[JobResult]) {
    for result in results {
        println!(
            "{}: {}/{} completed, {} failed in {:.2}s",
            result.job,
            result.completed,
            result.total,
            result.failed,
            result.duration.as_secs_f64(),
        );
        let mut metric_names: Vec<&String> = result.metrics.keys().collect();
        metric_names.sort();
        for name in metric_names {
            let stats = &result.metrics[name];
            println!(
                "  {name}: mean {:.3} (min {:.3}, max {:.3}, {} scored, {} errored)",
                stats.mean, stats.min, stats.max, stats.count, stats.errors
            );
        }
    }
}

async fn write_results(path: &str, results: &[JobResult]) -> Result<()> {
    let json = serde_json::to_string_pretty(results)?;
    tokio::fs::write(path, json)
        .await
        .with_context(|| format!("failed to write results to {path}"))?;
    tracing::info!(path, "results written");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_load_batch_builds_specs() {
        let dir = tempfile::tempdir().unwrap();
        tokio::fs::write(
            dir.path().join("questions.json"),
            r#"[{"input": "2+2?", "expected": "4"}]"#,
        )
        .await
        .unwrap();
        let batch_path = dir.path().join("batch.json");
        tokio::fs::write(
            &batch_path,
            r#"{
                "jobs": [
                    {
                        "name": "smoke",
                        "dataset": "questions",
                        "metrics": ["exact_match"],
                        "concurrency": 2,
                        "timeout_ms": 1000,
                        "targets": [{"name": "fast", "options": {"delay_ms": 1}}]
                    }
                ]
            }"#,
        )
        .await
        .unwrap();

        let batch = load_batch(batch_path.to_str().unwrap()).await.unwrap();
        assert_eq!(batch.specs.len(), 1);
        assert_eq!(batch.specs[0].name, "smoke");
        assert_eq!(batch.specs[0].targets.len(), 1);
        assert_eq!(batch.dataset_names, vec!["questions".to_string()]);
    }

    #[tokio::test]
    async fn test_load_batch_rejects_unknown_metric() {
        let dir = tempfile::tempdir().unwrap();
        let batch_path = dir.path().join("batch.json");
        tokio::fs::write(
            &batch_path,
            r#"{"jobs": [{"name": "bad", "dataset": "d", "metrics": ["bleu"]}]}"#,
        )
        .await
        .unwrap();

        let error = load_batch(batch_path.to_str().unwrap()).await.unwrap_err();
        assert!(error.to_string().contains("bleu"));
    }

    #[tokio::test]
    async fn test_load_batch_rejects_empty_jobs() {
        let dir = tempfile::tempdir().unwrap();
        let batch_path = dir.path().join("batch.json");
        tokio::fs::write(&batch_path, r#"{"jobs": []}"#).await.unwrap();

        assert!(load_batch(batch_path.to_str().unwrap()).await.is_err());
    }
}
