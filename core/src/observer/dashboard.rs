//! In-memory per-job visual aggregate
//!
//! The dashboard observer mutates this state from its hooks; the rendering
//! collaborator reads cloneable snapshots on its own refresh cadence. The
//! aggregate is an explicit owned map keyed by job name, created at the
//! job-start hook and finalized at the job-complete hook.

use crate::item::MetricScore;
use crate::observer::JobStart;
use crate::result::JobResult;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Latency histogram for item wall-clock times
///
/// Microsecond precision with a one hour ceiling, recorded in milliseconds.
pub struct LatencyHistogram {
    histogram: hdrhistogram::Histogram<u64>,
}

impl LatencyHistogram {
    /// Create an empty histogram
    pub fn new() -> Self {
        let histogram = hdrhistogram::Histogram::new_with_bounds(1, 3_600_000_000, 3)
            .expect("Failed to create histogram");
        Self { histogram }
    }

    /// Record a latency in milliseconds
    pub fn record_ms(&mut self, ms: f64) {
        let micros = (ms * 1000.0) as u64;
        let _ = self.histogram.record(micros.max(1));
    }

    /// Number of recorded samples
    pub fn len(&self) -> u64 {
        self.histogram.len()
    }

    /// Whether no samples have been recorded
    pub fn is_empty(&self) -> bool {
        self.histogram.is_empty()
    }

    /// Summarize into percentiles (milliseconds)
    pub fn summary(&self) -> LatencySummary {
        if self.histogram.is_empty() {
            return LatencySummary::default();
        }

        LatencySummary {
            mean: self.histogram.mean() / 1000.0,
            p50: self.histogram.value_at_quantile(0.50) as f64 / 1000.0,
            p95: self.histogram.value_at_quantile(0.95) as f64 / 1000.0,
            p99: self.histogram.value_at_quantile(0.99) as f64 / 1000.0,
            max: self.histogram.max() as f64 / 1000.0,
        }
    }
}

impl Default for LatencyHistogram {
    fn default() -> Self {
        Self::new()
    }
}

/// Latency percentile summary (all values in milliseconds)
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct LatencySummary {
    /// Mean latency
    pub mean: f64,
    /// 50th percentile
    pub p50: f64,
    /// 95th percentile
    pub p95: f64,
    /// 99th percentile
    pub p99: f64,
    /// Maximum observed latency
    pub max: f64,
}

/// Running average without keeping samples
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct RunningAverage {
    /// Number of recorded values
    pub count: usize,
    /// Sum of recorded values
    pub sum: f64,
}

impl RunningAverage {
    /// Record one value
    pub fn record(&mut self, value: f64) {
        self.count += 1;
        self.sum += value;
    }

    /// Current mean, or 0.0 with no samples
    pub fn mean(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.sum / self.count as f64
        }
    }
}

/// Live aggregate for one job
struct JobProgress {
    total: usize,
    running: usize,
    completed: usize,
    errors: usize,
    metric_names: Vec<String>,
    latency: LatencyHistogram,
    metric_averages: HashMap<String, RunningAverage>,
    started_at: DateTime<Utc>,
    finished_at: Option<DateTime<Utc>>,
}

impl JobProgress {
    fn new(start: &JobStart) -> Self {
        Self {
            total: start.total_items,
            running: 0,
            completed: 0,
            errors: 0,
            metric_names: start.metric_names.clone(),
            latency: LatencyHistogram::new(),
            metric_averages: HashMap::new(),
            started_at: Utc::now(),
            finished_at: None,
        }
    }

    fn snapshot(&self, job: &str) -> JobProgressSnapshot {
        JobProgressSnapshot {
            job: job.to_string(),
            total: self.total,
            running: self.running,
            completed: self.completed,
            errors: self.errors,
            metric_names: self.metric_names.clone(),
            metric_averages: self
                .metric_averages
                .iter()
                .map(|(name, avg)| (name.clone(), avg.mean()))
                .collect(),
            latency: self.latency.summary(),
            started_at: self.started_at,
            finished_at: self.finished_at,
        }
    }
}

/// Cloneable snapshot handed to the rendering collaborator
#[derive(Debug, Clone, Serialize)]
pub struct JobProgressSnapshot {
    /// Job name
    pub job: String,
    /// Total item count
    pub total: usize,
    /// Items currently running
    pub running: usize,
    /// Items completed successfully
    pub completed: usize,
    /// Items that ended in error
    pub errors: usize,
    /// Metric names declared by the job
    pub metric_names: Vec<String>,
    /// Per-metric running averages
    pub metric_averages: HashMap<String, f64>,
    /// Item latency summary
    pub latency: LatencySummary,
    /// When the job started
    pub started_at: DateTime<Utc>,
    /// When the job finished, once terminal
    pub finished_at: Option<DateTime<Utc>>,
}

impl JobProgressSnapshot {
    /// Items in a terminal state
    pub fn terminal(&self) -> usize {
        self.completed + self.errors
    }

    /// Whether the job has finished
    pub fn is_finished(&self) -> bool {
        self.finished_at.is_some()
    }
}

/// Process-wide dashboard state: an owned map of per-job aggregates
#[derive(Default)]
pub struct DashboardState {
    jobs: Mutex<HashMap<String, JobProgress>>,
}

impl DashboardState {
    /// Create empty dashboard state
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, JobProgress>> {
        self.jobs.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn job_started(&self, start: &JobStart) {
        self.lock()
            .insert(start.job.clone(), JobProgress::new(start));
    }

    pub(crate) fn item_started(&self, job: &str) {
        if let Some(progress) = self.lock().get_mut(job) {
            progress.running += 1;
        }
    }

    pub(crate) fn item_completed(&self, job: &str, elapsed_ms: f64) {
        if let Some(progress) = self.lock().get_mut(job) {
            progress.running = progress.running.saturating_sub(1);
            progress.completed += 1;
            progress.latency.record_ms(elapsed_ms);
        }
    }

    pub(crate) fn item_errored(&self, job: &str) {
        if let Some(progress) = self.lock().get_mut(job) {
            progress.running = progress.running.saturating_sub(1);
            progress.errors += 1;
        }
    }

    pub(crate) fn metric_recorded(&self, job: &str, metric: &str, score: &MetricScore) {
        if let Some(value) = score.value() {
            if let Some(progress) = self.lock().get_mut(job) {
                progress
                    .metric_averages
                    .entry(metric.to_string())
                    .or_default()
                    .record(value);
            }
        }
    }

    pub(crate) fn job_finished(&self, result: &JobResult) {
        if let Some(progress) = self.lock().get_mut(&result.job) {
            progress.finished_at = Some(result.finished_at);
            progress.completed = result.completed;
            progress.errors = result.failed;
            progress.running = 0;
        }
    }

    /// Snapshot every tracked job, sorted by name
    pub fn snapshot(&self) -> Vec<JobProgressSnapshot> {
        let jobs = self.lock();
        let mut snapshots: Vec<JobProgressSnapshot> = jobs
            .iter()
            .map(|(name, progress)| progress.snapshot(name))
            .collect();
        snapshots.sort_by(|a, b| a.job.cmp(&b.job));
        snapshots
    }

    /// Snapshot one job
    pub fn snapshot_job(&self, job: &str) -> Option<JobProgressSnapshot> {
        self.lock().get(job).map(|progress| progress.snapshot(job))
    }

    /// Drop a job's aggregate once its result has been consumed
    pub fn remove(&self, job: &str) -> bool {
        self.lock().remove(job).is_some()
    }

    /// Number of tracked jobs
    pub fn job_count(&self) -> usize {
        self.lock().len()
    }
}

impl std::fmt::Debug for DashboardState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DashboardState")
            .field("jobs", &self.job_count())
            .finish()
    }
}
