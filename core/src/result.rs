//! Job result snapshots and per-metric aggregates

use crate::item::{ItemOutcome, MetricScore};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

/// Aggregate statistics for one metric across a job
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MetricStats {
    /// Number of successfully scored items
    pub count: usize,
    /// Number of failed computations
    pub errors: usize,
    /// Mean score across scored items
    pub mean: f64,
    /// Minimum score
    pub min: f64,
    /// Maximum score
    pub max: f64,
}

impl MetricStats {
    /// Aggregate from the scores one metric produced across a job
    pub fn from_scores<'a>(scores: impl Iterator<Item = &'a MetricScore>) -> Self {
        let mut stats = MetricStats::default();
        let mut sum = 0.0;

        for score in scores {
            match score.value() {
                Some(value) => {
                    if stats.count == 0 {
                        stats.min = value;
                        stats.max = value;
                    } else {
                        stats.min = stats.min.min(value);
                        stats.max = stats.max.max(value);
                    }
                    stats.count += 1;
                    sum += value;
                }
                None => stats.errors += 1,
            }
        }

        if stats.count > 0 {
            stats.mean = sum / stats.count as f64;
        }

        stats
    }
}

/// Immutable snapshot produced once per job at completion
///
/// Items are indexed by their original dataset position, not completion
/// order. Handed to the persistence collaborator exactly once.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobResult {
    /// Job name
    pub job: String,
    /// Total item count
    pub total: usize,
    /// Items that completed successfully
    pub completed: usize,
    /// Items that ended in error
    pub failed: usize,
    /// Per-item outcomes in original order
    pub items: Vec<ItemOutcome>,
    /// Per-metric aggregate statistics
    pub metrics: HashMap<String, MetricStats>,
    /// Tags carried over from the job configuration
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    /// When the job started
    pub started_at: DateTime<Utc>,
    /// When the job finished
    pub finished_at: DateTime<Utc>,
    /// Total wall-clock duration
    pub duration: Duration,
}

impl JobResult {
    /// Build the snapshot from terminal item outcomes
    pub fn from_outcomes(
        job: impl Into<String>,
        items: Vec<ItemOutcome>,
        metric_names: &[String],
        tags: Vec<String>,
        started_at: DateTime<Utc>,
        finished_at: DateTime<Utc>,
        duration: Duration,
    ) -> Self {
        let total = items.len();
        let completed = items.iter().filter(|o| o.is_completed()).count();
        let failed = total - completed;

        let metrics = metric_names
            .iter()
            .map(|name| {
                let stats =
                    MetricStats::from_scores(items.iter().filter_map(|o| o.scores.get(name)));
                (name.clone(), stats)
            })
            .collect();

        Self {
            job: job.into(),
            total,
            completed,
            failed,
            items,
            metrics,
            tags,
            started_at,
            finished_at,
            duration,
        }
    }

    /// Fraction of items that completed successfully (0.0 - 1.0)
    pub fn success_rate(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.completed as f64 / self.total as f64
        }
    }
}
