//! Lifecycle observers
//!
//! The runner reports job and item lifecycle transitions through a fixed
//! hook set. Observers form a small closed set of variants rather than an
//! open trait hierarchy: a null sink, a dashboard aggregator, a broadcast
//! forwarder, and a composite that calls its children in sequence.
//!
//! Hooks are synchronous and must stay cheap. The dashboard variant takes a
//! short lock to bump counters; the broadcast variant serializes one
//! envelope and enqueues it on unbounded per-connection channels. Anything
//! expensive (rendering, persistence) happens elsewhere, against snapshots.

mod dashboard;

pub use dashboard::{
    DashboardState, JobProgressSnapshot, LatencyHistogram, LatencySummary, RunningAverage,
};


use crate::events::{EventEnvelope, EventKind};
use crate::hub::BroadcastHub;
use crate::item::MetricScore;
use crate::result::JobResult;
use serde_json::json;
use std::sync::Arc;

/// Start-of-job summary passed to `on_job_start`
///
/// Carries what subscribers need to size progress displays.
#[derive(Debug, Clone)]
pub struct JobStart {
    /// Job name
    pub job: String,
    /// Total item count
    pub total_items: usize,
    /// Names of the job's metrics
    pub metric_names: Vec<String>,
}

/// A lifecycle-hook sink notified of job and item events
#[derive(Clone)]
pub enum Observer {
    /// All hooks are no-ops, for jobs that need no live reporting
    Null,
    /// Mutates the in-memory per-job dashboard aggregate
    Dashboard(Arc<DashboardState>),
    /// Serializes each event and forwards it to the hub for the job
    Broadcast(Arc<BroadcastHub>),
    /// Calls each child in sequence
    Composite(Vec<Observer>),
}

impl Observer {
    /// Compose several observers into one
    pub fn composite(children: Vec<Observer>) -> Self {
        Observer::Composite(children)
    }

    /// A job is about to start its first item
    pub fn on_job_start(&self, start: &JobStart) {
        match self {
            Observer::Null => {}
            Observer::Dashboard(dashboard) => dashboard.job_started(start),
            Observer::Broadcast(hub) => {
                let envelope = EventEnvelope::new(
                    &start.job,
                    EventKind::Status,
                    json!({
                        "state": "started",
                        "total_items": start.total_items,
                        "metrics": start.metric_names,
                    }),
                );
                hub.broadcast_to_job(&start.job, &envelope.to_json());
            }
            Observer::Composite(children) => {
                for child in children {
                    child.on_job_start(start);
                }
            }
        }
    }

    /// An item entered the running state
    pub fn on_item_start(&self, job: &str, index: usize) {
        match self {
            Observer::Null => {}
            Observer::Dashboard(dashboard) => dashboard.item_started(job),
            Observer::Broadcast(hub) => {
                let envelope = EventEnvelope::new(
                    job,
                    EventKind::Progress,
                    json!({ "item": index, "state": "running" }),
                );
                hub.broadcast_to_job(job, &envelope.to_json());
            }
            Observer::Composite(children) => {
                for child in children {
                    child.on_item_start(job, index);
                }
            }
        }
    }

    /// One metric produced a score (or an error marker) for one item
    pub fn on_metric_result(&self, job: &str, index: usize, metric: &str, score: &MetricScore) {
        match self {
            Observer::Null => {}
            Observer::Dashboard(dashboard) => dashboard.metric_recorded(job, metric, score),
            Observer::Broadcast(hub) => {
                let envelope = EventEnvelope::new(
                    job,
                    EventKind::Metric,
                    json!({ "item": index, "metric": metric, "score": score }),
                );
                hub.broadcast_to_job(job, &envelope.to_json());
            }
            Observer::Composite(children) => {
                for child in children {
                    child.on_metric_result(job, index, metric, score);
                }
            }
        }
    }

    /// An item completed successfully
    pub fn on_item_complete(&self, job: &str, index: usize, elapsed_ms: f64) {
        match self {
            Observer::Null => {}
            Observer::Dashboard(dashboard) => dashboard.item_completed(job, elapsed_ms),
            Observer::Broadcast(hub) => {
                let envelope = EventEnvelope::new(
                    job,
                    EventKind::Progress,
                    json!({ "item": index, "state": "completed", "elapsed_ms": elapsed_ms }),
                );
                hub.broadcast_to_job(job, &envelope.to_json());
            }
            Observer::Composite(children) => {
                for child in children {
                    child.on_item_complete(job, index, elapsed_ms);
                }
            }
        }
    }

    /// An item ended in error
    pub fn on_item_error(&self, job: &str, index: usize, message: &str) {
        match self {
            Observer::Null => {}
            Observer::Dashboard(dashboard) => dashboard.item_errored(job),
            Observer::Broadcast(hub) => {
                let envelope = EventEnvelope::new(
                    job,
                    EventKind::Error,
                    json!({ "item": index, "message": message }),
                );
                hub.broadcast_to_job(job, &envelope.to_json());
            }
            Observer::Composite(children) => {
                for child in children {
                    child.on_item_error(job, index, message);
                }
            }
        }
    }

    /// A job finished and its result snapshot is available
    pub fn on_job_complete(&self, result: &JobResult) {
        match self {
            Observer::Null => {}
            Observer::Dashboard(dashboard) => dashboard.job_finished(result),
            Observer::Broadcast(hub) => {
                let envelope = EventEnvelope::new(
                    &result.job,
                    EventKind::Completed,
                    json!({
                        "total": result.total,
                        "completed": result.completed,
                        "failed": result.failed,
                        "duration_ms": result.duration.as_secs_f64() * 1000.0,
                        "metrics": result.metrics,
                    }),
                );
                hub.broadcast_to_job(&result.job, &envelope.to_json());
            }
            Observer::Composite(children) => {
                for child in children {
                    child.on_job_complete(result);
                }
            }
        }
    }
}

impl std::fmt::Debug for Observer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Observer::Null => write!(f, "Observer::Null"),
            Observer::Dashboard(_) => write!(f, "Observer::Dashboard"),
            Observer::Broadcast(_) => write!(f, "Observer::Broadcast"),
            Observer::Composite(children) => {
                write!(f, "Observer::Composite({} children)", children.len())
            }
        }
    }
}
