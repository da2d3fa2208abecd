//! Items and per-item execution state

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

/// One unit of work within a job
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Item {
    /// Original position within the dataset
    pub index: usize,

    /// Opaque task input
    pub input: Value,

    /// Expected output, when the dataset provides one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected: Option<Value>,

    /// Free-form item metadata
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub metadata: HashMap<String, Value>,
}

impl Item {
    /// Create a new item at the given dataset position
    pub fn new(index: usize, input: Value) -> Self {
        Self {
            index,
            input,
            expected: None,
            metadata: HashMap::new(),
        }
    }

    /// Set the expected output
    pub fn with_expected(mut self, expected: Value) -> Self {
        self.expected = Some(expected);
        self
    }

    /// Set the item metadata
    pub fn with_metadata(mut self, metadata: HashMap<String, Value>) -> Self {
        self.metadata = metadata;
        self
    }
}

/// Lifecycle status of one item
///
/// Transitions are monotonic: pending, then running, then exactly one of
/// completed or error. An item never re-enters `Running`. A job-level
/// cancellation may move an item straight from `Pending` to `Error` when it
/// never acquired a permit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemStatus {
    /// Not yet started
    Pending,
    /// Task invocation in flight
    Running,
    /// Terminal: invocation succeeded, metrics attempted
    Completed,
    /// Terminal: invocation failed, timed out, or was cancelled
    Error,
}

impl ItemStatus {
    /// Whether this status is terminal
    pub fn is_terminal(&self) -> bool {
        matches!(self, ItemStatus::Completed | ItemStatus::Error)
    }
}

impl std::fmt::Display for ItemStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ItemStatus::Pending => write!(f, "pending"),
            ItemStatus::Running => write!(f, "running"),
            ItemStatus::Completed => write!(f, "completed"),
            ItemStatus::Error => write!(f, "error"),
        }
    }
}

/// Score produced by one metric for one item
///
/// A metric failure degrades only that metric's score to an error marker; it
/// never fails the item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MetricScore {
    /// Successful computation
    Value {
        /// The computed score
        value: f64,
    },
    /// Failed computation, recorded in place of a score
    Failed {
        /// Why the computation failed
        message: String,
    },
}

impl MetricScore {
    /// The numeric score, if the computation succeeded
    pub fn value(&self) -> Option<f64> {
        match self {
            MetricScore::Value { value } => Some(*value),
            MetricScore::Failed { .. } => None,
        }
    }

    /// Whether the computation failed
    pub fn is_failed(&self) -> bool {
        matches!(self, MetricScore::Failed { .. })
    }
}

/// Mutable per-item record, owned by the single executor driving the item
#[derive(Debug, Clone)]
pub struct ItemState {
    /// Original dataset position
    pub index: usize,
    /// Current lifecycle status
    pub status: ItemStatus,
    /// When the item entered `Running`
    pub started_at: Option<DateTime<Utc>>,
    /// When the item reached a terminal status
    pub ended_at: Option<DateTime<Utc>>,
    /// Last task output
    pub output: Option<Value>,
    /// Per-metric last score
    pub scores: HashMap<String, MetricScore>,
    /// Error message for `Error` status
    pub error: Option<String>,
}

impl ItemState {
    /// Create a pending state for the given item position
    pub fn new(index: usize) -> Self {
        Self {
            index,
            status: ItemStatus::Pending,
            started_at: None,
            ended_at: None,
            output: None,
            scores: HashMap::new(),
            error: None,
        }
    }

    /// Transition to `Running`
    pub fn mark_running(&mut self) {
        self.status = ItemStatus::Running;
        self.started_at = Some(Utc::now());
    }

    /// Transition to `Completed` with the task output
    pub fn mark_completed(&mut self, output: Value) {
        self.status = ItemStatus::Completed;
        self.output = Some(output);
        self.ended_at = Some(Utc::now());
    }

    /// Transition to `Error` with a message
    pub fn mark_error(&mut self, message: impl Into<String>) {
        self.status = ItemStatus::Error;
        self.error = Some(message.into());
        self.ended_at = Some(Utc::now());
    }

    /// Freeze into an immutable outcome with the measured elapsed time
    pub fn into_outcome(self, elapsed_ms: f64) -> ItemOutcome {
        ItemOutcome {
            index: self.index,
            status: self.status,
            output: self.output,
            scores: self.scores,
            error: self.error,
            elapsed_ms,
        }
    }
}

/// Immutable terminal outcome of one item, recorded in the job result
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ItemOutcome {
    /// Original dataset position
    pub index: usize,
    /// Terminal status (`Completed` or `Error`)
    pub status: ItemStatus,
    /// Task output, when the invocation succeeded
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<Value>,
    /// Per-metric scores
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub scores: HashMap<String, MetricScore>,
    /// Error message, when the item failed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Wall-clock time the item spent executing, in milliseconds
    pub elapsed_ms: f64,
}

impl ItemOutcome {
    /// Terminal error outcome for an item that produced no output
    pub fn failed(index: usize, message: impl Into<String>) -> Self {
        Self {
            index,
            status: ItemStatus::Error,
            output: None,
            scores: HashMap::new(),
            error: Some(message.into()),
            elapsed_ms: 0.0,
        }
    }

    /// Whether the item completed successfully
    pub fn is_completed(&self) -> bool {
        self.status == ItemStatus::Completed
    }
}
