//! Capability traits consumed by the runner and coordinator
//!
//! These traits are defined in core to avoid circular dependencies.
//! Implementations live with their owners: data sources and task capabilities
//! are supplied by the embedding application, metrics by metric crates.

use crate::item::Item;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

// ============================================================================
// Data Source
// ============================================================================

/// A fully resolved, read-only dataset handle
///
/// Resolved once per distinct name by the coordinator and shared across every
/// job that references it. Never mutated after resolution, so sharing needs
/// no locking.
#[derive(Debug, Clone)]
pub struct Dataset {
    /// Source name the handle was resolved from
    pub name: String,
    /// Ordered item set
    pub items: Vec<Item>,
}

impl Dataset {
    /// Create a resolved dataset handle
    pub fn new(name: impl Into<String>, items: Vec<Item>) -> Self {
        Self {
            name: name.into(),
            items,
        }
    }

    /// Number of items in the dataset
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Whether the dataset has no items
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// Resolves dataset names to handles
#[async_trait]
pub trait DataSource: Send + Sync {
    /// Resolve a dataset by name
    ///
    /// Returns `SourceError::NotFound` for unknown names and
    /// `SourceError::Empty` for datasets with no items.
    async fn resolve(&self, name: &str) -> Result<Arc<Dataset>, SourceError>;
}

/// Data source errors
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    /// No dataset with the given name
    #[error("dataset not found: {0}")]
    NotFound(String),

    /// The dataset resolved but contains no items
    #[error("dataset is empty: {0}")]
    Empty(String),

    /// The dataset exists but could not be parsed
    #[error("malformed dataset {name}: {message}")]
    Malformed {
        /// Dataset name
        name: String,
        /// Parse failure detail
        message: String,
    },

    /// IO error while reading the dataset
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

// ============================================================================
// Task Invocation
// ============================================================================

/// Correlation context threaded through task invocations
#[derive(Debug, Clone, Default)]
pub struct InvokeContext {
    /// Name of the job the item belongs to
    pub job: String,
    /// Original dataset position of the item
    pub item_index: usize,
    /// Optional trace identifier for distributed correlation
    pub trace_id: Option<String>,
    /// Target-variant options, when the job spec declared variants
    pub target_options: HashMap<String, Value>,
}

/// Parameter shape advertised by a task capability
///
/// Inspected once at job construction to pick a binding strategy; never
/// re-inspected per call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParameterShape {
    /// The capability takes the item input as a single opaque value
    Single,
    /// The capability expects the input's fields unpacked by name
    NamedFields,
    /// The capability expects the whole item (input, expected, metadata)
    WholeItem,
}

/// The task invocation capability driven once per item
///
/// May be synchronous or asynchronous under the hood; the executor makes no
/// assumption beyond the async contract here.
#[async_trait]
pub trait TaskInvoker: Send + Sync {
    /// Capability identifier
    fn name(&self) -> &str;

    /// Shape of the payload this capability expects
    fn parameter_shape(&self) -> ParameterShape {
        ParameterShape::Single
    }

    /// Execute the task for one item payload
    async fn invoke(&self, payload: Value, ctx: &InvokeContext) -> Result<Value, InvokeError>;
}

/// Task invocation errors
#[derive(Debug, thiserror::Error)]
pub enum InvokeError {
    /// The task ran and failed
    #[error("invocation failed: {0}")]
    Failed(String),

    /// The payload did not match the capability's expectations
    #[error("invalid payload: {0}")]
    InvalidPayload(String),

    /// The capability itself is unavailable
    #[error("capability unavailable: {0}")]
    Unavailable(String),
}

// ============================================================================
// Metrics
// ============================================================================

/// Argument set assembled for one metric computation
///
/// Which fields are populated is decided by the metric's cached binding, not
/// by the metric at call time.
#[derive(Debug, Clone, Copy)]
pub struct MetricArgs<'a> {
    /// Task output for the item
    pub output: &'a Value,
    /// Expected output, when bound and present on the item
    pub expected: Option<&'a Value>,
    /// Item input, when bound
    pub input: Option<&'a Value>,
}

/// Arity advertised by a metric
///
/// Inspected once at job construction, like [`ParameterShape`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricArity {
    /// Scores the output alone
    OutputOnly,
    /// Scores the output against the expected output
    OutputExpected,
    /// Scores with output, expected output, and input
    Full,
}

/// A scoring capability applied to each completed item
#[async_trait]
pub trait Metric: Send + Sync {
    /// Metric identifier, used as the score key
    fn name(&self) -> &str;

    /// Argument set this metric consumes
    fn arity(&self) -> MetricArity {
        MetricArity::OutputExpected
    }

    /// Compute the score for one item
    ///
    /// Each computation is independently fallible: an error degrades this
    /// metric's score for this item and nothing else.
    async fn compute(&self, args: MetricArgs<'_>) -> Result<f64, MetricError>;
}

/// Metric computation errors
#[derive(Debug, thiserror::Error)]
pub enum MetricError {
    /// The computation itself failed
    #[error("metric computation failed: {0}")]
    Failed(String),

    /// The metric needs an expected output the item does not carry
    #[error("missing expected output")]
    MissingExpected,

    /// The output shape is not scorable by this metric
    #[error("unsupported output shape: {0}")]
    UnsupportedShape(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_dataset_len() {
        let dataset = Dataset::new(
            "smoke",
            vec![Item::new(0, json!("a")), Item::new(1, json!("b"))],
        );
        assert_eq!(dataset.len(), 2);
        assert!(!dataset.is_empty());
    }

    #[test]
    fn test_parameter_shape_serialization() {
        assert_eq!(
            serde_json::to_string(&ParameterShape::NamedFields).unwrap(),
            "\"named_fields\""
        );
        assert_eq!(
            serde_json::to_string(&MetricArity::OutputOnly).unwrap(),
            "\"output_only\""
        );
    }

    #[test]
    fn test_invoke_context_default() {
        let ctx = InvokeContext::default();
        assert!(ctx.job.is_empty());
        assert!(ctx.trace_id.is_none());
        assert!(ctx.target_options.is_empty());
    }
}
