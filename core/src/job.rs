//! Job specifications, target-variant expansion, and runnable jobs

use crate::binding::{ArgBinding, MetricBinding};
use crate::config::{ConfigError, JobConfig};
use crate::traits::{Dataset, Metric, TaskInvoker};
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// One target configuration a spec fans out over (e.g. a model variant)
#[derive(Debug, Clone, Default)]
pub struct TargetVariant {
    /// Variant name, appended to the job name on expansion
    pub name: String,
    /// Variant options handed to the task capability via the invoke context
    pub options: HashMap<String, Value>,
}

impl TargetVariant {
    /// Create a named variant with no options
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            options: HashMap::new(),
        }
    }

    /// Add one option
    pub fn with_option(mut self, key: impl Into<String>, value: Value) -> Self {
        self.options.insert(key.into(), value);
        self
    }
}

/// Reference to the dataset a job runs over
#[derive(Clone)]
pub enum SourceRef {
    /// Resolved by name through the coordinator's data source, once per
    /// distinct name per batch
    Named(String),
    /// Already resolved; used directly
    Resolved(Arc<Dataset>),
}

impl std::fmt::Debug for SourceRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SourceRef::Named(name) => f.debug_tuple("Named").field(name).finish(),
            SourceRef::Resolved(dataset) => f.debug_tuple("Resolved").field(&dataset.name).finish(),
        }
    }
}

/// Declarative input to the coordinator
///
/// Immutable after construction. A spec that declares target variants is
/// expanded into one job per variant before scheduling.
#[derive(Clone)]
pub struct JobSpec {
    /// Base job name
    pub name: String,
    /// Where the item set comes from
    pub source: SourceRef,
    /// Task invocation capability
    pub invoker: Arc<dyn TaskInvoker>,
    /// Metric set applied to each completed item
    pub metrics: Vec<Arc<dyn Metric>>,
    /// Execution configuration
    pub config: JobConfig,
    /// Target variants to fan out over; empty means one job
    pub targets: Vec<TargetVariant>,
    /// Cancellation token observed at the permit-acquire points
    pub cancel: CancellationToken,
}

impl JobSpec {
    /// Create a spec with default configuration and no metrics
    pub fn new(name: impl Into<String>, source: SourceRef, invoker: Arc<dyn TaskInvoker>) -> Self {
        Self {
            name: name.into(),
            source,
            invoker,
            metrics: Vec::new(),
            config: JobConfig::default(),
            targets: Vec::new(),
            cancel: CancellationToken::new(),
        }
    }

    /// Add one metric
    pub fn with_metric(mut self, metric: Arc<dyn Metric>) -> Self {
        self.metrics.push(metric);
        self
    }

    /// Replace the metric set
    pub fn with_metrics(mut self, metrics: Vec<Arc<dyn Metric>>) -> Self {
        self.metrics = metrics;
        self
    }

    /// Set the execution configuration
    pub fn with_config(mut self, config: JobConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the target variants
    pub fn with_targets(mut self, targets: Vec<TargetVariant>) -> Self {
        self.targets = targets;
        self
    }

    /// Use an externally owned cancellation token
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// The named source this spec references, if it is not already resolved
    pub fn source_name(&self) -> Option<&str> {
        match &self.source {
            SourceRef::Named(name) => Some(name),
            SourceRef::Resolved(_) => None,
        }
    }
}

/// A metric paired with its binding strategy, resolved once at construction
#[derive(Clone)]
pub struct MetricSlot {
    /// The scoring capability
    pub metric: Arc<dyn Metric>,
    /// Cached argument-binding strategy
    pub binding: MetricBinding,
}

/// One runnable evaluation unit
///
/// Owned by a single runner; never shared across runners. Binding strategies
/// for the invoker and every metric are resolved here, once.
pub struct Job {
    /// Unique job name within its batch
    pub name: String,
    /// Resolved, read-only item set
    pub dataset: Arc<Dataset>,
    /// Task invocation capability
    pub invoker: Arc<dyn TaskInvoker>,
    /// Cached payload-binding strategy for the invoker
    pub binding: ArgBinding,
    /// Metric set with cached bindings
    pub metrics: Vec<MetricSlot>,
    /// Execution configuration
    pub config: JobConfig,
    /// Target variant this job was expanded from, if any
    pub target: Option<TargetVariant>,
    /// Cancellation token observed at the permit-acquire points
    pub cancel: CancellationToken,
}

impl Job {
    /// Build a runnable job from a spec, a resolved dataset, and the variant
    /// it was expanded into
    pub fn from_spec(
        spec: &JobSpec,
        name: String,
        dataset: Arc<Dataset>,
        target: Option<TargetVariant>,
    ) -> Result<Self, ConfigError> {
        spec.config.validate()?;

        let binding = ArgBinding::resolve(spec.invoker.as_ref());
        let metrics = spec
            .metrics
            .iter()
            .map(|metric| MetricSlot {
                binding: MetricBinding::resolve(metric.as_ref()),
                metric: Arc::clone(metric),
            })
            .collect();

        Ok(Self {
            name,
            dataset,
            invoker: Arc::clone(&spec.invoker),
            binding,
            metrics,
            config: spec.config.clone(),
            target,
            cancel: spec.cancel.clone(),
        })
    }

    /// Names of the job's metrics, in declaration order
    pub fn metric_names(&self) -> Vec<String> {
        self.metrics
            .iter()
            .map(|slot| slot.metric.name().to_string())
            .collect()
    }
}

/// Expansion plan entry: a job name bound to its originating spec and variant
pub(crate) struct JobPlan<'a> {
    pub name: String,
    pub spec: &'a JobSpec,
    pub target: Option<TargetVariant>,
}

/// Expand a batch of specs into per-variant job plans with unique names
///
/// A spec with no targets yields one plan under its own name; a spec with
/// targets yields one plan per variant named `base-variant`. Name collisions
/// get an incrementing counter suffix, so expanding the same batch twice
/// yields the same names.
pub(crate) fn expand_specs(specs: &[JobSpec]) -> Vec<JobPlan<'_>> {
    let mut used: HashSet<String> = HashSet::new();
    let mut plans = Vec::new();

    for spec in specs {
        if spec.targets.is_empty() {
            plans.push(JobPlan {
                name: unique_name(&mut used, &spec.name),
                spec,
                target: None,
            });
        } else {
            for target in &spec.targets {
                let base = format!("{}-{}", spec.name, target.name);
                plans.push(JobPlan {
                    name: unique_name(&mut used, &base),
                    spec,
                    target: Some(target.clone()),
                });
            }
        }
    }

    plans
}

fn unique_name(used: &mut HashSet<String>, base: &str) -> String {
    if used.insert(base.to_string()) {
        return base.to_string();
    }

    let mut counter = 2;
    loop {
        let candidate = format!("{base}-{counter}");
        if used.insert(candidate.clone()) {
            return candidate;
        }
        counter += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::item::Item;
    use crate::traits::{InvokeContext, InvokeError, MetricArgs, MetricArity, MetricError};
    use async_trait::async_trait;
    use serde_json::json;

    struct EchoInvoker;

    #[async_trait]
    impl TaskInvoker for EchoInvoker {
        fn name(&self) -> &str {
            "echo"
        }

        async fn invoke(
            &self,
            payload: Value,
            _ctx: &InvokeContext,
        ) -> Result<Value, InvokeError> {
            Ok(payload)
        }
    }

    struct ConstMetric;

    #[async_trait]
    impl Metric for ConstMetric {
        fn name(&self) -> &str {
            "const"
        }

        fn arity(&self) -> MetricArity {
            MetricArity::OutputOnly
        }

        async fn compute(&self, _args: MetricArgs<'_>) -> Result<f64, MetricError> {
            Ok(1.0)
        }
    }

    fn test_dataset() -> Arc<Dataset> {
        Arc::new(Dataset::new("d", vec![Item::new(0, json!("x"))]))
    }

    fn spec(name: &str) -> JobSpec {
        JobSpec::new(name, SourceRef::Named("d".into()), Arc::new(EchoInvoker))
    }

    #[test]
    fn test_expand_without_targets() {
        let specs = vec![spec("alpha"), spec("beta")];
        let plans = expand_specs(&specs);

        assert_eq!(plans.len(), 2);
        assert_eq!(plans[0].name, "alpha");
        assert_eq!(plans[1].name, "beta");
        assert!(plans[0].target.is_none());
    }

    #[test]
    fn test_expand_with_targets() {
        let specs = vec![spec("sweep").with_targets(vec![
            TargetVariant::new("small"),
            TargetVariant::new("large"),
        ])];
        let plans = expand_specs(&specs);

        assert_eq!(plans.len(), 2);
        assert_eq!(plans[0].name, "sweep-small");
        assert_eq!(plans[1].name, "sweep-large");
        assert_eq!(plans[1].target.as_ref().map(|t| t.name.as_str()), Some("large"));
    }

    #[test]
    fn test_expand_resolves_collisions_with_counter() {
        let specs = vec![
            spec("dup"),
            spec("dup"),
            spec("dup"),
        ];
        let plans = expand_specs(&specs);

        let names: Vec<&str> = plans.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["dup", "dup-2", "dup-3"]);
    }

    #[test]
    fn test_expand_is_deterministic() {
        let specs = vec![
            spec("sweep").with_targets(vec![TargetVariant::new("a"), TargetVariant::new("a")]),
        ];
        let first: Vec<String> = expand_specs(&specs).into_iter().map(|p| p.name).collect();
        let second: Vec<String> = expand_specs(&specs).into_iter().map(|p| p.name).collect();
        assert_eq!(first, second);
        assert_eq!(first, vec!["sweep-a", "sweep-a-2"]);
    }

    #[test]
    fn test_job_from_spec_caches_bindings() {
        let spec = spec("bind").with_metric(Arc::new(ConstMetric));
        let job = Job::from_spec(&spec, "bind".into(), test_dataset(), None).unwrap();

        assert_eq!(job.binding, ArgBinding::Input);
        assert_eq!(job.metrics.len(), 1);
        assert_eq!(job.metrics[0].binding, MetricBinding::OutputOnly);
        assert_eq!(job.metric_names(), vec!["const".to_string()]);
    }

    #[test]
    fn test_job_from_spec_rejects_invalid_config() {
        let spec = spec("bad").with_config(JobConfig {
            concurrency: 0,
            ..Default::default()
        });
        let result = Job::from_spec(&spec, "bad".into(), test_dataset(), None);
        assert!(result.is_err());
    }
}
