//! Multi-job coordination
//!
//! The coordinator takes a batch of job specifications and:
//!
//! 1. expands every spec that declares target variants into one job per
//!    variant, with deterministic unique names
//! 2. resolves every distinct named data source exactly once and shares the
//!    resolved handle across the jobs that reference it (the handle is
//!    read-only after resolution, so sharing needs no locking)
//! 3. launches every job's runner concurrently, optionally gated by a
//!    job-level permit pool that is independent of each runner's item pool
//! 4. awaits all jobs and aggregates failures: a fatal job never cancels
//!    its siblings, and the batch error enumerates every failed job by name
//!    while still carrying the successful results


use crate::error::{BatchError, JobError, JobFailure};
use crate::job::{expand_specs, Job, JobSpec, SourceRef};
use crate::observer::Observer;
use crate::result::JobResult;
use crate::runner::JobRunner;
use crate::traits::{DataSource, Dataset};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Semaphore;

/// Expands, schedules, and aggregates a batch of evaluation jobs
pub struct JobCoordinator {
    source: Arc<dyn DataSource>,
    observer: Observer,
}

impl JobCoordinator {
    /// Create a coordinator resolving datasets through the given source
    pub fn new(source: Arc<dyn DataSource>) -> Self {
        Self {
            source,
            observer: Observer::Null,
        }
    }

    /// Report job lifecycles through the given observer
    pub fn with_observer(mut self, observer: Observer) -> Self {
        self.observer = observer;
        self
    }

    /// Run a batch of job specifications
    ///
    /// With `max_parallel_jobs` set, at most that many jobs run at once;
    /// item-level concurrency inside each job is bounded separately by the
    /// job's own configuration.
    pub async fn run(
        &self,
        specs: Vec<JobSpec>,
        max_parallel_jobs: Option<usize>,
    ) -> Result<Vec<JobResult>, BatchError> {
        let plans = expand_specs(&specs);
        tracing::info!(
            specs = specs.len(),
            jobs = plans.len(),
            max_parallel = ?max_parallel_jobs,
            "batch expanded"
        );

        // resolve each distinct named source exactly once up front
        let mut datasets: HashMap<String, Result<Arc<Dataset>, JobError>> = HashMap::new();
        for plan in &plans {
            if let SourceRef::Named(name) = &plan.spec.source {
                if !datasets.contains_key(name) {
                    let entry = match self.source.resolve(name).await {
                        Ok(handle) => {
                            tracing::debug!(dataset = %name, items = handle.len(), "dataset resolved");
                            Ok(handle)
                        }
                        Err(e) => {
                            tracing::error!(dataset = %name, error = %e, "dataset resolution failed");
                            Err(JobError::from(e))
                        }
                    };
                    datasets.insert(name.clone(), entry);
                }
            }
        }

        let gate = max_parallel_jobs.map(|n| Arc::new(Semaphore::new(n.max(1))));

        let mut failures: Vec<JobFailure> = Vec::new();
        let mut handles = Vec::with_capacity(plans.len());
        for plan in plans {
            let dataset = match &plan.spec.source {
                SourceRef::Resolved(handle) => Ok(Arc::clone(handle)),
                SourceRef::Named(name) => datasets.get(name).cloned().unwrap_or_else(|| {
                    Err(JobError::Setup(format!("dataset {name} was not resolved")))
                }),
            };

            let job = dataset.and_then(|handle| {
                Job::from_spec(plan.spec, plan.name.clone(), handle, plan.target.clone())
                    .map_err(JobError::Config)
            });

            let job = match job {
                Ok(job) => job,
                Err(error) => {
                    failures.push(JobFailure {
                        job: plan.name.clone(),
                        error,
                    });
                    continue;
                }
            };

            let runner = JobRunner::new(self.observer.clone());
            let gate = gate.clone();
            let name = job.name.clone();
            handles.push((
                name,
                tokio::spawn(async move {
                    let _permit = match gate {
                        Some(gate) => gate.acquire_owned().await.ok(),
                        None => None,
                    };
                    runner.run(job).await
                }),
            ));
        }

        let mut results = Vec::with_capacity(handles.len());
        for (name, handle) in handles {
            match handle.await {
                Ok(Ok(result)) => results.push(result),
                Ok(Err(error)) => {
                    tracing::error!(job = %name, error = %error, "job failed");
                    failures.push(JobFailure { job: name, error });
                }
                Err(e) => {
                    tracing::error!(job = %name, error = %e, "job task panicked");
                    failures.push(JobFailure {
                        job: name,
                        error: JobError::Setup(format!("job task panicked: {e}")),
                    });
                }
            }
        }

        if failures.is_empty() {
            tracing::info!(jobs = results.len(), "batch completed");
            Ok(results)
        } else {
            tracing::warn!(
                failed = failures.len(),
                completed = results.len(),
                "batch finished with failures"
            );
            Err(BatchError {
                failures,
                completed: results,
            })
        }
    }
}

impl std::fmt::Debug for JobCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JobCoordinator")
            .field("observer", &self.observer)
            .finish()
    }
}
