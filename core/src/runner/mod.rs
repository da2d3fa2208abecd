//! Job execution under a bounded permit pool
//!
//! The runner is the core execution unit: it owns one job, fans its items
//! out as concurrent tasks gated by a counting semaphore, and folds the
//! terminal outcomes into a result snapshot.
//!
//! Each item task acquires a permit before starting and releases it when it
//! resolves, success or failure. The semaphore is the only synchronization
//! between items: no item touches another item's state, and completion order
//! is whatever the scheduler yields. The final result indexes items by their
//! original dataset position.
//!
//! # Example
//!
//! ```ignore
//! use evalstream_core::{JobRunner, Observer};
//!
//! let runner = JobRunner::new(Observer::Null);
//! let result = runner.run(job).await?;
//! println!("completed: {}/{}", result.completed, result.total);
//! ```

mod executor;

pub(crate) use executor::ItemExecutor;


use crate::error::JobError;
use crate::item::{Item, ItemOutcome};
use crate::job::Job;
use crate::observer::{JobStart, Observer};
use crate::result::JobResult;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Semaphore;

/// Drives one job to completion and produces its result snapshot
pub struct JobRunner {
    observer: Observer,
}

impl JobRunner {
    /// Create a runner reporting through the given observer
    pub fn new(observer: Observer) -> Self {
        Self { observer }
    }

    /// Run the job
    ///
    /// Item-level failures are recorded on their outcomes, never raised;
    /// only fatal conditions outside the per-item loop (an invalid
    /// configuration, a failed setup) surface as an error. Exactly every
    /// item reaches a terminal state before this returns.
    pub async fn run(&self, job: Job) -> Result<JobResult, JobError> {
        job.config.validate().map_err(JobError::Config)?;

        let job = Arc::new(job);
        let total = job.dataset.items.len();
        let metric_names = job.metric_names();

        tracing::info!(
            job = %job.name,
            items = total,
            concurrency = job.config.concurrency,
            "job starting"
        );
        self.observer.on_job_start(&JobStart {
            job: job.name.clone(),
            total_items: total,
            metric_names: metric_names.clone(),
        });

        let started_at = chrono::Utc::now();
        let started = Instant::now();
        let semaphore = Arc::new(Semaphore::new(job.config.concurrency));

        let mut handles = Vec::with_capacity(total);
        for item in job.dataset.items.iter().cloned() {
            let executor = ItemExecutor::new(Arc::clone(&job), self.observer.clone());
            let semaphore = Arc::clone(&semaphore);
            let cancel = job.cancel.clone();

            handles.push(tokio::spawn(async move {
                run_item(executor, semaphore, cancel, item).await
            }));
        }

        // handles were spawned in dataset order, so awaiting in order yields
        // outcomes indexed by original position regardless of completion order
        let mut outcomes: Vec<ItemOutcome> = Vec::with_capacity(total);
        for (index, handle) in handles.into_iter().enumerate() {
            match handle.await {
                Ok(outcome) => outcomes.push(outcome),
                Err(e) => {
                    tracing::error!(job = %job.name, item = index, error = %e, "item task panicked");
                    outcomes.push(ItemOutcome::failed(
                        index,
                        format!("item task panicked: {e}"),
                    ));
                }
            }
        }

        let finished_at = chrono::Utc::now();
        let result = JobResult::from_outcomes(
            job.name.clone(),
            outcomes,
            &metric_names,
            job.config.tags.clone(),
            started_at,
            finished_at,
            started.elapsed(),
        );

        tracing::info!(
            job = %job.name,
            completed = result.completed,
            failed = result.failed,
            elapsed_secs = started.elapsed().as_secs_f64(),
            "job completed"
        );
        self.observer.on_job_complete(&result);

        Ok(result)
    }
}

async fn run_item(
    executor: ItemExecutor,
    semaphore: Arc<Semaphore>,
    cancel: tokio_util::sync::CancellationToken,
    item: Item,
) -> ItemOutcome {
    // the cancellation token is observed at the permit-acquire point: items
    // that have not started yet resolve as cancelled, items already holding
    // a permit run to their own timeout
    let permit = tokio::select! {
        biased;

        _ = cancel.cancelled() => None,
        permit = semaphore.acquire_owned() => permit.ok(),
    };

    match permit {
        Some(_permit) => executor.execute(item).await,
        None => executor.cancelled(&item),
    }
}

impl std::fmt::Debug for JobRunner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JobRunner")
            .field("observer", &self.observer)
            .finish()
    }
}
