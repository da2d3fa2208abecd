//! Per-item execution
//!
//! One executor drives one item from pending to a terminal state. It is the
//! only writer of that item's state, and it always resolves with an outcome:
//! invocation failures, timeouts, and cancellations are recorded, never
//! propagated, so one item can never abort its siblings.

use crate::item::{Item, ItemOutcome, ItemState, MetricScore};
use crate::job::Job;
use crate::observer::Observer;
use crate::traits::InvokeContext;
use std::sync::Arc;
use std::time::Instant;

pub(crate) struct ItemExecutor {
    job: Arc<Job>,
    observer: Observer,
}

impl ItemExecutor {
    pub fn new(job: Arc<Job>, observer: Observer) -> Self {
        Self { job, observer }
    }

    /// Run one item to a terminal state
    pub async fn execute(&self, item: Item) -> ItemOutcome {
        let mut state = ItemState::new(item.index);
        state.mark_running();
        self.observer.on_item_start(&self.job.name, item.index);

        let started = Instant::now();
        let ctx = InvokeContext {
            job: self.job.name.clone(),
            item_index: item.index,
            trace_id: Some(format!("{}#{}", self.job.name, item.index)),
            target_options: self
                .job
                .target
                .as_ref()
                .map(|target| target.options.clone())
                .unwrap_or_default(),
        };
        let payload = self.job.binding.payload(&item);

        let invoked = tokio::time::timeout(
            self.job.config.item_timeout,
            self.job.invoker.invoke(payload, &ctx),
        )
        .await;

        match invoked {
            Ok(Ok(output)) => {
                // each metric is independently fallible: a failure degrades
                // that metric's score and nothing else
                for slot in &self.job.metrics {
                    let score = match slot.metric.compute(slot.binding.args(&output, &item)).await {
                        Ok(value) => MetricScore::Value { value },
                        Err(e) => {
                            tracing::warn!(
                                job = %self.job.name,
                                item = item.index,
                                metric = slot.metric.name(),
                                error = %e,
                                "metric computation failed"
                            );
                            MetricScore::Failed {
                                message: e.to_string(),
                            }
                        }
                    };
                    self.observer.on_metric_result(
                        &self.job.name,
                        item.index,
                        slot.metric.name(),
                        &score,
                    );
                    state.scores.insert(slot.metric.name().to_string(), score);
                }

                state.mark_completed(output);
                let elapsed_ms = started.elapsed().as_secs_f64() * 1000.0;
                self.observer
                    .on_item_complete(&self.job.name, item.index, elapsed_ms);
            }
            Ok(Err(e)) => {
                tracing::warn!(
                    job = %self.job.name,
                    item = item.index,
                    error = %e,
                    "task invocation failed"
                );
                let message = e.to_string();
                state.mark_error(message.clone());
                self.observer
                    .on_item_error(&self.job.name, item.index, &message);
            }
            Err(_) => {
                let message = format!("timed out after {:?}", self.job.config.item_timeout);
                tracing::warn!(
                    job = %self.job.name,
                    item = item.index,
                    timeout = ?self.job.config.item_timeout,
                    "task invocation timed out"
                );
                state.mark_error(message.clone());
                self.observer
                    .on_item_error(&self.job.name, item.index, &message);
            }
        }

        state.into_outcome(started.elapsed().as_secs_f64() * 1000.0)
    }

    /// Terminal outcome for an item the job cancelled before it started
    pub fn cancelled(&self, item: &Item) -> ItemOutcome {
        let message = "job cancelled before item started";
        self.observer
            .on_item_error(&self.job.name, item.index, message);
        ItemOutcome::failed(item.index, message)
    }
}
