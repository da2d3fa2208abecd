//! Cooperative background health sweep
//!
//! The sweep runs as a cancellable periodic task: a stop signal is checked
//! each cycle, and shutdown joins the task with a timeout before draining
//! the registry.

use super::{BroadcastHub, ConnectionId};
use std::sync::{Arc, PoisonError};
use std::time::Duration;

const SHUTDOWN_JOIN_TIMEOUT: Duration = Duration::from_secs(2);

impl BroadcastHub {
    /// Start the periodic health sweep
    ///
    /// Idempotent in effect: starting again replaces the previous sweeper
    /// handle; the old task stops at the next shutdown signal.
    pub fn start_sweeper(self: &Arc<Self>) {
        let hub = Arc::clone(self);
        let mut stop_rx = self.stop_tx.subscribe();
        let sweep_interval = self.config.sweep_interval;

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(sweep_interval);
            // the first tick fires immediately; skip it so a fresh hub is
            // not swept before anything attaches
            ticker.tick().await;

            loop {
                tokio::select! {
                    biased;

                    _ = stop_rx.recv() => {
                        tracing::debug!("sweeper received stop signal");
                        break;
                    }

                    _ = ticker.tick() => {
                        let evicted = hub.evict_stale();
                        if evicted > 0 {
                            tracing::debug!(evicted, "sweep evicted stale subscribers");
                        }
                    }
                }
            }
        });

        *self
            .sweeper
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(handle);
    }

    /// Stop the sweep and evict every remaining connection
    ///
    /// The sweeper is signalled, then joined with a timeout; a sweeper that
    /// does not stop in time is abandoned with a warning. Either way the
    /// registry is drained afterwards.
    pub async fn shutdown(&self) {
        let _ = self.stop_tx.send(());

        let handle = self
            .sweeper
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(handle) = handle {
            if tokio::time::timeout(SHUTDOWN_JOIN_TIMEOUT, handle)
                .await
                .is_err()
            {
                tracing::warn!("sweeper did not stop within the join timeout");
            }
        }

        let drained: Vec<ConnectionId> = {
            let mut inner = self.lock();
            inner.connections.drain().map(|(id, _)| id).collect()
        };

        if !drained.is_empty() {
            tracing::info!(
                connections = drained.len(),
                "hub shut down, remaining subscribers evicted"
            );
        }
    }
}
