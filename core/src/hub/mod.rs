//! Broadcast hub: connection registry and event fan-out
//!
//! The hub keys live subscriber connections by id, tracks per-job and
//! all-jobs subscriptions, and delivers serialized event envelopes
//! best-effort:
//!
//! - `attach` / `detach` manage the registry under a capacity limit
//! - `send_to` never raises; failures feed a per-connection error counter
//!   that forces eviction once the configured ceiling is crossed
//! - broadcasts snapshot the subscriber id set before sending, so a
//!   concurrent attach or detach cannot corrupt iteration
//! - a periodic sweep evicts connections that went silent, never signalled
//!   liveness at all, or sit over the error ceiling
//!
//! Every registry mutation happens under one internal lock per call. No
//! await happens while the lock is held: outbound queues are unbounded, so a
//! send is a non-blocking enqueue and per-connection order is preserved.

mod connection;
mod sweeper;

pub use connection::{ConnectionId, Subscription};

#[cfg(test)]
mod tests;

use crate::config::HubConfig;
use crate::events::{EventEnvelope, EventKind};
use connection::Connection;
use serde_json::json;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Instant;
use thiserror::Error;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;

/// Hub errors surfaced to callers
#[derive(Debug, Error)]
pub enum HubError {
    /// The configured maximum connection count is reached
    #[error("subscriber capacity reached ({limit} connections)")]
    AtCapacity {
        /// The configured maximum
        limit: usize,
    },
}

struct HubInner {
    connections: HashMap<ConnectionId, Connection>,
}

/// Registry and fan-out mechanism for live subscribers
pub struct BroadcastHub {
    config: HubConfig,
    inner: Mutex<HubInner>,
    next_id: AtomicU64,
    stop_tx: broadcast::Sender<()>,
    sweeper: Mutex<Option<JoinHandle<()>>>,
}

impl BroadcastHub {
    /// Create a hub with the given configuration
    pub fn new(config: HubConfig) -> Self {
        let (stop_tx, _) = broadcast::channel(1);
        Self {
            config,
            inner: Mutex::new(HubInner {
                connections: HashMap::new(),
            }),
            next_id: AtomicU64::new(1),
            stop_tx,
            sweeper: Mutex::new(None),
        }
    }

    /// The hub configuration
    pub fn config(&self) -> &HubConfig {
        &self.config
    }

    fn lock(&self) -> MutexGuard<'_, HubInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Attach a new subscriber
    ///
    /// Returns the connection id and the ordered outbound receiver. The new
    /// subscriber is greeted with a `connected` envelope carrying its id.
    pub fn attach(&self) -> Result<(ConnectionId, mpsc::UnboundedReceiver<String>), HubError> {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut inner = self.lock();

        if inner.connections.len() >= self.config.max_connections {
            return Err(HubError::AtCapacity {
                limit: self.config.max_connections,
            });
        }

        let id = ConnectionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let conn = Connection::new(id, tx);
        let greeting =
            EventEnvelope::new("*", EventKind::Connected, json!({ "connection_id": id.0 }));
        let _ = conn.tx.send(greeting.to_json());
        inner.connections.insert(id, conn);

        tracing::debug!(connection = %id, total = inner.connections.len(), "subscriber attached");
        Ok((id, rx))
    }

    /// Detach a subscriber
    ///
    /// Idempotent: detaching an unknown or already evicted id returns false.
    pub fn detach(&self, id: ConnectionId) -> bool {
        let removed = self.lock().connections.remove(&id).is_some();
        if removed {
            tracing::debug!(connection = %id, "subscriber detached");
        }
        removed
    }

    /// Subscribe a connection to one job or to all jobs
    ///
    /// Returns false for unknown connection ids. Counts as a liveness signal.
    pub fn subscribe(&self, id: ConnectionId, subscription: Subscription) -> bool {
        let mut inner = self.lock();
        match inner.connections.get_mut(&id) {
            Some(conn) => {
                match subscription {
                    Subscription::All => conn.all_jobs = true,
                    Subscription::Job(job) => {
                        conn.jobs.insert(job);
                    }
                }
                conn.last_seen = Instant::now();
                true
            }
            None => false,
        }
    }

    /// Remove one subscription from a connection
    pub fn unsubscribe(&self, id: ConnectionId, subscription: Subscription) -> bool {
        let mut inner = self.lock();
        match inner.connections.get_mut(&id) {
            Some(conn) => {
                match subscription {
                    Subscription::All => conn.all_jobs = false,
                    Subscription::Job(job) => {
                        conn.jobs.remove(&job);
                    }
                }
                conn.last_seen = Instant::now();
                true
            }
            None => false,
        }
    }

    /// Record an inbound message from a subscriber as a liveness signal
    pub fn touch(&self, id: ConnectionId) -> bool {
        let mut inner = self.lock();
        match inner.connections.get_mut(&id) {
            Some(conn) => {
                conn.last_seen = Instant::now();
                true
            }
            None => false,
        }
    }

    /// Best-effort unicast
    ///
    /// Returns false on any failure instead of raising. A failed send
    /// increments the connection's consecutive-error counter; crossing the
    /// ceiling evicts the connection. A successful send resets the counter.
    pub fn send_to(&self, id: ConnectionId, message: &str) -> bool {
        let mut inner = self.lock();
        let Some(conn) = inner.connections.get_mut(&id) else {
            return false;
        };

        if conn.tx.send(message.to_string()).is_ok() {
            conn.consecutive_errors = 0;
            true
        } else {
            conn.consecutive_errors += 1;
            if conn.consecutive_errors >= self.config.error_ceiling {
                inner.connections.remove(&id);
                tracing::warn!(connection = %id, "subscriber evicted after repeated send failures");
            }
            false
        }
    }

    /// Fan an event out to every connection subscribed to the job
    ///
    /// Individual send failures are tolerated. Returns the delivery count.
    pub fn broadcast_to_job(&self, job: &str, message: &str) -> usize {
        let targets: Vec<ConnectionId> = {
            let inner = self.lock();
            inner
                .connections
                .values()
                .filter(|conn| conn.wants(job))
                .map(|conn| conn.id)
                .collect()
        };

        targets
            .into_iter()
            .filter(|id| self.send_to(*id, message))
            .count()
    }

    /// Fan an event out to every attached connection
    pub fn broadcast_all(&self, message: &str) -> usize {
        let targets: Vec<ConnectionId> = {
            let inner = self.lock();
            inner.connections.keys().copied().collect()
        };

        targets
            .into_iter()
            .filter(|id| self.send_to(*id, message))
            .count()
    }

    /// Evict unhealthy connections
    ///
    /// A connection is evicted when it has been silent longer than the idle
    /// timeout, has never signalled liveness within the no-liveness window,
    /// or sits over the error ceiling. Returns the eviction count.
    pub fn evict_stale(&self) -> usize {
        let now = Instant::now();
        let mut inner = self.lock();
        let before = inner.connections.len();

        inner.connections.retain(|id, conn| {
            let silent = now.duration_since(conn.last_seen) > self.config.idle_timeout;
            let never_seen = conn.last_seen == conn.created_at
                && now.duration_since(conn.created_at) > self.config.max_age;
            let over_ceiling = conn.consecutive_errors >= self.config.error_ceiling;

            let evict = silent || never_seen || over_ceiling;
            if evict {
                tracing::debug!(connection = %id, silent, never_seen, over_ceiling, "subscriber evicted by sweep");
            }
            !evict
        });

        before - inner.connections.len()
    }

    /// Number of attached connections
    pub fn connection_count(&self) -> usize {
        self.lock().connections.len()
    }

    /// Whether a connection id is currently attached
    pub fn is_attached(&self, id: ConnectionId) -> bool {
        self.lock().connections.contains_key(&id)
    }
}

impl Default for BroadcastHub {
    fn default() -> Self {
        Self::new(HubConfig::default())
    }
}

impl std::fmt::Debug for BroadcastHub {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BroadcastHub")
            .field("config", &self.config)
            .field("connections", &self.connection_count())
            .finish()
    }
}
