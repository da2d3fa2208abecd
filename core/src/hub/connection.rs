//! Per-subscriber connection state

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::time::Instant;
use tokio::sync::mpsc;

/// Identifier for one live subscriber connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConnectionId(pub u64);

impl std::fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// What a connection is subscribed to
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Subscription {
    /// Events for one job
    Job(String),
    /// Events for every job
    All,
}

/// One live subscriber
///
/// Mutated only by the hub under its registry lock. The outbound channel
/// preserves send order per connection.
pub(crate) struct Connection {
    pub id: ConnectionId,
    pub tx: mpsc::UnboundedSender<String>,
    pub created_at: Instant,
    pub last_seen: Instant,
    pub consecutive_errors: u32,
    pub jobs: HashSet<String>,
    pub all_jobs: bool,
}

impl Connection {
    pub fn new(id: ConnectionId, tx: mpsc::UnboundedSender<String>) -> Self {
        let now = Instant::now();
        Self {
            id,
            tx,
            created_at: now,
            last_seen: now,
            consecutive_errors: 0,
            jobs: HashSet::new(),
            all_jobs: false,
        }
    }

    /// Whether this connection should receive events for the given job
    pub fn wants(&self, job: &str) -> bool {
        self.all_jobs || self.jobs.contains(job)
    }
}
