//! Outbound subscriber events
//!
//! Every message delivered through the hub is a tagged envelope: the job it
//! concerns, an event type, a timestamp, and an opaque payload. Hub-scoped
//! messages (such as the attach greeting) use `"*"` as the job id.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Event type tag carried on every outbound envelope
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    /// Sent to a subscriber when its connection attaches
    Connected,
    /// Per-item lifecycle progress
    Progress,
    /// One metric result for one item
    Metric,
    /// An item-level error was recorded
    Error,
    /// A job finished and its result snapshot is available
    Completed,
    /// Job-level status (start summary, on-demand status)
    Status,
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EventKind::Connected => write!(f, "connected"),
            EventKind::Progress => write!(f, "progress"),
            EventKind::Metric => write!(f, "metric"),
            EventKind::Error => write!(f, "error"),
            EventKind::Completed => write!(f, "completed"),
            EventKind::Status => write!(f, "status"),
        }
    }
}

/// Tagged event envelope delivered to subscribers
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventEnvelope {
    /// Job the event concerns, or `"*"` for hub-scoped events
    pub job_id: String,

    /// Event type tag
    pub event_type: EventKind,

    /// When the event was produced
    pub timestamp: DateTime<Utc>,

    /// Event-specific payload
    pub payload: Value,
}

impl EventEnvelope {
    /// Create an envelope stamped with the current time
    pub fn new(job_id: impl Into<String>, event_type: EventKind, payload: Value) -> Self {
        Self {
            job_id: job_id.into(),
            event_type,
            timestamp: Utc::now(),
            payload,
        }
    }

    /// Serialize for the wire
    ///
    /// Envelope serialization cannot fail for JSON payloads; the fallback
    /// keeps the hub path infallible anyway.
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| String::from("{}"))
    }
}
