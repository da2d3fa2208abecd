//! evalstream-core: concurrent evaluation-job execution and live fan-out
//!
//! This crate provides the runtime shared by all evalstream components,
//! including:
//!
//! - Job specifications, target-variant expansion, and runnable jobs
//! - Bounded-concurrency item execution with per-item timeouts
//! - Multi-job coordination with shared read-only datasets
//! - Lifecycle observers (dashboard aggregate, broadcast forwarding)
//! - The broadcast hub delivering events to live subscribers

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod binding;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod events;
pub mod hub;
pub mod item;
pub mod job;
pub mod observer;
pub mod result;
pub mod runner;
pub mod traits;

pub use binding::{ArgBinding, MetricBinding};
pub use config::{ConfigError, HubConfig, JobConfig};
pub use coordinator::JobCoordinator;
pub use error::{BatchError, JobError, JobFailure};
pub use events::{EventEnvelope, EventKind};
pub use hub::{BroadcastHub, ConnectionId, HubError, Subscription};
pub use item::{Item, ItemOutcome, ItemState, ItemStatus, MetricScore};
pub use job::{Job, JobSpec, MetricSlot, SourceRef, TargetVariant};
pub use observer::{DashboardState, JobProgressSnapshot, JobStart, Observer};
pub use result::{JobResult, MetricStats};
pub use runner::JobRunner;
pub use traits::{
    DataSource, Dataset, InvokeContext, InvokeError, Metric, MetricArgs, MetricArity, MetricError,
    ParameterShape, SourceError, TaskInvoker,
};
