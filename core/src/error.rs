//! Error types for evalstream-core
//!
//! Item-level failures (invocation errors, timeouts, metric failures) are
//! recorded on the item outcome and never surface here. Only fatal,
//! job-scoped conditions cross component boundaries, always paired with the
//! job name so callers can tell one failed job from a failed batch.

use crate::config::ConfigError;
use crate::result::JobResult;
use crate::traits::SourceError;
use thiserror::Error;

/// Fatal, job-scoped error
///
/// Aborts a single job without touching its siblings.
#[derive(Debug, Clone, Error)]
pub enum JobError {
    /// The job's data source could not be resolved
    #[error("data source error: {0}")]
    Source(String),

    /// The job configuration is invalid
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Job setup failed before any item started
    #[error("setup error: {0}")]
    Setup(String),
}

impl From<SourceError> for JobError {
    fn from(e: SourceError) -> Self {
        JobError::Source(e.to_string())
    }
}

/// One failed job inside a coordinated batch
#[derive(Debug, Clone)]
pub struct JobFailure {
    /// Name of the failed job
    pub job: String,
    /// Why it failed
    pub error: JobError,
}

/// Batch error enumerating every fatally failed job
///
/// Successful jobs' results are still carried in `completed`, so a partial
/// result set is never dropped.
#[derive(Debug)]
pub struct BatchError {
    /// Every failed job with its underlying error
    pub failures: Vec<JobFailure>,
    /// Results of the jobs that did not fail
    pub completed: Vec<JobResult>,
}

impl std::fmt::Display for BatchError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} of {} jobs failed: ",
            self.failures.len(),
            self.failures.len() + self.completed.len()
        )?;
        for (i, failure) in self.failures.iter().enumerate() {
            if i > 0 {
                write!(f, "; ")?;
            }
            write!(f, "{} ({})", failure.job, failure.error)?;
        }
        Ok(())
    }
}

impl std::error::Error for BatchError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_job_error_from_source_error() {
        let error: JobError = SourceError::NotFound("questions".into()).into();
        assert!(matches!(error, JobError::Source(_)));
        assert!(error.to_string().contains("questions"));
    }

    #[test]
    fn test_batch_error_display_lists_every_failure() {
        let error = BatchError {
            failures: vec![
                JobFailure {
                    job: "job-a".into(),
                    error: JobError::Setup("bad".into()),
                },
                JobFailure {
                    job: "job-b".into(),
                    error: JobError::Source("missing".into()),
                },
            ],
            completed: vec![],
        };

        let message = error.to_string();
        assert!(message.contains("2 of 2 jobs failed"));
        assert!(message.contains("job-a"));
        assert!(message.contains("job-b"));
    }
}
