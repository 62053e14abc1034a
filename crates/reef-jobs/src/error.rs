//! Error types for the job layer.

use reef_types::ShardError;

/// Errors raised while decoding or executing jobs.
#[derive(Debug, thiserror::Error)]
pub enum JobError {
    /// A persisted payload could not be turned into a job.
    #[error("unparsable job: {reason}")]
    Unparsable {
        /// What was wrong with the payload.
        reason: String,
    },

    /// A job body failed.
    #[error("job {job} failed: {reason}")]
    Failed {
        /// Type tag of the failing job.
        job: String,
        /// Description of the failure.
        reason: String,
    },

    /// A shard operation driven by the job failed.
    #[error("shard error: {0}")]
    Shard(#[from] ShardError),
}

impl JobError {
    /// Shorthand for [`JobError::Unparsable`].
    pub fn unparsable(reason: impl Into<String>) -> Self {
        JobError::Unparsable {
            reason: reason.into(),
        }
    }

    /// Shorthand for [`JobError::Failed`].
    pub fn failed(job: impl Into<String>, reason: impl Into<String>) -> Self {
        JobError::Failed {
            job: job.into(),
            reason: reason.into(),
        }
    }

    /// Whether this is a decode failure rather than an execution failure.
    pub fn is_unparsable(&self) -> bool {
        matches!(self, JobError::Unparsable { .. })
    }
}
