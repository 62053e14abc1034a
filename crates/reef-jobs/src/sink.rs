//! Terminal sinks for jobs that cannot be processed further.

use std::sync::{Mutex, PoisonError};

use tracing::error;

use crate::job::Job;

/// Last stop for a job the queue gave up on.
pub trait JobConsumer: Send + Sync {
    /// Take ownership of a job that will not be retried.
    fn put(&self, job: Job);
}

/// Writes every dropped job's encoded form to the log at error level.
///
/// Operators can replay the logged payloads through
/// [`ParserRegistry::decode`](crate::ParserRegistry::decode).
#[derive(Debug, Default, Clone, Copy)]
pub struct JobLogger;

impl JobConsumer for JobLogger {
    fn put(&self, job: Job) {
        error!(
            job = job.display_name(),
            error_count = job.error_count,
            error_message = %job.error_message,
            payload = %job.to_json(),
            "dropping job"
        );
    }
}

/// Keeps the encoded form of every dropped job in memory.
#[derive(Debug, Default)]
pub struct MemoryConsumer {
    payloads: Mutex<Vec<Vec<u8>>>,
}

impl MemoryConsumer {
    /// Create an empty sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of jobs held.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Whether no job has been put.
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Remove and return every held payload in arrival order.
    pub fn drain(&self) -> Vec<Vec<u8>> {
        std::mem::take(&mut *self.lock())
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<Vec<u8>>> {
        self.payloads.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl JobConsumer for MemoryConsumer {
    fn put(&self, job: Job) {
        self.lock().push(job.encode());
    }
}
