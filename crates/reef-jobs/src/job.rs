//! [`Job`] — a task plus its retry metadata.

use serde_json::{Value, json};

use crate::error::JobError;
use crate::task::{Task, tagged};

/// Field holding the number of failed attempts.
pub const ERROR_COUNT: &str = "error_count";

/// Field holding the last failure description.
pub const ERROR_MESSAGE: &str = "error_message";

/// Error message of a job that has never failed.
pub const NO_ERROR: &str = "(none)";

/// A unit of mutating work as persisted by the job queue.
///
/// `error_count` and `error_message` are written only by the queue that
/// drives retries; a job never updates them itself and a single job must not
/// be executed by two attempts at once.
#[derive(Debug)]
pub struct Job {
    task: Box<dyn Task>,
    /// Number of attempts that have failed so far.
    pub error_count: u32,
    /// Description of the most recent failure.
    pub error_message: String,
    next_job: Option<Box<Job>>,
}

impl Job {
    /// Wrap a task with fresh retry metadata.
    pub fn new(task: impl Task + 'static) -> Self {
        Self::from_task(Box::new(task))
    }

    /// Wrap an already boxed task with fresh retry metadata.
    pub fn from_task(task: Box<dyn Task>) -> Self {
        Self {
            task,
            error_count: 0,
            error_message: NO_ERROR.to_string(),
            next_job: None,
        }
    }

    /// The job's behavior.
    pub fn task(&self) -> &dyn Task {
        self.task.as_ref()
    }

    /// Discard the retry metadata and return the task.
    pub fn into_task(self) -> Box<dyn Task> {
        self.task
    }

    /// The job's type tag.
    pub fn tag(&self) -> &str {
        self.task.tag()
    }

    /// Short name for logs: the last `.`-separated segment of the tag.
    pub fn display_name(&self) -> &str {
        let tag = self.tag();
        tag.rsplit('.').next().unwrap_or(tag)
    }

    /// Whether the effect should also be propagated to secondary sites.
    pub fn should_replicate(&self) -> bool {
        self.task.should_replicate()
    }

    /// Run the job once.
    ///
    /// A failure is returned as-is; recording it and deciding whether to
    /// retry is up to the caller.
    #[tracing::instrument(
        skip(self),
        fields(job = %self.display_name(), error_count = self.error_count)
    )]
    pub async fn execute(&self) -> Result<(), JobError> {
        self.task.execute().await
    }

    /// Record a failed attempt. Called by the queue, never by the job.
    pub fn record_failure(&mut self, message: impl Into<String>) {
        self.error_count = self.error_count.saturating_add(1);
        self.error_message = message.into();
    }

    /// Chain a follow-up job to be enqueued after this one succeeds.
    pub fn with_next(mut self, next: Job) -> Self {
        self.next_job = Some(Box::new(next));
        self
    }

    /// The follow-up job, if any.
    pub fn next_job(&self) -> Option<&Job> {
        self.next_job.as_deref()
    }

    /// Detach the follow-up job so the queue can enqueue it.
    pub fn take_next(&mut self) -> Option<Job> {
        self.next_job.take().map(|next| *next)
    }

    /// The encoded form as a JSON value.
    ///
    /// The follow-up job is not part of the encoding.
    pub fn to_json(&self) -> Value {
        let mut fields = self.task.to_map();
        debug_assert!(
            !fields.contains_key(ERROR_COUNT) && !fields.contains_key(ERROR_MESSAGE),
            "{} uses a reserved field name",
            self.tag()
        );
        fields.insert(ERROR_COUNT.to_string(), json!(self.error_count));
        fields.insert(ERROR_MESSAGE.to_string(), json!(self.error_message));
        tagged(self.tag(), fields)
    }

    /// The encoded form as bytes, ready for the queue.
    pub fn encode(&self) -> Vec<u8> {
        self.to_json().to_string().into_bytes()
    }
}
