//! Durable units of mutating work for reef.
//!
//! This crate provides:
//!
//! - [`Task`] — the behavior of a job: its type tag, its fields and its
//!   effect.
//! - [`Job`] — a task plus the retry metadata the external queue maintains,
//!   and the JSON encoding the queue persists.
//! - [`NestedJob`] — an ordered composite of tasks.
//! - [`ParserRegistry`] — decodes persisted jobs by dispatching on their
//!   type tag to a registered [`Parser`].
//! - [`JobConsumer`] — terminal sinks for jobs that cannot be processed,
//!   with [`JobLogger`] and [`MemoryConsumer`].
//!
//! # Encoding
//!
//! A job encodes as a single-entry JSON object keyed by its type tag:
//!
//! ```json
//! {"reef.jobs.Copy": {"source": 1, "error_count": 2, "error_message": "timeout"}}
//! ```

mod error;
mod job;
mod nested;
mod registry;
mod sink;
mod task;

pub use error::JobError;
pub use job::{ERROR_COUNT, ERROR_MESSAGE, Job, NO_ERROR};
pub use nested::{NestedJob, NestedJobParser};
pub use registry::{FnParser, Parser, ParserRegistry, SerdeParser};
pub use sink::{JobConsumer, JobLogger, MemoryConsumer};
pub use task::Task;
