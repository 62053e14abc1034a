//! The [`Task`] trait implemented by every concrete job body.

use std::fmt;

use serde_json::{Map, Value};

use crate::error::JobError;

/// The behavior of a job.
///
/// A task knows its stable type tag, can describe itself as a field map for
/// persistence, and performs its effect when executed. Retry bookkeeping is
/// not part of a task; it lives on the [`Job`](crate::Job) record.
///
/// Decoding is the reverse of [`to_map`](Task::to_map) and is provided by a
/// [`Parser`](crate::Parser) registered under the same tag.
#[async_trait::async_trait]
pub trait Task: Send + Sync + fmt::Debug {
    /// Stable identifier used to pick the parser on decode.
    fn tag(&self) -> &str;

    /// The task's own parameters.
    ///
    /// The keys [`ERROR_COUNT`](crate::ERROR_COUNT) and
    /// [`ERROR_MESSAGE`](crate::ERROR_MESSAGE) are reserved for the job's
    /// retry metadata and must not appear in the map.
    fn to_map(&self) -> Map<String, Value>;

    /// Perform the task's effect.
    async fn execute(&self) -> Result<(), JobError>;

    /// Whether the effect should also be propagated to secondary sites.
    fn should_replicate(&self) -> bool {
        true
    }
}

/// `{tag: fields}` — the single-entry shape every encoded task takes.
pub(crate) fn tagged(tag: &str, fields: Map<String, Value>) -> Value {
    let mut entry = Map::with_capacity(1);
    entry.insert(tag.to_string(), Value::Object(fields));
    Value::Object(entry)
}

/// Split a `{tag: fields}` value into its tag and fields.
pub(crate) fn untag(value: &Value) -> Result<(&str, &Map<String, Value>), JobError> {
    let entry = value
        .as_object()
        .ok_or_else(|| JobError::unparsable(format!("expected an object, got {value}")))?;

    let mut entries = entry.iter();
    match (entries.next(), entries.next()) {
        (Some((tag, Value::Object(fields))), None) => Ok((tag.as_str(), fields)),
        (Some((tag, other)), None) => Err(JobError::unparsable(format!(
            "fields of {tag} must be an object, got {other}"
        ))),
        _ => Err(JobError::unparsable(format!(
            "expected exactly one type tag, got {} keys",
            entry.len()
        ))),
    }
}
