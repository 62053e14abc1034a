//! Polymorphic job decoding.
//!
//! A [`ParserRegistry`] maps type tags to [`Parser`]s. Decoding reads the
//! single top-level key of a payload, hands the inner field map to the
//! parser registered under it, and restores the retry metadata onto the
//! resulting [`Job`]. Registration happens once at startup; afterwards the
//! registry is read-only and can be shared across threads.

use std::collections::HashMap;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use crate::error::JobError;
use crate::job::{ERROR_COUNT, ERROR_MESSAGE, Job, NO_ERROR};
use crate::nested::{NestedJob, NestedJobParser};
use crate::task::{Task, untag};

/// Reconstructs one type of task from its field map.
///
/// Parsers never see the job's retry metadata as something they must
/// handle: `error_count` and `error_message` may be present in `fields` and
/// are restored by the registry afterwards.
pub trait Parser: Send + Sync {
    /// Build the task described by `fields`.
    ///
    /// `registry` is available for composite tasks that need to inflate
    /// children of other types.
    fn parse(
        &self,
        registry: &ParserRegistry,
        fields: &Map<String, Value>,
    ) -> Result<Box<dyn Task>, JobError>;
}

/// A [`Parser`] backed by a closure over the field map.
pub struct FnParser<F>(pub F);

impl<F> Parser for FnParser<F>
where
    F: Fn(&Map<String, Value>) -> Result<Box<dyn Task>, JobError> + Send + Sync,
{
    fn parse(
        &self,
        _registry: &ParserRegistry,
        fields: &Map<String, Value>,
    ) -> Result<Box<dyn Task>, JobError> {
        (self.0)(fields)
    }
}

/// A [`Parser`] for task types that implement `Deserialize`.
///
/// The retry metadata fields are ignored unless the type opts into
/// `deny_unknown_fields`, which it must not do.
pub struct SerdeParser<T>(PhantomData<fn() -> T>);

impl<T> SerdeParser<T> {
    /// Create the parser.
    pub fn new() -> Self {
        Self(PhantomData)
    }
}

impl<T> Default for SerdeParser<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Parser for SerdeParser<T>
where
    T: Task + DeserializeOwned + 'static,
{
    fn parse(
        &self,
        _registry: &ParserRegistry,
        fields: &Map<String, Value>,
    ) -> Result<Box<dyn Task>, JobError> {
        let task: T = serde_json::from_value(Value::Object(fields.clone()))
            .map_err(|e| JobError::unparsable(format!("{}: {e}", std::any::type_name::<T>())))?;
        Ok(Box::new(task))
    }
}

/// Maps type tags to the parsers that decode them.
#[derive(Clone)]
pub struct ParserRegistry {
    parsers: HashMap<String, Arc<dyn Parser>>,
}

impl ParserRegistry {
    /// A registry that knows only [`NestedJob`].
    pub fn new() -> Self {
        let mut registry = Self {
            parsers: HashMap::new(),
        };
        registry.register(NestedJob::TAG, NestedJobParser);
        registry
    }

    /// Register `parser` for `tag`, replacing any previous parser.
    pub fn register(&mut self, tag: impl Into<String>, parser: impl Parser + 'static) -> &mut Self {
        self.parsers.insert(tag.into(), Arc::new(parser));
        self
    }

    /// Register a closure as the parser for `tag`.
    pub fn register_fn<F>(&mut self, tag: impl Into<String>, f: F) -> &mut Self
    where
        F: Fn(&Map<String, Value>) -> Result<Box<dyn Task>, JobError> + Send + Sync + 'static,
    {
        self.register(tag, FnParser(f))
    }

    /// Register a [`SerdeParser`] for `T` under `tag`.
    pub fn register_serde<T>(&mut self, tag: impl Into<String>) -> &mut Self
    where
        T: Task + DeserializeOwned + 'static,
    {
        self.register(tag, SerdeParser::<T>::new())
    }

    /// Whether a parser is registered for `tag`.
    pub fn contains(&self, tag: &str) -> bool {
        self.parsers.contains_key(tag)
    }

    /// Registered tags, sorted.
    pub fn tags(&self) -> Vec<&str> {
        let mut tags: Vec<&str> = self.parsers.keys().map(String::as_str).collect();
        tags.sort_unstable();
        tags
    }

    /// Decode a `{tag: fields}` value into its task, dispatching on the tag.
    pub fn inflate(&self, value: &Value) -> Result<Box<dyn Task>, JobError> {
        let (tag, fields) = untag(value)?;
        let parser = self
            .parsers
            .get(tag)
            .ok_or_else(|| JobError::unparsable(format!("no parser registered for {tag}")))?;
        parser.parse(self, fields)
    }

    /// Decode a `{tag: fields}` value into a [`Job`], restoring its retry
    /// metadata (`0` and `"(none)"` when absent).
    pub fn inflate_job(&self, value: &Value) -> Result<Job, JobError> {
        let task = self.inflate(value)?;
        let (_, fields) = untag(value)?;

        let mut job = Job::from_task(task);
        job.error_count = match fields.get(ERROR_COUNT) {
            None | Some(Value::Null) => 0,
            Some(count) => count
                .as_u64()
                .and_then(|n| u32::try_from(n).ok())
                .ok_or_else(|| JobError::unparsable(format!("invalid {ERROR_COUNT}: {count}")))?,
        };
        job.error_message = match fields.get(ERROR_MESSAGE) {
            None | Some(Value::Null) => NO_ERROR.to_string(),
            Some(Value::String(message)) => message.clone(),
            Some(other) => {
                return Err(JobError::unparsable(format!(
                    "invalid {ERROR_MESSAGE}: {other}"
                )));
            }
        };
        Ok(job)
    }

    /// Decode a payload produced by [`Job::encode`].
    pub fn decode(&self, bytes: &[u8]) -> Result<Job, JobError> {
        let value: Value = serde_json::from_slice(bytes)
            .map_err(|e| JobError::unparsable(format!("invalid json: {e}")))?;
        self.inflate_job(&value)
    }
}

impl Default for ParserRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ParserRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ParserRegistry")
            .field("tags", &self.tags())
            .finish()
    }
}
