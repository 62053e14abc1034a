//! [`NestedJob`] — an ordered composite of tasks.

use serde_json::{Map, Value};
use tracing::debug;

use crate::error::JobError;
use crate::registry::{Parser, ParserRegistry};
use crate::task::{Task, tagged};

const TASKS: &str = "tasks";

/// A sequence of tasks persisted as one job and executed in order.
///
/// Execution stops at the first failing child. Children that already ran
/// are not rolled back, so a retry of the whole composite may run them
/// again: every child must tolerate at-least-once execution.
#[derive(Debug)]
pub struct NestedJob {
    tasks: Vec<Box<dyn Task>>,
}

impl NestedJob {
    /// Type tag of nested jobs.
    pub const TAG: &'static str = "reef.jobs.NestedJob";

    /// Compose `tasks` in order.
    pub fn new(tasks: Vec<Box<dyn Task>>) -> Self {
        Self { tasks }
    }

    /// The children in execution order.
    pub fn tasks(&self) -> &[Box<dyn Task>] {
        &self.tasks
    }

    /// Number of children.
    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    /// Whether there are no children.
    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }
}

#[async_trait::async_trait]
impl Task for NestedJob {
    fn tag(&self) -> &str {
        Self::TAG
    }

    /// `{"tasks": [{tag: fields}, ...]}`. Children carry no retry metadata.
    fn to_map(&self) -> Map<String, Value> {
        let tasks = self
            .tasks
            .iter()
            .map(|task| tagged(task.tag(), task.to_map()))
            .collect();
        let mut fields = Map::with_capacity(1);
        fields.insert(TASKS.to_string(), Value::Array(tasks));
        fields
    }

    async fn execute(&self) -> Result<(), JobError> {
        for (index, task) in self.tasks.iter().enumerate() {
            debug!(index, task = task.tag(), total = self.tasks.len(), "running nested task");
            task.execute().await?;
        }
        Ok(())
    }
}

/// Rebuilds a [`NestedJob`], inflating each child through the registry.
#[derive(Debug, Default, Clone, Copy)]
pub struct NestedJobParser;

impl Parser for NestedJobParser {
    fn parse(
        &self,
        registry: &ParserRegistry,
        fields: &Map<String, Value>,
    ) -> Result<Box<dyn Task>, JobError> {
        let tasks = fields
            .get(TASKS)
            .and_then(Value::as_array)
            .ok_or_else(|| JobError::unparsable("nested job requires a \"tasks\" array"))?;

        let tasks = tasks
            .iter()
            .map(|child| registry.inflate(child))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Box::new(NestedJob::new(tasks)))
    }
}
