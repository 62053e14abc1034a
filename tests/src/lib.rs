//! Shared test harness for reef integration tests.
//!
//! Provides [`ReplicaGroup`] — a set of in-memory key/value replicas exposed
//! as a [`NodeSet`], with failure and latency injection — plus two demo jobs
//! ([`PutValue`], [`DeleteValue`]) whose bodies fan out over the group, and
//! [`RetryDriver`], a minimal stand-in for the persistent job queue.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use reef_jobs::{Job, JobConsumer, JobError, ParserRegistry, Task};
use reef_nodes::{NodeIterable, NodeSet};
use reef_types::{ShardError, ShardId, ShardInfo};
use serde_json::{Map, Value};
use tokio::sync::RwLock;

/// Tag of [`PutValue`].
pub const PUT_VALUE: &str = "reef.demo.PutValue";

/// Tag of [`DeleteValue`].
pub const DELETE_VALUE: &str = "reef.demo.DeleteValue";

const TABLE: &str = "kv";

// =========================================================================
// Replicas
// =========================================================================

/// One in-memory key/value replica.
///
/// While marked down every operation fails with [`ShardError::Offline`].
#[derive(Debug)]
pub struct MemoryShard {
    id: ShardId,
    data: RwLock<HashMap<String, i64>>,
    down: AtomicBool,
    latency_ms: AtomicU64,
}

impl MemoryShard {
    fn new(id: ShardId) -> Self {
        Self {
            id,
            data: RwLock::new(HashMap::new()),
            down: AtomicBool::new(false),
            latency_ms: AtomicU64::new(0),
        }
    }

    async fn check(&self) -> Result<(), ShardError> {
        let latency = self.latency_ms.load(Ordering::SeqCst);
        if latency > 0 {
            tokio::time::sleep(Duration::from_millis(latency)).await;
        }
        if self.down.load(Ordering::SeqCst) {
            return Err(ShardError::Offline(self.id.clone()));
        }
        Ok(())
    }

    /// Store `value` under `key`.
    pub async fn put(&self, key: &str, value: i64) -> Result<(), ShardError> {
        self.check().await?;
        self.data.write().await.insert(key.to_string(), value);
        Ok(())
    }

    /// Read `key`.
    pub async fn get(&self, key: &str) -> Result<Option<i64>, ShardError> {
        self.check().await?;
        Ok(self.data.read().await.get(key).copied())
    }

    /// Remove `key`.
    pub async fn delete(&self, key: &str) -> Result<(), ShardError> {
        self.check().await?;
        self.data.write().await.remove(key);
        Ok(())
    }

    /// Read `key` directly, ignoring injected failures.
    pub async fn peek(&self, key: &str) -> Option<i64> {
        self.data.read().await.get(key).copied()
    }

    /// Take the replica down or bring it back.
    pub fn set_down(&self, down: bool) {
        self.down.store(down, Ordering::SeqCst);
    }

    /// Delay every operation by `ms` milliseconds.
    pub fn set_latency(&self, ms: u64) {
        self.latency_ms.store(ms, Ordering::SeqCst);
    }
}

/// A logical shard group backed by `n` replicas.
#[derive(Debug)]
pub struct ReplicaGroup {
    root: ShardInfo,
    replicas: Vec<(ShardInfo, Arc<MemoryShard>)>,
    blocked: Mutex<HashSet<usize>>,
}

impl ReplicaGroup {
    /// A group of `n` healthy replicas named `replica-0` .. `replica-{n-1}`.
    pub fn new(n: usize) -> Arc<Self> {
        let replicas = (0..n)
            .map(|i| {
                let info = ShardInfo::new(Self::id(i), "MemoryShard");
                let shard = Arc::new(MemoryShard::new(info.id.clone()));
                (info, shard)
            })
            .collect();
        Arc::new(Self {
            root: ShardInfo::new(ShardId::new("group", TABLE), "ReplicatingShard"),
            replicas,
            blocked: Mutex::new(HashSet::new()),
        })
    }

    /// Id of replica `i`.
    pub fn id(i: usize) -> ShardId {
        ShardId::new(format!("replica-{i}"), TABLE)
    }

    /// Replica `i`.
    pub fn replica(&self, i: usize) -> &Arc<MemoryShard> {
        &self.replicas[i].1
    }

    /// Administratively block or unblock replica `i`.
    pub fn set_blocked(&self, i: usize, blocked: bool) {
        let mut set = self.blocked.lock().unwrap();
        if blocked {
            set.insert(i);
        } else {
            set.remove(&i);
        }
    }

    /// A snapshot of the group as a node collection.
    pub fn nodes(&self) -> NodeSet<Arc<MemoryShard>> {
        let blocked = self.blocked.lock().unwrap();
        let mut active = Vec::new();
        let mut blocked_infos = Vec::new();
        for (i, (info, shard)) in self.replicas.iter().enumerate() {
            if blocked.contains(&i) {
                blocked_infos.push(info.clone());
            } else {
                active.push((info.clone(), shard.clone()));
            }
        }
        NodeSet::new(self.root.clone(), active, blocked_infos)
    }

    /// Read `key` from the first replica that answers.
    pub async fn read(&self, key: &str) -> Result<Option<i64>, ShardError> {
        let key = key.to_string();
        self.nodes()
            .any(move |_, shard: Arc<MemoryShard>| {
                let key = key.clone();
                async move { shard.get(&key).await }
            })
            .await
    }

    /// A registry that decodes the demo jobs against this group.
    pub fn registry(self: &Arc<Self>) -> ParserRegistry {
        let mut registry = ParserRegistry::new();

        let group = self.clone();
        registry.register_fn(PUT_VALUE, move |fields| {
            let key = string_field(fields, "key")?;
            let value = fields
                .get("value")
                .and_then(Value::as_i64)
                .ok_or_else(|| JobError::unparsable("put requires an integer value"))?;
            Ok(Box::new(PutValue::new(&group, key, value)))
        });

        let group = self.clone();
        registry.register_fn(DELETE_VALUE, move |fields| {
            let key = string_field(fields, "key")?;
            Ok(Box::new(DeleteValue::new(&group, key)))
        });

        registry
    }
}

fn string_field(fields: &Map<String, Value>, name: &str) -> Result<String, JobError> {
    fields
        .get(name)
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| JobError::unparsable(format!("missing string field {name}")))
}

// =========================================================================
// Demo jobs
// =========================================================================

/// Writes a value to every replica of the group.
#[derive(Debug)]
pub struct PutValue {
    group: Arc<ReplicaGroup>,
    key: String,
    value: i64,
}

impl PutValue {
    /// Write `value` under `key` on every replica of `group`.
    pub fn new(group: &Arc<ReplicaGroup>, key: impl Into<String>, value: i64) -> Self {
        Self {
            group: group.clone(),
            key: key.into(),
            value,
        }
    }
}

#[async_trait::async_trait]
impl Task for PutValue {
    fn tag(&self) -> &str {
        PUT_VALUE
    }

    fn to_map(&self) -> Map<String, Value> {
        let mut fields = Map::new();
        fields.insert("key".to_string(), Value::from(self.key.clone()));
        fields.insert("value".to_string(), Value::from(self.value));
        fields
    }

    async fn execute(&self) -> Result<(), JobError> {
        let key = self.key.clone();
        let value = self.value;
        self.group
            .nodes()
            .foreach(move |_, shard: Arc<MemoryShard>| {
                let key = key.clone();
                async move { shard.put(&key, value).await }
            })
            .await?;
        Ok(())
    }
}

/// Removes a key from every replica of the group. Never replicated
/// to secondary sites.
#[derive(Debug)]
pub struct DeleteValue {
    group: Arc<ReplicaGroup>,
    key: String,
}

impl DeleteValue {
    /// Remove `key` from every replica of `group`.
    pub fn new(group: &Arc<ReplicaGroup>, key: impl Into<String>) -> Self {
        Self {
            group: group.clone(),
            key: key.into(),
        }
    }
}

#[async_trait::async_trait]
impl Task for DeleteValue {
    fn tag(&self) -> &str {
        DELETE_VALUE
    }

    fn to_map(&self) -> Map<String, Value> {
        let mut fields = Map::new();
        fields.insert("key".to_string(), Value::from(self.key.clone()));
        fields
    }

    async fn execute(&self) -> Result<(), JobError> {
        let key = self.key.clone();
        self.group
            .nodes()
            .foreach(move |_, shard: Arc<MemoryShard>| {
                let key = key.clone();
                async move { shard.delete(&key).await }
            })
            .await?;
        Ok(())
    }

    fn should_replicate(&self) -> bool {
        false
    }
}

// =========================================================================
// Retry driver
// =========================================================================

/// What happened to one attempt of a persisted job.
#[derive(Debug)]
pub enum Attempt {
    /// The job succeeded; carries the encoded follow-up job, if any.
    Done(Option<Vec<u8>>),
    /// The job failed and should be retried with this payload.
    Retry(Vec<u8>),
    /// The job failed too often and went to the dead-letter sink.
    DeadLettered,
}

/// A minimal job queue: decode, execute, record failures, dead-letter.
pub struct RetryDriver<'a> {
    registry: &'a ParserRegistry,
    sink: &'a dyn JobConsumer,
    max_errors: u32,
}

impl<'a> RetryDriver<'a> {
    /// Retry each job until it has failed `max_errors` times.
    pub fn new(registry: &'a ParserRegistry, sink: &'a dyn JobConsumer, max_errors: u32) -> Self {
        Self {
            registry,
            sink,
            max_errors,
        }
    }

    /// Run one attempt of the job encoded in `payload`.
    pub async fn attempt(&self, payload: &[u8]) -> Result<Attempt, JobError> {
        let mut job = self.registry.decode(payload)?;
        match job.execute().await {
            Ok(()) => Ok(Attempt::Done(job.take_next().map(|next| next.encode()))),
            Err(e) => {
                tracing::debug!(job = job.display_name(), error = %e, "attempt failed");
                job.record_failure(e.to_string());
                if job.error_count >= self.max_errors {
                    self.sink.put(job);
                    Ok(Attempt::DeadLettered)
                } else {
                    Ok(Attempt::Retry(job.encode()))
                }
            }
        }
    }

    /// Run a job in memory once, chaining its follow-up through the queue.
    pub async fn run(&self, mut job: Job) -> Result<Attempt, JobError> {
        let next = job.take_next();
        let outcome = self.attempt(&job.encode()).await?;
        Ok(match (outcome, next) {
            (Attempt::Done(_), Some(next)) => Attempt::Done(Some(next.encode())),
            (outcome, _) => outcome,
        })
    }
}
