//! [`ParNodeSet`] — a node collection whose member operations run on a
//! bounded worker pool under a per-call deadline.
//!
//! Members still running when the deadline passes are abandoned, not
//! cancelled: their tasks keep running to completion and their results are
//! discarded. Member operations must therefore be safe to finish after the
//! caller has stopped waiting. Members still queued for a pool permit when
//! the caller stops waiting are never invoked.

use std::future::Future;
use std::sync::Arc;

use reef_types::{ShardError, ShardInfo};
use tokio::task::JoinSet;
use tokio::time::{Instant, timeout_at};
use tracing::{debug, warn};

use crate::future::ShardFuture;
use crate::iterable::{NodeIterable, blocked_failures, blocked_outcomes};
use crate::node_set::NodeSet;
use crate::pool::ParallelConfig;

/// A [`NodeSet`] view that fans out concurrently.
///
/// Produced by [`NodeSet::parallel`]. The returned value of `any` is the
/// first member to succeed in time, not the first by position, and no
/// ordering holds between the side effects of concurrent members.
#[derive(Debug, Clone)]
pub struct ParNodeSet<T> {
    nodes: NodeSet<T>,
    config: ParallelConfig,
}

impl<T> ParNodeSet<T> {
    /// Wrap `nodes` with the given concurrency settings.
    pub fn new(nodes: NodeSet<T>, config: ParallelConfig) -> Self {
        Self { nodes, config }
    }

    /// The concurrency settings in use.
    pub fn config(&self) -> &ParallelConfig {
        &self.config
    }

    /// The underlying sequential set.
    pub fn sequential(&self) -> &NodeSet<T> {
        &self.nodes
    }

    /// Consume the view and return the underlying sequential set.
    pub fn into_sequential(self) -> NodeSet<T> {
        self.nodes
    }
}

impl<T> NodeIterable<T> for ParNodeSet<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn root_info(&self) -> &ShardInfo {
        self.nodes.root_info()
    }

    fn active_members(&self) -> &[(ShardInfo, T)] {
        self.nodes.active_members()
    }

    fn blocked_members(&self) -> &[ShardInfo] {
        self.nodes.blocked_members()
    }

    fn any<R, F, Fut>(&self, f: F) -> impl Future<Output = Result<R, ShardError>> + Send
    where
        F: Fn(ShardInfo, T) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<R, ShardError>> + Send + 'static,
        R: Send + 'static,
    {
        async move {
            let root = &self.root_info().id;
            if self.is_empty() {
                return Err(ShardError::BlackHole(root.clone()));
            }

            let deadline = Instant::now() + self.config.timeout;
            let gate = self.config.pool.gate(deadline);
            let _close = gate.close_on_drop();
            let f = Arc::new(f);
            let mut tasks = JoinSet::new();
            for (info, handle) in self.active_members() {
                let shard = info.id.clone();
                let run = gate.clone().run(member(f.clone(), info.clone(), handle.clone()));
                tasks.spawn(async move { (shard, run.await) });
            }

            let race = async {
                while let Some(joined) = tasks.join_next().await {
                    match joined {
                        Ok((_, Some(Ok(value)))) => return Ok(Some(value)),
                        Ok((shard, Some(Err(e)))) if e.is_shard_scoped() => {
                            debug!(%shard, error = %e, "member failed, waiting on others");
                        }
                        Ok((_, Some(Err(e)))) => return Err(e),
                        // Never started; the gate only closes at the deadline here.
                        Ok((_, None)) => {}
                        Err(e) => {
                            return Err(ShardError::Internal(format!("member task failed: {e}")));
                        }
                    }
                }
                Ok(None)
            };
            let raced = timeout_at(deadline, race).await;

            // Queued members are dropped; running ones are left to finish.
            gate.close();
            let abandoned = tasks.len();
            tasks.detach_all();

            match raced {
                Ok(Ok(Some(value))) => Ok(value),
                Ok(Err(e)) => Err(e),
                Ok(Ok(None)) => {
                    warn!(%root, "no member could satisfy the operation");
                    Err(ShardError::Offline(root.clone()))
                }
                Err(_) => {
                    warn!(
                        %root,
                        abandoned,
                        timeout = ?self.config.timeout,
                        "no member succeeded before the deadline"
                    );
                    Err(ShardError::Offline(root.clone()))
                }
            }
        }
    }

    fn try_all<R, F, Fut>(&self, f: F) -> impl Future<Output = Vec<Result<R, ShardError>>> + Send
    where
        F: Fn(ShardInfo, T) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<R, ShardError>> + Send + 'static,
        R: Send + 'static,
    {
        async move {
            let timeout = self.config.timeout;
            let deadline = Instant::now() + timeout;
            let gate = self.config.pool.gate(deadline);
            let _close = gate.close_on_drop();
            let f = Arc::new(f);

            let handles: Vec<_> = self
                .active_members()
                .iter()
                .map(|(info, handle)| {
                    let task = gate.spawn(member(f.clone(), info.clone(), handle.clone()));
                    (info.id.clone(), task)
                })
                .collect();

            let mut outcomes = Vec::with_capacity(self.size());
            for (shard, handle) in handles {
                let outcome = match timeout_at(deadline, handle).await {
                    Ok(Ok(Some(outcome))) => outcome,
                    Ok(Err(e)) => Err(ShardError::Internal(format!(
                        "member task for {shard} failed: {e}"
                    ))),
                    Ok(Ok(None)) | Err(_) => {
                        warn!(%shard, ?timeout, "abandoning member past deadline");
                        Err(ShardError::Timeout { shard, timeout })
                    }
                };
                outcomes.push(outcome);
            }
            outcomes.extend(blocked_outcomes(self.blocked_members()));
            outcomes
        }
    }

    /// Like the default, but active members wait for a pool permit and each
    /// future fails with [`ShardError::Timeout`] once the call's deadline
    /// passes.
    fn async_all<R, F, Fut>(&self, f: F) -> Vec<ShardFuture<R>>
    where
        F: Fn(ShardInfo, T) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<R, ShardError>> + Send + 'static,
        R: Send + 'static,
    {
        let timeout = self.config.timeout;
        let deadline = Instant::now() + timeout;
        let gate = self.config.pool.gate(deadline);
        let f = Arc::new(f);

        let mut futures: Vec<ShardFuture<R>> = self
            .active_members()
            .iter()
            .map(|(info, handle)| {
                let task = gate.spawn(member(f.clone(), info.clone(), handle.clone()));
                ShardFuture::with_deadline(task, info.id.clone(), deadline, timeout)
            })
            .collect();
        futures.extend(blocked_failures(self.blocked_members()));
        futures
    }
}

/// Defers invoking `f` on one member until the member is allowed to start.
fn member<T, F, Fut>(
    f: Arc<F>,
    info: ShardInfo,
    handle: T,
) -> impl FnOnce() -> Fut + Send + 'static
where
    T: Send + 'static,
    F: Fn(ShardInfo, T) -> Fut + Send + Sync + 'static,
{
    move || f(info, handle)
}
