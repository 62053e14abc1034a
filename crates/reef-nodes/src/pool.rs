//! Bounded worker pool and parallel execution settings.
//!
//! A [`WorkerPool`] is a shared semaphore: every member task spawned through
//! it waits for a permit before running, so at most `size` member operations
//! execute at once across every collection sharing the pool.
//!
//! Member tasks of a fan-out call go through a `Gate`: a member still
//! waiting for a permit when its caller stops waiting never starts.

use std::future::Future;
use std::sync::{Arc, LazyLock};
use std::time::Duration;

use reef_types::ShardError;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio::task::JoinHandle;
use tokio::time::{Instant, sleep_until};
use tokio_util::sync::{CancellationToken, DropGuard};

/// Worker count of the process-wide pool.
pub const DEFAULT_POOL_SIZE: usize = 8;

/// Per-call wait bound used when the caller supplies none.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(1_000);

static GLOBAL_POOL: LazyLock<WorkerPool> = LazyLock::new(|| WorkerPool::new(DEFAULT_POOL_SIZE));

/// A fixed-capacity pool that gates concurrent member operations.
///
/// Cloning yields another handle to the same pool.
#[derive(Debug, Clone)]
pub struct WorkerPool {
    permits: Arc<Semaphore>,
    size: usize,
}

impl WorkerPool {
    /// Create a pool running at most `size` operations at once (minimum 1).
    pub fn new(size: usize) -> Self {
        let size = size.max(1);
        Self {
            permits: Arc::new(Semaphore::new(size)),
            size,
        }
    }

    /// The process-wide default pool.
    pub fn global() -> Self {
        GLOBAL_POOL.clone()
    }

    /// Maximum number of operations running at once.
    pub fn size(&self) -> usize {
        self.size
    }

    /// Number of operations that could start right now without waiting.
    pub fn idle(&self) -> usize {
        self.permits.available_permits()
    }

    /// Spawn `fut` onto the runtime; it starts once a permit is free.
    ///
    /// Dropping the returned handle detaches the task: it keeps its place in
    /// the queue and runs to completion unobserved.
    pub fn spawn<R, Fut>(&self, fut: Fut) -> JoinHandle<Result<R, ShardError>>
    where
        Fut: Future<Output = Result<R, ShardError>> + Send + 'static,
        R: Send + 'static,
    {
        let permits = self.permits.clone();
        tokio::spawn(async move {
            let _permit = acquire(permits).await?;
            fut.await
        })
    }

    /// Start conditions for the members of one fan-out call ending at
    /// `deadline`.
    pub(crate) fn gate(&self, deadline: Instant) -> Gate {
        Gate {
            permits: self.permits.clone(),
            cancel: CancellationToken::new(),
            deadline,
        }
    }
}

async fn acquire(permits: Arc<Semaphore>) -> Result<OwnedSemaphorePermit, ShardError> {
    permits
        .acquire_owned()
        .await
        .map_err(|_| ShardError::Internal("worker pool closed".to_string()))
}

/// Shared by the member tasks of one fan-out call.
///
/// A member queued behind the pool starts only if the call is still waiting
/// for it: once the gate is closed or the deadline has passed, queued
/// members resolve to `None` without being invoked. Members already running
/// are never interrupted.
#[derive(Debug, Clone)]
pub(crate) struct Gate {
    permits: Arc<Semaphore>,
    cancel: CancellationToken,
    deadline: Instant,
}

impl Gate {
    /// Stop members that have not started yet.
    pub(crate) fn close(&self) {
        self.cancel.cancel();
    }

    /// Closes the gate when dropped, so a caller that stops waiting early
    /// does not leave queued members behind.
    pub(crate) fn close_on_drop(&self) -> DropGuard {
        self.cancel.clone().drop_guard()
    }

    /// Invoke `work` once a permit is free, unless the gate closes first.
    pub(crate) async fn run<R, W, Fut>(self, work: W) -> Option<Result<R, ShardError>>
    where
        W: FnOnce() -> Fut,
        Fut: Future<Output = Result<R, ShardError>>,
    {
        let permit = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => return None,
            _ = sleep_until(self.deadline) => return None,
            permit = acquire(self.permits.clone()) => permit,
        };
        let _permit = match permit {
            Ok(permit) => permit,
            Err(e) => return Some(Err(e)),
        };
        Some(work().await)
    }

    /// Spawn [`run`](Self::run) onto the runtime.
    pub(crate) fn spawn<R, W, Fut>(&self, work: W) -> JoinHandle<Option<Result<R, ShardError>>>
    where
        W: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<R, ShardError>> + Send + 'static,
        R: Send + 'static,
    {
        tokio::spawn(self.clone().run(work))
    }
}

/// Concurrency settings for a [`ParNodeSet`](crate::ParNodeSet).
#[derive(Debug, Clone)]
pub struct ParallelConfig {
    /// Pool the member operations run on.
    pub pool: WorkerPool,
    /// Upper bound on how long one fan-out call waits for its members.
    pub timeout: Duration,
}

impl ParallelConfig {
    /// Settings with an explicit pool and timeout.
    pub fn new(pool: WorkerPool, timeout: Duration) -> Self {
        Self { pool, timeout }
    }

    /// Replace the timeout, keeping the pool.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

impl Default for ParallelConfig {
    /// The process-wide pool with [`DEFAULT_TIMEOUT`].
    fn default() -> Self {
        Self {
            pool: WorkerPool::global(),
            timeout: DEFAULT_TIMEOUT,
        }
    }
}
