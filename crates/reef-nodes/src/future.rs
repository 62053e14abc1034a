//! [`ShardFuture`] — one member's result from `async_all`.

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll, ready};
use std::time::Duration;

use reef_types::{ShardError, ShardId};
use tokio::task::{JoinError, JoinHandle};
use tokio::time::{Instant, Sleep, sleep_until};
use tracing::warn;

/// A single member's result that resolves independently of its siblings.
///
/// Active members are backed by a spawned task that is already running;
/// blocked members are already-failed values. Dropping a running future
/// detaches its task.
pub struct ShardFuture<R> {
    state: State<R>,
}

enum State<R> {
    Done(Option<Result<R, ShardError>>),
    Running(JoinHandle<Result<R, ShardError>>),
    Timed(Timed<R>),
}

/// A pool-gated member task raced against its call's deadline.
struct Timed<R> {
    handle: JoinHandle<Option<Result<R, ShardError>>>,
    expiry: Pin<Box<Sleep>>,
    shard: ShardId,
    timeout: Duration,
}

impl<R> Timed<R> {
    fn timed_out(&self) -> ShardError {
        ShardError::Timeout {
            shard: self.shard.clone(),
            timeout: self.timeout,
        }
    }

    fn poll(&mut self, cx: &mut Context<'_>) -> Poll<Result<R, ShardError>> {
        if let Poll::Ready(joined) = Pin::new(&mut self.handle).poll(cx) {
            return Poll::Ready(match joined {
                Ok(Some(outcome)) => outcome,
                // Still queued at the deadline, so it never started.
                Ok(None) => Err(self.timed_out()),
                Err(e) => Err(join_failed(e)),
            });
        }
        ready!(self.expiry.as_mut().poll(cx));
        warn!(shard = %self.shard, timeout = ?self.timeout, "abandoning member past deadline");
        Poll::Ready(Err(self.timed_out()))
    }
}

fn join_failed(e: JoinError) -> ShardError {
    ShardError::Internal(format!("member task failed: {e}"))
}

impl<R: Send + 'static> ShardFuture<R> {
    /// Start `fut` on the runtime immediately.
    pub fn spawn<Fut>(fut: Fut) -> Self
    where
        Fut: Future<Output = Result<R, ShardError>> + Send + 'static,
    {
        Self::from_handle(tokio::spawn(fut))
    }

    /// Wrap an already spawned member task.
    pub fn from_handle(handle: JoinHandle<Result<R, ShardError>>) -> Self {
        Self {
            state: State::Running(handle),
        }
    }
}

impl<R> ShardFuture<R> {
    /// A result that has already failed.
    pub fn failed(error: ShardError) -> Self {
        Self {
            state: State::Done(Some(Err(error))),
        }
    }

    /// A gated member task that fails with [`ShardError::Timeout`] unless it
    /// finishes by `deadline`. Must be called within a tokio runtime.
    pub(crate) fn with_deadline(
        handle: JoinHandle<Option<Result<R, ShardError>>>,
        shard: ShardId,
        deadline: Instant,
        timeout: Duration,
    ) -> Self {
        Self {
            state: State::Timed(Timed {
                handle,
                expiry: Box::pin(sleep_until(deadline)),
                shard,
                timeout,
            }),
        }
    }

    /// Whether awaiting this future would complete without waiting.
    pub fn is_finished(&self) -> bool {
        match &self.state {
            State::Done(_) => true,
            State::Running(handle) => handle.is_finished(),
            State::Timed(timed) => timed.handle.is_finished() || timed.expiry.is_elapsed(),
        }
    }
}

// No field is structurally pinned: join handles and boxed timers are Unpin
// and a finished result is moved out by value.
impl<R> Unpin for ShardFuture<R> {}

impl<R> Future for ShardFuture<R> {
    type Output = Result<R, ShardError>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        let outcome = match &mut this.state {
            State::Done(slot) => {
                return Poll::Ready(slot.take().unwrap_or_else(|| {
                    Err(ShardError::Internal(
                        "shard future polled after completion".to_string(),
                    ))
                }));
            }
            State::Running(handle) => {
                ready!(Pin::new(handle).poll(cx)).unwrap_or_else(|e| Err(join_failed(e)))
            }
            State::Timed(timed) => ready!(timed.poll(cx)),
        };
        // Drops any handle still held, detaching its task.
        this.state = State::Done(None);
        Poll::Ready(outcome)
    }
}

impl<R> std::fmt::Debug for ShardFuture<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShardFuture")
            .field("finished", &self.is_finished())
            .finish()
    }
}
