//! The fan-out contract shared by every node collection.

use std::future::Future;

use reef_types::{ShardError, ShardId, ShardInfo};

use crate::future::ShardFuture;

/// An immutable snapshot of a shard group's members with fan-out primitives.
///
/// Members are split into active members, which carry a handle `T` and are
/// eligible for operations, and blocked members, which exist but must not be
/// used. A descriptor never appears in both lists.
///
/// Member functions receive an owned copy of the member's descriptor and
/// handle and return a future. A member reports a shard-scoped
/// [`ShardError`] to say "this shard is unusable right now"; any other error
/// is a defect and is never failed over.
///
/// Outcomes are positional: active members first in their original order,
/// then one [`ShardError::Offline`] per blocked member.
pub trait NodeIterable<T>: Send + Sync
where
    T: Clone + Send + Sync + 'static,
{
    /// Descriptor of the logical group this collection represents.
    fn root_info(&self) -> &ShardInfo;

    /// Usable members in order.
    fn active_members(&self) -> &[(ShardInfo, T)];

    /// Members that exist but are excluded from use.
    fn blocked_members(&self) -> &[ShardInfo];

    /// Apply `f` to active members until one succeeds.
    ///
    /// Shard-scoped failures move on to the next member; any other failure
    /// aborts immediately. Fails with [`ShardError::BlackHole`] when the
    /// group has no members at all, and with [`ShardError::Offline`] when no
    /// active member succeeded.
    fn any<R, F, Fut>(&self, f: F) -> impl Future<Output = Result<R, ShardError>> + Send
    where
        F: Fn(ShardInfo, T) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<R, ShardError>> + Send + 'static,
        R: Send + 'static;

    /// Apply `f` to every active member and collect one outcome per member.
    ///
    /// Never stops early. The result always has [`size`](Self::size) slots.
    fn try_all<R, F, Fut>(&self, f: F) -> impl Future<Output = Vec<Result<R, ShardError>>> + Send
    where
        F: Fn(ShardInfo, T) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<R, ShardError>> + Send + 'static,
        R: Send + 'static;

    /// Total number of members, active and blocked.
    fn size(&self) -> usize {
        self.active_members().len() + self.blocked_members().len()
    }

    /// Whether the group has no members at all.
    fn is_empty(&self) -> bool {
        self.size() == 0
    }

    /// Whether any member is blocked.
    fn contains_blocked(&self) -> bool {
        !self.blocked_members().is_empty()
    }

    /// Ids of the blocked members.
    fn blocked_shards(&self) -> Vec<ShardId> {
        self.blocked_members().iter().map(|info| info.id.clone()).collect()
    }

    /// Ids of the active members.
    fn active_shards(&self) -> Vec<ShardId> {
        self.active_members()
            .iter()
            .map(|(info, _)| info.id.clone())
            .collect()
    }

    /// Ids of every member in positional order.
    fn shard_ids(&self) -> Vec<ShardId> {
        let mut ids = self.active_shards();
        ids.extend(self.blocked_shards());
        ids
    }

    /// Like [`any`](Self::any), but an offline or empty group yields `None`.
    fn any_option<R, F, Fut>(
        &self,
        f: F,
    ) -> impl Future<Output = Result<Option<R>, ShardError>> + Send
    where
        F: Fn(ShardInfo, T) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<R, ShardError>> + Send + 'static,
        R: Send + 'static,
    {
        async move {
            match self.any(f).await {
                Ok(value) => Ok(Some(value)),
                Err(ShardError::Offline(_) | ShardError::BlackHole(_)) => Ok(None),
                Err(e) => Err(e),
            }
        }
    }

    /// Alias of [`try_all`](Self::try_all).
    fn all<R, F, Fut>(&self, f: F) -> impl Future<Output = Vec<Result<R, ShardError>>> + Send
    where
        F: Fn(ShardInfo, T) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<R, ShardError>> + Send + 'static,
        R: Send + 'static,
    {
        self.try_all(f)
    }

    /// Apply `f` to every member and return the values in order.
    ///
    /// Every member is attempted; afterwards the first failing slot, which
    /// includes any blocked member, fails the whole call.
    fn map<R, F, Fut>(&self, f: F) -> impl Future<Output = Result<Vec<R>, ShardError>> + Send
    where
        F: Fn(ShardInfo, T) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<R, ShardError>> + Send + 'static,
        R: Send + 'static,
    {
        async move { self.try_all(f).await.into_iter().collect() }
    }

    /// [`map`](Self::map) for operations that return no value.
    fn foreach<F, Fut>(&self, f: F) -> impl Future<Output = Result<(), ShardError>> + Send
    where
        F: Fn(ShardInfo, T) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), ShardError>> + Send + 'static,
    {
        async move { self.map(f).await.map(|_| ()) }
    }

    /// [`map`](Self::map), flattening each member's values.
    fn flat_map<R, F, Fut>(
        &self,
        f: F,
    ) -> impl Future<Output = Result<Vec<R::Item>, ShardError>> + Send
    where
        F: Fn(ShardInfo, T) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<R, ShardError>> + Send + 'static,
        R: IntoIterator + Send + 'static,
        R::Item: Send,
    {
        async move {
            let values = self.map(f).await?;
            Ok(values.into_iter().flatten().collect())
        }
    }

    /// Start `f` on every active member concurrently without waiting.
    ///
    /// Returns one [`ShardFuture`] per member in positional order. Blocked
    /// members are already failed with [`ShardError::Offline`]. Must be
    /// called from within a tokio runtime.
    fn async_all<R, F, Fut>(&self, f: F) -> Vec<ShardFuture<R>>
    where
        F: Fn(ShardInfo, T) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<R, ShardError>> + Send + 'static,
        R: Send + 'static,
    {
        let mut futures: Vec<ShardFuture<R>> = self
            .active_members()
            .iter()
            .map(|(info, handle)| ShardFuture::spawn(f(info.clone(), handle.clone())))
            .collect();
        futures.extend(blocked_failures(self.blocked_members()));
        futures
    }
}

/// One already-failed future per blocked member.
pub(crate) fn blocked_failures<R>(
    blocked: &[ShardInfo],
) -> impl Iterator<Item = ShardFuture<R>> + '_ {
    blocked
        .iter()
        .map(|info| ShardFuture::failed(ShardError::Offline(info.id.clone())))
}

/// One offline outcome per blocked member.
pub(crate) fn blocked_outcomes<R>(
    blocked: &[ShardInfo],
) -> impl Iterator<Item = Result<R, ShardError>> + '_ {
    blocked
        .iter()
        .map(|info| Err(ShardError::Offline(info.id.clone())))
}
