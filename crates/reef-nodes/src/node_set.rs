//! [`NodeSet`] — the sequential node collection.

use std::collections::HashSet;
use std::future::Future;

use reef_types::{ShardError, ShardId, ShardInfo};
use tracing::{debug, warn};

use crate::iterable::{NodeIterable, blocked_outcomes};
use crate::par_node_set::ParNodeSet;
use crate::pool::ParallelConfig;

/// An immutable group of shard members, operated on one member at a time.
///
/// Every member operation is awaited to completion before the next one
/// starts, inside the caller's task. Transforms return a new set and never
/// modify the original, so a `NodeSet` can be shared freely.
#[derive(Debug, Clone)]
pub struct NodeSet<T> {
    root: ShardInfo,
    active: Vec<(ShardInfo, T)>,
    blocked: Vec<ShardInfo>,
}

impl<T> NodeSet<T> {
    /// Build a set from its active and blocked members.
    ///
    /// A blocked descriptor whose id is also active is dropped from the
    /// blocked list.
    pub fn new(root: ShardInfo, active: Vec<(ShardInfo, T)>, blocked: Vec<ShardInfo>) -> Self {
        let active_ids: HashSet<&ShardId> = active.iter().map(|(info, _)| &info.id).collect();
        let blocked: Vec<ShardInfo> = blocked
            .into_iter()
            .filter(|info| !active_ids.contains(&info.id))
            .collect();
        Self {
            root,
            active,
            blocked,
        }
    }

    /// A group with no members.
    pub fn empty(root: ShardInfo) -> Self {
        Self {
            root,
            active: Vec::new(),
            blocked: Vec::new(),
        }
    }

    /// A group whose only member is the root shard itself.
    pub fn leaf(root: ShardInfo, handle: T) -> Self {
        Self {
            active: vec![(root.clone(), handle)],
            root,
            blocked: Vec::new(),
        }
    }
}

impl<T: Clone> NodeSet<T> {
    /// Keep the members matching `predicate`.
    ///
    /// The predicate sees the handle for active members and `None` for
    /// blocked ones. Members keep their active/blocked classification.
    pub fn filter<P>(&self, predicate: P) -> Self
    where
        P: Fn(&ShardInfo, Option<&T>) -> bool,
    {
        Self {
            root: self.root.clone(),
            active: self
                .active
                .iter()
                .filter(|(info, handle)| predicate(info, Some(handle)))
                .cloned()
                .collect(),
            blocked: self
                .blocked
                .iter()
                .filter(|info| predicate(info, None))
                .cloned()
                .collect(),
        }
    }

    /// Drop the members matching `predicate`.
    pub fn filter_not<P>(&self, predicate: P) -> Self
    where
        P: Fn(&ShardInfo, Option<&T>) -> bool,
    {
        self.filter(|info, handle| !predicate(info, handle))
    }

    /// Drop every member, active or blocked, whose id is in `ids`.
    pub fn skip(&self, ids: &[ShardId]) -> Self {
        let skipped: HashSet<&ShardId> = ids.iter().collect();
        self.filter_not(|info, _| skipped.contains(&info.id))
    }

    /// A view of the same members that runs operations on a worker pool.
    pub fn parallel(&self, config: ParallelConfig) -> ParNodeSet<T> {
        ParNodeSet::new(self.clone(), config)
    }
}

impl<T> NodeIterable<T> for NodeSet<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn root_info(&self) -> &ShardInfo {
        &self.root
    }

    fn active_members(&self) -> &[(ShardInfo, T)] {
        &self.active
    }

    fn blocked_members(&self) -> &[ShardInfo] {
        &self.blocked
    }

    fn any<R, F, Fut>(&self, f: F) -> impl Future<Output = Result<R, ShardError>> + Send
    where
        F: Fn(ShardInfo, T) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<R, ShardError>> + Send + 'static,
        R: Send + 'static,
    {
        async move {
            if self.is_empty() {
                return Err(ShardError::BlackHole(self.root.id.clone()));
            }

            for (info, handle) in &self.active {
                match f(info.clone(), handle.clone()).await {
                    Ok(value) => return Ok(value),
                    Err(e) if e.is_shard_scoped() => {
                        debug!(shard = %info.id, error = %e, "member failed, trying next");
                    }
                    Err(e) => return Err(e),
                }
            }

            warn!(
                root = %self.root.id,
                active = self.active.len(),
                blocked = self.blocked.len(),
                "no member could satisfy the operation"
            );
            Err(ShardError::Offline(self.root.id.clone()))
        }
    }

    fn try_all<R, F, Fut>(&self, f: F) -> impl Future<Output = Vec<Result<R, ShardError>>> + Send
    where
        F: Fn(ShardInfo, T) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<R, ShardError>> + Send + 'static,
        R: Send + 'static,
    {
        async move {
            let mut outcomes = Vec::with_capacity(self.size());
            for (info, handle) in &self.active {
                outcomes.push(f(info.clone(), handle.clone()).await);
            }
            outcomes.extend(blocked_outcomes(&self.blocked));
            outcomes
        }
    }
}
