//! Failure taxonomy for shard operations.

use std::time::Duration;

use crate::ShardId;

/// Errors a shard operation can report.
///
/// Every variant except [`ShardError::Internal`] is shard-scoped: it says
/// that one specific shard is unusable right now, and fan-out primitives
/// such as `any` fail over to the next member. `Internal` marks a defect
/// unrelated to shard health and is never failed over.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ShardError {
    /// The shard group has no members at all, active or blocked.
    #[error("shard black hole: {0} has no members")]
    BlackHole(ShardId),

    /// The shard (or every member of the group) is unavailable.
    #[error("shard offline: {0}")]
    Offline(ShardId),

    /// The shard did not answer within the allotted time.
    #[error("shard {shard} timed out after {timeout:?}")]
    Timeout {
        /// The shard that timed out.
        shard: ShardId,
        /// How long the caller waited.
        timeout: Duration,
    },

    /// The shard refused the operation (e.g. it is read-only).
    #[error("shard {shard} rejected operation: {reason}")]
    Rejected {
        /// The rejecting shard.
        shard: ShardId,
        /// Why it was rejected.
        reason: String,
    },

    /// The shard failed the operation for a shard-local reason.
    #[error("shard {shard} failed: {reason}")]
    Failed {
        /// The failing shard.
        shard: ShardId,
        /// Description of the failure.
        reason: String,
    },

    /// A failure unrelated to shard availability.
    #[error("internal error: {0}")]
    Internal(String),
}

impl ShardError {
    /// Whether this failure is attributable to a single shard and may be
    /// failed over.
    pub fn is_shard_scoped(&self) -> bool {
        !matches!(self, ShardError::Internal(_))
    }

    /// The shard this failure is attributed to, if any.
    pub fn shard(&self) -> Option<&ShardId> {
        match self {
            ShardError::BlackHole(id) | ShardError::Offline(id) => Some(id),
            ShardError::Timeout { shard, .. }
            | ShardError::Rejected { shard, .. }
            | ShardError::Failed { shard, .. } => Some(shard),
            ShardError::Internal(_) => None,
        }
    }
}
