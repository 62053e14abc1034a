//! Shared types for reef.
//!
//! This crate defines the shard identifiers ([`ShardId`]), the shard
//! descriptor handed to every fan-out member ([`ShardInfo`]), and the
//! failure taxonomy shard operations report ([`ShardError`]).

use std::fmt;

use serde::{Deserialize, Serialize};

mod error;

pub use error::ShardError;

// ---------------------------------------------------------------------------
// Identifiers
// ---------------------------------------------------------------------------

/// Identifies one physical shard: the host it lives on and its table prefix.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
pub struct ShardId {
    /// Host serving the shard.
    pub hostname: String,
    /// Table prefix of the shard on that host.
    pub table_prefix: String,
}

impl ShardId {
    /// Create a shard id from a hostname and table prefix.
    pub fn new(hostname: impl Into<String>, table_prefix: impl Into<String>) -> Self {
        Self {
            hostname: hostname.into(),
            table_prefix: table_prefix.into(),
        }
    }
}

impl fmt::Display for ShardId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.hostname, self.table_prefix)
    }
}

// ---------------------------------------------------------------------------
// Descriptors
// ---------------------------------------------------------------------------

/// Immutable metadata describing a shard.
///
/// Node collections key their skip and block decisions on [`ShardInfo::id`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ShardInfo {
    /// Unique identifier of the shard.
    pub id: ShardId,
    /// Name of the shard implementation backing this shard.
    pub class_name: String,
    /// Whether the shard is marked busy (e.g. mid-copy).
    #[serde(default)]
    pub busy: bool,
}

impl ShardInfo {
    /// Create a descriptor for a shard that is not busy.
    pub fn new(id: ShardId, class_name: impl Into<String>) -> Self {
        Self {
            id,
            class_name: class_name.into(),
            busy: false,
        }
    }

    /// Mark the descriptor busy.
    pub fn busy(mut self) -> Self {
        self.busy = true;
        self
    }
}

impl fmt::Display for ShardInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.class_name, self.id)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
