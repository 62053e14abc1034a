//! Node collections: ordered sets of shard replicas with failover and
//! fan-out primitives.
//!
//! This crate provides:
//!
//! - [`NodeIterable`] — the fan-out contract (`any`, `try_all`, `map`,
//!   `foreach`, `flat_map`, `async_all`) shared by every collection.
//! - [`NodeSet`] — the sequential collection, with the `filter` / `skip`
//!   transforms.
//! - [`ParNodeSet`] — the same contract executed on a bounded
//!   [`WorkerPool`] with a per-call timeout.
//! - [`ShardFuture`] — one independently resolving result of `async_all`.
//! - [`ParallelOptions`] — the TOML form of [`ParallelConfig`].

mod config;
mod error;
mod future;
mod iterable;
mod node_set;
mod par_node_set;
mod pool;

pub use config::ParallelOptions;
pub use error::ConfigError;
pub use future::ShardFuture;
pub use iterable::NodeIterable;
pub use node_set::NodeSet;
pub use par_node_set::ParNodeSet;
pub use pool::{DEFAULT_POOL_SIZE, DEFAULT_TIMEOUT, ParallelConfig, WorkerPool};
