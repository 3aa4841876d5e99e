//! Finback shard: consistent-hash routing of uniquely-keyed entities across
//! the operator nodes, with spawn-on-demand and stop-released slots.

#![forbid(unsafe_code)]

pub mod proxy;
pub mod ring;

pub use proxy::{EntityKey, Routed, ShardError, ShardProxy};
pub use ring::{NodeId, NodeInfo, ShardRing, FLINK_OPERATOR_ROLE};
