//! Finback store: a replicated last-writer-wins key/value map. Each operator
//! node runs one store actor per cached value type; writes gossip deltas to
//! peer replicas and concurrent writes resolve by the larger write stamp.
//! With no peers wired, a node degenerates to a plain local map.

#![forbid(unsafe_code)]

pub mod lww;
pub mod node;

pub use lww::{DeltaOp, LwwMap, NodeId, Stamp};
pub use node::{spawn_node, Consistency, StoreCfg, StoreError, StoreHandle};

use std::hash::Hash;

/// Spawn `nodes.len()` replicas fully meshed with each other.
pub async fn spawn_cluster<K, V>(nodes: &[NodeId], base: StoreCfg) -> Vec<StoreHandle<K, V>>
where
    K: Eq + Hash + Clone + Send + 'static,
    V: Clone + Send + 'static,
{
    let handles: Vec<StoreHandle<K, V>> = nodes
        .iter()
        .map(|n| {
            let mut cfg = base.clone();
            cfg.node = *n;
            spawn_node(cfg)
        })
        .collect();
    for a in &handles {
        for b in &handles {
            if a.node() != b.node() {
                // Wiring failures only happen when an actor already died.
                let _ = a.add_peer(b).await;
            }
        }
    }
    handles
}
