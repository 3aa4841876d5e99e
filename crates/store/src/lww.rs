//! Last-writer-wins map CRDT. Every local mutation stamps the entry with
//! `(counter, node)`; merging keeps the larger stamp. Removals leave a
//! tombstone stamp behind so a stale remote put loses against a newer remove.

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use std::hash::Hash;

pub type NodeId = u64;

/// Logical write stamp; totally ordered by `(counter, node)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Stamp {
    pub counter: u64,
    pub node: NodeId,
}

/// A replicable delta produced by a local mutation.
#[derive(Debug, Clone)]
pub enum DeltaOp<K, V> {
    Put { key: K, stamp: Stamp, value: V },
    Remove { key: K, stamp: Stamp },
}

/// The per-node replica.
#[derive(Debug)]
pub struct LwwMap<K, V> {
    node: NodeId,
    counter: u64,
    entries: FxHashMap<K, (Stamp, V)>,
    tombstones: FxHashMap<K, Stamp>,
}

impl<K, V> LwwMap<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    pub fn new(node: NodeId) -> Self {
        Self {
            node,
            counter: 0,
            entries: FxHashMap::default(),
            tombstones: FxHashMap::default(),
        }
    }

    fn next_stamp(&mut self) -> Stamp {
        self.counter += 1;
        Stamp { counter: self.counter, node: self.node }
    }

    /// Local write; returns the delta to gossip.
    pub fn put(&mut self, key: K, value: V) -> DeltaOp<K, V> {
        let stamp = self.next_stamp();
        self.tombstones.remove(&key);
        self.entries.insert(key.clone(), (stamp, value.clone()));
        DeltaOp::Put { key, stamp, value }
    }

    /// Local removal; returns the delta to gossip, or `None` when the key was
    /// unknown (nothing to undo anywhere).
    pub fn remove(&mut self, key: &K) -> Option<DeltaOp<K, V>> {
        if self.entries.remove(key).is_none() {
            return None;
        }
        let stamp = self.next_stamp();
        self.tombstones.insert(key.clone(), stamp);
        Some(DeltaOp::Remove { key: key.clone(), stamp })
    }

    /// Merge a remote delta. Keeps the replica's counter monotone past every
    /// observed stamp so later local writes win over what they saw.
    pub fn apply(&mut self, op: DeltaOp<K, V>) {
        match op {
            DeltaOp::Put { key, stamp, value } => {
                self.counter = self.counter.max(stamp.counter);
                if self.tombstones.get(&key).is_some_and(|t| *t > stamp) {
                    return;
                }
                let newer = self.entries.get(&key).is_some_and(|(s, _)| *s > stamp);
                if !newer {
                    self.tombstones.remove(&key);
                    self.entries.insert(key, (stamp, value));
                }
            }
            DeltaOp::Remove { key, stamp } => {
                self.counter = self.counter.max(stamp.counter);
                if self.entries.get(&key).is_some_and(|(s, _)| *s > stamp) {
                    return;
                }
                self.entries.remove(&key);
                let keep = self.tombstones.get(&key).map_or(stamp, |t| (*t).max(stamp));
                self.tombstones.insert(key, keep);
            }
        }
    }

    pub fn get(&self, key: &K) -> Option<&V> {
        self.entries.get(key).map(|(_, v)| v)
    }

    pub fn contains(&self, key: &K) -> bool {
        self.entries.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &K> {
        self.entries.keys()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&K, &V)> {
        self.entries.iter().map(|(k, (_, v))| (k, v))
    }
}
