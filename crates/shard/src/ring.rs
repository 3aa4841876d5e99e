//! Consistent-hash ring over the operator nodes eligible to host entities.

use rustc_hash::FxHasher;
use std::collections::BTreeMap;
use std::hash::Hasher;

pub type NodeId = u64;

/// Role a node must carry to host tracker entities.
pub const FLINK_OPERATOR_ROLE: &str = "flink-operator";

/// Cluster membership entry.
#[derive(Debug, Clone)]
pub struct NodeInfo {
    pub id: NodeId,
    pub roles: Vec<String>,
}

impl NodeInfo {
    pub fn operator(id: NodeId) -> Self {
        Self { id, roles: vec![FLINK_OPERATOR_ROLE.to_string()] }
    }
}

const VNODES_PER_NODE: u32 = 64;

fn hash_bytes(bytes: &[u8]) -> u64 {
    let mut h = FxHasher::default();
    h.write(bytes);
    h.finish()
}

/// Hash ring with virtual nodes; owner lookup is deterministic for a given
/// membership.
#[derive(Debug, Clone, Default)]
pub struct ShardRing {
    points: BTreeMap<u64, NodeId>,
}

impl ShardRing {
    /// Ring over the nodes carrying the operator role; others never host.
    pub fn new(members: &[NodeInfo]) -> Self {
        let mut points = BTreeMap::new();
        for m in members {
            if !m.roles.iter().any(|r| r == FLINK_OPERATOR_ROLE) {
                continue;
            }
            for v in 0..VNODES_PER_NODE {
                let point = hash_bytes(format!("{}#{}", m.id, v).as_bytes());
                points.insert(point, m.id);
            }
        }
        Self { points }
    }

    /// Single-node ring, the degenerate deployment.
    pub fn solo(id: NodeId) -> Self {
        Self::new(&[NodeInfo::operator(id)])
    }

    /// Node owning the shard of a marshaled entity key.
    pub fn owner(&self, key: &str) -> Option<NodeId> {
        if self.points.is_empty() {
            return None;
        }
        let h = hash_bytes(key.as_bytes());
        self.points
            .range(h..)
            .next()
            .or_else(|| self.points.iter().next())
            .map(|(_, node)| *node)
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn owner_is_deterministic() {
        let ring = ShardRing::new(&[NodeInfo::operator(1), NodeInfo::operator(2), NodeInfo::operator(3)]);
        for key in ["jmMt@c1@ns1", "jmMt@c2@ns1", "jmMt@c3@other"] {
            assert_eq!(ring.owner(key), ring.owner(key));
        }
    }

    #[test]
    fn solo_ring_owns_everything() {
        let ring = ShardRing::solo(7);
        assert_eq!(ring.owner("jmMt@c1@ns1"), Some(7));
        assert_eq!(ring.owner("anything"), Some(7));
    }

    #[test]
    fn non_operator_nodes_never_host() {
        let ring = ShardRing::new(&[
            NodeInfo { id: 1, roles: vec!["frontend".into()] },
            NodeInfo::operator(2),
        ]);
        for key in ["a", "b", "c", "d"] {
            assert_eq!(ring.owner(key), Some(2));
        }
    }

    #[test]
    fn empty_ring_has_no_owner() {
        let ring = ShardRing::new(&[NodeInfo { id: 1, roles: vec![] }]);
        assert!(ring.is_empty());
        assert_eq!(ring.owner("k"), None);
    }
}
