//! Finback core types: Flink cluster/job identities, S3 path rules and the
//! observation snapshot model shared by the tracker fleet and the cache.

#![forbid(unsafe_code)]

pub mod pathx;
pub mod snapshot;

use serde::{Deserialize, Serialize};
use std::fmt;

/// Prefix of the marshaled shard-entity key form of an [`Fcid`].
const ENTITY_KEY_PREFIX: &str = "jmMt";

/// Identity of a Flink cluster: unique within one Kubernetes cluster.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Fcid {
    pub cluster_id: String,
    pub namespace: String,
}

impl Fcid {
    pub fn new(cluster_id: impl Into<String>, namespace: impl Into<String>) -> Self {
        Self { cluster_id: cluster_id.into(), namespace: namespace.into() }
    }

    /// Marshal to the single-string shard-entity key: `jmMt@<clusterId>@<namespace>`.
    pub fn marshall(&self) -> String {
        format!("{}@{}@{}", ENTITY_KEY_PREFIX, self.cluster_id, self.namespace)
    }

    /// Inverse of [`Fcid::marshall`]. Kubernetes names never contain `@`.
    pub fn unmarshall(key: &str) -> Option<Fcid> {
        let mut parts = key.splitn(3, '@');
        match (parts.next(), parts.next(), parts.next()) {
            (Some(ENTITY_KEY_PREFIX), Some(cid), Some(ns)) if !cid.is_empty() && !ns.is_empty() => {
                Some(Fcid::new(cid, ns))
            }
            _ => None,
        }
    }
}

impl fmt::Display for Fcid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.cluster_id, self.namespace)
    }
}

/// Identity of a Flink job inside a cluster.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Fjid {
    pub fcid: Fcid,
    pub job_id: String,
}

impl Fjid {
    pub fn new(fcid: Fcid, job_id: impl Into<String>) -> Self {
        Self { fcid, job_id: job_id.into() }
    }
}

impl fmt::Display for Fjid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.fcid, self.job_id)
    }
}

/// A Flink distribution version, e.g. `1.17.2` (major line `1.17`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FlinkVer {
    /// Major line, e.g. `1.17`.
    pub major: String,
    /// Full version, e.g. `1.17.2`.
    pub full: String,
}

impl FlinkVer {
    /// Build from a full version string; the major line is everything up to
    /// the second dot.
    pub fn new(full: impl Into<String>) -> Self {
        let full = full.into();
        let major = match full.match_indices('.').nth(1) {
            Some((idx, _)) => full[..idx].to_string(),
            None => full.clone(),
        };
        Self { major, full }
    }
}

impl fmt::Display for FlinkVer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.full)
    }
}

pub mod prelude {
    pub use super::snapshot::{
        now_ts_millis, DeploymentSnap, JmMetrics, JobMetrics, JobOverview, JobState, PodSnap,
        RestSvcEndpoint, ServiceSnap, SvcPort, TmMetrics,
    };
    pub use super::{Fcid, FlinkVer, Fjid};
}
