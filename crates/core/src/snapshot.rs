//! Observation snapshots published by the tracker fleet into the replicated
//! cache. Every snapshot carries `ts`, epoch millis at conversion time; the
//! cache overwrites whole values, so readers never see torn snapshots.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

/// Epoch millis now. Snapshot constructors stamp with this.
pub fn now_ts_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as i64
}

/// Raw jobmanager metric key/values.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct JmMetrics {
    pub ts: i64,
    pub metrics: HashMap<String, String>,
}

/// Raw metric key/values for one taskmanager.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TmMetrics {
    pub ts: i64,
    pub tid: String,
    pub metrics: HashMap<String, String>,
}

/// One row of the Flink `/jobs/overview` listing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobOverview {
    pub ts: i64,
    pub jid: String,
    pub name: String,
    pub state: JobState,
    pub start_time: i64,
    pub end_time: i64,
    pub task_total: i32,
}

/// Raw metric key/values for one job.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct JobMetrics {
    pub ts: i64,
    pub jid: String,
    pub metrics: HashMap<String, String>,
}

/// Flink job lifecycle state as reported by the REST API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum JobState {
    Initializing,
    Created,
    Running,
    Failing,
    Failed,
    Cancelling,
    Canceled,
    Finished,
    Restarting,
    Suspended,
    Reconciling,
    Unknown,
}

impl JobState {
    /// Lenient parse; unrecognized states collapse to [`JobState::Unknown`].
    pub fn from_rest(s: &str) -> JobState {
        match s {
            "INITIALIZING" => JobState::Initializing,
            "CREATED" => JobState::Created,
            "RUNNING" => JobState::Running,
            "FAILING" => JobState::Failing,
            "FAILED" => JobState::Failed,
            "CANCELLING" => JobState::Cancelling,
            "CANCELED" => JobState::Canceled,
            "FINISHED" => JobState::Finished,
            "RESTARTING" => JobState::Restarting,
            "SUSPENDED" => JobState::Suspended,
            "RECONCILING" => JobState::Reconciling,
            _ => JobState::Unknown,
        }
    }
}

/// Condensed view of the jobmanager Deployment.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DeploymentSnap {
    pub ts: i64,
    pub name: String,
    pub namespace: String,
    pub replicas: i32,
    pub ready_replicas: i32,
}

/// Condensed view of a Service owned by the cluster.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ServiceSnap {
    pub ts: i64,
    pub name: String,
    pub namespace: String,
    #[serde(rename = "type")]
    pub type_: String,
    pub cluster_ip: Option<String>,
    pub ports: Vec<SvcPort>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SvcPort {
    pub name: Option<String>,
    pub port: i32,
}

/// Condensed view of a Pod owned by the cluster.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PodSnap {
    pub ts: i64,
    pub name: String,
    pub namespace: String,
    pub phase: String,
    pub pod_ip: Option<String>,
}

/// Resolved location of a cluster's Flink REST service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RestSvcEndpoint {
    pub ts: i64,
    pub cluster_ip: String,
    pub cluster_port: i32,
    pub dns: String,
    pub pod_ip: Option<String>,
}

impl RestSvcEndpoint {
    /// Base URL reachable from inside the cluster network.
    pub fn url(&self) -> String {
        format!("http://{}:{}", self.cluster_ip, self.cluster_port)
    }
}

impl fmt::Display for RestSvcEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{} ({})", self.cluster_ip, self.cluster_port, self.dns)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn job_state_parses_rest_values() {
        assert_eq!(JobState::from_rest("RUNNING"), JobState::Running);
        assert_eq!(JobState::from_rest("FINISHED"), JobState::Finished);
        assert_eq!(JobState::from_rest("whatever"), JobState::Unknown);
    }

    #[test]
    fn endpoint_url_form() {
        let ep = RestSvcEndpoint {
            ts: 0,
            cluster_ip: "10.0.0.5".into(),
            cluster_port: 8081,
            dns: "c1-rest.ns1".into(),
            pod_ip: None,
        };
        assert_eq!(ep.url(), "http://10.0.0.5:8081");
    }
}
