//! Concrete tracker kinds: jobmanager metrics, taskmanager metrics, jobs
//! (overview plus per-job metrics) and Kubernetes resource snapshots. Each
//! poller resolves the cluster's REST endpoint through the shared resolver,
//! fetches, converts, and publishes into its cache slot.

use crate::cache::ObsCache;
use crate::endpoint::EndpointResolver;
use crate::error::ObserverError;
use crate::tracker::Poller;
use async_trait::async_trait;
use finback_core::prelude::*;
use finback_flinkhub::FlinkRestClient;
use std::time::Duration;

/// Jobmanager metric keys the operator tracks.
pub const JM_METRIC_KEYS: &[&str] = &[
    "Status.JVM.CPU.Load",
    "Status.JVM.Memory.Heap.Used",
    "Status.JVM.Memory.Heap.Max",
    "numRegisteredTaskManagers",
    "numRunningJobs",
    "taskSlotsAvailable",
    "taskSlotsTotal",
];

/// Taskmanager metric keys the operator tracks.
pub const TM_METRIC_KEYS: &[&str] = &[
    "Status.JVM.CPU.Load",
    "Status.JVM.Memory.Heap.Used",
    "Status.JVM.Memory.Heap.Max",
    "Status.Flink.Memory.Managed.Used",
    "Status.Flink.Memory.Managed.Total",
];

/// Per-job metric keys the operator tracks.
pub const JOB_METRIC_KEYS: &[&str] = &["uptime", "restartingTime", "numRestarts", "fullRestarts"];

/// Jobs observation: the overview rows plus per-job metrics gathered on the
/// same tick.
#[derive(Debug, Clone, Default)]
pub struct JobsObs {
    pub overviews: Vec<JobOverview>,
    pub metrics: Vec<JobMetrics>,
}

/// Kubernetes observation: deployment, services and pods of one cluster.
#[derive(Debug, Clone, Default)]
pub struct K8sObs {
    pub deployment: Option<DeploymentSnap>,
    pub services: Vec<ServiceSnap>,
    pub pods: Vec<PodSnap>,
}

pub struct JmMetricsPoller {
    pub flink: FlinkRestClient,
    pub resolver: EndpointResolver,
    pub cache: ObsCache,
    pub interval: Duration,
}

#[async_trait]
impl Poller for JmMetricsPoller {
    type Snap = JmMetrics;

    fn kind(&self) -> &'static str {
        "jm-metrics"
    }

    fn interval(&self) -> Duration {
        self.interval
    }

    async fn poll(&self, fcid: &Fcid) -> Result<JmMetrics, ObserverError> {
        let ep = self.resolver.resolve(fcid, false).await?;
        let metrics = self.flink.get_jm_metrics(&ep.url(), JM_METRIC_KEYS).await?;
        Ok(JmMetrics { ts: now_ts_millis(), metrics })
    }

    async fn publish(&self, fcid: &Fcid, snap: &JmMetrics) -> Result<(), ObserverError> {
        self.cache.jm_metrics.put(fcid.clone(), snap.clone()).await?;
        Ok(())
    }
}

pub struct TmMetricsPoller {
    pub flink: FlinkRestClient,
    pub resolver: EndpointResolver,
    pub cache: ObsCache,
    pub interval: Duration,
}

#[async_trait]
impl Poller for TmMetricsPoller {
    type Snap = Vec<TmMetrics>;

    fn kind(&self) -> &'static str {
        "tm-metrics"
    }

    fn interval(&self) -> Duration {
        self.interval
    }

    async fn poll(&self, fcid: &Fcid) -> Result<Vec<TmMetrics>, ObserverError> {
        let ep = self.resolver.resolve(fcid, false).await?;
        let url = ep.url();
        let mut out = Vec::new();
        for tid in self.flink.list_taskmanagers(&url).await? {
            let metrics = self.flink.get_tm_metrics(&url, &tid, TM_METRIC_KEYS).await?;
            out.push(TmMetrics { ts: now_ts_millis(), tid, metrics });
        }
        Ok(out)
    }

    async fn publish(&self, fcid: &Fcid, snap: &Vec<TmMetrics>) -> Result<(), ObserverError> {
        self.cache.tm_metrics.put(fcid.clone(), snap.clone()).await?;
        Ok(())
    }
}

pub struct JobsPoller {
    pub flink: FlinkRestClient,
    pub resolver: EndpointResolver,
    pub cache: ObsCache,
    pub interval: Duration,
}

#[async_trait]
impl Poller for JobsPoller {
    type Snap = JobsObs;

    fn kind(&self) -> &'static str {
        "jobs"
    }

    fn interval(&self) -> Duration {
        self.interval
    }

    async fn poll(&self, fcid: &Fcid) -> Result<JobsObs, ObserverError> {
        let ep = self.resolver.resolve(fcid, false).await?;
        let url = ep.url();
        let overviews = self.flink.jobs_overview(&url).await?;
        let mut metrics = Vec::with_capacity(overviews.len());
        for row in &overviews {
            let kv = self.flink.get_job_metrics(&url, &row.jid, JOB_METRIC_KEYS).await?;
            metrics.push(JobMetrics { ts: now_ts_millis(), jid: row.jid.clone(), metrics: kv });
        }
        Ok(JobsObs { overviews, metrics })
    }

    async fn publish(&self, fcid: &Fcid, snap: &JobsObs) -> Result<(), ObserverError> {
        self.cache.job_overviews.put(fcid.clone(), snap.overviews.clone()).await?;
        self.cache.job_metrics.put(fcid.clone(), snap.metrics.clone()).await?;
        Ok(())
    }
}

pub struct K8sSnapPoller {
    pub cache: ObsCache,
    pub interval: Duration,
}

#[async_trait]
impl Poller for K8sSnapPoller {
    type Snap = K8sObs;

    fn kind(&self) -> &'static str {
        "k8s-snapshots"
    }

    fn interval(&self) -> Duration {
        self.interval
    }

    async fn poll(&self, fcid: &Fcid) -> Result<K8sObs, ObserverError> {
        let deployment = finback_kubehub::deployment_snap(fcid).await?;
        let services = finback_kubehub::service_snaps(fcid).await?;
        let pods = finback_kubehub::pod_snaps(fcid).await?;
        Ok(K8sObs { deployment, services, pods })
    }

    async fn publish(&self, fcid: &Fcid, snap: &K8sObs) -> Result<(), ObserverError> {
        if let Some(dep) = &snap.deployment {
            self.cache.deployments.put(fcid.clone(), dep.clone()).await?;
        }
        self.cache.services.put(fcid.clone(), snap.services.clone()).await?;
        self.cache.pods.put(fcid.clone(), snap.pods.clone()).await?;
        Ok(())
    }
}
