//! Finback observer: the cluster-sharded tracker fleet and the public query
//! facade over tracked Flink clusters. Commands route through the shard
//! proxies to per-cluster tracker entities; queries read the replicated
//! observation cache and fall back to live REST/Kubernetes calls on miss.

#![forbid(unsafe_code)]

pub mod cache;
pub mod endpoint;
pub mod error;
pub mod kinds;
pub mod savepoint;
pub mod tracker;

pub use cache::ObsCache;
pub use endpoint::{EndpointResolver, KubeRestSvcLocator, RestSvcLocator};
pub use error::ObserverError;
pub use kinds::{JobsObs, K8sObs};
pub use savepoint::{RestSavepointSource, SavepointStatusSource};
pub use tracker::{spawn_tracker, Poller, TrackerMsg};

use finback_conf::OperatorConf;
use finback_core::prelude::*;
use finback_flinkhub::{FlinkRestClient, SavepointTriggerStatus};
use finback_shard::{NodeId, ShardProxy, ShardRing};
use kinds::{JmMetricsPoller, JobsPoller, K8sSnapPoller, TmMetricsPoller};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// One shard proxy per tracker kind; all share the entity key space.
pub struct TrackerFleet {
    pub jm: ShardProxy<Fcid, TrackerMsg<JmMetrics>>,
    pub tm: ShardProxy<Fcid, TrackerMsg<Vec<TmMetrics>>>,
    pub jobs: ShardProxy<Fcid, TrackerMsg<JobsObs>>,
    pub k8s: ShardProxy<Fcid, TrackerMsg<K8sObs>>,
}

impl TrackerFleet {
    async fn start_all(&self, fcid: &Fcid) -> Result<(), ObserverError> {
        self.jm.tell(fcid, TrackerMsg::Start).await?;
        self.tm.tell(fcid, TrackerMsg::Start).await?;
        self.jobs.tell(fcid, TrackerMsg::Start).await?;
        self.k8s.tell(fcid, TrackerMsg::Start).await?;
        Ok(())
    }

    /// Stop every tracker for `fcid` and wait for their slots to release, so
    /// a purge that follows cannot race a still-queued `Refresh`.
    async fn stop_all(&self, fcid: &Fcid, grace: Duration) -> Result<(), ObserverError> {
        self.jm.tell(fcid, TrackerMsg::Stop).await?;
        self.tm.tell(fcid, TrackerMsg::Stop).await?;
        self.jobs.tell(fcid, TrackerMsg::Stop).await?;
        self.k8s.tell(fcid, TrackerMsg::Stop).await?;
        self.jm.wait_released(fcid, grace).await;
        self.tm.wait_released(fcid, grace).await;
        self.jobs.wait_released(fcid, grace).await;
        self.k8s.wait_released(fcid, grace).await;
        Ok(())
    }
}

/// Where the facade lists live job ids when the cache has no jobs snapshot.
#[async_trait::async_trait]
pub trait JobListSource: Send + Sync {
    async fn list_job_ids(&self, rest_url: &str) -> Result<Vec<String>, ObserverError>;
}

/// REST-backed job listing.
pub struct RestJobListSource {
    pub flink: FlinkRestClient,
}

#[async_trait::async_trait]
impl JobListSource for RestJobListSource {
    async fn list_job_ids(&self, rest_url: &str) -> Result<Vec<String>, ObserverError> {
        Ok(self.flink.list_jobs(rest_url).await?)
    }
}

/// Observer-side tunables.
#[derive(Debug, Clone)]
pub struct ObserverConf {
    pub node: NodeId,
    pub ask_timeout: Duration,
    pub rest_poll_interval: Duration,
    pub spt_trigger_poll_interval: Duration,
}

impl ObserverConf {
    pub fn from_operator_conf(node: NodeId, conf: &OperatorConf) -> Self {
        Self {
            node,
            ask_timeout: conf.flink.ask_timeout,
            rest_poll_interval: conf.flink.rest_poll_interval,
            spt_trigger_poll_interval: conf.flink.spt_trigger_poll_interval,
        }
    }
}

/// The public query surface over tracked clusters.
pub struct FlinkObserver {
    conf: ObserverConf,
    cache: ObsCache,
    fleet: TrackerFleet,
    resolver: EndpointResolver,
    spt_source: Arc<dyn SavepointStatusSource>,
    job_source: Arc<dyn JobListSource>,
}

impl FlinkObserver {
    /// Assemble an observer from explicit collaborators. Production wiring
    /// lives in [`FlinkObserver::spawn_single_node`]; tests inject scripted
    /// locators and sources here.
    pub fn with_parts(
        conf: ObserverConf,
        cache: ObsCache,
        fleet: TrackerFleet,
        resolver: EndpointResolver,
        spt_source: Arc<dyn SavepointStatusSource>,
        job_source: Arc<dyn JobListSource>,
    ) -> Self {
        Self { conf, cache, fleet, resolver, spt_source, job_source }
    }

    /// Single-node observer over the live Kubernetes and Flink APIs.
    pub fn spawn_single_node(node: NodeId, opconf: &OperatorConf) -> Self {
        let conf = ObserverConf::from_operator_conf(node, opconf);
        let cache = ObsCache::spawn(node, conf.ask_timeout);
        let resolver = EndpointResolver::new(&cache, Arc::new(KubeRestSvcLocator));
        let flink = FlinkRestClient::default();
        let ring = ShardRing::solo(node);

        let interval = conf.rest_poll_interval;
        let jm_poller = Arc::new(JmMetricsPoller {
            flink: flink.clone(),
            resolver: resolver.clone(),
            cache: cache.clone(),
            interval,
        });
        let tm_poller = Arc::new(TmMetricsPoller {
            flink: flink.clone(),
            resolver: resolver.clone(),
            cache: cache.clone(),
            interval,
        });
        let jobs_poller = Arc::new(JobsPoller {
            flink: flink.clone(),
            resolver: resolver.clone(),
            cache: cache.clone(),
            interval,
        });
        let k8s_poller = Arc::new(K8sSnapPoller { cache: cache.clone(), interval });

        let fleet = TrackerFleet {
            jm: ShardProxy::new(node, ring.clone(), move |fcid| {
                spawn_tracker(fcid, Arc::clone(&jm_poller))
            }),
            tm: ShardProxy::new(node, ring.clone(), move |fcid| {
                spawn_tracker(fcid, Arc::clone(&tm_poller))
            }),
            jobs: ShardProxy::new(node, ring.clone(), move |fcid| {
                spawn_tracker(fcid, Arc::clone(&jobs_poller))
            }),
            k8s: ShardProxy::new(node, ring, move |fcid| {
                spawn_tracker(fcid, Arc::clone(&k8s_poller))
            }),
        };

        let spt_source =
            Arc::new(RestSavepointSource { flink: flink.clone(), resolver: resolver.clone() });
        let job_source = Arc::new(RestJobListSource { flink });
        Self::with_parts(conf, cache, fleet, resolver, spt_source, job_source)
    }

    pub fn cache(&self) -> &ObsCache {
        &self.cache
    }

    /// Begin tracking a cluster. Idempotent: a running tracker ignores a
    /// second `Start`.
    pub async fn track_cluster(&self, fcid: &Fcid) -> Result<(), ObserverError> {
        info!(fcid = %fcid, "track cluster");
        self.fleet.start_all(fcid).await
    }

    /// Stop tracking a cluster and purge everything cached under its key.
    /// Idempotent.
    pub async fn untrack_cluster(&self, fcid: &Fcid) -> Result<(), ObserverError> {
        info!(fcid = %fcid, "untrack cluster");
        self.fleet.stop_all(fcid, self.conf.ask_timeout).await?;
        self.cache.purge(fcid).await
    }

    /// Resolve the cluster's REST endpoint; `directly` bypasses the cache.
    pub async fn retrieve_rest_endpoint(
        &self,
        fcid: &Fcid,
        directly: bool,
    ) -> Result<RestSvcEndpoint, ObserverError> {
        self.resolver.resolve(fcid, directly).await
    }

    /// Job ids of the cluster: from the jobs snapshot when present, else a
    /// live REST listing.
    pub async fn list_job_ids(&self, fcid: &Fcid) -> Result<Vec<String>, ObserverError> {
        if let Some(rows) = self.cache.job_overviews.get(fcid).await? {
            return Ok(rows.into_iter().map(|r| r.jid).collect());
        }
        let ep = self.resolver.resolve(fcid, false).await?;
        self.job_source.list_job_ids(&ep.url()).await
    }

    /// Poll a savepoint trigger until it turns terminal or `timeout` passes.
    pub async fn watch_savepoint_trigger(
        &self,
        fjid: &Fjid,
        trigger_id: &str,
        timeout: Duration,
    ) -> Result<SavepointTriggerStatus, ObserverError> {
        let poll = async {
            loop {
                let status = self.spt_source.fetch(fjid, trigger_id).await?;
                if status.is_terminal() {
                    return Ok(status);
                }
                tokio::time::sleep(self.conf.spt_trigger_poll_interval).await;
            }
        };
        match tokio::time::timeout(timeout, poll).await {
            Ok(result) => result,
            Err(_) => Err(ObserverError::Timeout),
        }
    }
}
