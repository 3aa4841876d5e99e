//! The observation cache: one replicated store slot per snapshot type, all
//! keyed by [`Fcid`]. Untracking a cluster purges its entries from every slot.

use crate::error::ObserverError;
use finback_core::prelude::*;
use finback_store::{spawn_node, NodeId, StoreCfg, StoreHandle};
use std::time::Duration;

/// Typed store handles for everything the trackers publish.
#[derive(Clone)]
pub struct ObsCache {
    pub jm_metrics: StoreHandle<Fcid, JmMetrics>,
    pub tm_metrics: StoreHandle<Fcid, Vec<TmMetrics>>,
    pub job_overviews: StoreHandle<Fcid, Vec<JobOverview>>,
    pub job_metrics: StoreHandle<Fcid, Vec<JobMetrics>>,
    pub deployments: StoreHandle<Fcid, DeploymentSnap>,
    pub services: StoreHandle<Fcid, Vec<ServiceSnap>>,
    pub pods: StoreHandle<Fcid, Vec<PodSnap>>,
    pub endpoints: StoreHandle<Fcid, RestSvcEndpoint>,
}

impl ObsCache {
    /// Spawn all store slots for one node.
    pub fn spawn(node: NodeId, ask_timeout: Duration) -> Self {
        let cfg = StoreCfg { node, ask_timeout, ..StoreCfg::default() };
        Self {
            jm_metrics: spawn_node(cfg.clone()),
            tm_metrics: spawn_node(cfg.clone()),
            job_overviews: spawn_node(cfg.clone()),
            job_metrics: spawn_node(cfg.clone()),
            deployments: spawn_node(cfg.clone()),
            services: spawn_node(cfg.clone()),
            pods: spawn_node(cfg.clone()),
            endpoints: spawn_node(cfg),
        }
    }

    /// Remove every cached entry keyed by `fcid`, across all slots.
    pub async fn purge(&self, fcid: &Fcid) -> Result<(), ObserverError> {
        macro_rules! purge_slot {
            ($slot:expr) => {{
                let target = fcid.clone();
                $slot.remove_by_key_selector(move |k| *k == target).await?;
            }};
        }
        purge_slot!(self.jm_metrics);
        purge_slot!(self.tm_metrics);
        purge_slot!(self.job_overviews);
        purge_slot!(self.job_metrics);
        purge_slot!(self.deployments);
        purge_slot!(self.services);
        purge_slot!(self.pods);
        purge_slot!(self.endpoints);
        Ok(())
    }

    /// Whether any slot still holds an entry for `fcid`.
    pub async fn holds_any(&self, fcid: &Fcid) -> Result<bool, ObserverError> {
        Ok(self.jm_metrics.contains(fcid).await?
            || self.tm_metrics.contains(fcid).await?
            || self.job_overviews.contains(fcid).await?
            || self.job_metrics.contains(fcid).await?
            || self.deployments.contains(fcid).await?
            || self.services.contains(fcid).await?
            || self.pods.contains(fcid).await?
            || self.endpoints.contains(fcid).await?)
    }
}
