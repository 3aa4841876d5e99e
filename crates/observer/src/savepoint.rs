//! Savepoint trigger watching: poll the trigger status until it leaves
//! `IN_PROGRESS` or the deadline elapses.

use crate::endpoint::EndpointResolver;
use crate::error::ObserverError;
use async_trait::async_trait;
use finback_core::Fjid;
use finback_flinkhub::{FlinkRestClient, SavepointTriggerStatus};

/// Where trigger statuses come from; the REST impl resolves the cluster's
/// endpoint per fetch so a jobmanager failover mid-watch self-heals.
#[async_trait]
pub trait SavepointStatusSource: Send + Sync {
    async fn fetch(
        &self,
        fjid: &Fjid,
        trigger_id: &str,
    ) -> Result<SavepointTriggerStatus, ObserverError>;
}

pub struct RestSavepointSource {
    pub flink: FlinkRestClient,
    pub resolver: EndpointResolver,
}

#[async_trait]
impl SavepointStatusSource for RestSavepointSource {
    async fn fetch(
        &self,
        fjid: &Fjid,
        trigger_id: &str,
    ) -> Result<SavepointTriggerStatus, ObserverError> {
        let ep = self.resolver.resolve(&fjid.fcid, false).await?;
        Ok(self.flink.get_savepoint_trigger(&ep.url(), &fjid.job_id, trigger_id).await?)
    }
}
