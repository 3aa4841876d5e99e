//! REST endpoint resolution: cache-first with a Kubernetes fallback behind
//! the [`RestSvcLocator`] trait, so the lookup path also runs without a live
//! cluster.

use crate::cache::ObsCache;
use crate::error::ObserverError;
use async_trait::async_trait;
use finback_core::snapshot::RestSvcEndpoint;
use finback_core::Fcid;
use finback_store::StoreHandle;
use tracing::debug;

/// Where Flink REST services are discovered when the cache has nothing.
#[async_trait]
pub trait RestSvcLocator: Send + Sync {
    async fn locate(&self, fcid: &Fcid) -> Result<Option<RestSvcEndpoint>, ObserverError>;
}

/// Production locator backed by the Kubernetes Services listing.
pub struct KubeRestSvcLocator;

#[async_trait]
impl RestSvcLocator for KubeRestSvcLocator {
    async fn locate(&self, fcid: &Fcid) -> Result<Option<RestSvcEndpoint>, ObserverError> {
        Ok(finback_kubehub::find_rest_endpoint(fcid).await?)
    }
}

/// Cache-first endpoint resolver shared by the facade and the pollers.
#[derive(Clone)]
pub struct EndpointResolver {
    cache: StoreHandle<Fcid, RestSvcEndpoint>,
    locator: std::sync::Arc<dyn RestSvcLocator>,
}

impl EndpointResolver {
    pub fn new(cache: &ObsCache, locator: std::sync::Arc<dyn RestSvcLocator>) -> Self {
        Self { cache: cache.endpoints.clone(), locator }
    }

    /// Resolve the REST endpoint for `fcid`. Unless `directly`, a cached
    /// entry short-circuits; on miss the locator runs and the result is
    /// upserted into the cache.
    pub async fn resolve(
        &self,
        fcid: &Fcid,
        directly: bool,
    ) -> Result<RestSvcEndpoint, ObserverError> {
        if !directly {
            if let Some(ep) = self.cache.get(fcid).await? {
                return Ok(ep);
            }
        }
        let ep = self
            .locator
            .locate(fcid)
            .await?
            .ok_or_else(|| ObserverError::EndpointNotFound(fcid.clone()))?;
        debug!(fcid = %fcid, endpoint = %ep, directly, "rest endpoint located");
        let put = ep.clone();
        let overwrite = ep.clone();
        self.cache.upsert(fcid.clone(), put, move |_| overwrite).await?;
        Ok(ep)
    }
}
