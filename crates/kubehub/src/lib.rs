//! Finback kubehub: the Kubernetes side of the operator. Discovers Flink REST
//! service endpoints, deletes cluster deployments and converts Deployments,
//! Services and Pods into the condensed snapshots the trackers publish.

#![forbid(unsafe_code)]

use finback_core::snapshot::{
    now_ts_millis, DeploymentSnap, PodSnap, RestSvcEndpoint, ServiceSnap, SvcPort,
};
use finback_core::Fcid;
use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::{Pod, Service};
use kube::api::{Api, DeleteParams, ListParams};
use kube::Client;
use metrics::counter;
use thiserror::Error;
use tokio::sync::OnceCell;
use tracing::{debug, info};

/// Failure talking to the Kubernetes API.
#[derive(Debug, Error)]
pub enum K8sApiError {
    #[error("kubernetes resource not found")]
    NotFound,
    #[error("kubernetes api request failed: {0}")]
    Request(String),
}

impl From<kube::Error> for K8sApiError {
    fn from(e: kube::Error) -> Self {
        match e {
            kube::Error::Api(ae) if ae.code == 404 => K8sApiError::NotFound,
            other => K8sApiError::Request(other.to_string()),
        }
    }
}

// Reuse a single kube Client across calls to avoid costly TLS/config setup.
static KUBE_CLIENT: OnceCell<Client> = OnceCell::const_new();

async fn client() -> Result<Client, K8sApiError> {
    KUBE_CLIENT
        .get_or_try_init(|| async {
            Client::try_default().await.map_err(|e| K8sApiError::Request(e.to_string()))
        })
        .await
        .cloned()
}

/// Suffix Flink gives the REST service of a cluster.
const REST_SVC_SUFFIX: &str = "-rest";
/// Label value marking jobmanager-owned services.
const JOBMANAGER_COMPONENT: &str = "jobmanager";

/// Locate the Flink REST service for `fcid`: services in the namespace whose
/// name ends with `-rest` and whose `component` label is `jobmanager`,
/// preferring the exact `<clusterId>-rest` name. Returns `None` when no
/// service matches.
pub async fn find_rest_endpoint(fcid: &Fcid) -> Result<Option<RestSvcEndpoint>, K8sApiError> {
    let api: Api<Service> = Api::namespaced(client().await?, &fcid.namespace);
    let svcs = api.list(&ListParams::default()).await?;
    counter!("k8s_endpoint_lookups_total", 1u64);

    let mut candidates: Vec<&Service> = svcs
        .items
        .iter()
        .filter(|s| {
            let name = s.metadata.name.as_deref().unwrap_or_default();
            let component = s
                .metadata
                .labels
                .as_ref()
                .and_then(|l| l.get("component"))
                .map(String::as_str);
            name.ends_with(REST_SVC_SUFFIX) && component == Some(JOBMANAGER_COMPONENT)
        })
        .collect();
    let expected = format!("{}{}", fcid.cluster_id, REST_SVC_SUFFIX);
    candidates.sort_by_key(|s| s.metadata.name.as_deref() != Some(expected.as_str()));

    let Some(svc) = candidates.first() else {
        debug!(fcid = %fcid, "no flink rest service visible");
        return Ok(None);
    };
    let name = svc.metadata.name.as_deref().unwrap_or_default();
    let spec = svc.spec.as_ref();
    let cluster_ip = spec.and_then(|s| s.cluster_ip.clone()).filter(|ip| ip != "None");
    let rest_port = spec
        .and_then(|s| s.ports.as_ref())
        .and_then(|ports| ports.iter().find(|p| p.name.as_deref() == Some("rest")))
        .map(|p| p.port);

    match (cluster_ip, rest_port) {
        (Some(ip), Some(port)) => {
            let ep = RestSvcEndpoint {
                ts: now_ts_millis(),
                cluster_ip: ip,
                cluster_port: port,
                dns: format!("{}.{}", name, fcid.namespace),
                pod_ip: None,
            };
            info!(fcid = %fcid, endpoint = %ep, "flink rest endpoint resolved");
            Ok(Some(ep))
        }
        _ => {
            debug!(fcid = %fcid, svc = name, "rest service lacks clusterIP or rest port");
            Ok(None)
        }
    }
}

/// Delete the jobmanager Deployment of a cluster. NotFound surfaces as
/// [`K8sApiError::NotFound`] so callers can report a missing cluster.
pub async fn delete_deployment(name: &str, namespace: &str) -> Result<(), K8sApiError> {
    let api: Api<Deployment> = Api::namespaced(client().await?, namespace);
    let _ = api.delete(name, &DeleteParams::default()).await?;
    info!(name, namespace, "deployment delete issued");
    Ok(())
}

/// Condensed snapshot of the cluster's jobmanager Deployment, if present.
pub async fn deployment_snap(fcid: &Fcid) -> Result<Option<DeploymentSnap>, K8sApiError> {
    let api: Api<Deployment> = Api::namespaced(client().await?, &fcid.namespace);
    let Some(dep) = api.get_opt(&fcid.cluster_id).await? else {
        return Ok(None);
    };
    let status = dep.status.as_ref();
    Ok(Some(DeploymentSnap {
        ts: now_ts_millis(),
        name: dep.metadata.name.clone().unwrap_or_default(),
        namespace: fcid.namespace.clone(),
        replicas: status.and_then(|s| s.replicas).unwrap_or(0),
        ready_replicas: status.and_then(|s| s.ready_replicas).unwrap_or(0),
    }))
}

fn app_selector(fcid: &Fcid) -> ListParams {
    ListParams::default().labels(&format!("app={}", fcid.cluster_id))
}

/// Condensed snapshots of the Services owned by the cluster.
pub async fn service_snaps(fcid: &Fcid) -> Result<Vec<ServiceSnap>, K8sApiError> {
    let api: Api<Service> = Api::namespaced(client().await?, &fcid.namespace);
    let svcs = api.list(&app_selector(fcid)).await?;
    let ts = now_ts_millis();
    Ok(svcs
        .items
        .into_iter()
        .map(|s| {
            let spec = s.spec.unwrap_or_default();
            ServiceSnap {
                ts,
                name: s.metadata.name.unwrap_or_default(),
                namespace: fcid.namespace.clone(),
                type_: spec.type_.unwrap_or_default(),
                cluster_ip: spec.cluster_ip.filter(|ip| ip != "None"),
                ports: spec
                    .ports
                    .unwrap_or_default()
                    .into_iter()
                    .map(|p| SvcPort { name: p.name, port: p.port })
                    .collect(),
            }
        })
        .collect())
}

/// Condensed snapshots of the Pods owned by the cluster.
pub async fn pod_snaps(fcid: &Fcid) -> Result<Vec<PodSnap>, K8sApiError> {
    let api: Api<Pod> = Api::namespaced(client().await?, &fcid.namespace);
    let pods = api.list(&app_selector(fcid)).await?;
    let ts = now_ts_millis();
    Ok(pods
        .items
        .into_iter()
        .map(|p| {
            let status = p.status.unwrap_or_default();
            PodSnap {
                ts,
                name: p.metadata.name.unwrap_or_default(),
                namespace: fcid.namespace.clone(),
                phase: status.phase.unwrap_or_default(),
                pod_ip: status.pod_ip,
            }
        })
        .collect())
}
