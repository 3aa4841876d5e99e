use finback_core::Fcid;
use thiserror::Error;

/// Observer-side error taxonomy.
#[derive(Debug, Error)]
pub enum ObserverError {
    #[error("no flink rest service found for {0}")]
    EndpointNotFound(Fcid),

    #[error("actor interop failure: {0}")]
    ActorInterop(String),

    #[error("watch savepoint trigger timed out")]
    Timeout,

    #[error(transparent)]
    Flink(#[from] finback_flinkhub::FlinkApiError),

    #[error("kubernetes api failure: {0}")]
    K8s(String),
}

impl From<finback_store::StoreError> for ObserverError {
    fn from(e: finback_store::StoreError) -> Self {
        ObserverError::ActorInterop(e.to_string())
    }
}

impl From<finback_shard::ShardError> for ObserverError {
    fn from(e: finback_shard::ShardError) -> Self {
        ObserverError::ActorInterop(e.to_string())
    }
}

impl From<finback_kubehub::K8sApiError> for ObserverError {
    fn from(e: finback_kubehub::K8sApiError) -> Self {
        ObserverError::K8s(e.to_string())
    }
}
