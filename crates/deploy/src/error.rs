//! Deployment error taxonomy. Every variant carries the cluster or path it
//! concerns; messages are the primary conveyance, not stack traces.

use finback_core::Fcid;
use finback_flinkhub::FlinkApiError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DeployError {
    #[error("failed to generate pod template for {fcid}: {cause}")]
    GenPodTemplate { fcid: Fcid, cause: String },

    #[error("failed to encode pod template yaml: {0}")]
    EncodePodTemplateYaml(String),

    #[error("failed to decode pod template yaml: {0}")]
    DecodePodTemplateYaml(String),

    #[error("io failure while {msg}")]
    Io {
        msg: String,
        #[source]
        cause: std::io::Error,
    },

    #[error("failed to submit flink session cluster {fcid}: {cause}")]
    SubmitSessionCluster { fcid: Fcid, cause: String },

    #[error("failed to submit flink application cluster {fcid}: {cause}")]
    SubmitApplicationCluster { fcid: Fcid, cause: String },

    #[error("job jar must live on s3 for session submission: {0}")]
    NotSupportedJobJarPath(String),

    #[error("unable to resolve remote resource: {0}")]
    RemoteResource(String),

    #[error("flink cluster not found: {0}")]
    ClusterNotFound(Fcid),

    #[error(transparent)]
    Revise(#[from] finback_conf::ReviseError),

    #[error(transparent)]
    Emit(#[from] finback_conf::EmitError),

    #[error(transparent)]
    Flink(#[from] FlinkApiError),

    #[error("kubernetes api failure: {0}")]
    K8s(String),
}

impl DeployError {
    pub(crate) fn io(msg: impl Into<String>) -> impl FnOnce(std::io::Error) -> DeployError {
        let msg = msg.into();
        move |cause| DeployError::Io { msg, cause }
    }
}
