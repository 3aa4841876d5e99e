//! Finback deploy: pod-template generation, per-cluster local workspaces and
//! the submission engine for application/session clusters and session jobs.

#![forbid(unsafe_code)]

pub mod error;
pub mod podtpl;
pub mod submit;
pub mod workspace;

pub use error::DeployError;
pub use podtpl::{MAIN_CONTAINER, POD_TEMPLATE_NAME, USERLIB_LOADER};
pub use submit::{
    cancel_job, kill_cluster, submit_application_cluster, submit_job_to_session,
    submit_session_cluster, FlinkLauncher, RemoteStorage, SessionJobDef,
};
pub use workspace::Workspace;
