//! Operator-side configuration: settings the operator itself carries, as
//! opposed to the per-cluster definitions submitted by clients. Values are
//! env-tunable with sensible defaults; file-based loading stays with the CLI.

use crate::fragments::S3AccessConf;
use finback_core::pathx;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// How the object-storage endpoint addresses buckets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AccessStyle {
    PathStyle,
    VirtualHosted,
}

/// Object-storage access owned by the operator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct S3Conf {
    pub endpoint: String,
    pub bucket: String,
    pub access_key: String,
    pub secret_key: String,
    pub access_style: AccessStyle,
    pub ssl_enabled: bool,
}

impl S3Conf {
    /// Normalize bucket placement of `path` for this endpoint's addressing
    /// style: path-style wants the bucket leading the path, virtual-hosted
    /// wants it stripped (it lives in the hostname).
    pub fn revise_path(&self, path: &str) -> String {
        let pure = pathx::pure_path(path);
        let prefixed = pure == self.bucket || pure.starts_with(&format!("{}/", self.bucket));
        match self.access_style {
            AccessStyle::PathStyle if !prefixed => format!("{}/{}", self.bucket, pure),
            AccessStyle::PathStyle => pure,
            AccessStyle::VirtualHosted => pure
                .strip_prefix(&format!("{}/", self.bucket))
                .map(str::to_string)
                .unwrap_or(pure),
        }
    }

    /// The cluster-side access fragment for this storage.
    pub fn access_conf(&self) -> S3AccessConf {
        S3AccessConf {
            endpoint: self.endpoint.clone(),
            access_key: self.access_key.clone(),
            secret_key: self.secret_key.clone(),
            path_style_access: Some(matches!(self.access_style, AccessStyle::PathStyle)),
            ssl_enabled: Some(self.ssl_enabled),
        }
    }
}

/// Flink-facing operator settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlinkConf {
    /// Service account bound to jobmanager pods when a definition names none.
    pub k8s_account: String,
    /// Root of the per-cluster local workspaces.
    pub local_tmp_dir: PathBuf,
    /// Image of the MinIO client used by the user-library init container.
    pub mc_image: String,
    /// Tracker poll cadence against the Flink REST API.
    pub rest_poll_interval: Duration,
    /// Poll cadence while watching a savepoint trigger.
    pub spt_trigger_poll_interval: Duration,
    /// Deadline for any request into an operator actor.
    pub ask_timeout: Duration,
}

impl Default for FlinkConf {
    fn default() -> Self {
        Self {
            k8s_account: "flink-operator".to_string(),
            local_tmp_dir: std::env::temp_dir().join("finback"),
            mc_image: "minio/mc".to_string(),
            rest_poll_interval: Duration::from_millis(1000),
            spt_trigger_poll_interval: Duration::from_millis(100),
            ask_timeout: Duration::from_secs(5),
        }
    }
}

/// The operator's own configuration bundle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperatorConf {
    pub flink: FlinkConf,
    pub s3: S3Conf,
}

impl OperatorConf {
    /// Env-driven construction for the CLI and tests.
    pub fn from_env() -> Self {
        let mut conf = Self::default();
        if let Ok(v) = std::env::var("FINBACK_K8S_ACCOUNT") {
            conf.flink.k8s_account = v;
        }
        if let Ok(v) = std::env::var("FINBACK_LOCAL_TMP_DIR") {
            conf.flink.local_tmp_dir = PathBuf::from(v);
        }
        if let Ok(v) = std::env::var("FINBACK_S3_ENDPOINT") {
            conf.s3.endpoint = v;
        }
        if let Ok(v) = std::env::var("FINBACK_S3_BUCKET") {
            conf.s3.bucket = v;
        }
        if let Ok(v) = std::env::var("FINBACK_S3_ACCESS_KEY") {
            conf.s3.access_key = v;
        }
        if let Ok(v) = std::env::var("FINBACK_S3_SECRET_KEY") {
            conf.s3.secret_key = v;
        }
        if let Some(ms) = env_ms("FINBACK_REST_POLL_MS") {
            conf.flink.rest_poll_interval = ms;
        }
        if let Some(ms) = env_ms("FINBACK_SPT_POLL_MS") {
            conf.flink.spt_trigger_poll_interval = ms;
        }
        if let Some(ms) = env_ms("FINBACK_ASK_TIMEOUT_MS") {
            conf.flink.ask_timeout = ms;
        }
        conf
    }
}

fn env_ms(name: &str) -> Option<Duration> {
    std::env::var(name).ok().and_then(|s| s.parse::<u64>().ok()).map(Duration::from_millis)
}

impl Default for OperatorConf {
    fn default() -> Self {
        Self {
            flink: FlinkConf::default(),
            s3: S3Conf {
                endpoint: "http://minio:9000".to_string(),
                bucket: "flink".to_string(),
                access_key: String::new(),
                secret_key: String::new(),
                access_style: AccessStyle::PathStyle,
                ssl_enabled: false,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn s3(style: AccessStyle) -> S3Conf {
        S3Conf {
            endpoint: "http://minio:9000".into(),
            bucket: "b".into(),
            access_key: "ak".into(),
            secret_key: "sk".into(),
            access_style: style,
            ssl_enabled: false,
        }
    }

    #[test]
    fn path_style_prepends_missing_bucket() {
        let c = s3(AccessStyle::PathStyle);
        assert_eq!(c.revise_path("s3://b/app.jar"), "b/app.jar");
        assert_eq!(c.revise_path("s3p://other/app.jar"), "b/other/app.jar");
        assert_eq!(c.revise_path("app.jar"), "b/app.jar");
    }

    #[test]
    fn virtual_hosted_strips_leading_bucket() {
        let c = s3(AccessStyle::VirtualHosted);
        assert_eq!(c.revise_path("s3://b/app.jar"), "app.jar");
        assert_eq!(c.revise_path("s3://x/app.jar"), "x/app.jar");
    }
}
