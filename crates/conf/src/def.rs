//! Declarative Flink cluster definitions, as submitted by clients and
//! consumed by the revise pipeline.

use crate::fragments::{
    CpuConf, JmHaConf, MemConf, ParConf, RestartStgConf, S3AccessConf, SavepointRestoreConf,
    StateBackendConf, WebUIConf,
};
use finback_core::{Fcid, FlinkVer};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// Flink execution target on Kubernetes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExecMode {
    KubernetesSession,
    KubernetesApplication,
}

impl fmt::Display for ExecMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExecMode::KubernetesSession => f.write_str("kubernetes-session"),
            ExecMode::KubernetesApplication => f.write_str("kubernetes-application"),
        }
    }
}

/// Exposure type of the generated Flink REST service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RestExportType {
    ClusterIP,
    NodePort,
    LoadBalancer,
    HeadlessClusterIP,
}

impl Default for RestExportType {
    fn default() -> Self {
        RestExportType::ClusterIP
    }
}

impl fmt::Display for RestExportType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RestExportType::ClusterIP => f.write_str("ClusterIP"),
            RestExportType::NodePort => f.write_str("NodePort"),
            RestExportType::LoadBalancer => f.write_str("LoadBalancer"),
            RestExportType::HeadlessClusterIP => f.write_str("Headless_ClusterIP"),
        }
    }
}

/// Application-variant extras: the job jar and its launch parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppDef {
    pub job_jar: String,
    pub job_name: String,
    pub app_main: Option<String>,
    pub app_args: Vec<String>,
    pub restore: Option<SavepointRestoreConf>,
}

/// Variant selector of a cluster definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ClusterKind {
    Session,
    Application(AppDef),
}

/// A declarative Flink cluster definition. Immutable once revised.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlinkClusterDef {
    pub fcid: Fcid,
    pub image: String,
    pub flink_ver: FlinkVer,
    pub k8s_account: Option<String>,
    pub rest_export: RestExportType,
    pub cpu: CpuConf,
    pub mem: MemConf,
    pub par: ParConf,
    pub webui: WebUIConf,
    pub restart_stg: RestartStgConf,
    pub state_backend: Option<StateBackendConf>,
    pub jm_ha: Option<JmHaConf>,
    pub s3: Option<S3AccessConf>,
    pub injected_deps: BTreeSet<String>,
    pub built_in_plugins: BTreeSet<String>,
    pub ext_raw_configs: BTreeMap<String, String>,
    pub override_pod_template: Option<String>,
    pub kind: ClusterKind,
}

impl FlinkClusterDef {
    /// A session-cluster definition with defaults for the tunable fragments.
    pub fn session(fcid: Fcid, image: impl Into<String>, flink_ver: FlinkVer) -> Self {
        Self {
            fcid,
            image: image.into(),
            flink_ver,
            k8s_account: None,
            rest_export: RestExportType::default(),
            cpu: CpuConf::default(),
            mem: MemConf::default(),
            par: ParConf::default(),
            webui: WebUIConf::default(),
            restart_stg: RestartStgConf::default(),
            state_backend: None,
            jm_ha: None,
            s3: None,
            injected_deps: BTreeSet::new(),
            built_in_plugins: BTreeSet::new(),
            ext_raw_configs: BTreeMap::new(),
            override_pod_template: None,
            kind: ClusterKind::Session,
        }
    }

    /// An application-cluster definition with defaults for the tunable fragments.
    pub fn application(
        fcid: Fcid,
        image: impl Into<String>,
        flink_ver: FlinkVer,
        app: AppDef,
    ) -> Self {
        let mut def = Self::session(fcid, image, flink_ver);
        def.kind = ClusterKind::Application(app);
        def
    }

    /// Execution target derived from the variant.
    pub fn mode(&self) -> ExecMode {
        match self.kind {
            ClusterKind::Session => ExecMode::KubernetesSession,
            ClusterKind::Application(_) => ExecMode::KubernetesApplication,
        }
    }

    pub fn app(&self) -> Option<&AppDef> {
        match &self.kind {
            ClusterKind::Session => None,
            ClusterKind::Application(app) => Some(app),
        }
    }

    fn app_mut(&mut self) -> Option<&mut AppDef> {
        match &mut self.kind {
            ClusterKind::Session => None,
            ClusterKind::Application(app) => Some(app),
        }
    }

    /// Visit every S3-capable path field mutably (checkpoint/savepoint dirs,
    /// HA storage dir, injected deps and the application job jar).
    pub(crate) fn map_storage_paths(&mut self, f: impl Fn(&str) -> String) {
        if let Some(sb) = &mut self.state_backend {
            if let Some(dir) = &sb.checkpoint_dir {
                sb.checkpoint_dir = Some(f(dir));
            }
            if let Some(dir) = &sb.savepoint_dir {
                sb.savepoint_dir = Some(f(dir));
            }
        }
        if let Some(ha) = &mut self.jm_ha {
            ha.storage_dir = f(&ha.storage_dir);
        }
        self.injected_deps = self.injected_deps.iter().map(|d| f(d)).collect();
        if let Some(app) = self.app_mut() {
            app.job_jar = f(&app.job_jar);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mode_follows_variant() {
        let fcid = Fcid::new("c1", "ns1");
        let ver = FlinkVer::new("1.17.2");
        let session = FlinkClusterDef::session(fcid.clone(), "flink:1.17", ver.clone());
        assert_eq!(session.mode(), ExecMode::KubernetesSession);

        let app = FlinkClusterDef::application(
            fcid,
            "flink:1.17",
            ver,
            AppDef {
                job_jar: "s3://b/app.jar".into(),
                job_name: "job".into(),
                app_main: None,
                app_args: vec![],
                restore: None,
            },
        );
        assert_eq!(app.mode(), ExecMode::KubernetesApplication);
        assert_eq!(app.mode().to_string(), "kubernetes-application");
    }

    #[test]
    fn rest_export_display_matches_flink_values() {
        assert_eq!(RestExportType::ClusterIP.to_string(), "ClusterIP");
        assert_eq!(RestExportType::HeadlessClusterIP.to_string(), "Headless_ClusterIP");
    }
}
