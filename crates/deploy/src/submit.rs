//! The submission engine: resolve a definition, stage its workspace and pod
//! template, then hand the emitted configuration to the Flink launcher; or
//! submit a job into a running session cluster over its REST API.

use crate::error::DeployError;
use crate::podtpl;
use crate::workspace::Workspace;
use async_trait::async_trait;
use finback_conf::fragments::SavepointRestoreConf;
use finback_conf::{revise, to_flink_raw_config, Configuration, FlinkClusterDef, OperatorConf};
use finback_core::{pathx, Fcid, Fjid};
use finback_flinkhub::{FlinkRestClient, RunJarReq};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// The external launcher contract: takes the resolved configuration and
/// performs the actual `flink run` equivalent.
#[async_trait]
pub trait FlinkLauncher: Send + Sync {
    async fn deploy_application(&self, config: &Configuration) -> anyhow::Result<()>;
    async fn deploy_session(&self, config: &Configuration) -> anyhow::Result<()>;
}

/// The external object-storage contract: fetch a remote object into a local
/// directory and return the local path.
#[async_trait]
pub trait RemoteStorage: Send + Sync {
    async fn download(&self, remote_path: &str, into_dir: &Path) -> anyhow::Result<PathBuf>;
}

/// A job submitted into an existing session cluster.
#[derive(Debug, Clone, Default)]
pub struct SessionJobDef {
    pub job_jar: String,
    pub entry_class: Option<String>,
    pub args: Vec<String>,
    pub parallelism: Option<i32>,
    pub restore: Option<SavepointRestoreConf>,
}

async fn stage_cluster(
    def: FlinkClusterDef,
    conf: &OperatorConf,
) -> Result<(FlinkClusterDef, Configuration), DeployError> {
    let fcid = def.fcid.clone();
    let def = revise(def)?;
    let ws = Workspace::new(&conf.flink.local_tmp_dir);
    ws.prepare(&fcid).await?;
    let pod = podtpl::resolve(&def, conf)?;
    let pod_path = ws.pod_template_path(&fcid);
    podtpl::dump(&pod, &pod_path).await?;
    let mut cfg = to_flink_raw_config(&def, conf)?;
    cfg.set("kubernetes.pod-template-file", pod_path.display().to_string());
    Ok((def, cfg))
}

/// Launch an application cluster from a definition.
pub async fn submit_application_cluster(
    def: FlinkClusterDef,
    conf: &OperatorConf,
    launcher: &dyn FlinkLauncher,
) -> Result<Configuration, DeployError> {
    let fcid = def.fcid.clone();
    let (_, cfg) = stage_cluster(def, conf).await?;
    launcher.deploy_application(&cfg).await.map_err(|e| {
        DeployError::SubmitApplicationCluster { fcid: fcid.clone(), cause: e.to_string() }
    })?;
    info!(fcid = %fcid, "application cluster submitted");
    Ok(cfg)
}

/// Launch a session cluster from a definition.
pub async fn submit_session_cluster(
    def: FlinkClusterDef,
    conf: &OperatorConf,
    launcher: &dyn FlinkLauncher,
) -> Result<Configuration, DeployError> {
    let fcid = def.fcid.clone();
    let (_, cfg) = stage_cluster(def, conf).await?;
    launcher.deploy_session(&cfg).await.map_err(|e| DeployError::SubmitSessionCluster {
        fcid: fcid.clone(),
        cause: e.to_string(),
    })?;
    info!(fcid = %fcid, "session cluster submitted");
    Ok(cfg)
}

/// Submit a job to a running session cluster: download its S3 jar, upload it
/// through the REST API, run it, then drop the uploaded jar best-effort.
/// Returns the started job id.
pub async fn submit_job_to_session(
    fcid: &Fcid,
    job: SessionJobDef,
    rest_url: &str,
    conf: &OperatorConf,
    storage: &dyn RemoteStorage,
    flink: &FlinkRestClient,
) -> Result<String, DeployError> {
    if !pathx::is_s3_path(&job.job_jar) {
        return Err(DeployError::NotSupportedJobJarPath(job.job_jar));
    }
    let ws = Workspace::new(&conf.flink.local_tmp_dir);
    let dir = ws.prepare(fcid).await?;
    let local_jar = storage
        .download(&job.job_jar, &dir)
        .await
        .map_err(|e| DeployError::RemoteResource(e.to_string()))?;

    let jar_id = flink.upload_jar(rest_url, &local_jar).await?;
    let req = RunJarReq {
        entry_class: job.entry_class,
        program_args: job.args,
        parallelism: job.parallelism,
        savepoint_path: job.restore.as_ref().map(|r| r.path.clone()),
        restore_mode: job.restore.as_ref().map(|r| r.mode.to_string()),
        allow_non_restored_state: job.restore.as_ref().map(|r| r.allow_non_restored_state),
    };
    let run = flink.run_jar(rest_url, &jar_id, &req).await;
    // Uploaded jar is disposable whether or not the run went through.
    flink.delete_jar(rest_url, &jar_id).await;
    let job_id = run?;
    info!(fcid = %fcid, job_id = %job_id, "session job submitted");
    Ok(job_id)
}

/// Tear a cluster down by deleting its jobmanager Deployment. The local
/// workspace is dropped as well; a missing Deployment reports
/// [`DeployError::ClusterNotFound`].
pub async fn kill_cluster(fcid: &Fcid, conf: &OperatorConf) -> Result<(), DeployError> {
    match finback_kubehub::delete_deployment(&fcid.cluster_id, &fcid.namespace).await {
        Ok(()) => {}
        Err(finback_kubehub::K8sApiError::NotFound) => {
            return Err(DeployError::ClusterNotFound(fcid.clone()))
        }
        Err(e) => return Err(DeployError::K8s(e.to_string())),
    }
    let ws = Workspace::new(&conf.flink.local_tmp_dir);
    if let Err(e) = ws.purge(fcid).await {
        warn!(fcid = %fcid, error = %e, "workspace purge failed after kill");
    }
    info!(fcid = %fcid, "cluster killed");
    Ok(())
}

/// Stop a job, optionally draining into a savepoint; returns the savepoint
/// trigger id to watch.
pub async fn cancel_job(
    fjid: &Fjid,
    rest_url: &str,
    savepoint_dir: Option<&str>,
    flink: &FlinkRestClient,
) -> Result<String, DeployError> {
    let trigger = flink.stop_job(rest_url, &fjid.job_id, savepoint_dir).await?;
    info!(fjid = %fjid, trigger = %trigger, "job stop triggered");
    Ok(trigger)
}

#[cfg(test)]
mod tests {
    use super::*;
    use finback_conf::AppDef;
    use finback_core::FlinkVer;
    use std::sync::Mutex;

    /// Launcher stub recording the configurations it was handed.
    #[derive(Default)]
    struct RecordingLauncher {
        applications: Mutex<Vec<Configuration>>,
        sessions: Mutex<Vec<Configuration>>,
    }

    #[async_trait]
    impl FlinkLauncher for RecordingLauncher {
        async fn deploy_application(&self, config: &Configuration) -> anyhow::Result<()> {
            self.applications.lock().unwrap().push(config.clone());
            Ok(())
        }

        async fn deploy_session(&self, config: &Configuration) -> anyhow::Result<()> {
            self.sessions.lock().unwrap().push(config.clone());
            Ok(())
        }
    }

    struct FailingLauncher;

    #[async_trait]
    impl FlinkLauncher for FailingLauncher {
        async fn deploy_application(&self, _config: &Configuration) -> anyhow::Result<()> {
            anyhow::bail!("launcher exploded")
        }

        async fn deploy_session(&self, _config: &Configuration) -> anyhow::Result<()> {
            anyhow::bail!("launcher exploded")
        }
    }

    fn conf_in(tmp: &Path) -> OperatorConf {
        let mut conf = OperatorConf::default();
        conf.flink.local_tmp_dir = tmp.to_path_buf();
        conf
    }

    fn app_def() -> FlinkClusterDef {
        FlinkClusterDef::application(
            Fcid::new("c1", "ns1"),
            "flink:1.17",
            FlinkVer::new("1.17.2"),
            AppDef {
                job_jar: "s3://b/app.jar".into(),
                job_name: "app".into(),
                app_main: Some("M".into()),
                app_args: vec!["-x".into()],
                restore: None,
            },
        )
    }

    #[tokio::test]
    async fn application_submit_stages_workspace_and_hands_off_config() {
        let tmp = tempfile::tempdir().unwrap();
        let conf = conf_in(tmp.path());
        let launcher = RecordingLauncher::default();

        let cfg = submit_application_cluster(app_def(), &conf, &launcher).await.unwrap();

        let handed = launcher.applications.lock().unwrap();
        assert_eq!(handed.len(), 1);
        assert_eq!(&handed[0], &cfg);
        assert_eq!(cfg.get("execution.target"), Some("kubernetes-application"));
        assert_eq!(cfg.get("pipeline.jars"), Some("local:///opt/flink/lib/app.jar"));

        let pod_path = cfg.get("kubernetes.pod-template-file").unwrap();
        assert!(pod_path.ends_with("ns1@c1/flink-podtemplate.yaml"));
        assert!(Path::new(pod_path).is_file());
        assert!(tmp.path().join("ns1@c1/log-conf/log4j-console.properties").is_file());
    }

    #[tokio::test]
    async fn session_submit_uses_session_target() {
        let tmp = tempfile::tempdir().unwrap();
        let conf = conf_in(tmp.path());
        let launcher = RecordingLauncher::default();
        let def = FlinkClusterDef::session(
            Fcid::new("s1", "ns1"),
            "flink:1.17",
            FlinkVer::new("1.17.2"),
        );
        let cfg = submit_session_cluster(def, &conf, &launcher).await.unwrap();
        assert_eq!(cfg.get("execution.target"), Some("kubernetes-session"));
        assert_eq!(launcher.sessions.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn launcher_failure_surfaces_with_the_fcid() {
        let tmp = tempfile::tempdir().unwrap();
        let conf = conf_in(tmp.path());
        let err = submit_application_cluster(app_def(), &conf, &FailingLauncher).await.unwrap_err();
        match err {
            DeployError::SubmitApplicationCluster { fcid, cause } => {
                assert_eq!(fcid, Fcid::new("c1", "ns1"));
                assert!(cause.contains("launcher exploded"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn session_job_requires_s3_jar() {
        let tmp = tempfile::tempdir().unwrap();
        let conf = conf_in(tmp.path());
        struct NoStorage;
        #[async_trait]
        impl RemoteStorage for NoStorage {
            async fn download(&self, _remote: &str, _into: &Path) -> anyhow::Result<PathBuf> {
                anyhow::bail!("must not be called")
            }
        }
        let job = SessionJobDef { job_jar: "/local/app.jar".into(), ..SessionJobDef::default() };
        let err = submit_job_to_session(
            &Fcid::new("s1", "ns1"),
            job,
            "http://127.0.0.1:1",
            &conf,
            &NoStorage,
            &FlinkRestClient::default(),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, DeployError::NotSupportedJobJarPath(p) if p == "/local/app.jar"));
    }

    #[tokio::test]
    async fn failed_download_is_a_remote_resource_error() {
        let tmp = tempfile::tempdir().unwrap();
        let conf = conf_in(tmp.path());
        struct BrokenStorage;
        #[async_trait]
        impl RemoteStorage for BrokenStorage {
            async fn download(&self, _remote: &str, _into: &Path) -> anyhow::Result<PathBuf> {
                anyhow::bail!("object vanished")
            }
        }
        let job = SessionJobDef { job_jar: "s3://b/app.jar".into(), ..SessionJobDef::default() };
        let err = submit_job_to_session(
            &Fcid::new("s1", "ns1"),
            job,
            "http://127.0.0.1:1",
            &conf,
            &BrokenStorage,
            &FlinkRestClient::default(),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, DeployError::RemoteResource(msg) if msg.contains("object vanished")));
    }
}
