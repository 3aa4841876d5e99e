//! Emission of the final Flink configuration from a revised definition.
//! Append order is fixed; extra raw configs overlay last, so they win over
//! every default except the reserved keys (filtered during revise).

use crate::def::{ClusterKind, FlinkClusterDef};
use crate::error::EmitError;
use crate::opconf::OperatorConf;
use crate::raw::{Configuration, RawValue};
use crate::revise::is_s3_required;
use finback_core::pathx;
use tracing::debug;

pub const BLOB_SERVER_PORT: i64 = 6124;
pub const TASKMANAGER_RPC_PORT: i64 = 6122;

/// Directory where the user-library init container stages jars inside the
/// Flink containers.
pub const CONTAINER_LIB_DIR: &str = "/opt/flink/lib";

/// Produce the key/value configuration handed to the Flink launcher. Expects
/// a definition that already went through [`crate::revise::revise`].
pub fn to_flink_raw_config(
    def: &FlinkClusterDef,
    pota: &OperatorConf,
) -> Result<Configuration, EmitError> {
    let mut cfg = Configuration::new();

    cfg.set("execution.target", def.mode().to_string());
    cfg.set("kubernetes.cluster-id", def.fcid.cluster_id.as_str());
    cfg.set("kubernetes.namespace", def.fcid.namespace.as_str());
    cfg.set("kubernetes.container.image", def.image.as_str());
    cfg.set(
        "kubernetes.jobmanager.service-account",
        def.k8s_account.clone().unwrap_or_else(|| pota.flink.k8s_account.clone()),
    );
    cfg.set("kubernetes.rest-service.exposed.type", def.rest_export.to_string());
    cfg.append("blob.server.port", RawValue::I64(BLOB_SERVER_PORT));
    cfg.append("taskmanager.rpc.port", RawValue::I64(TASKMANAGER_RPC_PORT));

    cfg.append_all(def.cpu.raw_mapping());
    cfg.append_all(def.mem.raw_mapping());
    cfg.append_all(def.par.raw_mapping());
    cfg.append_all(def.webui.raw_mapping());
    cfg.append_all(def.restart_stg.raw_mapping());
    if let Some(sb) = &def.state_backend {
        cfg.append_all(sb.raw_mapping());
    }
    if let Some(ha) = &def.jm_ha {
        cfg.append_all(ha.raw_mapping());
    }

    if is_s3_required(def) {
        cfg.append_all(pota.s3.access_conf().raw_mapping_s3p());
    }
    if let Some(s3) = &def.s3 {
        cfg.append_all(s3.raw_mapping_s3a());
    }

    if !def.built_in_plugins.is_empty() {
        let joined: Vec<String> = def.built_in_plugins.iter().cloned().collect();
        cfg.append("containerized.master.env.ENABLE_BUILT_IN_PLUGINS", RawValue::List(joined.clone()));
        cfg.append("containerized.taskmanager.env.ENABLE_BUILT_IN_PLUGINS", RawValue::List(joined));
    }

    if let ClusterKind::Application(app) = &def.kind {
        let jar = if pathx::is_s3_path(&app.job_jar) {
            format!("local://{}/{}", CONTAINER_LIB_DIR, pathx::basename(&app.job_jar))
        } else {
            app.job_jar.clone()
        };
        cfg.append("pipeline.jars", RawValue::Str(jar));
        cfg.append("pipeline.name", RawValue::Str(app.job_name.clone()));
        cfg.append("$internal.application.main", RawValue::OptStr(app.app_main.clone()));
        cfg.append("$internal.application.program-args", RawValue::List(app.app_args.clone()));
        if let Some(restore) = &app.restore {
            cfg.append_all(restore.raw_mapping());
        }
    }

    for (k, v) in &def.ext_raw_configs {
        cfg.set(k.as_str(), v.as_str());
    }

    debug!(fcid = %def.fcid, entries = cfg.len(), "flink raw configuration emitted");
    Ok(cfg)
}
