//! The revise pipeline: validates and normalizes a cluster definition before
//! emission. Pure, idempotent, stage-ordered.

use crate::def::FlinkClusterDef;
use crate::error::ReviseError;
use crate::plugins;
use finback_core::pathx;
use std::collections::BTreeSet;
use tracing::debug;

/// Keys the resolver computes from structured fields; user-supplied overrides
/// for them are discarded.
pub const RESERVED_KEYS: &[&str] = &[
    "execution.target",
    "kubernetes.cluster-id",
    "kubernetes.namespace",
    "kubernetes.container.image",
    "kubernetes.service-account",
    "kubernetes.jobmanager.service-account",
    "kubernetes.pod-template-file",
    "kubernetes.pod-template-file.taskmanager",
    "kubernetes.pod-template-file.jobmanager",
    "$internal.deployment.config-dir",
    "pipeline.jars",
    "$internal.application.main",
    "$internal.application.program-args",
];

pub fn is_reserved_key(key: &str) -> bool {
    RESERVED_KEYS.contains(&key)
}

/// Validate and normalize a definition. Stages run in a fixed order; each is
/// a pure transform, and the pipeline as a whole is idempotent.
pub fn revise(def: FlinkClusterDef) -> Result<FlinkClusterDef, ReviseError> {
    let def = filter_ext_raw_configs(def);
    let def = normalize_plugins(def);
    let def = rewrite_s3_paths(def);
    let def = ensure_s3_plugins(def);
    let def = ensure_hadoop_plugins(def);
    debug!(fcid = %def.fcid, "cluster definition revised");
    Ok(def)
}

/// Stage 1: trim extra raw configs, drop blanks and reserved keys.
fn filter_ext_raw_configs(mut def: FlinkClusterDef) -> FlinkClusterDef {
    def.ext_raw_configs = def
        .ext_raw_configs
        .iter()
        .filter_map(|(k, v)| {
            let k = pathx::non_blank(k)?;
            let v = pathx::non_blank(v)?;
            if is_reserved_key(k) {
                debug!(key = k, "dropping reserved extra config key");
                return None;
            }
            Some((k.to_string(), v.to_string()))
        })
        .collect();
    def
}

/// Stage 2: replace registered plugin names with their versioned JAR
/// filenames; unknown names pass through as literals.
fn normalize_plugins(mut def: FlinkClusterDef) -> FlinkClusterDef {
    let ver = def.flink_ver.clone();
    def.built_in_plugins = def
        .built_in_plugins
        .iter()
        .filter_map(|name| pathx::non_blank(name))
        .map(|name| match plugins::lookup(name) {
            Some(plugin) => plugins::jar_name(plugin, &ver),
            None => name.to_string(),
        })
        .collect();
    def
}

/// Stage 3: force every S3-family storage path to the `s3p://` scheme.
fn rewrite_s3_paths(mut def: FlinkClusterDef) -> FlinkClusterDef {
    def.map_storage_paths(pathx::revise_to_s3p_schema);
    def
}

/// Whether any storage path of the definition lives on S3.
pub fn is_s3_required(def: &FlinkClusterDef) -> bool {
    let backend_on_s3 = def.state_backend.as_ref().is_some_and(|sb| {
        sb.checkpoint_dir.as_deref().is_some_and(pathx::is_s3_path)
            || sb.savepoint_dir.as_deref().is_some_and(pathx::is_s3_path)
    });
    let ha_on_s3 = def.jm_ha.as_ref().is_some_and(|ha| pathx::is_s3_path(&ha.storage_dir));
    let deps_on_s3 = def.injected_deps.iter().any(|d| pathx::is_s3_path(d));
    let jar_on_s3 = def.app().is_some_and(|app| pathx::is_s3_path(&app.job_jar));
    backend_on_s3 || ha_on_s3 || deps_on_s3 || jar_on_s3
}

/// Stage 4: auto-include the S3 filesystem plugins the resolved paths need.
fn ensure_s3_plugins(mut def: FlinkClusterDef) -> FlinkClusterDef {
    let mut set: BTreeSet<String> = def.built_in_plugins.clone();
    if is_s3_required(&def) && !set.iter().any(|e| plugins::jar_matches(e, plugins::S3_PRESTO)) {
        set.insert(plugins::jar_name(plugins::S3_PRESTO, &def.flink_ver));
    }
    if def.s3.is_some() && !set.iter().any(|e| plugins::jar_matches(e, plugins::S3_HADOOP)) {
        set.insert(plugins::jar_name(plugins::S3_HADOOP, &def.flink_ver));
    }
    def.built_in_plugins = set;
    def
}

/// Stage 5: reserved for Hadoop plugin handling; currently identity.
fn ensure_hadoop_plugins(def: FlinkClusterDef) -> FlinkClusterDef {
    def
}
