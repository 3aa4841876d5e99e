//! Typed cluster-configuration fragments, each exposing its ordered Flink
//! key/value pairs via `raw_mapping`. Numeric guards apply at emission so an
//! out-of-range field never reaches the launcher.

use crate::raw::{RawMapping, RawValue};
use finback_core::pathx::{at_least, pos_or, pos_or_i64};
use serde::{Deserialize, Serialize};
use std::fmt;

/// CPU shares for jobmanager/taskmanager containers. Non-positive fields fall
/// back to 1.0.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CpuConf {
    pub jm: f64,
    pub tm: f64,
    pub jm_factor: f64,
    pub tm_factor: f64,
}

impl Default for CpuConf {
    fn default() -> Self {
        Self { jm: 1.0, tm: 1.0, jm_factor: 1.0, tm_factor: 1.0 }
    }
}

impl CpuConf {
    pub fn raw_mapping(&self) -> RawMapping {
        // The duplicated taskmanager key is kept for parity with existing
        // deployments; the later value wins.
        vec![
            ("kubernetes.taskmanager.cpu", RawValue::F64(pos_or(self.jm, 1.0))),
            ("kubernetes.jobmanager.cpu.limit-factor", RawValue::F64(pos_or(self.jm_factor, 1.0))),
            ("kubernetes.taskmanager.cpu", RawValue::F64(pos_or(self.tm, 1.0))),
            ("kubernetes.taskmanager.cpu.limit-factor", RawValue::F64(pos_or(self.tm_factor, 1.0))),
        ]
    }
}

/// Process memory in MiB. Non-positive fields fall back to 1920.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemConf {
    pub jm_mb: i64,
    pub tm_mb: i64,
}

impl Default for MemConf {
    fn default() -> Self {
        Self { jm_mb: 1920, tm_mb: 1920 }
    }
}

impl MemConf {
    pub fn raw_mapping(&self) -> RawMapping {
        vec![
            ("jobmanager.memory.process.size", RawValue::Str(format!("{}m", pos_or_i64(self.jm_mb, 1920)))),
            ("taskmanager.memory.process.size", RawValue::Str(format!("{}m", pos_or_i64(self.tm_mb, 1920)))),
        ]
    }
}

/// Slot count and default parallelism, both lower-bounded to 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParConf {
    pub num_of_slot: i64,
    pub par_default: i64,
}

impl Default for ParConf {
    fn default() -> Self {
        Self { num_of_slot: 1, par_default: 1 }
    }
}

impl ParConf {
    pub fn raw_mapping(&self) -> RawMapping {
        vec![
            ("taskmanager.numberOfTaskSlots", RawValue::I64(at_least(self.num_of_slot, 1))),
            ("parallelism.default", RawValue::I64(at_least(self.par_default, 1))),
        ]
    }
}

/// Web UI submit/cancel toggles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebUIConf {
    pub enable_submit: bool,
    pub enable_cancel: bool,
}

impl Default for WebUIConf {
    fn default() -> Self {
        Self { enable_submit: true, enable_cancel: true }
    }
}

impl WebUIConf {
    pub fn raw_mapping(&self) -> RawMapping {
        vec![
            ("web.submit.enable", RawValue::Bool(self.enable_submit)),
            ("web.cancel.enable", RawValue::Bool(self.enable_cancel)),
        ]
    }
}

/// Job restart strategy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RestartStgConf {
    NonRestart,
    FixedDelay { attempts: i64, delay_sec: i64 },
    FailureRate { delay_sec: i64, failure_rate_interval_sec: i64, max_failures_per_interval: i64 },
}

impl Default for RestartStgConf {
    fn default() -> Self {
        RestartStgConf::NonRestart
    }
}

impl RestartStgConf {
    pub fn raw_mapping(&self) -> RawMapping {
        match self {
            RestartStgConf::NonRestart => vec![("restart-strategy", RawValue::from("none"))],
            RestartStgConf::FixedDelay { attempts, delay_sec } => vec![
                ("restart-strategy", RawValue::from("fixed-delay")),
                ("restart-strategy.fixed-delay.attempts", RawValue::I64(at_least(*attempts, 1))),
                ("restart-strategy.fixed-delay.delay", RawValue::Str(format!("{}s", at_least(*delay_sec, 1)))),
            ],
            RestartStgConf::FailureRate {
                delay_sec,
                failure_rate_interval_sec,
                max_failures_per_interval,
            } => vec![
                ("restart-strategy", RawValue::from("failure-rate")),
                ("restart-strategy.failure-rate.delay", RawValue::Str(format!("{}s", at_least(*delay_sec, 1)))),
                (
                    "restart-strategy.failure-rate.failure-rate-interval",
                    RawValue::Str(format!("{}s", at_least(*failure_rate_interval_sec, 1))),
                ),
                (
                    "restart-strategy.failure-rate.max-failures-per-interval",
                    RawValue::I64(at_least(*max_failures_per_interval, 1)),
                ),
            ],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StateBackendType {
    Hashmap,
    Rocksdb,
}

impl fmt::Display for StateBackendType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StateBackendType::Hashmap => f.write_str("hashmap"),
            StateBackendType::Rocksdb => f.write_str("rocksdb"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CheckpointStorageType {
    Jobmanager,
    Filesystem,
}

impl fmt::Display for CheckpointStorageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CheckpointStorageType::Jobmanager => f.write_str("jobmanager"),
            CheckpointStorageType::Filesystem => f.write_str("filesystem"),
        }
    }
}

/// State backend and checkpointing layout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateBackendConf {
    pub backend_type: StateBackendType,
    pub checkpoint_storage: CheckpointStorageType,
    pub checkpoint_dir: Option<String>,
    pub savepoint_dir: Option<String>,
    pub incremental: bool,
    pub local_recovery: bool,
    pub checkpoint_num_retained: i64,
}

impl StateBackendConf {
    pub fn raw_mapping(&self) -> RawMapping {
        vec![
            ("state.backend", RawValue::Str(self.backend_type.to_string())),
            ("state.checkpoint-storage", RawValue::Str(self.checkpoint_storage.to_string())),
            ("state.checkpoints.dir", RawValue::OptStr(self.checkpoint_dir.clone())),
            ("state.savepoints.dir", RawValue::OptStr(self.savepoint_dir.clone())),
            ("state.backend.incremental", RawValue::Bool(self.incremental)),
            ("state.backend.local-recovery", RawValue::Bool(self.local_recovery)),
            ("state.checkpoints.num-retained", RawValue::I64(at_least(self.checkpoint_num_retained, 1))),
        ]
    }
}

/// Jobmanager high availability.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JmHaConf {
    pub ha_impl_clz: String,
    pub storage_dir: String,
    pub cluster_id: Option<String>,
}

impl JmHaConf {
    pub fn kubernetes(storage_dir: impl Into<String>) -> Self {
        Self {
            ha_impl_clz: "org.apache.flink.kubernetes.highavailability.KubernetesHaServicesFactory"
                .to_string(),
            storage_dir: storage_dir.into(),
            cluster_id: None,
        }
    }

    pub fn raw_mapping(&self) -> RawMapping {
        vec![
            ("high-availability", RawValue::Str(self.ha_impl_clz.clone())),
            ("high-availability.storageDir", RawValue::Str(self.storage_dir.clone())),
            ("high-availability.cluster-id", RawValue::OptStr(self.cluster_id.clone())),
        ]
    }
}

/// S3 access settings attached to a cluster definition. Two emission flavors:
/// presto (`hive.s3.*`) and hadoop (`fs.s3a.*`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct S3AccessConf {
    pub endpoint: String,
    pub access_key: String,
    pub secret_key: String,
    pub path_style_access: Option<bool>,
    pub ssl_enabled: Option<bool>,
}

impl S3AccessConf {
    pub fn raw_mapping_s3p(&self) -> RawMapping {
        vec![
            ("hive.s3.endpoint", RawValue::Str(self.endpoint.clone())),
            ("hive.s3.aws-access-key", RawValue::Str(self.access_key.clone())),
            ("hive.s3.aws-secret-key", RawValue::Str(self.secret_key.clone())),
            ("hive.s3.path-style-access", RawValue::OptBool(self.path_style_access)),
            ("hive.s3.ssl.enabled", RawValue::OptBool(self.ssl_enabled)),
        ]
    }

    pub fn raw_mapping_s3a(&self) -> RawMapping {
        vec![
            ("fs.s3a.endpoint", RawValue::Str(self.endpoint.clone())),
            ("fs.s3a.access.key", RawValue::Str(self.access_key.clone())),
            ("fs.s3a.secret.key", RawValue::Str(self.secret_key.clone())),
            ("fs.s3a.path.style.access", RawValue::OptBool(self.path_style_access)),
            ("fs.s3a.connection.ssl.enabled", RawValue::OptBool(self.ssl_enabled)),
        ]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RestoreMode {
    Claim,
    NoClaim,
    Legacy,
}

impl fmt::Display for RestoreMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RestoreMode::Claim => f.write_str("CLAIM"),
            RestoreMode::NoClaim => f.write_str("NO_CLAIM"),
            RestoreMode::Legacy => f.write_str("LEGACY"),
        }
    }
}

/// Savepoint restore settings for an application cluster.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SavepointRestoreConf {
    pub path: String,
    pub allow_non_restored_state: bool,
    pub mode: RestoreMode,
}

impl SavepointRestoreConf {
    pub fn raw_mapping(&self) -> RawMapping {
        vec![
            ("execution.savepoint.path", RawValue::Str(self.path.clone())),
            ("execution.savepoint.ignore-unclaimed-state", RawValue::Bool(self.allow_non_restored_state)),
            ("execution.savepoint-restore-mode", RawValue::Str(self.mode.to_string())),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::raw::Configuration;

    #[test]
    fn cpu_duplicate_key_last_write_wins() {
        let cpu = CpuConf { jm: 2.0, tm: 4.0, jm_factor: 1.0, tm_factor: 1.0 };
        let mut c = Configuration::new();
        c.append_all(cpu.raw_mapping());
        assert_eq!(c.get("kubernetes.taskmanager.cpu"), Some("4"));
        assert_eq!(c.get("kubernetes.jobmanager.cpu.limit-factor"), Some("1"));
    }

    #[test]
    fn cpu_guards_default_to_one() {
        let cpu = CpuConf { jm: 0.0, tm: -1.0, jm_factor: 0.0, tm_factor: 0.0 };
        let mut c = Configuration::new();
        c.append_all(cpu.raw_mapping());
        assert_eq!(c.get("kubernetes.taskmanager.cpu"), Some("1"));
        assert_eq!(c.get("kubernetes.taskmanager.cpu.limit-factor"), Some("1"));
    }

    #[test]
    fn mem_guards_default_to_1920() {
        let mem = MemConf { jm_mb: 0, tm_mb: 4096 };
        let mut c = Configuration::new();
        c.append_all(mem.raw_mapping());
        assert_eq!(c.get("jobmanager.memory.process.size"), Some("1920m"));
        assert_eq!(c.get("taskmanager.memory.process.size"), Some("4096m"));
    }

    #[test]
    fn state_backend_elides_empty_dirs() {
        let sb = StateBackendConf {
            backend_type: StateBackendType::Hashmap,
            checkpoint_storage: CheckpointStorageType::Jobmanager,
            checkpoint_dir: None,
            savepoint_dir: Some(String::new()),
            incremental: false,
            local_recovery: false,
            checkpoint_num_retained: 0,
        };
        let mut c = Configuration::new();
        c.append_all(sb.raw_mapping());
        assert_eq!(c.get("state.backend"), Some("hashmap"));
        assert_eq!(c.get("state.checkpoint-storage"), Some("jobmanager"));
        assert_eq!(c.get("state.backend.incremental"), Some("false"));
        assert_eq!(c.get("state.backend.local-recovery"), Some("false"));
        assert_eq!(c.get("state.checkpoints.num-retained"), Some("1"));
        assert!(!c.contains_key("state.checkpoints.dir"));
        assert!(!c.contains_key("state.savepoints.dir"));
    }

    #[test]
    fn restart_strategy_variants() {
        let mut c = Configuration::new();
        c.append_all(RestartStgConf::NonRestart.raw_mapping());
        assert_eq!(c.get("restart-strategy"), Some("none"));

        let mut c = Configuration::new();
        c.append_all(RestartStgConf::FixedDelay { attempts: 0, delay_sec: 3 }.raw_mapping());
        assert_eq!(c.get("restart-strategy.fixed-delay.attempts"), Some("1"));
        assert_eq!(c.get("restart-strategy.fixed-delay.delay"), Some("3s"));
    }

    #[test]
    fn s3_access_flavors() {
        let s3 = S3AccessConf {
            endpoint: "http://minio:9000".into(),
            access_key: "ak".into(),
            secret_key: "sk".into(),
            path_style_access: Some(true),
            ssl_enabled: None,
        };
        let mut c = Configuration::new();
        c.append_all(s3.raw_mapping_s3p());
        assert_eq!(c.get("hive.s3.endpoint"), Some("http://minio:9000"));
        assert_eq!(c.get("hive.s3.path-style-access"), Some("true"));
        assert!(!c.contains_key("hive.s3.ssl.enabled"));

        let mut c = Configuration::new();
        c.append_all(s3.raw_mapping_s3a());
        assert_eq!(c.get("fs.s3a.access.key"), Some("ak"));
        assert!(!c.contains_key("fs.s3a.connection.ssl.enabled"));
    }
}
