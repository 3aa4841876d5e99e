//! Finback cluster-definition resolver: typed raw-config fragments, the
//! revise pipeline and emission of the launcher-facing Flink configuration.

#![forbid(unsafe_code)]

pub mod def;
pub mod emit;
pub mod error;
pub mod fragments;
pub mod opconf;
pub mod plugins;
pub mod raw;
pub mod revise;

pub use def::{AppDef, ClusterKind, ExecMode, FlinkClusterDef, RestExportType};
pub use emit::{to_flink_raw_config, CONTAINER_LIB_DIR};
pub use error::{EmitError, ReviseError};
pub use opconf::{AccessStyle, FlinkConf, OperatorConf, S3Conf};
pub use raw::{Configuration, RawValue};
pub use revise::{is_reserved_key, is_s3_required, revise, RESERVED_KEYS};
