//! Registry of Flink-distributed built-in plugins, selectable by base name
//! and versioned into their shipped JAR filenames.

use finback_core::FlinkVer;

pub const S3_PRESTO: &str = "flink-s3-fs-presto";
pub const S3_HADOOP: &str = "flink-s3-fs-hadoop";

const REGISTRY: &[&str] = &[
    S3_PRESTO,
    S3_HADOOP,
    "flink-azure-fs-hadoop",
    "flink-gs-fs-hadoop",
    "flink-oss-fs-hadoop",
];

/// Look up a plugin by its base name.
pub fn lookup(name: &str) -> Option<&'static str> {
    REGISTRY.iter().copied().find(|p| *p == name)
}

/// Filename of the JAR Flink ships for `plugin` at `ver`.
pub fn jar_name(plugin: &str, ver: &FlinkVer) -> String {
    format!("{}-{}.jar", plugin, ver)
}

/// Whether `entry` is a versioned JAR of `plugin` (any version).
pub fn jar_matches(entry: &str, plugin: &str) -> bool {
    entry.strip_prefix(plugin).is_some_and(|rest| rest.starts_with('-') && rest.ends_with(".jar"))
}
