//! Path-scheme rules for object-storage locations, plus the numeric guards
//! used by the raw-config fragments.

/// URI schemes treated as S3-family storage.
pub const S3_SCHEMES: [&str; 4] = ["s3", "s3a", "s3n", "s3p"];

/// Scheme prefix of `path` (the part before `://`), if any.
pub fn scheme_of(path: &str) -> Option<&str> {
    path.split_once("://").map(|(scheme, _)| scheme)
}

/// Whether `path` points at S3-family storage.
pub fn is_s3_path(path: &str) -> bool {
    matches!(scheme_of(path), Some(s) if S3_SCHEMES.contains(&s))
}

/// Strip the scheme prefix and any leading slashes: `s3://b/x` -> `b/x`.
pub fn pure_path(path: &str) -> String {
    let rest = match path.split_once("://") {
        Some((_, rest)) => rest,
        None => path,
    };
    rest.trim_start_matches('/').to_string()
}

/// Force the scheme of an S3-family path to `s3p`; other paths are untouched.
pub fn revise_to_s3p_schema(path: &str) -> String {
    if is_s3_path(path) {
        format!("s3p://{}", pure_path(path))
    } else {
        path.to_string()
    }
}

/// Last path segment after the final `/` (the whole input when it has none).
pub fn basename(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}

/// `v` when strictly positive, otherwise `fallback`.
pub fn pos_or(v: f64, fallback: f64) -> f64 {
    if v > 0.0 {
        v
    } else {
        fallback
    }
}

/// `v` when strictly positive, otherwise `fallback`.
pub fn pos_or_i64(v: i64, fallback: i64) -> i64 {
    if v > 0 {
        v
    } else {
        fallback
    }
}

/// Lower-bound `v` to `min`.
pub fn at_least(v: i64, min: i64) -> i64 {
    v.max(min)
}

/// Trimmed `s` when non-blank.
pub fn non_blank(s: &str) -> Option<&str> {
    let t = s.trim();
    if t.is_empty() {
        None
    } else {
        Some(t)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recognizes_s3_family_schemes() {
        assert!(is_s3_path("s3://b/x.jar"));
        assert!(is_s3_path("s3a://b/x.jar"));
        assert!(is_s3_path("s3n://b/x.jar"));
        assert!(is_s3_path("s3p://b/x.jar"));
        assert!(!is_s3_path("hdfs://b/x.jar"));
        assert!(!is_s3_path("/opt/flink/lib/x.jar"));
        assert!(!is_s3_path("file:///x.jar"));
    }

    #[test]
    fn pure_path_strips_scheme_and_leading_slashes() {
        assert_eq!(pure_path("s3://b/app.jar"), "b/app.jar");
        assert_eq!(pure_path("s3p:///b/app.jar"), "b/app.jar");
        assert_eq!(pure_path("/b/app.jar"), "b/app.jar");
        assert_eq!(pure_path("b/app.jar"), "b/app.jar");
    }

    #[test]
    fn s3p_rewrite_only_touches_s3_paths() {
        assert_eq!(revise_to_s3p_schema("s3://b/ha"), "s3p://b/ha");
        assert_eq!(revise_to_s3p_schema("s3a://b/ha"), "s3p://b/ha");
        assert_eq!(revise_to_s3p_schema("s3p://b/ha"), "s3p://b/ha");
        assert_eq!(revise_to_s3p_schema("hdfs://b/ha"), "hdfs://b/ha");
        assert_eq!(revise_to_s3p_schema("/local/ha"), "/local/ha");
    }

    #[test]
    fn basename_takes_last_segment() {
        assert_eq!(basename("s3://b/dir/app.jar"), "app.jar");
        assert_eq!(basename("app.jar"), "app.jar");
        assert_eq!(basename("/tmp/flink-web/uploaded.jar"), "uploaded.jar");
    }

    #[test]
    fn guards_clamp_to_declared_minimums() {
        assert_eq!(pos_or(0.0, 1.0), 1.0);
        assert_eq!(pos_or(-2.5, 1.0), 1.0);
        assert_eq!(pos_or(0.5, 1.0), 0.5);
        assert_eq!(pos_or_i64(0, 1920), 1920);
        assert_eq!(pos_or_i64(2048, 1920), 2048);
        assert_eq!(at_least(0, 1), 1);
        assert_eq!(at_least(8, 1), 8);
        assert_eq!(non_blank("  "), None);
        assert_eq!(non_blank(" x "), Some("x"));
    }
}
