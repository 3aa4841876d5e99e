//! End-to-end resolver checks: revise + emission against representative
//! cluster definitions, plus property checks for elision and guards.

use finback_conf::fragments::{
    CheckpointStorageType, CpuConf, JmHaConf, MemConf, ParConf, StateBackendConf, StateBackendType,
};
use finback_conf::{
    is_s3_required, revise, to_flink_raw_config, AppDef, FlinkClusterDef, OperatorConf,
};
use finback_core::{Fcid, FlinkVer};
use proptest::prelude::*;

fn pota() -> OperatorConf {
    let mut conf = OperatorConf::default();
    conf.flink.k8s_account = "flink-opr".to_string();
    conf
}

fn s3_app_def() -> FlinkClusterDef {
    let mut def = FlinkClusterDef::application(
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
    );
    def.jm_ha = Some(JmHaConf::kubernetes("s3://b/ha"));
    def
}

#[test]
fn resolves_application_cluster_with_s3_job_jar() {
    let def = revise(s3_app_def()).unwrap();
    assert!(is_s3_required(&def));
    let cfg = to_flink_raw_config(&def, &pota()).unwrap();

    assert_eq!(cfg.get("execution.target"), Some("kubernetes-application"));
    assert_eq!(cfg.get("kubernetes.cluster-id"), Some("c1"));
    assert_eq!(cfg.get("kubernetes.namespace"), Some("ns1"));
    assert_eq!(cfg.get("kubernetes.container.image"), Some("flink:1.17"));
    assert_eq!(cfg.get("kubernetes.jobmanager.service-account"), Some("flink-opr"));
    assert_eq!(cfg.get("blob.server.port"), Some("6124"));
    assert_eq!(cfg.get("taskmanager.rpc.port"), Some("6122"));
    assert_eq!(cfg.get("pipeline.jars"), Some("local:///opt/flink/lib/app.jar"));
    assert_eq!(cfg.get("pipeline.name"), Some("app"));
    assert_eq!(cfg.get("$internal.application.main"), Some("M"));
    assert_eq!(cfg.get("$internal.application.program-args"), Some("-x"));
    assert_eq!(cfg.get("high-availability.storageDir"), Some("s3p://b/ha"));
    let plugins = cfg.get("containerized.master.env.ENABLE_BUILT_IN_PLUGINS").unwrap();
    assert!(plugins.contains("flink-s3-fs-presto-1.17.2.jar"));
    assert_eq!(
        cfg.get("containerized.taskmanager.env.ENABLE_BUILT_IN_PLUGINS"),
        Some(plugins)
    );
    // The operator's S3 access rides along in presto form.
    assert_eq!(cfg.get("hive.s3.endpoint"), Some("http://minio:9000"));
}

#[test]
fn reserved_key_override_is_discarded() {
    let mut def = s3_app_def();
    def.ext_raw_configs.insert("execution.target".into(), "hacked".into());
    def.ext_raw_configs.insert("parallelism.max".into(), "64".into());
    let def = revise(def).unwrap();
    let cfg = to_flink_raw_config(&def, &pota()).unwrap();
    assert_eq!(cfg.get("execution.target"), Some("kubernetes-application"));
    assert_eq!(cfg.get("parallelism.max"), Some("64"));
}

#[test]
fn ext_raw_configs_win_over_defaults() {
    let mut def = s3_app_def();
    def.ext_raw_configs.insert("web.submit.enable".into(), "false".into());
    let def = revise(def).unwrap();
    let cfg = to_flink_raw_config(&def, &pota()).unwrap();
    assert_eq!(cfg.get("web.submit.enable"), Some("false"));
}

#[test]
fn session_cluster_has_no_application_extras() {
    let def = revise(FlinkClusterDef::session(
        Fcid::new("s1", "ns1"),
        "flink:1.17",
        FlinkVer::new("1.17.2"),
    ))
    .unwrap();
    let cfg = to_flink_raw_config(&def, &pota()).unwrap();
    assert_eq!(cfg.get("execution.target"), Some("kubernetes-session"));
    assert!(!cfg.contains_key("pipeline.jars"));
    assert!(!cfg.contains_key("pipeline.name"));
    assert!(!cfg.contains_key("$internal.application.main"));
    // No S3 anywhere, so no plugin env and no presto access keys.
    assert!(!cfg.contains_key("containerized.master.env.ENABLE_BUILT_IN_PLUGINS"));
    assert!(!cfg.contains_key("hive.s3.endpoint"));
}

#[test]
fn non_s3_job_jar_is_emitted_verbatim() {
    let mut def = s3_app_def();
    if let finback_conf::ClusterKind::Application(app) = &mut def.kind {
        app.job_jar = "local:///opt/flink/usrlib/app.jar".into();
    }
    def.jm_ha = None;
    let def = revise(def).unwrap();
    assert!(!is_s3_required(&def));
    let cfg = to_flink_raw_config(&def, &pota()).unwrap();
    assert_eq!(cfg.get("pipeline.jars"), Some("local:///opt/flink/usrlib/app.jar"));
    assert!(!cfg.contains_key("hive.s3.endpoint"));
}

proptest! {
    /// Revise is idempotent for arbitrary plugin names, extra configs and
    /// storage paths.
    #[test]
    fn revise_is_idempotent(
        plugin in "[a-z][a-z0-9-]{0,16}",
        key in "[a-z][a-z0-9.-]{0,24}",
        value in "[ ]{0,2}[a-z0-9]{0,8}[ ]{0,2}",
        dep in "(s3|s3a|s3p|hdfs)://b/[a-z]{1,8}\\.jar",
    ) {
        let mut def = s3_app_def();
        def.built_in_plugins.insert(plugin);
        def.ext_raw_configs.insert(key, value);
        def.injected_deps.insert(dep);
        let once = revise(def).unwrap();
        let twice = revise(once.clone()).unwrap();
        prop_assert_eq!(once, twice);
    }

    /// No emitted value is ever empty, and guarded numerics respect their
    /// minimums, whatever the input fields were.
    #[test]
    fn emitted_values_are_non_empty_and_guarded(
        jm in -4.0f64..4.0,
        tm in -4.0f64..4.0,
        jm_mb in -1024i64..8192,
        tm_mb in -1024i64..8192,
        slots in -4i64..16,
        par in -4i64..16,
        retained in -4i64..8,
    ) {
        let mut def = s3_app_def();
        def.cpu = CpuConf { jm, tm, jm_factor: jm, tm_factor: tm };
        def.mem = MemConf { jm_mb, tm_mb };
        def.par = ParConf { num_of_slot: slots, par_default: par };
        def.state_backend = Some(StateBackendConf {
            backend_type: StateBackendType::Rocksdb,
            checkpoint_storage: CheckpointStorageType::Filesystem,
            checkpoint_dir: Some("s3://b/ckp".into()),
            savepoint_dir: None,
            incremental: true,
            local_recovery: false,
            checkpoint_num_retained: retained,
        });
        let def = revise(def).unwrap();
        let cfg = to_flink_raw_config(&def, &pota()).unwrap();
        for (k, v) in cfg.iter() {
            prop_assert!(!v.trim().is_empty(), "empty value for key {}", k);
        }
        let slots_v: i64 = cfg.get("taskmanager.numberOfTaskSlots").unwrap().parse().unwrap();
        prop_assert!(slots_v >= 1);
        let par_v: i64 = cfg.get("parallelism.default").unwrap().parse().unwrap();
        prop_assert!(par_v >= 1);
        let retained_v: i64 = cfg.get("state.checkpoints.num-retained").unwrap().parse().unwrap();
        prop_assert!(retained_v >= 1);
        let cpu_v: f64 = cfg.get("kubernetes.taskmanager.cpu").unwrap().parse().unwrap();
        prop_assert!(cpu_v > 0.0);
        prop_assert_eq!(cfg.get("state.checkpoints.dir"), Some("s3p://b/ckp"));
    }
}
