//! Kubernetes Pod template generation. Either an override YAML supplied by
//! the definition, or a synthesized pod carrying the side-car volumes and,
//! when user libraries live on S3, a MinIO-client init container that stages
//! them under `/opt/flink/lib` before the main container starts.

use crate::error::DeployError;
use finback_conf::{FlinkClusterDef, OperatorConf, CONTAINER_LIB_DIR};
use finback_core::pathx;
use k8s_openapi::api::core::v1::{
    Container, EmptyDirVolumeSource, HostPathVolumeSource, Pod, PodSpec, Volume, VolumeMount,
};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use std::path::Path;
use tracing::debug;

pub const POD_TEMPLATE_NAME: &str = "pod-template";
pub const MAIN_CONTAINER: &str = "flink-main-container";
pub const USERLIB_LOADER: &str = "userlib-loader";

const VOLUME_HOSTPATH: &str = "flink-volume-hostpath";
const VOLUME_LIBS: &str = "flink-libs";
const VOLUME_LOGS: &str = "flink-logs";

/// User libraries the init container must stage: S3 injected deps plus the
/// application job jar when it lives on S3 (the emitted `pipeline.jars`
/// points into the container lib dir for it).
fn s3_user_libs(def: &FlinkClusterDef) -> Vec<String> {
    let mut libs: Vec<String> = def
        .injected_deps
        .iter()
        .filter(|d| pathx::is_s3_path(d))
        .cloned()
        .collect();
    if let Some(app) = def.app() {
        if pathx::is_s3_path(&app.job_jar) && !libs.contains(&app.job_jar) {
            libs.push(app.job_jar.clone());
        }
    }
    libs
}

/// Resolve the pod template for a definition. An override template wins;
/// otherwise the pod is synthesized.
pub fn resolve(def: &FlinkClusterDef, conf: &OperatorConf) -> Result<Pod, DeployError> {
    if let Some(yaml) = &def.override_pod_template {
        return serde_yaml::from_str(yaml)
            .map_err(|e| DeployError::DecodePodTemplateYaml(e.to_string()));
    }

    let libs = s3_user_libs(def);

    let volumes = vec![
        Volume {
            name: VOLUME_HOSTPATH.to_string(),
            host_path: Some(HostPathVolumeSource {
                path: "/tmp".to_string(),
                type_: Some("Directory".to_string()),
            }),
            ..Volume::default()
        },
        Volume {
            name: VOLUME_LIBS.to_string(),
            empty_dir: Some(EmptyDirVolumeSource::default()),
            ..Volume::default()
        },
        Volume {
            name: VOLUME_LOGS.to_string(),
            empty_dir: Some(EmptyDirVolumeSource::default()),
            ..Volume::default()
        },
    ];

    let init_containers = if libs.is_empty() {
        None
    } else {
        let mut steps = vec![format!(
            "mc alias set minio {} {} {}",
            conf.s3.endpoint, conf.s3.access_key, conf.s3.secret_key
        )];
        for lib in &libs {
            steps.push(format!(
                "mc cp minio/{} {}/{}",
                conf.s3.revise_path(lib),
                CONTAINER_LIB_DIR,
                pathx::basename(lib)
            ));
        }
        Some(vec![Container {
            name: USERLIB_LOADER.to_string(),
            image: Some(conf.flink.mc_image.clone()),
            command: Some(vec!["sh".to_string(), "-c".to_string(), steps.join(" && ")]),
            volume_mounts: Some(vec![VolumeMount {
                name: VOLUME_LIBS.to_string(),
                mount_path: CONTAINER_LIB_DIR.to_string(),
                ..VolumeMount::default()
            }]),
            ..Container::default()
        }])
    };

    let mut main_mounts = vec![
        VolumeMount {
            name: VOLUME_HOSTPATH.to_string(),
            mount_path: "/opt/flink/volume".to_string(),
            ..VolumeMount::default()
        },
        VolumeMount {
            name: VOLUME_LOGS.to_string(),
            mount_path: "/opt/flink/log".to_string(),
            ..VolumeMount::default()
        },
    ];
    for lib in &libs {
        let base = pathx::basename(lib).to_string();
        main_mounts.push(VolumeMount {
            name: VOLUME_LIBS.to_string(),
            mount_path: format!("{}/{}", CONTAINER_LIB_DIR, base),
            sub_path: Some(base),
            ..VolumeMount::default()
        });
    }

    let pod = Pod {
        metadata: ObjectMeta { name: Some(POD_TEMPLATE_NAME.to_string()), ..ObjectMeta::default() },
        spec: Some(PodSpec {
            volumes: Some(volumes),
            init_containers,
            containers: vec![Container {
                name: MAIN_CONTAINER.to_string(),
                volume_mounts: Some(main_mounts),
                ..Container::default()
            }],
            ..PodSpec::default()
        }),
        status: None,
    };
    debug!(fcid = %def.fcid, s3_libs = libs.len(), "pod template synthesized");
    Ok(pod)
}

/// Serialize the pod as YAML and write it: any existing file is removed
/// first, then the fresh content lands in one write.
pub async fn dump(pod: &Pod, path: &Path) -> Result<(), DeployError> {
    let yaml =
        serde_yaml::to_string(pod).map_err(|e| DeployError::EncodePodTemplateYaml(e.to_string()))?;
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(DeployError::io(format!("creating {}", parent.display())))?;
    }
    match tokio::fs::remove_file(path).await {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => return Err(DeployError::io(format!("removing {}", path.display()))(e)),
    }
    tokio::fs::write(path, yaml)
        .await
        .map_err(DeployError::io(format!("writing {}", path.display())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use finback_conf::{revise, AppDef};
    use finback_core::{Fcid, FlinkVer};

    fn def_with_s3_jar() -> FlinkClusterDef {
        let mut def = FlinkClusterDef::application(
            Fcid::new("c1", "ns1"),
            "flink:1.17",
            FlinkVer::new("1.17.2"),
            AppDef {
                job_jar: "s3://b/app.jar".into(),
                job_name: "app".into(),
                app_main: None,
                app_args: vec![],
                restore: None,
            },
        );
        def.injected_deps.insert("s3://b/udf.jar".into());
        def.injected_deps.insert("local:///opt/libs/extra.jar".into());
        revise(def).unwrap()
    }

    #[test]
    fn synthesized_pod_has_volumes_and_loader() {
        let pod = resolve(&def_with_s3_jar(), &OperatorConf::default()).unwrap();
        assert_eq!(pod.metadata.name.as_deref(), Some("pod-template"));
        let spec = pod.spec.unwrap();

        let volumes = spec.volumes.unwrap();
        let names: Vec<_> = volumes.iter().map(|v| v.name.as_str()).collect();
        assert_eq!(names, vec!["flink-volume-hostpath", "flink-libs", "flink-logs"]);
        assert_eq!(volumes[0].host_path.as_ref().unwrap().path, "/tmp");

        let init = &spec.init_containers.unwrap()[0];
        assert_eq!(init.name, "userlib-loader");
        assert_eq!(init.image.as_deref(), Some("minio/mc"));
        let script = &init.command.as_ref().unwrap()[2];
        assert!(script.starts_with("mc alias set minio http://minio:9000"));
        // Bucket placement goes through the operator's addressing style.
        assert!(script.contains("mc cp minio/b/udf.jar /opt/flink/lib/udf.jar"));
        assert!(script.contains("mc cp minio/b/app.jar /opt/flink/lib/app.jar"));
        // Non-S3 deps are not staged.
        assert!(!script.contains("extra.jar"));

        let main = &spec.containers[0];
        assert_eq!(main.name, "flink-main-container");
        let mounts = main.volume_mounts.as_ref().unwrap();
        assert!(mounts
            .iter()
            .any(|m| m.name == "flink-volume-hostpath" && m.mount_path == "/opt/flink/volume"));
        assert!(mounts.iter().any(|m| m.name == "flink-logs" && m.mount_path == "/opt/flink/log"));
        assert!(mounts.iter().any(|m| {
            m.name == "flink-libs"
                && m.mount_path == "/opt/flink/lib/app.jar"
                && m.sub_path.as_deref() == Some("app.jar")
        }));
    }

    #[test]
    fn pod_without_s3_libs_has_no_init_container() {
        let def = revise(FlinkClusterDef::session(
            Fcid::new("s1", "ns1"),
            "flink:1.17",
            FlinkVer::new("1.17.2"),
        ))
        .unwrap();
        let pod = resolve(&def, &OperatorConf::default()).unwrap();
        assert!(pod.spec.unwrap().init_containers.is_none());
    }

    #[test]
    fn override_template_wins() {
        let mut def = def_with_s3_jar();
        def.override_pod_template = Some(
            "apiVersion: v1\nkind: Pod\nmetadata:\n  name: custom\nspec:\n  containers: []\n"
                .to_string(),
        );
        let pod = resolve(&def, &OperatorConf::default()).unwrap();
        assert_eq!(pod.metadata.name.as_deref(), Some("custom"));
    }

    #[test]
    fn bad_override_template_is_a_decode_error() {
        let mut def = def_with_s3_jar();
        def.override_pod_template = Some(":::not yaml".to_string());
        let err = resolve(&def, &OperatorConf::default()).unwrap_err();
        assert!(matches!(err, DeployError::DecodePodTemplateYaml(_)));
    }

    #[tokio::test]
    async fn dump_replaces_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("flink-podtemplate.yaml");
        tokio::fs::write(&path, "stale").await.unwrap();

        let pod = resolve(&def_with_s3_jar(), &OperatorConf::default()).unwrap();
        dump(&pod, &path).await.unwrap();

        let content = tokio::fs::read_to_string(&path).await.unwrap();
        assert!(content.contains("pod-template"));
        assert!(!content.contains("stale"));
        // Null fields stay out of the dumped YAML.
        assert!(!content.contains("status:"));
        let parsed: Pod = serde_yaml::from_str(&content).unwrap();
        assert_eq!(parsed.metadata.name.as_deref(), Some("pod-template"));
    }
}
