//! Per-cluster local workspaces: `<localTmpDir>/<namespace>@<clusterId>/`
//! holding the dumped pod template and the Log4j/Logback console configs the
//! launcher ships to the cluster.

use crate::error::DeployError;
use finback_core::Fcid;
use std::path::{Path, PathBuf};
use tracing::debug;

pub const POD_TEMPLATE_FILE: &str = "flink-podtemplate.yaml";
pub const LOG_CONF_DIR: &str = "log-conf";

const LOG4J_CONSOLE_PROPERTIES: &str = "\
rootLogger.level = INFO
rootLogger.appenderRef.console.ref = ConsoleAppender
appender.console.name = ConsoleAppender
appender.console.type = CONSOLE
appender.console.layout.type = PatternLayout
appender.console.layout.pattern = %d{yyyy-MM-dd HH:mm:ss,SSS} %-5p %-60c %x - %m%n
logger.akka.name = akka
logger.akka.level = INFO
logger.kafka.name = org.apache.kafka
logger.kafka.level = INFO
logger.hadoop.name = org.apache.hadoop
logger.hadoop.level = INFO
logger.zookeeper.name = org.apache.zookeeper
logger.zookeeper.level = INFO
";

const LOGBACK_CONSOLE_XML: &str = "\
<configuration>
    <appender name=\"console\" class=\"ch.qos.logback.core.ConsoleAppender\">
        <encoder>
            <pattern>%d{yyyy-MM-dd HH:mm:ss.SSS} [%thread] %-5level %logger{60} %X{sourceThread} - %msg%n</pattern>
        </encoder>
    </appender>
    <root level=\"INFO\">
        <appender-ref ref=\"console\"/>
    </root>
</configuration>
";

/// The operator's local workspace root.
#[derive(Debug, Clone)]
pub struct Workspace {
    root: PathBuf,
}

impl Workspace {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn cluster_dir(&self, fcid: &Fcid) -> PathBuf {
        self.root.join(format!("{}@{}", fcid.namespace, fcid.cluster_id))
    }

    pub fn pod_template_path(&self, fcid: &Fcid) -> PathBuf {
        self.cluster_dir(fcid).join(POD_TEMPLATE_FILE)
    }

    pub fn log_conf_dir(&self, fcid: &Fcid) -> PathBuf {
        self.cluster_dir(fcid).join(LOG_CONF_DIR)
    }

    /// Create the cluster directory with its `log-conf/` files; idempotent.
    /// Returns the cluster directory.
    pub async fn prepare(&self, fcid: &Fcid) -> Result<PathBuf, DeployError> {
        let dir = self.cluster_dir(fcid);
        let log_conf = self.log_conf_dir(fcid);
        tokio::fs::create_dir_all(&log_conf)
            .await
            .map_err(DeployError::io(format!("creating {}", log_conf.display())))?;
        write_file(&log_conf.join("log4j-console.properties"), LOG4J_CONSOLE_PROPERTIES).await?;
        write_file(&log_conf.join("logback-console.xml"), LOGBACK_CONSOLE_XML).await?;
        debug!(fcid = %fcid, dir = %dir.display(), "workspace prepared");
        Ok(dir)
    }

    /// Drop the whole cluster workspace; missing directories are fine.
    pub async fn purge(&self, fcid: &Fcid) -> Result<(), DeployError> {
        let dir = self.cluster_dir(fcid);
        match tokio::fs::remove_dir_all(&dir).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(DeployError::io(format!("removing {}", dir.display()))(e)),
        }
    }
}

async fn write_file(path: &Path, content: &str) -> Result<(), DeployError> {
    tokio::fs::write(path, content)
        .await
        .map_err(DeployError::io(format!("writing {}", path.display())))
}
