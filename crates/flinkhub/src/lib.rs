//! Finback flinkhub: the Flink REST API client used by the tracker fleet and
//! the submission engine. Transport lives here; payload decoding lives in
//! [`parse`] so it tests on fixtures.

#![forbid(unsafe_code)]

pub mod error;
pub mod parse;

pub use error::FlinkApiError;
pub use parse::{SavepointTriggerState, SavepointTriggerStatus};

use finback_core::snapshot::{now_ts_millis, JobOverview};
use metrics::{counter, histogram};
use serde_json::Value;
use std::collections::HashMap;
use std::path::Path;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Launch request for an uploaded jar.
#[derive(Debug, Clone, Default)]
pub struct RunJarReq {
    pub entry_class: Option<String>,
    pub program_args: Vec<String>,
    pub parallelism: Option<i32>,
    pub savepoint_path: Option<String>,
    pub restore_mode: Option<String>,
    pub allow_non_restored_state: Option<bool>,
}

impl RunJarReq {
    fn to_body(&self) -> Value {
        let mut body = serde_json::Map::new();
        if let Some(ec) = &self.entry_class {
            body.insert("entry-class".into(), Value::String(ec.clone()));
        }
        if !self.program_args.is_empty() {
            body.insert("programArgs".into(), Value::String(self.program_args.join(" ")));
        }
        if let Some(p) = self.parallelism {
            body.insert("parallelism".into(), Value::from(p));
        }
        if let Some(sp) = &self.savepoint_path {
            body.insert("savepointPath".into(), Value::String(sp.clone()));
        }
        if let Some(rm) = &self.restore_mode {
            body.insert("restoreMode".into(), Value::String(rm.clone()));
        }
        if let Some(allow) = self.allow_non_restored_state {
            body.insert("allowNonRestoredState".into(), Value::Bool(allow));
        }
        Value::Object(body)
    }
}

/// Shared Flink REST client. Cheap to clone.
#[derive(Debug, Clone)]
pub struct FlinkRestClient {
    http: reqwest::Client,
}

impl Default for FlinkRestClient {
    fn default() -> Self {
        Self::new(Duration::from_secs(30))
    }
}

impl FlinkRestClient {
    pub fn new(request_timeout: Duration) -> Self {
        let http = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self { http }
    }

    async fn get_json(&self, url: &str) -> Result<Value, FlinkApiError> {
        let t0 = Instant::now();
        let resp = self.http.get(url).send().await?;
        histogram!("flink_rest_get_ms", t0.elapsed().as_millis() as f64);
        if !resp.status().is_success() {
            counter!("flink_rest_errors_total", 1u64);
            return Err(FlinkApiError::Request(format!("GET {} -> {}", url, resp.status())));
        }
        Ok(resp.json::<Value>().await?)
    }

    /// `GET /jobmanager/metrics?get=<keys>`: raw metric key/values.
    pub async fn get_jm_metrics(
        &self,
        rest_url: &str,
        keys: &[&str],
    ) -> Result<HashMap<String, String>, FlinkApiError> {
        let url = format!("{}/jobmanager/metrics?get={}", rest_url, keys.join(","));
        let v = self.get_json(&url).await?;
        Ok(parse::metric_kv(&v))
    }

    /// `GET /taskmanagers`: registered taskmanager ids.
    pub async fn list_taskmanagers(&self, rest_url: &str) -> Result<Vec<String>, FlinkApiError> {
        let v = self.get_json(&format!("{}/taskmanagers", rest_url)).await?;
        Ok(parse::taskmanager_ids(&v))
    }

    /// `GET /taskmanagers/<tid>/metrics?get=<keys>`.
    pub async fn get_tm_metrics(
        &self,
        rest_url: &str,
        tid: &str,
        keys: &[&str],
    ) -> Result<HashMap<String, String>, FlinkApiError> {
        let url = format!("{}/taskmanagers/{}/metrics?get={}", rest_url, tid, keys.join(","));
        let v = self.get_json(&url).await?;
        Ok(parse::metric_kv(&v))
    }

    /// `GET /jobs`: job ids.
    pub async fn list_jobs(&self, rest_url: &str) -> Result<Vec<String>, FlinkApiError> {
        let v = self.get_json(&format!("{}/jobs", rest_url)).await?;
        Ok(parse::job_ids(&v))
    }

    /// `GET /jobs/overview`.
    pub async fn jobs_overview(&self, rest_url: &str) -> Result<Vec<JobOverview>, FlinkApiError> {
        let v = self.get_json(&format!("{}/jobs/overview", rest_url)).await?;
        Ok(parse::job_overview(&v, now_ts_millis()))
    }

    /// `GET /jobs/<jid>/metrics?get=<keys>`.
    pub async fn get_job_metrics(
        &self,
        rest_url: &str,
        jid: &str,
        keys: &[&str],
    ) -> Result<HashMap<String, String>, FlinkApiError> {
        let url = format!("{}/jobs/{}/metrics?get={}", rest_url, jid, keys.join(","));
        let v = self.get_json(&url).await?;
        Ok(parse::metric_kv(&v))
    }

    /// `POST /jars/upload` (multipart field `jarfile`); returns the jar id.
    pub async fn upload_jar(&self, rest_url: &str, jar: &Path) -> Result<String, FlinkApiError> {
        let bytes = tokio::fs::read(jar)
            .await
            .map_err(|e| FlinkApiError::Request(format!("reading {}: {}", jar.display(), e)))?;
        let file_name = jar
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| "job.jar".to_string());
        let part = reqwest::multipart::Part::bytes(bytes)
            .file_name(file_name)
            .mime_str("application/java-archive")
            .map_err(|e| FlinkApiError::Request(e.to_string()))?;
        let form = reqwest::multipart::Form::new().part("jarfile", part);
        let t0 = Instant::now();
        let resp = self
            .http
            .post(format!("{}/jars/upload", rest_url))
            .multipart(form)
            .send()
            .await?;
        histogram!("flink_rest_upload_ms", t0.elapsed().as_millis() as f64);
        if !resp.status().is_success() {
            return Err(FlinkApiError::Request(format!("jar upload -> {}", resp.status())));
        }
        let v = resp.json::<Value>().await?;
        let id = parse::jar_id(&v)?;
        debug!(jar_id = %id, "jar uploaded");
        Ok(id)
    }

    /// `POST /jars/<jarId>/run`; returns the started job id.
    pub async fn run_jar(
        &self,
        rest_url: &str,
        jar_id: &str,
        req: &RunJarReq,
    ) -> Result<String, FlinkApiError> {
        let resp = self
            .http
            .post(format!("{}/jars/{}/run", rest_url, jar_id))
            .json(&req.to_body())
            .send()
            .await?;
        if !resp.status().is_success() {
            return Err(FlinkApiError::Request(format!("jar run -> {}", resp.status())));
        }
        let v = resp.json::<Value>().await?;
        parse::run_job_id(&v)
    }

    /// `DELETE /jars/<jarId>`: best-effort cleanup, failures only logged.
    pub async fn delete_jar(&self, rest_url: &str, jar_id: &str) {
        match self.http.delete(format!("{}/jars/{}", rest_url, jar_id)).send().await {
            Ok(resp) if !resp.status().is_success() => {
                warn!(jar_id, status = %resp.status(), "jar delete refused")
            }
            Err(e) => warn!(jar_id, error = %e, "jar delete failed"),
            _ => {}
        }
    }

    /// `GET /jobs/<jid>/savepoints/<triggerId>`.
    pub async fn get_savepoint_trigger(
        &self,
        rest_url: &str,
        jid: &str,
        trigger_id: &str,
    ) -> Result<SavepointTriggerStatus, FlinkApiError> {
        let v = self
            .get_json(&format!("{}/jobs/{}/savepoints/{}", rest_url, jid, trigger_id))
            .await?;
        parse::savepoint_trigger(&v)
    }

    /// `PATCH /jobs/<jid>?mode=stop` with an optional savepoint target;
    /// returns the trigger id.
    pub async fn stop_job(
        &self,
        rest_url: &str,
        jid: &str,
        savepoint_dir: Option<&str>,
    ) -> Result<String, FlinkApiError> {
        let mut body = serde_json::Map::new();
        if let Some(dir) = savepoint_dir {
            body.insert("targetDirectory".into(), Value::String(dir.to_string()));
        }
        let resp = self
            .http
            .patch(format!("{}/jobs/{}?mode=stop", rest_url, jid))
            .json(&Value::Object(body))
            .send()
            .await?;
        if !resp.status().is_success() {
            return Err(FlinkApiError::Request(format!("job stop -> {}", resp.status())));
        }
        let v = resp.json::<Value>().await?;
        parse::trigger_id(&v)
    }
}
