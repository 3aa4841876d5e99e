//! Pure decoders for Flink REST payloads, kept apart from transport so they
//! test directly on JSON fixtures.

use crate::error::FlinkApiError;
use finback_core::pathx;
use finback_core::snapshot::{JobOverview, JobState};
use serde_json::Value;
use std::collections::HashMap;

/// Decode a `/metrics?get=...` reply (`[{"id": ..., "value": ...}, ...]`)
/// into a raw key/value map. Entries without a value are skipped.
pub fn metric_kv(v: &Value) -> HashMap<String, String> {
    let mut out = HashMap::new();
    if let Some(items) = v.as_array() {
        for item in items {
            let id = item.get("id").and_then(Value::as_str);
            let value = item.get("value");
            if let (Some(id), Some(value)) = (id, value) {
                let s = match value {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                };
                out.insert(id.to_string(), s);
            }
        }
    }
    out
}

/// Decode `/taskmanagers` into the taskmanager id list.
pub fn taskmanager_ids(v: &Value) -> Vec<String> {
    v.get("taskmanagers")
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(|t| t.get("id").and_then(Value::as_str).map(str::to_string))
                .collect()
        })
        .unwrap_or_default()
}

/// Decode `/jobs` into the job id list.
pub fn job_ids(v: &Value) -> Vec<String> {
    v.get("jobs")
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(|j| j.get("id").and_then(Value::as_str).map(str::to_string))
                .collect()
        })
        .unwrap_or_default()
}

/// Decode `/jobs/overview` rows, stamping each with `ts`.
pub fn job_overview(v: &Value, ts: i64) -> Vec<JobOverview> {
    v.get("jobs")
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(|j| {
                    let jid = j.get("jid").and_then(Value::as_str)?;
                    Some(JobOverview {
                        ts,
                        jid: jid.to_string(),
                        name: j.get("name").and_then(Value::as_str).unwrap_or_default().to_string(),
                        state: JobState::from_rest(
                            j.get("state").and_then(Value::as_str).unwrap_or_default(),
                        ),
                        start_time: j.get("start-time").and_then(Value::as_i64).unwrap_or(-1),
                        end_time: j.get("end-time").and_then(Value::as_i64).unwrap_or(-1),
                        task_total: j
                            .get("tasks")
                            .and_then(|t| t.get("total"))
                            .and_then(Value::as_i64)
                            .unwrap_or(0) as i32,
                    })
                })
                .collect()
        })
        .unwrap_or_default()
}

/// Jar id from the `/jars/upload` reply: basename of the returned filename.
pub fn jar_id(v: &Value) -> Result<String, FlinkApiError> {
    v.get("filename")
        .and_then(Value::as_str)
        .map(|f| pathx::basename(f).to_string())
        .ok_or_else(|| FlinkApiError::Decode("jar upload reply missing filename".into()))
}

/// Job id from the `/jars/<id>/run` reply.
pub fn run_job_id(v: &Value) -> Result<String, FlinkApiError> {
    v.get("jobid")
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| FlinkApiError::Decode("jar run reply missing jobid".into()))
}

/// Trigger id from a stop/savepoint reply.
pub fn trigger_id(v: &Value) -> Result<String, FlinkApiError> {
    v.get("request-id")
        .or_else(|| v.get("triggerid"))
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| FlinkApiError::Decode("trigger reply missing request-id".into()))
}

/// State of an asynchronous savepoint trigger.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SavepointTriggerState {
    InProgress,
    Completed,
    Failed,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SavepointTriggerStatus {
    pub state: SavepointTriggerState,
    pub location: Option<String>,
    pub failure: Option<String>,
}

impl SavepointTriggerStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self.state, SavepointTriggerState::InProgress)
    }
}

/// Decode `/jobs/<jid>/savepoints/<triggerId>`.
pub fn savepoint_trigger(v: &Value) -> Result<SavepointTriggerStatus, FlinkApiError> {
    let id = v
        .get("status")
        .and_then(|s| s.get("id"))
        .and_then(Value::as_str)
        .ok_or_else(|| FlinkApiError::Decode("savepoint trigger reply missing status.id".into()))?;
    let operation = v.get("operation");
    let failure = operation
        .and_then(|o| o.get("failure-cause"))
        .map(|f| f.get("stack-trace").and_then(Value::as_str).unwrap_or("").to_string())
        .filter(|s| !s.is_empty())
        .or_else(|| {
            operation
                .and_then(|o| o.get("failure-cause"))
                .map(|f| f.to_string())
        });
    let state = match id {
        "IN_PROGRESS" => SavepointTriggerState::InProgress,
        "COMPLETED" if failure.is_some() => SavepointTriggerState::Failed,
        "COMPLETED" => SavepointTriggerState::Completed,
        "FAILED" => SavepointTriggerState::Failed,
        other => {
            return Err(FlinkApiError::Decode(format!(
                "unknown savepoint trigger state: {}",
                other
            )))
        }
    };
    Ok(SavepointTriggerStatus {
        state,
        location: operation
            .and_then(|o| o.get("location"))
            .and_then(Value::as_str)
            .map(str::to_string),
        failure: if state == SavepointTriggerState::Failed { failure } else { None },
    })
}
