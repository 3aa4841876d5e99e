use thiserror::Error;

/// Failure talking to a Flink REST endpoint.
#[derive(Debug, Error)]
pub enum FlinkApiError {
    #[error("flink rest request failed: {0}")]
    Request(String),
    #[error("unexpected flink rest payload: {0}")]
    Decode(String),
}

impl From<reqwest::Error> for FlinkApiError {
    fn from(e: reqwest::Error) -> Self {
        FlinkApiError::Request(e.to_string())
    }
}
