//! Resolver error types, suitable for transport in operator replies.

use thiserror::Error;

/// Failure inside the revise pipeline; carries the offending stage.
#[derive(Debug, Error)]
#[error("failed to revise cluster definition at stage {stage}: {message}")]
pub struct ReviseError {
    pub stage: &'static str,
    pub message: String,
}

impl ReviseError {
    pub fn at(stage: &'static str, message: impl Into<String>) -> Self {
        Self { stage, message: message.into() }
    }
}

/// Failure while emitting the final Flink configuration.
#[derive(Debug, Error)]
#[error("failed to emit flink raw configuration: {message}")]
pub struct EmitError {
    pub message: String,
}

impl EmitError {
    pub fn new(message: impl Into<String>) -> Self {
        Self { message: message.into() }
    }
}
