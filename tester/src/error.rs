//! Harness error types

use shared::SharedError;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum TesterError {
    #[error("Command `{command}` exited with code {exit_code}: {stderr}")]
    ExecutionError {
        command: String,
        exit_code: i32,
        stderr: String,
    },

    #[error("Command `{command}` did not finish within {timeout:?}")]
    ExecutionTimeout { command: String, timeout: Duration },

    #[error("Failed to launch `{command}`: {source}")]
    SpawnFailed {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{subject} did not reach {target} within {elapsed:?}; last observed: {last_state}")]
    PollTimeout {
        subject: String,
        target: String,
        elapsed: Duration,
        last_state: String,
    },

    #[error("Wait for {subject} was cancelled")]
    Cancelled { subject: String },

    #[error("Namespace {name} already exists")]
    NamespaceExists { name: String },

    #[error("Namespace {name} was not removed within {grace:?}")]
    TeardownTimeout { name: String, grace: Duration },

    #[error("Cleanup of {resource} failed: {message}")]
    CleanupError { resource: String, message: String },

    #[error("Capture {artifact_id} collides with a running capture writing {path}")]
    CaptureCollision { artifact_id: String, path: String },

    #[error("Assertion failed: {message}")]
    AssertionError { message: String },

    #[error("Step {step} panicked: {message}")]
    StepPanicked { step: String, message: String },

    #[error("Configuration error: {field}")]
    ConfigurationError { field: String },

    #[error("Shared component error: {0}")]
    SharedError(#[from] SharedError),

    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    JsonError(#[from] serde_json::Error),
}

impl TesterError {
    pub fn config(field: impl Into<String>) -> Self {
        Self::ConfigurationError { field: field.into() }
    }

    pub fn assertion(message: impl Into<String>) -> Self {
        Self::AssertionError { message: message.into() }
    }

    pub fn cleanup(resource: impl Into<String>, message: impl Into<String>) -> Self {
        Self::CleanupError {
            resource: resource.into(),
            message: message.into(),
        }
    }

    /// Errors raised while releasing resources; reported, never a verdict
    pub fn is_cleanup(&self) -> bool {
        matches!(self, Self::TeardownTimeout { .. } | Self::CleanupError { .. })
    }

    /// The workload was observed in the wrong state
    pub fn is_assertion(&self) -> bool {
        matches!(self, Self::AssertionError { .. })
    }
}

pub type TesterResult<T> = Result<T, TesterError>;
