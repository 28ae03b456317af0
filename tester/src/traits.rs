//! Trait definitions with mockall annotations for testing
//!
//! The seams between the orchestrator and the outside world: running a
//! command against the cluster, and submitting a workload into a namespace.

use shared::{ExecutionResult, NamespaceRecord};

use crate::config::WorkloadTarget;
use crate::error::TesterResult;
use crate::runtime::{CommandLine, RunOptions};

/// Cluster command abstraction for dependency injection
///
/// Runs one fully formed command against the cluster control plane and
/// returns its exit code and captured output.
#[mockall::automock]
#[async_trait::async_trait]
pub trait CommandExecutor: Send + Sync {
    /// Run `command`, bounded by `options.timeout`
    ///
    /// # Returns
    /// The captured result. A non-zero exit is an `ExecutionError` when
    /// `options.fail_on_non_zero` is set and plain data otherwise.
    async fn run(&self, command: &CommandLine, options: RunOptions) -> TesterResult<ExecutionResult>;
}

/// Workload submission abstraction
///
/// Puts one deployable unit into a namespace. How it gets there (manifest,
/// API call) is up to the implementation.
#[mockall::automock]
#[async_trait::async_trait]
pub trait WorkloadSubmitter: Send + Sync {
    async fn submit(&self, namespace: &NamespaceRecord, target: &WorkloadTarget) -> TesterResult<()>;
}
