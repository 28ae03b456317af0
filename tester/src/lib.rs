//! Workload Deployment Test Harness
//!
//! Drives a cluster CLI to deploy workloads into ephemeral namespaces, waits
//! for them under bounded polls, captures their logs in the background and
//! guarantees teardown whatever the outcome.
//!
//! ## Main Interface
//!
//! [`TestOrchestrator`] runs one test: namespace setup, submission, polling,
//! capture, assertion and cleanup. It returns a [`TestReport`].
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use tester::*;
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn example(fixture: shared::Fixture) {
//! let config = SuiteConfig::builder()
//!     .cli("oc")
//!     .target(WorkloadTarget::new("llama-2-7b-chat"))
//!     .build();
//!
//! let executor = Arc::new(RealCommandExecutor::new());
//! let client = ClusterClient::new(executor.clone(), Cluster::new("oc"), config.command_timeout);
//! let submitter = ManifestSubmitter::new(client, "manifests");
//! let targets = config.targets.clone();
//! let orchestrator = TestOrchestrator::new(config, executor, submitter);
//!
//! let report = orchestrator.run(&fixture, &targets, &CancellationToken::new()).await;
//! assert!(report.passed());
//! # }
//! ```

// Core modules
pub mod config;
pub mod error;
pub mod runtime;
pub mod scenarios;
pub mod testing;
pub mod traits;

// Main interfaces - re-exported at crate root for convenience
pub use config::{EnvConfig, PreflightAction, ResourceDump, SuiteConfig, SuiteConfigBuilder, WorkloadTarget, load_targets};
pub use error::{TesterError, TesterResult};
pub use testing::{Outcome, TestOrchestrator, TestReport};

// Supporting types
pub use runtime::{
    CaptureHandle, CaptureManager, CaptureRequest, Cluster, ClusterClient, CommandLine, ManifestSubmitter,
    NamespaceLifecycleController, PollSpec, PollTiming, ResourcePoller, RealCommandExecutor, RunOptions, TargetState,
};
pub use scenarios::TestScenarios;
pub use traits::{CommandExecutor, MockCommandExecutor, MockWorkloadSubmitter, WorkloadSubmitter};
