//! Runtime Management
//!
//! Command execution, state polling, background captures and namespace
//! lifecycle against a live cluster.

pub mod artifacts;
pub mod capture;
pub mod cluster;
pub mod executor;
pub mod namespace;
pub mod poller;
pub mod submitter;

#[cfg(test)]
mod tests;

// Re-export main types
pub use artifacts::ArtifactLayout;
pub use capture::{CaptureHandle, CaptureManager, CaptureRequest};
pub use cluster::{Cluster, ClusterClient, LogSource, PatchType, PodRow, Presence, WorkloadStatus};
pub use executor::{CommandLine, RealCommandExecutor, RunOptions};
pub use namespace::NamespaceLifecycleController;
pub use poller::{Observation, PollError, PollSpec, PollTiming, ResourcePoller, TargetState};
pub use submitter::ManifestSubmitter;
