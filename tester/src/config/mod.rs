//! Configuration Management
//!
//! Suite configuration, its builder, and values read from the environment.

pub mod builder;
pub mod env;
pub mod suite;

// Re-export main types
pub use builder::SuiteConfigBuilder;
pub use env::EnvConfig;
pub use suite::{
    load_targets, ControllerCapture, PreflightAction, ResourceDump, StatusProbe, SuiteConfig, WorkloadTarget,
};
