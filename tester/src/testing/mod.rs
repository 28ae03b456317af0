//! Testing Framework
//!
//! Run sequencing, final-state assertions and run reports.

pub mod assertions;
pub mod orchestrator;
pub mod report;

// Re-export main types
pub use orchestrator::TestOrchestrator;
pub use report::{CleanupWarning, Outcome, TargetReport, TestReport};
