//! Common test utilities and infrastructure
//!
//! Fixtures plus a scripted fake cluster used by the integration tests.

pub mod fixtures;
pub mod helpers;

// Re-export commonly used items for convenience
#[allow(unused_imports)]
pub use fixtures::TestFixtures;
#[allow(unused_imports)]
pub use helpers::{ScriptedCluster, TestHelpers};
