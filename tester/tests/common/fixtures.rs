//! Test fixtures and data for harness integration tests

use shared::{Fixture, NamespaceRecord};
use std::time::Duration;

/// Standard test data and fixtures
pub struct TestFixtures;

impl TestFixtures {
    pub const NAMESPACE: &'static str = "proj-123";
    pub const MODEL: &'static str = "model-x";
    pub const SECOND_MODEL: &'static str = "granite-8b";
    pub const LOADED: &'static str = "Loaded";

    /// Short real-time waits so the suite stays fast
    pub const POLL_INTERVAL: Duration = Duration::from_millis(10);
    pub const POLL_TIMEOUT: Duration = Duration::from_secs(5);

    pub const FIXTURE_YAML: &'static str = "\
displayName: Proj 123
description: Deploys a single model and waits for it to load
resourceName: proj
";

    pub fn fixture() -> Fixture {
        Fixture::from_yaml(Self::FIXTURE_YAML).unwrap()
    }

    /// The fixed namespace the end-to-end tests run in
    pub fn record() -> NamespaceRecord {
        NamespaceRecord {
            name: Self::NAMESPACE.to_string(),
            ..NamespaceRecord::generate("proj").unwrap()
        }
    }

    pub fn manifest() -> &'static str {
        "\
apiVersion: serving.kserve.io/v1beta1
kind: InferenceService
metadata:
  name: {{name}}
  namespace: {{namespace}}
"
    }
}
