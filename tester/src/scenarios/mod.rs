//! Test Scenarios
//!
//! Short scenario names selectable from the command line

pub mod deploy;

use tokio_util::sync::CancellationToken;

use shared::Fixture;

use crate::error::{TesterError, TesterResult};
use crate::testing::{TestOrchestrator, TestReport};
use crate::traits::{CommandExecutor, WorkloadSubmitter};

pub struct TestScenarios<E: CommandExecutor, W: WorkloadSubmitter> {
    orchestrator: TestOrchestrator<E, W>,
}

impl<E: CommandExecutor, W: WorkloadSubmitter> TestScenarios<E, W> {
    pub fn new(orchestrator: TestOrchestrator<E, W>) -> Self {
        Self { orchestrator }
    }

    pub fn orchestrator(&self) -> &TestOrchestrator<E, W> {
        &self.orchestrator
    }

    /// Run a specific scenario by name.
    ///
    /// Preflight failures end the scenario before any namespace is created.
    pub async fn run_scenario(
        &self,
        name: &str,
        fixture: &Fixture,
        cancel: &CancellationToken,
    ) -> TesterResult<Vec<TestReport>> {
        if !Self::available_scenarios().contains(&name) {
            return Err(TesterError::config(format!(
                "Unknown test scenario: '{}'. Available: {}",
                name,
                Self::available_scenarios().join(", ")
            )));
        }
        if name != "preflight" && self.orchestrator.config().targets.is_empty() {
            return Err(TesterError::config("no targets configured"));
        }

        self.orchestrator.preflight().await?;

        let reports = match name {
            "deploy" => deploy::isolated(&self.orchestrator, fixture, cancel).await,
            "shared" => deploy::shared(&self.orchestrator, fixture, cancel).await,
            _ => {
                tracing::info!("✅ Preflight: PASSED");
                Vec::new()
            }
        };
        Ok(reports)
    }

    /// Get list of available scenarios
    pub fn available_scenarios() -> Vec<&'static str> {
        vec![
            "deploy",    // every target in its own namespace
            "shared",    // all targets in one namespace
            "preflight", // cluster adjustments only
        ]
    }
}
