//! Deployment scenarios
//!
//! Each target either gets a namespace of its own or shares one with the
//! rest of the suite. Targets always run in the configured order.

use tokio_util::sync::CancellationToken;

use shared::Fixture;

use crate::testing::{TestOrchestrator, TestReport};
use crate::traits::{CommandExecutor, WorkloadSubmitter};

/// One namespace per target, run one after another
pub async fn isolated<E, W>(
    orchestrator: &TestOrchestrator<E, W>,
    fixture: &Fixture,
    cancel: &CancellationToken,
) -> Vec<TestReport>
where
    E: CommandExecutor,
    W: WorkloadSubmitter,
{
    let targets = &orchestrator.config().targets;
    tracing::info!("🧪 Deploy: {} target(s), one namespace each", targets.len());

    let mut reports = Vec::with_capacity(targets.len());
    for target in targets {
        if cancel.is_cancelled() {
            tracing::warn!("🛑 Skipping {} and later targets after cancellation", target.name);
            break;
        }
        let report = orchestrator.run(fixture, std::slice::from_ref(target), cancel).await;
        if report.passed() {
            tracing::info!("✅ Deploy {}: PASSED", target.name);
        } else {
            tracing::error!("❌ Deploy {}: {}", target.name, report.summary());
        }
        reports.push(report);
    }
    reports
}

/// All targets in a single namespace, awaited in turn
pub async fn shared<E, W>(
    orchestrator: &TestOrchestrator<E, W>,
    fixture: &Fixture,
    cancel: &CancellationToken,
) -> Vec<TestReport>
where
    E: CommandExecutor,
    W: WorkloadSubmitter,
{
    let targets = &orchestrator.config().targets;
    tracing::info!("🧪 Shared: {} target(s) in one namespace", targets.len());

    let report = orchestrator.run(fixture, targets, cancel).await;
    if report.passed() {
        tracing::info!("✅ Shared: PASSED");
    } else {
        tracing::error!("❌ Shared: {}", report.summary());
    }
    vec![report]
}
