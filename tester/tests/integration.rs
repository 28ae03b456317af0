//! End-to-end orchestrator tests against a scripted cluster
//!
//! Cluster commands are answered in memory; log captures run as real
//! processes so the artifact files on disk are genuine.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tester::*;
use tokio_util::sync::CancellationToken;

mod common;
use common::{ScriptedCluster, TestFixtures, TestHelpers};

struct Workspace {
    artifacts: tempfile::TempDir,
    manifests: tempfile::TempDir,
}

impl Workspace {
    fn new(targets: &[&str]) -> Self {
        let workspace = Self {
            artifacts: tempfile::tempdir().unwrap(),
            manifests: tempfile::tempdir().unwrap(),
        };
        TestHelpers::write_manifests(workspace.manifests.path(), targets);
        workspace
    }

    fn config(&self, targets: &[&str]) -> SuiteConfig {
        TestHelpers::config(self.artifacts.path(), self.manifests.path(), targets)
    }
}

/// Create proj-123, submit model-x, wait for Loaded, capture its log,
/// delete the namespace
#[tokio::test]
async fn test_deploy_single_model_end_to_end() {
    let workspace = Workspace::new(&[TestFixtures::MODEL]);
    let cluster = Arc::new(ScriptedCluster::new().with_workload(TestFixtures::MODEL));
    let orchestrator = TestHelpers::orchestrator(workspace.config(&[TestFixtures::MODEL]), cluster.clone());
    let targets = orchestrator.config().targets.clone();

    let report = orchestrator
        .run_in(
            &TestFixtures::record(),
            &TestFixtures::fixture(),
            &targets,
            &CancellationToken::new(),
        )
        .await;

    assert!(report.passed(), "run failed: {}", report.summary());
    assert_eq!(report.namespace, TestFixtures::NAMESPACE);
    assert!(report.warnings.is_empty(), "unexpected warnings: {:?}", report.warnings);

    let target = &report.targets[0];
    assert_eq!(target.final_status.as_deref(), Some(TestFixtures::LOADED));
    assert!(target.pod.as_deref().unwrap().starts_with("model-x-predictor"));

    // capture log for label model-x exists and is non-empty
    let log = target.capture_log.clone().unwrap();
    assert_eq!(
        log,
        workspace.artifacts.path().join("proj-123/model-x/model-x.log")
    );
    let content = std::fs::read_to_string(&log).unwrap();
    assert!(content.contains("logs -f model-x-predictor"), "log was: {content:?}");

    // the manifest went into the right namespace with placeholders filled in
    let applied = cluster.applied();
    assert_eq!(applied.len(), 1);
    assert_eq!(applied[0].0, "proj-123");
    assert!(applied[0].1.contains("name: model-x"));

    // teardown deleted the namespace exactly once
    assert_eq!(cluster.count(&["delete", "namespace", "proj-123"]), 1);
    assert_eq!(cluster.count(&["create", "namespace", "proj-123"]), 1);

    // post-mortem artifacts
    let run_dir = workspace.artifacts.path().join("proj-123");
    assert!(run_dir.join("resources/InferenceService.yaml").exists());
    assert!(run_dir.join("resources/Account-odh-nim-account.yaml").exists());
    assert_eq!(
        cluster.count(&["get", "Account", "odh-nim-account", "-n", "redhat-ods-applications"]),
        1
    );
    assert!(run_dir.join("report.json").exists());
    assert!(run_dir.join("odh-model-controller/odh-model-controller.log").exists());
}

/// A failing assertion still dumps, stops captures and tears down once
#[tokio::test]
async fn test_assertion_failure_still_tears_down_once() {
    let workspace = Workspace::new(&[TestFixtures::MODEL]);
    let cluster = Arc::new(
        ScriptedCluster::new()
            .with_workload(TestFixtures::MODEL)
            .with_statuses(&["Pending", "FailedToLoad"]),
    );
    let mut config = workspace.config(&[TestFixtures::MODEL]);
    config.status_timing = PollTiming {
        interval: Duration::from_millis(10),
        timeout: Duration::from_millis(300),
    };
    let orchestrator = TestHelpers::orchestrator(config, cluster.clone());
    let targets = orchestrator.config().targets.clone();

    let report = orchestrator
        .run_in(
            &TestFixtures::record(),
            &TestFixtures::fixture(),
            &targets,
            &CancellationToken::new(),
        )
        .await;

    assert_matches::assert_matches!(report.outcome, Outcome::Failed { ref reason } if reason.contains("FailedToLoad"));
    assert_eq!(report.targets[0].final_status.as_deref(), Some("FailedToLoad"));
    assert_eq!(cluster.count(&["delete", "namespace", "proj-123"]), 1);
    assert_eq!(cluster.count(&["-o", "yaml"]), 3);
}

/// Cancelling mid-poll aborts promptly and still cleans up
#[tokio::test]
async fn test_cancellation_still_cleans_up() {
    let workspace = Workspace::new(&[TestFixtures::MODEL]);
    let cluster = Arc::new(
        ScriptedCluster::new()
            .with_workload(TestFixtures::MODEL)
            .pods_never_ready(),
    );
    let orchestrator = TestHelpers::orchestrator(workspace.config(&[TestFixtures::MODEL]), cluster.clone());
    let targets = orchestrator.config().targets.clone();

    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(200)).await;
        trigger.cancel();
    });

    let started = Instant::now();
    let report = orchestrator
        .run_in(&TestFixtures::record(), &TestFixtures::fixture(), &targets, &cancel)
        .await;

    assert!(started.elapsed() < TestFixtures::POLL_TIMEOUT);
    assert_matches::assert_matches!(report.outcome, Outcome::Aborted { .. });
    assert!(!report.passed());
    assert_eq!(cluster.count(&["delete", "namespace", "proj-123"]), 1);
}

/// A namespace that turns up between the absence check and creation is
/// someone else's: the run aborts and never deletes it
#[tokio::test]
async fn test_namespace_collision_never_deletes_foreign_namespace() {
    let workspace = Workspace::new(&[TestFixtures::MODEL]);
    let cluster = Arc::new(
        ScriptedCluster::new()
            .with_workload(TestFixtures::MODEL)
            .namespace_appears_after(1),
    );
    let orchestrator = TestHelpers::orchestrator(workspace.config(&[TestFixtures::MODEL]), cluster.clone());
    let targets = orchestrator.config().targets.clone();

    let report = orchestrator
        .run_in(
            &TestFixtures::record(),
            &TestFixtures::fixture(),
            &targets,
            &CancellationToken::new(),
        )
        .await;

    assert_matches::assert_matches!(report.outcome, Outcome::Aborted { ref reason } if reason.contains("already exists"));
    assert_eq!(cluster.count(&["create", "namespace"]), 0);
    assert_eq!(cluster.count(&["delete", "namespace"]), 0);
}

/// Cancelling while the pre-create existence check is still running leaves
/// the namespace alone: the run never issued a create, so it owns nothing
#[tokio::test]
async fn test_cancel_during_existence_check_deletes_nothing() {
    let workspace = Workspace::new(&[TestFixtures::MODEL]);
    let cluster = Arc::new(
        ScriptedCluster::new()
            .with_workload(TestFixtures::MODEL)
            .namespace_appears_after(1)
            .slow_namespace_check(2, Duration::from_millis(500)),
    );
    let orchestrator = TestHelpers::orchestrator(workspace.config(&[TestFixtures::MODEL]), cluster.clone());
    let targets = orchestrator.config().targets.clone();

    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(100)).await;
        trigger.cancel();
    });

    let report = orchestrator
        .run_in(&TestFixtures::record(), &TestFixtures::fixture(), &targets, &cancel)
        .await;

    assert_matches::assert_matches!(report.outcome, Outcome::Aborted { ref reason } if reason.contains("create-namespace"));
    assert_eq!(cluster.count(&["create", "namespace"]), 0);
    assert_eq!(cluster.count(&["delete", "namespace"]), 0);
}

/// The per-test timeout interrupts a poll that would otherwise run on, and
/// the namespace is still deleted exactly once
#[tokio::test]
async fn test_test_timeout_interrupts_poll_and_tears_down() {
    let workspace = Workspace::new(&[TestFixtures::MODEL]);
    let cluster = Arc::new(
        ScriptedCluster::new()
            .with_workload(TestFixtures::MODEL)
            .pods_never_ready(),
    );
    let mut config = workspace.config(&[TestFixtures::MODEL]);
    config.test_timeout = Duration::from_millis(300);
    let orchestrator = TestHelpers::orchestrator(config, cluster.clone());
    let targets = orchestrator.config().targets.clone();

    let started = Instant::now();
    let report = orchestrator
        .run_in(
            &TestFixtures::record(),
            &TestFixtures::fixture(),
            &targets,
            &CancellationToken::new(),
        )
        .await;

    assert!(started.elapsed() < TestFixtures::POLL_TIMEOUT);
    assert_matches::assert_matches!(report.outcome, Outcome::Aborted { ref reason } if reason.contains("test timeout") && reason.contains("await-pod"));
    assert_eq!(cluster.count(&["delete", "namespace", "proj-123"]), 1);
}

/// A namespace stuck on finalizers is a cleanup warning, not a failed run
#[tokio::test]
async fn test_teardown_timeout_is_only_a_warning() {
    let workspace = Workspace::new(&[TestFixtures::MODEL]);
    let cluster = Arc::new(
        ScriptedCluster::new()
            .with_workload(TestFixtures::MODEL)
            .stuck_finalizers(),
    );
    let mut config = workspace.config(&[TestFixtures::MODEL]);
    config.teardown_grace = Duration::from_millis(200);
    let orchestrator = TestHelpers::orchestrator(config, cluster.clone());
    let targets = orchestrator.config().targets.clone();

    let report = orchestrator
        .run_in(
            &TestFixtures::record(),
            &TestFixtures::fixture(),
            &targets,
            &CancellationToken::new(),
        )
        .await;

    assert!(report.passed(), "run failed: {}", report.summary());
    assert_eq!(cluster.count(&["delete", "namespace", "proj-123"]), 1);
    let warning = report
        .warnings
        .iter()
        .find(|w| w.resource == "namespace/proj-123")
        .expect("teardown warning");
    assert!(warning.message.contains("not removed"));
}

/// When every status read fails the verdict names the read error
#[tokio::test]
async fn test_failing_status_read_reports_last_error() {
    let workspace = Workspace::new(&[TestFixtures::MODEL]);
    let cluster = Arc::new(
        ScriptedCluster::new()
            .with_workload(TestFixtures::MODEL)
            .failing_status_read(),
    );
    let mut config = workspace.config(&[TestFixtures::MODEL]);
    config.status_timing = PollTiming {
        interval: Duration::from_millis(10),
        timeout: Duration::from_millis(300),
    };
    let orchestrator = TestHelpers::orchestrator(config, cluster.clone());
    let targets = orchestrator.config().targets.clone();

    let report = orchestrator
        .run_in(
            &TestFixtures::record(),
            &TestFixtures::fixture(),
            &targets,
            &CancellationToken::new(),
        )
        .await;

    assert_matches::assert_matches!(
        report.outcome,
        Outcome::Failed { ref reason } if reason.contains("observed <none>") && reason.contains("not found")
    );
    assert_eq!(cluster.count(&["delete", "namespace", "proj-123"]), 1);
}

/// A panic inside a step is contained and cleanup still runs
#[tokio::test]
async fn test_panicking_step_still_tears_down() {
    let workspace = Workspace::new(&[TestFixtures::MODEL]);
    let cluster = Arc::new(ScriptedCluster::new().with_workload(TestFixtures::MODEL));
    let config = workspace.config(&[TestFixtures::MODEL]);
    let targets = config.targets.clone();

    let mut submitter = MockWorkloadSubmitter::new();
    submitter
        .expect_submit()
        .returning(|_, _| panic!("manifest renderer exploded"));
    let orchestrator = TestOrchestrator::new(config, cluster.clone(), submitter);

    let report = orchestrator
        .run_in(
            &TestFixtures::record(),
            &TestFixtures::fixture(),
            &targets,
            &CancellationToken::new(),
        )
        .await;

    assert_matches::assert_matches!(report.outcome, Outcome::Aborted { ref reason } if reason.contains("submit-workload"));
    assert_eq!(cluster.count(&["delete", "namespace", "proj-123"]), 1);
}

/// The deploy scenario gives every target its own namespace
#[tokio::test]
async fn test_deploy_scenario_isolates_targets() {
    let models = [TestFixtures::MODEL, TestFixtures::SECOND_MODEL];
    let workspace = Workspace::new(&models);
    let cluster = Arc::new(
        ScriptedCluster::new()
            .with_workload(TestFixtures::MODEL)
            .with_workload(TestFixtures::SECOND_MODEL),
    );
    let mut config = workspace.config(&models);
    config.controller_captures.clear();
    let scenarios = TestScenarios::new(TestHelpers::orchestrator(config, cluster.clone()));

    let reports = scenarios
        .run_scenario("deploy", &TestFixtures::fixture(), &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(reports.len(), 2);
    assert!(reports.iter().all(TestReport::passed));
    assert_ne!(reports[0].namespace, reports[1].namespace);
    for report in &reports {
        assert!(report.namespace.starts_with("proj-"));
        assert_eq!(cluster.count(&["delete", "namespace", report.namespace.as_str()]), 1);
    }
}

/// The shared scenario waits for every target in one namespace
#[tokio::test]
async fn test_shared_scenario_uses_one_namespace() {
    let models = [TestFixtures::MODEL, TestFixtures::SECOND_MODEL];
    let workspace = Workspace::new(&models);
    let cluster = Arc::new(
        ScriptedCluster::new()
            .with_workload(TestFixtures::MODEL)
            .with_workload(TestFixtures::SECOND_MODEL),
    );
    let scenarios = TestScenarios::new(TestHelpers::orchestrator(workspace.config(&models), cluster.clone()));

    let reports = scenarios
        .run_scenario("shared", &TestFixtures::fixture(), &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(reports.len(), 1);
    assert!(reports[0].passed(), "{}", reports[0].summary());
    assert_eq!(reports[0].targets.len(), 2);
    assert_eq!(cluster.count(&["create", "namespace"]), 1);
    assert_eq!(cluster.applied().len(), 2);
}

#[tokio::test]
async fn test_unknown_scenario_is_rejected() {
    let workspace = Workspace::new(&[TestFixtures::MODEL]);
    let cluster = Arc::new(ScriptedCluster::new());
    let scenarios = TestScenarios::new(TestHelpers::orchestrator(
        workspace.config(&[TestFixtures::MODEL]),
        cluster.clone(),
    ));

    let err = scenarios
        .run_scenario("chaos", &TestFixtures::fixture(), &CancellationToken::new())
        .await
        .unwrap_err();

    assert_matches::assert_matches!(err, TesterError::ConfigurationError { .. });
    assert!(cluster.history().is_empty());
}

/// Preflight restarts the deployment and waits for its rollout
#[tokio::test]
async fn test_preflight_restart_rollout() {
    let workspace = Workspace::new(&[]);
    let cluster = Arc::new(ScriptedCluster::new());
    let mut config = workspace.config(&[]);
    config.preflight = vec![PreflightAction::parse_restart("redhat-ods-applications/rhods-dashboard").unwrap()];
    let scenarios = TestScenarios::new(TestHelpers::orchestrator(config, cluster.clone()));

    let reports = scenarios
        .run_scenario("preflight", &TestFixtures::fixture(), &CancellationToken::new())
        .await
        .unwrap();

    assert!(reports.is_empty());
    let history = cluster.history();
    assert_eq!(history.len(), 2);
    assert!(history[0].has_args(&["rollout", "restart", "deployment/rhods-dashboard"]));
    assert!(history[1].has_args(&["rollout", "status", "deployment/rhods-dashboard"]));
}
