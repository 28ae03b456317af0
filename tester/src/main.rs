//! Workload Deployment Test Runner
//!
//! Deploys workloads into ephemeral namespaces and checks they come up:
//! - Creates a uniquely named namespace per run from the fixture
//! - Waits for each workload's pod and status under bounded polls
//! - Captures pod and controller logs into the artifacts directory
//! - Always dumps resources, stops captures and deletes the namespace

use anyhow::Context;
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use shared::Fixture;
use tester::{
    EnvConfig, ManifestSubmitter, PreflightAction, RealCommandExecutor, SuiteConfig, TestOrchestrator, TestScenarios,
    WorkloadTarget, load_targets,
};

#[derive(Parser)]
#[command(name = "tester")]
#[command(about = "E2E deployment tests for model-serving workloads")]
struct Args {
    /// Test scenario to run
    #[arg(long, default_value = "deploy")]
    scenario: String,

    /// YAML fixture with displayName, description and resourceName
    #[arg(long)]
    fixture: PathBuf,

    /// Workload to deploy (repeatable, kept in order)
    #[arg(long = "target")]
    targets: Vec<String>,

    /// File listing workloads, one per line or a JSON array
    #[arg(long)]
    targets_file: Option<PathBuf>,

    /// Directory holding `<target>.yaml` manifests
    #[arg(long, default_value = "manifests")]
    manifest_dir: PathBuf,

    /// Where logs, dumps and reports are written
    #[arg(long)]
    artifacts_dir: Option<PathBuf>,

    /// Cluster CLI (oc or kubectl)
    #[arg(long)]
    cli: Option<String>,

    /// Per-test timeout in seconds (cleanup runs after it)
    #[arg(long, default_value = "1800")]
    timeout_secs: u64,

    /// Restart a deployment before the suite, as namespace/name (repeatable)
    #[arg(long = "restart-deployment")]
    restart_deployments: Vec<String>,

    /// Leave namespaces in place after each run
    #[arg(long)]
    keep_namespaces: bool,

    /// Enable verbose tracing output
    #[arg(long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    shared::logging::init_tracing(if args.verbose { "debug" } else { "info" });
    tracing::info!("🧪 Starting deployment test runner");
    tracing::info!("Scenario: {}, Timeout: {}s", args.scenario, args.timeout_secs);

    let env = EnvConfig::load();
    let fixture = Fixture::load(&args.fixture).context("loading fixture")?;
    let config = build_config(&args, &env)?;

    let executor = Arc::new(RealCommandExecutor::new().with_envs(config.envs.clone()));
    let submitter = ManifestSubmitter::new(
        tester::ClusterClient::new(
            executor.clone(),
            tester::Cluster::new(&config.cli),
            config.command_timeout,
        ),
        config.manifest_dir.clone(),
    );
    let scenarios = TestScenarios::new(TestOrchestrator::new(config, executor, submitter));

    let cancel = CancellationToken::new();
    let ctrl_c = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("🛑 Ctrl-C received, cancelling and cleaning up");
            ctrl_c.cancel();
        }
    });

    let reports = scenarios
        .run_scenario(&args.scenario, &fixture, &cancel)
        .await
        .with_context(|| format!("scenario '{}'", args.scenario))?;

    let failed: Vec<_> = reports.iter().filter(|r| !r.passed()).collect();
    for report in &reports {
        tracing::info!("📋 {}", report.summary());
    }

    if !failed.is_empty() {
        anyhow::bail!("{} of {} run(s) did not pass", failed.len(), reports.len());
    }

    tracing::info!("🏁 Deployment testing completed");
    Ok(())
}

fn build_config(args: &Args, env: &EnvConfig) -> anyhow::Result<SuiteConfig> {
    let mut targets: Vec<WorkloadTarget> = args.targets.iter().map(WorkloadTarget::new).collect();
    if let Some(path) = &args.targets_file {
        targets.extend(load_targets(path).with_context(|| format!("reading {}", path.display()))?);
    }

    let cli = args
        .cli
        .clone()
        .or_else(|| env.cluster_cli.clone())
        .unwrap_or_else(|| "oc".to_string());
    let artifacts = args
        .artifacts_dir
        .clone()
        .or_else(|| env.artifacts_dir.clone())
        .unwrap_or_else(|| PathBuf::from("artifacts"));

    let mut builder = SuiteConfig::builder()
        .cli(cli)
        .artifacts_root(artifacts)
        .manifest_dir(args.manifest_dir.clone())
        .targets(targets)
        .envs(env.credentials.clone())
        .test_timeout(Duration::from_secs(args.timeout_secs))
        .keep_namespaces(args.keep_namespaces);

    for spec in &args.restart_deployments {
        builder = builder.preflight(PreflightAction::parse_restart(spec)?);
    }

    Ok(builder.build())
}
