//! Test helpers: a scripted fake cluster and orchestrator construction
//!
//! `ScriptedCluster` answers the cluster CLI commands the harness issues,
//! keeping namespaces, pods and workload statuses in memory. Log captures
//! are real processes; the tests point the CLI at `echo` so they print their
//! own arguments and exit.

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use shared::ExecutionResult;
use tester::*;

use super::fixtures::TestFixtures;

#[derive(Default)]
struct ClusterState {
    namespaces: HashSet<String>,
    /// `get namespace` calls per name
    namespace_checks: HashMap<String, u32>,
    /// `get pods` calls per namespace
    pod_listings: HashMap<String, u32>,
    /// status reads per workload
    status_reads: HashMap<String, u32>,
    applied: Vec<(String, String)>,
    history: Vec<CommandLine>,
}

/// In-memory cluster behind the `CommandExecutor` seam
pub struct ScriptedCluster {
    state: Mutex<ClusterState>,
    workloads: Vec<String>,
    /// Pod listings that come back before the pods report Running
    pods_ready_after: u32,
    /// Status sequence per workload; the last entry repeats
    statuses: Vec<String>,
    /// Deleting a namespace removes it (false simulates stuck finalizers)
    deletes_complete: bool,
    /// A foreign namespace shows up after this many existence checks
    appears_after: Option<u32>,
    /// The nth `get namespace` call takes this long to answer
    slow_check: Option<(u32, Duration)>,
    /// Status reads fail as if the resource were missing
    status_fails: bool,
}

impl ScriptedCluster {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(ClusterState::default()),
            workloads: Vec::new(),
            pods_ready_after: 2,
            statuses: vec!["".to_string(), "Pending".to_string(), TestFixtures::LOADED.to_string()],
            deletes_complete: true,
            appears_after: None,
            slow_check: None,
            status_fails: false,
        }
    }

    pub fn with_workload(mut self, name: &str) -> Self {
        self.workloads.push(name.to_string());
        self
    }

    pub fn with_statuses(mut self, statuses: &[&str]) -> Self {
        self.statuses = statuses.iter().map(|s| s.to_string()).collect();
        self
    }

    pub fn pods_never_ready(mut self) -> Self {
        self.pods_ready_after = u32::MAX;
        self
    }

    pub fn namespace_appears_after(mut self, checks: u32) -> Self {
        self.appears_after = Some(checks);
        self
    }

    /// Namespace deletion is accepted but never completes
    pub fn stuck_finalizers(mut self) -> Self {
        self.deletes_complete = false;
        self
    }

    pub fn slow_namespace_check(mut self, nth: u32, delay: Duration) -> Self {
        self.slow_check = Some((nth, delay));
        self
    }

    pub fn failing_status_read(mut self) -> Self {
        self.status_fails = true;
        self
    }

    /// Commands seen so far, in order
    pub fn history(&self) -> Vec<CommandLine> {
        self.state.lock().unwrap().history.clone()
    }

    /// How often `args` appeared as a contiguous run in issued commands
    pub fn count(&self, args: &[&str]) -> usize {
        self.history().iter().filter(|c| c.has_args(args)).count()
    }

    pub fn applied(&self) -> Vec<(String, String)> {
        self.state.lock().unwrap().applied.clone()
    }

    fn answer(&self, command: &CommandLine) -> ExecutionResult {
        let args: Vec<&str> = command.get_args().iter().map(String::as_str).collect();
        let mut guard = self.state.lock().unwrap();
        let state = &mut *guard;
        state.history.push(command.clone());

        match args.as_slice() {
            ["get", "namespace", name, ..] => {
                let checks = state.namespace_checks.entry(name.to_string()).or_default();
                *checks += 1;
                if self.appears_after.is_some_and(|after| *checks > after) {
                    state.namespaces.insert(name.to_string());
                }
                if state.namespaces.contains(*name) {
                    ok(command, &format!("namespace/{name}\n"))
                } else {
                    failed(
                        command,
                        1,
                        &format!("Error from server (NotFound): namespaces \"{name}\" not found"),
                    )
                }
            }
            ["create", "namespace", name] => {
                state.namespaces.insert(name.to_string());
                ok(command, &format!("namespace/{name} created\n"))
            }
            ["delete", "namespace", name, ..] => {
                if self.deletes_complete {
                    state.namespaces.remove(*name);
                }
                ok(command, "")
            }
            ["get", "pods", "-n", namespace, ..] => {
                let listings = state.pod_listings.entry(namespace.to_string()).or_default();
                *listings += 1;
                let listings = *listings;
                let phase = if listings > self.pods_ready_after {
                    "Running"
                } else {
                    "ContainerCreating"
                };
                if listings == 1 {
                    return ok(command, "");
                }
                let table: String = self
                    .workloads
                    .iter()
                    .map(|w| format!("{w}-predictor-00001-deployment-7d9f   1/2   {phase}   0   {listings}s\n"))
                    .collect();
                ok(command, &table)
            }
            ["get", _, "-n", _, "-o", "yaml"] => ok(command, "apiVersion: v1\nitems: []\nkind: List\n"),
            ["get", kind, name, "-n", _, "-o", "yaml"] => ok(command, &format!("kind: {kind}\nmetadata:\n  name: {name}\n")),
            ["get", kind, name, "-n", _, "-o", _] if self.status_fails => failed(
                command,
                1,
                &format!("Error from server (NotFound): {kind}s \"{name}\" not found"),
            ),
            ["get", _, name, "-n", _, "-o", _] => {
                let reads = state.status_reads.entry(name.to_string()).or_default();
                let index = (*reads as usize).min(self.statuses.len().saturating_sub(1));
                *reads += 1;
                ok(command, self.statuses.get(index).map(String::as_str).unwrap_or(""))
            }
            ["apply", "-n", namespace, "-f", "-"] => {
                let manifest = command.stdin().unwrap_or_default().to_string();
                state.applied.push((namespace.to_string(), manifest));
                ok(command, "inferenceservice.serving.kserve.io/configured\n")
            }
            _ => ok(command, ""),
        }
    }
}

#[async_trait]
impl CommandExecutor for ScriptedCluster {
    async fn run(&self, command: &CommandLine, options: RunOptions) -> TesterResult<ExecutionResult> {
        if let Some((nth, delay)) = self.slow_check {
            if command.has_args(&["get", "namespace"]) {
                let upcoming = self.state.lock().unwrap().namespace_checks.values().sum::<u32>() + 1;
                if upcoming == nth {
                    tokio::time::sleep(delay).await;
                }
            }
        }
        let result = self.answer(command);
        if !result.success() && options.fail_on_non_zero {
            return Err(TesterError::ExecutionError {
                command: result.command,
                exit_code: result.exit_code,
                stderr: result.stderr,
            });
        }
        Ok(result)
    }
}

fn ok(command: &CommandLine, stdout: &str) -> ExecutionResult {
    ExecutionResult {
        command: command.to_string(),
        exit_code: 0,
        stdout: stdout.to_string(),
        stderr: String::new(),
    }
}

fn failed(command: &CommandLine, exit_code: i32, stderr: &str) -> ExecutionResult {
    ExecutionResult {
        command: command.to_string(),
        exit_code,
        stdout: String::new(),
        stderr: stderr.to_string(),
    }
}

pub struct TestHelpers;

impl TestHelpers {
    /// Fast timings, `echo` as the CLI for captures, artifacts under `artifacts`
    pub fn config(artifacts: &Path, manifests: &Path, targets: &[&str]) -> SuiteConfig {
        SuiteConfig::builder()
            .cli("echo")
            .artifacts_root(artifacts)
            .manifest_dir(manifests)
            .targets(targets.iter().map(|t| WorkloadTarget::new(*t)))
            .pod_timing(TestFixtures::POLL_INTERVAL, TestFixtures::POLL_TIMEOUT)
            .status_timing(TestFixtures::POLL_INTERVAL, TestFixtures::POLL_TIMEOUT)
            .namespace_removal(TestFixtures::POLL_INTERVAL, TestFixtures::POLL_TIMEOUT)
            .teardown_grace(TestFixtures::POLL_TIMEOUT)
            .build()
    }

    pub fn write_manifests(dir: &Path, targets: &[&str]) {
        for target in targets {
            std::fs::write(dir.join(format!("{target}.yaml")), TestFixtures::manifest()).unwrap();
        }
    }

    pub fn orchestrator(
        config: SuiteConfig,
        cluster: Arc<ScriptedCluster>,
    ) -> TestOrchestrator<ScriptedCluster, ManifestSubmitter<ScriptedCluster>> {
        let client = ClusterClient::new(cluster.clone(), Cluster::new(&config.cli), config.command_timeout);
        let submitter = ManifestSubmitter::new(client, config.manifest_dir.clone());
        TestOrchestrator::new(config, cluster, submitter)
    }
}
