//! Cluster command catalogue and typed observations
//!
//! [`Cluster`] only builds command lines for the configured CLI (`oc` or
//! `kubectl`); [`ClusterClient`] runs them through a [`CommandExecutor`] and
//! turns the output into typed observations the poller can check.

use std::fmt;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use crate::error::{TesterError, TesterResult};
use crate::runtime::executor::{CommandLine, RunOptions};
use crate::runtime::poller::{Observation, TargetState};
use crate::traits::CommandExecutor;

/// Where a log capture reads from
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LogSource {
    Pod(String),
    Selector(String),
}

impl fmt::Display for LogSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogSource::Pod(name) => write!(f, "pod/{name}"),
            LogSource::Selector(selector) => write!(f, "-l {selector}"),
        }
    }
}

/// Builds command lines for one cluster CLI
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Cluster {
    cli: String,
}

impl Cluster {
    pub fn new(cli: impl Into<String>) -> Self {
        Self { cli: cli.into() }
    }

    pub fn cli(&self) -> &str {
        &self.cli
    }

    fn command(&self) -> CommandLine {
        CommandLine::new(&self.cli)
    }

    pub fn get_namespace(&self, name: &str) -> CommandLine {
        self.command().args(["get", "namespace", name, "-o", "name"])
    }

    pub fn create_namespace(&self, name: &str) -> CommandLine {
        self.command().args(["create", "namespace", name])
    }

    pub fn annotate_namespace(&self, name: &str, display_name: &str, description: &str) -> CommandLine {
        self.command().args([
            "annotate".to_string(),
            "namespace".to_string(),
            name.to_string(),
            "--overwrite".to_string(),
            format!("openshift.io/display-name={display_name}"),
            format!("openshift.io/description={description}"),
        ])
    }

    /// Request deletion without blocking on finalizers
    pub fn delete_namespace(&self, name: &str) -> CommandLine {
        self.command()
            .args(["delete", "namespace", name, "--ignore-not-found", "--wait=false"])
    }

    pub fn list_pods(&self, namespace: &str) -> CommandLine {
        self.command().args(["get", "pods", "-n", namespace, "--no-headers"])
    }

    pub fn resource_field(&self, kind: &str, name: &str, namespace: &str, jsonpath: &str) -> CommandLine {
        self.command().args([
            "get".to_string(),
            kind.to_string(),
            name.to_string(),
            "-n".to_string(),
            namespace.to_string(),
            "-o".to_string(),
            format!("jsonpath={jsonpath}"),
        ])
    }

    /// Every resource of `kind`, or only `name` when given, as YAML
    pub fn dump_resources(&self, kind: &str, name: Option<&str>, namespace: &str) -> CommandLine {
        let command = self.command().args(["get", kind]);
        let command = match name {
            Some(name) => command.arg(name),
            None => command,
        };
        command.args(["-n", namespace, "-o", "yaml"])
    }

    /// Apply YAML passed on stdin
    pub fn apply_manifest(&self, namespace: &str, yaml: &str) -> CommandLine {
        self.command()
            .args(["apply", "-n", namespace, "-f", "-"])
            .with_stdin(yaml)
    }

    pub fn follow_logs(&self, namespace: &str, source: &LogSource) -> CommandLine {
        match source {
            LogSource::Pod(pod) => self.command().args(["logs", "-f", pod.as_str(), "-n", namespace]),
            LogSource::Selector(selector) => self
                .command()
                .args(["logs", "-l", selector.as_str(), "-f", "-n", namespace]),
        }
    }

    /// Patch a resource. The patch travels as its own argument, so quotes in
    /// the JSON need no shell escaping.
    pub fn patch(
        &self,
        kind: &str,
        name: &str,
        namespace: Option<&str>,
        patch_type: PatchType,
        patch: &str,
    ) -> CommandLine {
        let mut command = self.command();
        if let Some(namespace) = namespace {
            command = command.args(["-n", namespace]);
        }
        command.args([
            "patch".to_string(),
            kind.to_string(),
            name.to_string(),
            format!("--type={patch_type}"),
            "-p".to_string(),
            patch.to_string(),
        ])
    }

    pub fn rollout_restart(&self, namespace: &str, deployment: &str) -> CommandLine {
        self.command().args([
            "-n".to_string(),
            namespace.to_string(),
            "rollout".to_string(),
            "restart".to_string(),
            format!("deployment/{deployment}"),
        ])
    }

    pub fn rollout_status(&self, namespace: &str, deployment: &str, timeout: Duration) -> CommandLine {
        self.command().args([
            "-n".to_string(),
            namespace.to_string(),
            "rollout".to_string(),
            "status".to_string(),
            format!("deployment/{deployment}"),
            format!("--timeout={}s", timeout.as_secs()),
        ])
    }
}

/// Patch strategy accepted by `patch --type`
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PatchType {
    Merge,
    Json,
    Strategic,
}

impl fmt::Display for PatchType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PatchType::Merge => f.write_str("merge"),
            PatchType::Json => f.write_str("json"),
            PatchType::Strategic => f.write_str("strategic"),
        }
    }
}

/// One row of `get pods --no-headers`
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PodRow {
    pub name: String,
    pub ready: String,
    pub status: String,
    pub restarts: String,
    pub age: String,
}

impl PodRow {
    /// Split on whitespace: name, ready, status, restarts, age.
    /// Restarts may span several columns ("2 (5m ago)"); age is the last one.
    pub fn parse(line: &str) -> Option<Self> {
        let columns: Vec<&str> = line.split_whitespace().collect();
        if columns.len() < 3 {
            return None;
        }

        let restarts = if columns.len() > 4 {
            columns[3..columns.len() - 1].join(" ")
        } else {
            columns.get(3).copied().unwrap_or_default().to_string()
        };
        let age = if columns.len() > 4 {
            columns[columns.len() - 1].to_string()
        } else {
            String::new()
        };

        Some(Self {
            name: columns[0].to_string(),
            ready: columns[1].to_string(),
            status: columns[2].to_string(),
            restarts,
            age,
        })
    }

    pub fn is_running(&self) -> bool {
        self.status == "Running"
    }
}

/// Parse a whole pod table, skipping blank and malformed lines
pub fn parse_pod_table(output: &str) -> Vec<PodRow> {
    output.lines().filter_map(PodRow::parse).collect()
}

/// First pod whose name contains `prefix`
pub fn find_pod(output: &str, prefix: &str) -> Option<PodRow> {
    parse_pod_table(output).into_iter().find(|row| row.name.contains(prefix))
}

impl Observation for Option<PodRow> {
    fn satisfies(&self, target: &TargetState) -> bool {
        match target {
            TargetState::Running => self.as_ref().is_some_and(PodRow::is_running),
            TargetState::Status(status) => self.as_ref().is_some_and(|row| &row.status == status),
            TargetState::Present => self.is_some(),
            TargetState::Absent => self.is_none(),
        }
    }
}

/// Status string read from a workload resource
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WorkloadStatus(pub String);

impl WorkloadStatus {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for WorkloadStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            f.write_str("<none>")
        } else {
            f.write_str(&self.0)
        }
    }
}

impl Observation for WorkloadStatus {
    fn satisfies(&self, target: &TargetState) -> bool {
        match target {
            TargetState::Status(expected) => &self.0 == expected,
            TargetState::Running => self.0 == "Running",
            TargetState::Present => !self.0.is_empty(),
            TargetState::Absent => self.0.is_empty(),
        }
    }
}

/// Whether a named resource exists
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Presence {
    Present,
    Absent,
}

impl Observation for Presence {
    fn satisfies(&self, target: &TargetState) -> bool {
        match target {
            TargetState::Absent => *self == Presence::Absent,
            TargetState::Present | TargetState::Running => *self == Presence::Present,
            TargetState::Status(_) => false,
        }
    }
}

fn is_not_found(stderr: &str) -> bool {
    let lower = stderr.to_ascii_lowercase();
    lower.contains("notfound") || lower.contains("not found")
}

/// Runs catalogue commands through an executor
pub struct ClusterClient<E: CommandExecutor> {
    executor: Arc<E>,
    cluster: Cluster,
    command_timeout: Duration,
}

impl<E: CommandExecutor> Clone for ClusterClient<E> {
    fn clone(&self) -> Self {
        Self {
            executor: self.executor.clone(),
            cluster: self.cluster.clone(),
            command_timeout: self.command_timeout,
        }
    }
}

impl<E: CommandExecutor> ClusterClient<E> {
    pub fn new(executor: Arc<E>, cluster: Cluster, command_timeout: Duration) -> Self {
        Self {
            executor,
            cluster,
            command_timeout,
        }
    }

    pub fn cluster(&self) -> &Cluster {
        &self.cluster
    }

    pub fn command_timeout(&self) -> Duration {
        self.command_timeout
    }

    fn options(&self) -> RunOptions {
        RunOptions::with_timeout(self.command_timeout)
    }

    /// Run a command that must succeed
    pub async fn run(&self, command: &CommandLine) -> TesterResult<shared::ExecutionResult> {
        self.executor.run(command, self.options()).await
    }

    /// Run a command whose non-zero exit is returned as data
    pub async fn run_tolerant(&self, command: &CommandLine) -> TesterResult<shared::ExecutionResult> {
        self.executor.run(command, self.options().allow_non_zero()).await
    }

    pub async fn namespace_presence(&self, name: &str) -> TesterResult<Presence> {
        let result = self.run_tolerant(&self.cluster.get_namespace(name)).await?;
        if result.success() {
            Ok(Presence::Present)
        } else if is_not_found(&result.stderr) {
            Ok(Presence::Absent)
        } else {
            Err(TesterError::ExecutionError {
                command: result.command,
                exit_code: result.exit_code,
                stderr: result.stderr,
            })
        }
    }

    /// First pod in `namespace` whose name contains `prefix`; `None` while
    /// nothing matches yet
    pub async fn find_pod(&self, namespace: &str, prefix: &str) -> TesterResult<Option<PodRow>> {
        let result = self.run(&self.cluster.list_pods(namespace)).await?;
        Ok(find_pod(&result.stdout, prefix))
    }

    pub async fn workload_status(
        &self,
        kind: &str,
        name: &str,
        namespace: &str,
        jsonpath: &str,
    ) -> TesterResult<WorkloadStatus> {
        let result = self
            .run(&self.cluster.resource_field(kind, name, namespace, jsonpath))
            .await?;
        Ok(WorkloadStatus(result.stdout.trim().to_string()))
    }

    pub async fn apply_manifest(&self, namespace: &str, yaml: &str) -> TesterResult<()> {
        let result = self.run(&self.cluster.apply_manifest(namespace, yaml)).await?;
        tracing::info!("📦 Applied manifest in {}: {}", namespace, result.stdout.trim());
        Ok(())
    }

    /// Write `get KIND [NAME] -o yaml` for a namespace to `path`.
    ///
    /// Returns `false` when the command failed or returned nothing to write;
    /// a missing resource type is not an error here.
    pub async fn dump_resources(
        &self,
        kind: &str,
        name: Option<&str>,
        namespace: &str,
        path: &Path,
    ) -> TesterResult<bool> {
        let result = self
            .run_tolerant(&self.cluster.dump_resources(kind, name, namespace))
            .await?;
        if !result.success() {
            tracing::debug!("Skipping {} dump for {}: {}", kind, namespace, result.stderr.trim());
            return Ok(false);
        }
        if result.stdout.trim().is_empty() {
            tracing::debug!("No {} resources found in {}", kind, namespace);
            return Ok(false);
        }

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(path, result.stdout.as_bytes()).await?;
        tracing::debug!("📝 Stored {} dump at {}", kind, path.display());
        Ok(true)
    }

    pub async fn patch(
        &self,
        kind: &str,
        name: &str,
        namespace: Option<&str>,
        patch_type: PatchType,
        patch: &str,
    ) -> TesterResult<()> {
        self.run(&self.cluster.patch(kind, name, namespace, patch_type, patch))
            .await?;
        tracing::info!("🩹 Patched {} {}", kind, name);
        Ok(())
    }

    /// Restart a deployment and block until its rollout completes
    pub async fn restart_rollout(&self, namespace: &str, deployment: &str, wait: Duration) -> TesterResult<()> {
        self.run(&self.cluster.rollout_restart(namespace, deployment)).await?;
        tracing::info!("🔄 Restarted rollout of deployment/{} in {}", deployment, namespace);

        // rollout status enforces `wait` itself; give the process a little longer
        let options = RunOptions::with_timeout(wait + self.command_timeout);
        let result = self
            .executor
            .run(&self.cluster.rollout_status(namespace, deployment, wait), options)
            .await?;
        tracing::info!("✅ Rollout finished: {}", result.stdout.trim());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const POD_TABLE: &str = "\
llama-2-7b-chat-predictor-5d9c7-abcde   0/1   ContainerCreating   0          12s
odh-sidecar-7f8d9                       1/1   Running             2 (5m ago)   1h
";

    #[test]
    fn test_parse_pod_row_with_restart_annotation() {
        let rows = parse_pod_table(POD_TABLE);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].status, "ContainerCreating");
        assert_eq!(rows[1].restarts, "2 (5m ago)");
        assert_eq!(rows[1].age, "1h");
        assert!(rows[1].is_running());
    }

    #[test]
    fn test_dump_commands() {
        let cluster = Cluster::new("oc");
        assert!(cluster
            .dump_resources("InferenceService", None, "proj-123")
            .has_args(&["get", "InferenceService", "-n", "proj-123", "-o", "yaml"]));
        assert!(cluster
            .dump_resources("Account", Some("odh-nim-account"), "redhat-ods-applications")
            .has_args(&["get", "Account", "odh-nim-account", "-n", "redhat-ods-applications", "-o", "yaml"]));
    }

    #[test]
    fn test_find_pod_by_prefix() {
        let row = find_pod(POD_TABLE, "llama").unwrap();
        assert_eq!(row.name, "llama-2-7b-chat-predictor-5d9c7-abcde");
        assert!(find_pod(POD_TABLE, "mistral").is_none());
        assert!(find_pod("", "llama").is_none());
    }

    #[test]
    fn test_pod_observation_targets() {
        let pending = find_pod(POD_TABLE, "llama");
        let running = find_pod(POD_TABLE, "odh");
        let missing: Option<PodRow> = None;

        assert!(!pending.satisfies(&TargetState::Running));
        assert!(running.satisfies(&TargetState::Running));
        assert!(pending.satisfies(&TargetState::Present));
        assert!(missing.satisfies(&TargetState::Absent));
    }

    #[test]
    fn test_workload_status_observation() {
        let loaded = WorkloadStatus("Loaded".to_string());
        assert!(loaded.satisfies(&TargetState::Status("Loaded".to_string())));
        assert!(!loaded.satisfies(&TargetState::Status("Pending".to_string())));
        assert_eq!(WorkloadStatus(String::new()).to_string(), "<none>");
    }

    #[test]
    fn test_commands_for_cli() {
        let cluster = Cluster::new("oc");

        let follow = cluster.follow_logs("proj-1", &LogSource::Pod("model-x-pod".to_string()));
        assert_eq!(follow.to_string(), "oc logs -f model-x-pod -n proj-1");

        let selector = cluster.follow_logs("apps", &LogSource::Selector("app=odh-model-controller".to_string()));
        assert!(selector.has_args(&["-l", "app=odh-model-controller", "-f"]));

        let apply = cluster.apply_manifest("proj-1", "kind: Pod");
        assert_eq!(apply.stdin(), Some("kind: Pod"));
        assert!(apply.has_args(&["apply", "-n", "proj-1", "-f", "-"]));
    }

    #[test]
    fn test_patch_keeps_quotes_in_one_argument() {
        let cluster = Cluster::new("kubectl");
        let patch = cluster.patch(
            "storageclass",
            "standard",
            None,
            PatchType::Merge,
            r#"{"metadata":{"annotations":{"note":"it's"}}}"#,
        );
        assert_eq!(patch.get_args().last().unwrap(), r#"{"metadata":{"annotations":{"note":"it's"}}}"#);
        assert!(patch.has_args(&["--type=merge", "-p"]));
    }

    #[test]
    fn test_rollout_status_carries_timeout() {
        let cluster = Cluster::new("oc");
        let status = cluster.rollout_status("apps", "dashboard", Duration::from_secs(120));
        assert!(status.has_args(&["rollout", "status", "deployment/dashboard", "--timeout=120s"]));
    }

    #[test]
    fn test_not_found_detection() {
        assert!(is_not_found("Error from server (NotFound): namespaces \"x\" not found"));
        assert!(!is_not_found("Unable to connect to the server"));
    }
}
