//! Suite configuration
//!
//! Everything one invocation of the harness needs: which workloads to
//! deploy, how to reach the cluster, and how long each kind of wait may take.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use shared::KeyValuePair;

use crate::error::{TesterError, TesterResult};
use crate::runtime::capture::DEFAULT_STOP_GRACE;
use crate::runtime::cluster::PatchType;
use crate::runtime::executor::DEFAULT_COMMAND_TIMEOUT;
use crate::runtime::namespace::DEFAULT_REMOVAL_TIMING;
use crate::runtime::poller::PollTiming;

pub const DEFAULT_POD_TIMING: PollTiming = PollTiming {
    interval: Duration::from_secs(1),
    timeout: Duration::from_secs(600),
};
pub const DEFAULT_STATUS_TIMING: PollTiming = PollTiming {
    interval: Duration::from_secs(2),
    timeout: Duration::from_secs(900),
};
pub const DEFAULT_TEARDOWN_GRACE: Duration = Duration::from_secs(450);
pub const DEFAULT_TEST_TIMEOUT: Duration = Duration::from_secs(1800);
pub const DEFAULT_EXPECTED_STATUS: &str = "Loaded";

/// One workload to deploy and wait for
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkloadTarget {
    pub name: String,
    /// Substring identifying the workload's pod; defaults to the first
    /// dash-separated segment of `name`
    #[serde(default)]
    pub pod_prefix: String,
    /// Manifest to apply; defaults to `<manifest-dir>/<name>.yaml`
    #[serde(default)]
    pub manifest: Option<PathBuf>,
    /// Overrides the status probe's expected value for this target
    #[serde(default)]
    pub expected_status: Option<String>,
}

impl WorkloadTarget {
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            pod_prefix: default_pod_prefix(&name),
            name,
            manifest: None,
            expected_status: None,
        }
    }

    pub fn with_pod_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.pod_prefix = prefix.into();
        self
    }

    pub fn with_manifest(mut self, manifest: impl Into<PathBuf>) -> Self {
        self.manifest = Some(manifest.into());
        self
    }

    pub fn expecting(mut self, status: impl Into<String>) -> Self {
        self.expected_status = Some(status.into());
        self
    }

    fn normalized(mut self) -> Self {
        if self.pod_prefix.is_empty() {
            self.pod_prefix = default_pod_prefix(&self.name);
        }
        self
    }
}

fn default_pod_prefix(name: &str) -> String {
    name.split('-').next().unwrap_or(name).to_string()
}

/// Read targets from a file: a JSON array of targets when the file ends in
/// `.json`, otherwise one target name per line (`#` starts a comment)
pub fn load_targets(path: &Path) -> TesterResult<Vec<WorkloadTarget>> {
    let content = std::fs::read_to_string(path)?;

    let targets: Vec<WorkloadTarget> = if path.extension().is_some_and(|ext| ext == "json") {
        serde_json::from_str::<Vec<WorkloadTarget>>(&content)?
            .into_iter()
            .map(WorkloadTarget::normalized)
            .collect()
    } else {
        content
            .lines()
            .map(|line| line.split('#').next().unwrap_or_default().trim())
            .filter(|line| !line.is_empty())
            .map(WorkloadTarget::new)
            .collect()
    };

    if targets.is_empty() {
        return Err(TesterError::config(format!("no targets listed in {}", path.display())));
    }
    Ok(targets)
}

/// Where a workload's readiness status is read from
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusProbe {
    pub kind: String,
    pub jsonpath: String,
    pub expected: String,
}

impl Default for StatusProbe {
    fn default() -> Self {
        Self {
            kind: "inferenceservice".to_string(),
            jsonpath: "{.status.modelStatus.states.activeModelState}".to_string(),
            expected: DEFAULT_EXPECTED_STATUS.to_string(),
        }
    }
}

/// Extra log stream captured for the whole run, selected by label
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControllerCapture {
    pub label: String,
    pub namespace: String,
    pub selector: String,
}

impl ControllerCapture {
    pub fn new(label: impl Into<String>, namespace: impl Into<String>, selector: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            namespace: namespace.into(),
            selector: selector.into(),
        }
    }

    pub fn defaults() -> Vec<Self> {
        vec![
            Self::new("odh-model-controller", "redhat-ods-applications", "app=odh-model-controller"),
            Self::new(
                "kserve-controller",
                "redhat-ods-applications",
                "app.kubernetes.io/name=kserve-controller-manager",
            ),
        ]
    }
}

/// Resource written to disk before teardown. Without a namespace the run's
/// own namespace is used; without a name every resource of the kind is dumped.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceDump {
    pub kind: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub namespace: Option<String>,
}

impl ResourceDump {
    pub fn kind(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            name: None,
            namespace: None,
        }
    }

    pub fn named(kind: impl Into<String>, name: impl Into<String>, namespace: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            name: Some(name.into()),
            namespace: Some(namespace.into()),
        }
    }

    /// Workload resources of the run plus the NIM account
    pub fn defaults() -> Vec<Self> {
        vec![
            Self::kind("InferenceService"),
            Self::kind("ServingRuntime"),
            Self::named("Account", "odh-nim-account", "redhat-ods-applications"),
        ]
    }

    pub fn namespace_or<'a>(&'a self, run_namespace: &'a str) -> &'a str {
        self.namespace.as_deref().unwrap_or(run_namespace)
    }

    /// File name under the run's `resources` directory, without extension
    pub fn file_stem(&self) -> String {
        match &self.name {
            Some(name) => format!("{}-{}", self.kind, name),
            None => self.kind.clone(),
        }
    }
}

impl std::fmt::Display for ResourceDump {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.name {
            Some(name) => write!(f, "{}/{}", self.kind, name)?,
            None => f.write_str(&self.kind)?,
        }
        if let Some(namespace) = &self.namespace {
            write!(f, " in {namespace}")?;
        }
        Ok(())
    }
}

/// Cluster adjustments made once before any target runs
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "camelCase")]
pub enum PreflightAction {
    RestartRollout {
        namespace: String,
        deployment: String,
    },
    Patch {
        kind: String,
        name: String,
        namespace: Option<String>,
        patch_type: PatchType,
        patch: String,
    },
}

impl PreflightAction {
    /// Parse `namespace/deployment`
    pub fn parse_restart(spec: &str) -> TesterResult<Self> {
        match spec.split_once('/') {
            Some((namespace, deployment)) if !namespace.is_empty() && !deployment.is_empty() => {
                Ok(Self::RestartRollout {
                    namespace: namespace.to_string(),
                    deployment: deployment.to_string(),
                })
            }
            _ => Err(TesterError::config(format!(
                "restart target '{spec}' must look like namespace/deployment"
            ))),
        }
    }
}

#[derive(Clone, Debug)]
pub struct SuiteConfig {
    pub cli: String,
    pub artifacts_root: PathBuf,
    pub manifest_dir: PathBuf,
    /// Deployed in this order
    pub targets: Vec<WorkloadTarget>,
    pub envs: Vec<KeyValuePair>,
    pub command_timeout: Duration,
    pub pod_timing: PollTiming,
    pub status_timing: PollTiming,
    pub namespace_removal: PollTiming,
    pub teardown_grace: Duration,
    pub capture_stop_grace: Duration,
    pub test_timeout: Duration,
    pub status_probe: StatusProbe,
    pub controller_captures: Vec<ControllerCapture>,
    /// Resources written to disk before teardown
    pub dumps: Vec<ResourceDump>,
    pub preflight: Vec<PreflightAction>,
    /// Leave namespaces in place after the run
    pub keep_namespaces: bool,
}

impl Default for SuiteConfig {
    fn default() -> Self {
        Self {
            cli: "oc".to_string(),
            artifacts_root: PathBuf::from("artifacts"),
            manifest_dir: PathBuf::from("manifests"),
            targets: Vec::new(),
            envs: Vec::new(),
            command_timeout: DEFAULT_COMMAND_TIMEOUT,
            pod_timing: DEFAULT_POD_TIMING,
            status_timing: DEFAULT_STATUS_TIMING,
            namespace_removal: DEFAULT_REMOVAL_TIMING,
            teardown_grace: DEFAULT_TEARDOWN_GRACE,
            capture_stop_grace: DEFAULT_STOP_GRACE,
            test_timeout: DEFAULT_TEST_TIMEOUT,
            status_probe: StatusProbe::default(),
            controller_captures: ControllerCapture::defaults(),
            dumps: ResourceDump::defaults(),
            preflight: Vec::new(),
            keep_namespaces: false,
        }
    }
}

impl SuiteConfig {
    pub fn builder() -> crate::config::builder::SuiteConfigBuilder {
        crate::config::builder::SuiteConfigBuilder::new()
    }

    /// Status a target must reach before it counts as deployed
    pub fn expected_status<'a>(&'a self, target: &'a WorkloadTarget) -> &'a str {
        target
            .expected_status
            .as_deref()
            .unwrap_or(&self.status_probe.expected)
    }
}
