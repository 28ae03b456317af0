//! Core shared types and identifiers

use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::errors::{SharedError, SharedResult};

/// Longest name the cluster accepts for a namespace
pub const MAX_NAMESPACE_LEN: usize = 63;

/// Outcome of one external command invocation
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionResult {
    pub command: String,
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
}

impl ExecutionResult {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

/// Opaque environment value passed through to spawned commands
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyValuePair {
    pub key: String,
    pub value: String,
}

/// One ephemeral namespace owned by a single test run
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NamespaceRecord {
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub delete_on_teardown: bool,
}

impl NamespaceRecord {
    /// Generate a uniquely suffixed namespace name from a base resource name.
    ///
    /// The suffix is drawn once here; callers must thread the returned record
    /// through setup, body and teardown instead of generating a new one.
    pub fn generate(base: &str) -> SharedResult<Self> {
        let suffix: u32 = rand::thread_rng().gen_range(0..1_000_000);
        Self::with_suffix(base, suffix)
    }

    pub fn with_suffix(base: &str, suffix: u32) -> SharedResult<Self> {
        let mut stem = sanitize_name(base);
        // room for "-" plus six digits
        stem.truncate(MAX_NAMESPACE_LEN - 7);
        let stem = stem.trim_end_matches('-');
        if stem.is_empty() {
            return Err(SharedError::InvalidName { input: base.to_string() });
        }

        Ok(Self {
            name: format!("{stem}-{suffix:06}"),
            created_at: Utc::now(),
            delete_on_teardown: true,
        })
    }

    /// Keep the namespace around after the run (debugging aid)
    pub fn retained(mut self) -> Self {
        self.delete_on_teardown = false;
        self
    }
}

impl fmt::Display for NamespaceRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}

/// Lowercase DNS-1123 label form of an arbitrary display string
pub fn sanitize_name(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut last_dash = true;

    for c in input.chars() {
        if c.is_ascii_alphanumeric() {
            out.push(c.to_ascii_lowercase());
            last_dash = false;
        } else if !last_dash {
            out.push('-');
            last_dash = true;
        }
    }

    out.trim_end_matches('-').to_string()
}

/// Named phases of one test run, used as a structured logging field
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TestStep {
    Preflight,
    EnsureAbsent,
    CreateNamespace,
    SubmitWorkload,
    AwaitPod,
    AttachCapture,
    AwaitStatus,
    Assert,
    DumpResources,
    StopCaptures,
    Teardown,
}

impl fmt::Display for TestStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TestStep::Preflight => "preflight",
            TestStep::EnsureAbsent => "ensure-absent",
            TestStep::CreateNamespace => "create-namespace",
            TestStep::SubmitWorkload => "submit-workload",
            TestStep::AwaitPod => "await-pod",
            TestStep::AttachCapture => "attach-capture",
            TestStep::AwaitStatus => "await-status",
            TestStep::Assert => "assert",
            TestStep::DumpResources => "dump-resources",
            TestStep::StopCaptures => "stop-captures",
            TestStep::Teardown => "teardown",
        };
        f.write_str(name)
    }
}
