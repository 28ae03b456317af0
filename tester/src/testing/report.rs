//! Run reports
//!
//! One [`TestReport`] per orchestrator run, written as JSON next to the run's
//! captures so a failed run can be inspected without re-running it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use uuid::Uuid;

use crate::error::{TesterError, TesterResult};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "result", rename_all = "lowercase")]
pub enum Outcome {
    Passed,
    /// The workload was observed in the wrong state
    Failed { reason: String },
    /// The run could not reach a verdict (setup error, poll timeout,
    /// cancellation, panic)
    Aborted { reason: String },
}

impl Outcome {
    /// Map the body's result onto a verdict. Only assertion failures fail
    /// a run; every other error aborts it.
    pub fn from_result(result: &TesterResult<()>) -> Self {
        match result {
            Ok(()) => Outcome::Passed,
            Err(e) if e.is_assertion() => Outcome::Failed { reason: e.to_string() },
            Err(e) => Outcome::Aborted { reason: e.to_string() },
        }
    }
}

/// What was observed for one workload
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetReport {
    pub name: String,
    pub pod: Option<String>,
    pub final_status: Option<String>,
    pub capture_log: Option<PathBuf>,
}

impl TargetReport {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }
}

/// A resource that was not released cleanly; never changes the verdict
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CleanupWarning {
    pub resource: String,
    pub message: String,
}

impl From<&TesterError> for CleanupWarning {
    fn from(err: &TesterError) -> Self {
        let resource = match err {
            TesterError::CleanupError { resource, .. } => resource.clone(),
            TesterError::TeardownTimeout { name, .. } => format!("namespace/{name}"),
            TesterError::CaptureCollision { artifact_id, .. } => artifact_id.clone(),
            _ => "run".to_string(),
        };
        Self {
            resource,
            message: err.to_string(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestReport {
    pub run_id: Uuid,
    pub namespace: String,
    pub targets: Vec<TargetReport>,
    pub outcome: Outcome,
    pub warnings: Vec<CleanupWarning>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl TestReport {
    pub fn new(namespace: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            run_id: Uuid::new_v4(),
            namespace: namespace.into(),
            targets: Vec::new(),
            outcome: Outcome::Aborted {
                reason: "run did not finish".to_string(),
            },
            warnings: Vec::new(),
            started_at: now,
            finished_at: now,
        }
    }

    pub fn passed(&self) -> bool {
        self.outcome == Outcome::Passed
    }

    pub fn warn(&mut self, err: &TesterError) {
        self.warnings.push(CleanupWarning::from(err));
    }

    pub fn target_mut(&mut self, name: &str) -> &mut TargetReport {
        if let Some(index) = self.targets.iter().position(|t| t.name == name) {
            return &mut self.targets[index];
        }
        self.targets.push(TargetReport::new(name));
        let last = self.targets.len() - 1;
        &mut self.targets[last]
    }

    pub async fn write_to(&self, path: &Path) -> TesterResult<()> {
        if let Some(dir) = path.parent() {
            tokio::fs::create_dir_all(dir).await?;
        }
        let json = serde_json::to_string_pretty(self)?;
        tokio::fs::write(path, json).await?;
        Ok(())
    }

    /// One-line summary for logs
    pub fn summary(&self) -> String {
        let verdict = match &self.outcome {
            Outcome::Passed => "PASSED".to_string(),
            Outcome::Failed { reason } => format!("FAILED ({reason})"),
            Outcome::Aborted { reason } => format!("ABORTED ({reason})"),
        };
        format!(
            "{} in {}: {} target(s), {} cleanup warning(s), {}s",
            verdict,
            self.namespace,
            self.targets.len(),
            self.warnings.len(),
            (self.finished_at - self.started_at).num_seconds()
        )
    }
}
