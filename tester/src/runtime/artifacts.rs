//! On-disk layout of a run's artifacts
//!
//! ```text
//! <root>/<namespace>/<label>/<label>.log
//! <root>/<namespace>/<label>/<label>.pid
//! <root>/<namespace>/resources/<Kind>.yaml
//! <root>/<namespace>/report.json
//! ```

use std::path::{Path, PathBuf};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ArtifactLayout {
    run_dir: PathBuf,
}

impl ArtifactLayout {
    pub fn for_run(root: impl AsRef<Path>, namespace: &str) -> Self {
        Self {
            run_dir: root.as_ref().join(namespace),
        }
    }

    pub fn run_dir(&self) -> &Path {
        &self.run_dir
    }

    pub fn capture_log(&self, label: &str) -> PathBuf {
        self.run_dir.join(label).join(format!("{label}.log"))
    }

    pub fn resources_dir(&self) -> PathBuf {
        self.run_dir.join("resources")
    }

    pub fn resource_dump(&self, stem: &str) -> PathBuf {
        self.resources_dir().join(format!("{stem}.yaml"))
    }

    pub fn report_path(&self) -> PathBuf {
        self.run_dir.join("report.json")
    }
}
