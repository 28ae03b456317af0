//! Manifest-based workload submission

use async_trait::async_trait;
use std::path::{Path, PathBuf};

use shared::NamespaceRecord;

use crate::config::WorkloadTarget;
use crate::error::{TesterError, TesterResult};
use crate::runtime::cluster::ClusterClient;
use crate::traits::{CommandExecutor, WorkloadSubmitter};

/// Applies `<manifest-dir>/<target>.yaml` (or the target's own manifest)
/// after substituting `{{namespace}}` and `{{name}}`
pub struct ManifestSubmitter<E: CommandExecutor> {
    client: ClusterClient<E>,
    manifest_dir: PathBuf,
}

impl<E: CommandExecutor> ManifestSubmitter<E> {
    pub fn new(client: ClusterClient<E>, manifest_dir: impl Into<PathBuf>) -> Self {
        Self {
            client,
            manifest_dir: manifest_dir.into(),
        }
    }

    fn manifest_for(&self, target: &WorkloadTarget) -> PathBuf {
        target
            .manifest
            .clone()
            .unwrap_or_else(|| self.manifest_dir.join(format!("{}.yaml", target.name)))
    }
}

pub fn render_manifest(template: &str, namespace: &str, name: &str) -> String {
    template
        .replace("{{namespace}}", namespace)
        .replace("{{name}}", name)
}

async fn read_manifest(path: &Path) -> TesterResult<String> {
    tokio::fs::read_to_string(path)
        .await
        .map_err(|e| TesterError::config(format!("manifest {}: {}", path.display(), e)))
}

#[async_trait]
impl<E: CommandExecutor> WorkloadSubmitter for ManifestSubmitter<E> {
    async fn submit(&self, namespace: &NamespaceRecord, target: &WorkloadTarget) -> TesterResult<()> {
        let path = self.manifest_for(target);
        let template = read_manifest(&path).await?;
        let manifest = render_manifest(&template, &namespace.name, &target.name);

        tracing::info!("🚀 Submitting {} into {} from {}", target.name, namespace.name, path.display());
        self.client.apply_manifest(&namespace.name, &manifest).await
    }
}
