//! Environment-derived settings
//!
//! Values come from:
//! 1. a `.env` file in the current directory or its parents (if present)
//! 2. the process environment, which wins over `.env`
//!
//! ## Variables
//! - `E2E_CLUSTER_CLI`: cluster CLI to invoke (default `oc`)
//! - `E2E_ARTIFACTS_DIR`: where capture logs, dumps and reports go
//! - `KUBECONFIG`, `NGC_API_KEY`, `OC_TOKEN`, `KUBE_TOKEN`: passed through
//!   untouched to every command and capture process

use std::path::PathBuf;

use shared::KeyValuePair;

pub const CLUSTER_CLI_VAR: &str = "E2E_CLUSTER_CLI";
pub const ARTIFACTS_DIR_VAR: &str = "E2E_ARTIFACTS_DIR";

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct EnvConfig {
    pub cluster_cli: Option<String>,
    pub artifacts_dir: Option<PathBuf>,
    pub credentials: Vec<KeyValuePair>,
}

impl EnvConfig {
    /// Credentials forwarded to the cluster CLI when set
    pub const CREDENTIAL_KEYS: &'static [&'static str] = &["KUBECONFIG", "NGC_API_KEY", "OC_TOKEN", "KUBE_TOKEN"];

    /// Load `.env` (silently skipped when missing) and read the process environment
    pub fn load() -> Self {
        let _ = dotenv::dotenv();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        let credentials: Vec<KeyValuePair> = Self::CREDENTIAL_KEYS
            .iter()
            .filter_map(|&key| {
                non_empty(key).map(|value| KeyValuePair {
                    key: key.to_string(),
                    value,
                })
            })
            .collect();

        if !credentials.is_empty() {
            let names: Vec<&str> = credentials.iter().map(|kv| kv.key.as_str()).collect();
            tracing::debug!("🔑 Credentials available: {}", names.join(", "));
        }

        Self {
            cluster_cli: non_empty(CLUSTER_CLI_VAR),
            artifacts_dir: non_empty(ARTIFACTS_DIR_VAR).map(PathBuf::from),
            credentials,
        }
    }
}
