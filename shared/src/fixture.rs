//! Fixture records that parameterize one test run

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::errors::{SharedError, SharedResult};

/// Project data for one run, loaded from a YAML fixture file.
///
/// Both the short keys (`displayName`) and the dashboard's project keys
/// (`projectDisplayName`) are accepted. Unknown keys are ignored.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Fixture {
    #[serde(alias = "projectDisplayName")]
    pub display_name: String,
    #[serde(default, alias = "projectDescription")]
    pub description: String,
    #[serde(alias = "projectResourceName")]
    pub resource_name: String,
}

impl Fixture {
    pub fn load(path: impl AsRef<Path>) -> SharedResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| SharedError::FixtureUnreadable {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;

        Self::from_yaml(&content).map_err(|e| match e {
            SharedError::FixtureMalformed { message, .. } => SharedError::FixtureMalformed {
                path: path.display().to_string(),
                message,
            },
            other => other,
        })
    }

    pub fn from_yaml(content: &str) -> SharedResult<Self> {
        let fixture: Fixture = serde_yaml::from_str(content).map_err(|e| SharedError::FixtureMalformed {
            path: "<inline>".to_string(),
            message: e.to_string(),
        })?;

        if fixture.display_name.trim().is_empty() {
            return Err(SharedError::FixtureFieldMissing {
                field: "displayName".to_string(),
            });
        }
        if fixture.resource_name.trim().is_empty() {
            return Err(SharedError::FixtureFieldMissing {
                field: "resourceName".to_string(),
            });
        }

        Ok(fixture)
    }
}
