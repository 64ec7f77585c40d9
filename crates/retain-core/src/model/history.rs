//! A complete deployment history snapshot for one retention run.

use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use super::{Deployment, Environment, Project, Release};

/// Everything the engine needs for one computation: the four flat
/// collections exported from the deployment pipeline.
///
/// Collections are unordered. Missing collections deserialize as empty.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeploymentHistory {
    #[serde(default)]
    pub projects: Vec<Project>,
    #[serde(default)]
    pub environments: Vec<Environment>,
    #[serde(default)]
    pub releases: Vec<Release>,
    #[serde(default)]
    pub deployments: Vec<Deployment>,
}

impl DeploymentHistory {
    /// Parse a history snapshot from a JSON document.
    ///
    /// # Errors
    ///
    /// Returns an error if the document is not valid JSON or does not match
    /// the snapshot shape.
    pub fn from_json_str(raw: &str) -> Result<Self> {
        serde_json::from_str(raw).context("Failed to parse deployment history JSON")
    }

    /// Read and parse a history snapshot from disk.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        Self::from_json_str(&content).with_context(|| format!("Failed to parse {}", path.display()))
    }

    /// Total number of records across all collections.
    #[must_use]
    pub fn record_count(&self) -> usize {
        self.projects.len() + self.environments.len() + self.releases.len() + self.deployments.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const SNAPSHOT: &str = r#"{
        "projects": [{ "id": "Project-1", "name": "Random Quotes" }],
        "environments": [{ "id": "Environment-1", "name": "Staging" }],
        "releases": [
            { "id": "Release-1", "project_id": "Project-1", "version": "1.0.0", "created": "2000-01-01T08:00:00Z" }
        ],
        "deployments": [
            { "id": "Deployment-1", "release_id": "Release-1", "environment_id": "Environment-1", "deployed_on": "2000-01-01T10:00:00Z" }
        ]
    }"#;

    #[test]
    fn parses_full_snapshot() {
        let history = DeploymentHistory::from_json_str(SNAPSHOT).expect("parse snapshot");
        assert_eq!(history.projects.len(), 1);
        assert_eq!(history.environments[0].name, "Staging");
        assert_eq!(history.releases[0].version.as_deref(), Some("1.0.0"));
        assert_eq!(history.record_count(), 4);
    }

    #[test]
    fn missing_collections_default_to_empty() {
        let history = DeploymentHistory::from_json_str("{}").expect("parse empty");
        assert_eq!(history, DeploymentHistory::default());
    }

    #[test]
    fn malformed_json_is_an_error() {
        let err = DeploymentHistory::from_json_str("{\"projects\": 7}").expect_err("bad shape");
        assert!(err.to_string().contains("deployment history"));
    }

    #[test]
    fn load_reads_from_disk() {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        file.write_all(SNAPSHOT.as_bytes()).expect("write snapshot");

        let history = DeploymentHistory::load(file.path()).expect("load snapshot");
        assert_eq!(history.deployments[0].id, "Deployment-1");
    }

    #[test]
    fn load_reports_missing_file() {
        let dir = tempfile::tempdir().expect("temp dir");
        let err = DeploymentHistory::load(&dir.path().join("absent.json")).expect_err("missing");
        assert!(err.to_string().contains("Failed to read"));
    }
}
