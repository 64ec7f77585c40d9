//! Read-only records consumed by the retention engine.
//!
//! These mirror the deployment pipeline's own data: projects own releases,
//! releases are deployed into environments. The engine never mutates them.

pub mod history;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub use history::DeploymentHistory;

/// A deployable project.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Project {
    pub id: String,
    #[serde(default)]
    pub name: String,
}

impl Project {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
        }
    }
}

/// A deployment target such as `staging` or `production`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Environment {
    pub id: String,
    #[serde(default)]
    pub name: String,
}

impl Environment {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
        }
    }
}

/// A versioned build of exactly one project.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Release {
    pub id: String,
    pub project_id: String,
    #[serde(default)]
    pub version: Option<String>,
    pub created: DateTime<Utc>,
}

impl Release {
    pub fn new(
        id: impl Into<String>,
        project_id: impl Into<String>,
        version: Option<String>,
        created: DateTime<Utc>,
    ) -> Self {
        Self {
            id: id.into(),
            project_id: project_id.into(),
            version,
            created,
        }
    }
}

/// One deploy of one release into one environment.
///
/// `project_id` is the project the deploying system *declared*. Grouping
/// always uses the release's own project instead, so this field is carried
/// for reporting only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Deployment {
    pub id: String,
    pub release_id: String,
    pub environment_id: String,
    pub deployed_on: DateTime<Utc>,
    #[serde(default)]
    pub project_id: Option<String>,
}

impl Deployment {
    pub fn new(
        id: impl Into<String>,
        release_id: impl Into<String>,
        environment_id: impl Into<String>,
        deployed_on: DateTime<Utc>,
    ) -> Self {
        Self {
            id: id.into(),
            release_id: release_id.into(),
            environment_id: environment_id.into(),
            deployed_on,
            project_id: None,
        }
    }

    /// Attach the declared project id.
    #[must_use]
    pub fn declared_by(mut self, project_id: impl Into<String>) -> Self {
        self.project_id = Some(project_id.into());
        self
    }
}
