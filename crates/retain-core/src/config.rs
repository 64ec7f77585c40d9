use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::fmt;
use std::path::{Path, PathBuf};

use crate::error::RetentionError;
use crate::retention::validate_capacity;

/// File name looked up in the working directory.
pub const PROJECT_CONFIG_FILE: &str = "retain.toml";
/// Environment variable overriding `retention.releases_to_keep`.
pub const KEEP_ENV_VAR: &str = "RETAIN_KEEP";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigFile {
    #[serde(default)]
    pub retention: RetentionConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetentionConfig {
    /// Releases to keep per (project, environment). Signed so that a
    /// negative value in a file reports a capacity error, not a parse error.
    #[serde(default = "default_releases_to_keep")]
    pub releases_to_keep: i64,
}

impl RetentionConfig {
    /// The configured value as a tracker capacity.
    ///
    /// # Errors
    ///
    /// Returns [`RetentionError::InvalidCapacity`] when the value is below 1.
    pub fn capacity(&self) -> Result<usize, RetentionError> {
        validate_capacity(self.releases_to_keep)
    }
}

impl Default for RetentionConfig {
    fn default() -> Self {
        Self {
            releases_to_keep: default_releases_to_keep(),
        }
    }
}

/// Where the effective releases-to-keep value came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConfigSource {
    Flag,
    Env,
    Project,
    User,
    Default,
}

impl fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Flag => "flag",
            Self::Env => "env",
            Self::Project => "project",
            Self::User => "user",
            Self::Default => "default",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EffectiveConfig {
    pub releases_to_keep: usize,
    pub source: ConfigSource,
    /// Config files that were found and parsed.
    pub loaded_files: Vec<PathBuf>,
}

const fn default_releases_to_keep() -> i64 {
    3
}

#[must_use]
pub fn project_config_path(project_root: &Path) -> PathBuf {
    project_root.join(PROJECT_CONFIG_FILE)
}

#[must_use]
pub fn user_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("retain/config.toml"))
}

/// Parse a config file if it exists.
///
/// # Errors
///
/// Returns an error if the file exists but cannot be read or parsed.
pub fn load_config_file(path: &Path) -> Result<Option<ConfigFile>> {
    if !path.exists() {
        return Ok(None);
    }

    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;

    toml::from_str::<ConfigFile>(&content)
        .map(Some)
        .with_context(|| format!("Failed to parse {}", path.display()))
}

/// Resolve the effective configuration.
///
/// Precedence (highest wins): `cli_keep`, `RETAIN_KEEP`, `retain.toml` in
/// `project_root`, the user config file, then the built-in default.
///
/// # Errors
///
/// Returns an error if a config file is malformed, `RETAIN_KEEP` is not an
/// integer, or the winning value is not a positive capacity.
pub fn resolve_config(project_root: &Path, cli_keep: Option<i64>) -> Result<EffectiveConfig> {
    let project_path = project_config_path(project_root);
    let project = load_config_file(&project_path)?;
    let user_path = user_config_path();
    let user = match &user_path {
        Some(path) => load_config_file(path)?,
        None => None,
    };

    let env_keep = env::var(KEEP_ENV_VAR).ok();
    let (requested, source) =
        resolve_releases_to_keep(cli_keep, env_keep.as_deref(), project.as_ref(), user.as_ref())?;
    let releases_to_keep = validate_capacity(requested)?;

    let mut loaded_files = Vec::new();
    if project.is_some() {
        loaded_files.push(project_path);
    }
    if let (Some(_), Some(path)) = (&user, user_path) {
        loaded_files.push(path);
    }

    tracing::debug!(releases_to_keep, %source, "resolved retention config");

    Ok(EffectiveConfig {
        releases_to_keep,
        source,
        loaded_files,
    })
}

fn resolve_releases_to_keep(
    cli_keep: Option<i64>,
    env_keep: Option<&str>,
    project: Option<&ConfigFile>,
    user: Option<&ConfigFile>,
) -> Result<(i64, ConfigSource)> {
    if let Some(value) = cli_keep {
        return Ok((value, ConfigSource::Flag));
    }

    if let Some(raw) = env_keep.map(str::trim).filter(|raw| !raw.is_empty()) {
        let value = raw
            .parse::<i64>()
            .with_context(|| format!("{KEEP_ENV_VAR} must be an integer, got '{raw}'"))?;
        return Ok((value, ConfigSource::Env));
    }

    if let Some(file) = project {
        return Ok((file.retention.releases_to_keep, ConfigSource::Project));
    }

    if let Some(file) = user {
        return Ok((file.retention.releases_to_keep, ConfigSource::User));
    }

    Ok((default_releases_to_keep(), ConfigSource::Default))
}
