//! Environment configuration schema

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::error::{Result, SyncError};

/// Whether an environment lives on this machine or behind an ssh host alias.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EnvKind {
    Local,
    Remote,
}

impl EnvKind {
    pub fn is_local(self) -> bool {
        self == EnvKind::Local
    }
}

/// Upload strategy for remote environments.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum UploadMode {
    /// Single scp straight to the destination. A failed transfer can leave a
    /// partially written destination file; accepted risk of this mode.
    #[default]
    Direct,
    /// scp to a temp location, then a non-interactive `sudo -n mv` into
    /// place. Used when the destination is not writable by the ssh user.
    Sudo,
}

/// Per-environment configuration of one project.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct EnvironmentConfig {
    pub kind: EnvKind,
    pub base_path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host_alias: Option<String>,
    /// Allow-list of relative file paths; exact match only.
    #[serde(default)]
    pub files: Vec<String>,
    #[serde(default)]
    pub upload_mode: UploadMode,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub upload_tmp_dir: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

impl EnvironmentConfig {
    /// Validate shape invariants once at the boundary; later code only
    /// checks values.
    pub fn validate(&self) -> Result<()> {
        if self.base_path.is_empty() {
            return Err(SyncError::InvalidArgument("basePath is required".into()));
        }
        if self.kind == EnvKind::Remote && self.host_alias_trimmed().is_none() {
            return Err(SyncError::InvalidArgument(
                "hostAlias is required for remote environments".into(),
            ));
        }
        Ok(())
    }

    pub fn is_file_allowed(&self, file: &str) -> bool {
        self.files.iter().any(|allowed| allowed == file)
    }

    pub fn host_alias_trimmed(&self) -> Option<&str> {
        self.host_alias
            .as_deref()
            .map(str::trim)
            .filter(|alias| !alias.is_empty())
    }
}

/// A named project with its environments, in declaration order.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct Project {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub envs: IndexMap<String, EnvironmentConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

/// On-disk shape of the projects store.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ProjectsFile {
    #[serde(default)]
    pub projects: Vec<Project>,
}

/// Environment keys name directories under the workspace root, so they are
/// restricted to identifier characters before any path is built from them.
pub fn assert_env_key(value: &str) -> Result<()> {
    let mut chars = value.chars();
    let valid = match chars.next() {
        Some(first) => {
            (first.is_ascii_alphabetic() || first == '_')
                && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        }
        None => false,
    };
    if valid {
        Ok(())
    } else {
        Err(SyncError::InvalidArgument(format!(
            "invalid env key {value:?}"
        )))
    }
}

/// Project ids also name directories under the workspace root. They are
/// uuids in practice, so hyphens are allowed, but separators and dots are
/// not: an id like `../evil` must never reach a path join.
pub fn assert_project_id(value: &str) -> Result<()> {
    let valid = !value.is_empty()
        && value
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if valid {
        Ok(())
    } else {
        Err(SyncError::InvalidArgument(format!(
            "invalid project id {value:?}"
        )))
    }
}
