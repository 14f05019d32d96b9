//! Project registry and audit log collaborators
//!
//! The sync core only needs two things from the surrounding system: a way to
//! look up an environment's configuration, and a place to record successful
//! operations. Both are traits so callers can plug in their own storage; the
//! file-backed implementations here match the original JSON-document layout
//! (`<data>/projects.json`, `<data>/audit.log`).

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::Utc;
use serde_json::{json, Value};

use crate::config::{EnvironmentConfig, Project, ProjectsFile};
use crate::error::{Result, SyncError};
use crate::fs;

/// Read access to the project registry.
#[async_trait]
pub trait ProjectStore: Send + Sync {
    async fn get_project(&self, project_id: &str) -> Result<Project>;

    async fn get_env_config(&self, project_id: &str, env_key: &str) -> Result<EnvironmentConfig> {
        let project = self.get_project(project_id).await?;
        project
            .envs
            .get(env_key)
            .cloned()
            .ok_or_else(|| SyncError::NotFound(format!("env config {env_key:?}")))
    }
}

/// Append-only audit trail. Called exactly once per successful draft save and
/// once per successful sync, never on failed attempts.
#[async_trait]
pub trait AuditSink: Send + Sync {
    async fn append(&self, action: &str, fields: Value) -> Result<()>;
}

/// Projects file under a data directory, created empty on first use.
#[derive(Debug, Clone)]
pub struct JsonProjectStore {
    data_dir: PathBuf,
}

impl JsonProjectStore {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
        }
    }

    pub fn projects_path(&self) -> PathBuf {
        self.data_dir.join("projects.json")
    }

    pub async fn read(&self) -> Result<ProjectsFile> {
        let path = self.projects_path();
        if tokio::fs::try_exists(&path).await? {
            fs::read_json_or_default(&path, ProjectsFile::default()).await
        } else {
            let empty = ProjectsFile::default();
            fs::write_json_pretty(&path, &empty).await?;
            Ok(empty)
        }
    }
}

#[async_trait]
impl ProjectStore for JsonProjectStore {
    async fn get_project(&self, project_id: &str) -> Result<Project> {
        let data = self.read().await?;
        data.projects
            .into_iter()
            .find(|project| project.id == project_id)
            .ok_or_else(|| SyncError::NotFound(format!("project {project_id:?}")))
    }
}

/// JSON-lines audit log with RFC 3339 timestamps.
#[derive(Debug, Clone)]
pub struct FileAuditSink {
    path: PathBuf,
}

impl FileAuditSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn in_data_dir(data_dir: &Path) -> Self {
        Self::new(data_dir.join("audit.log"))
    }
}

#[async_trait]
impl AuditSink for FileAuditSink {
    async fn append(&self, action: &str, fields: Value) -> Result<()> {
        let mut entry = json!({
            "time": Utc::now().to_rfc3339(),
            "action": action,
        });
        if let (Some(entry_map), Value::Object(extra)) = (entry.as_object_mut(), fields) {
            entry_map.extend(extra);
        }
        fs::append_line(&self.path, &entry.to_string()).await
    }
}
