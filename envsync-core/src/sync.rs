//! Per-request orchestration of fetch, draft save, and remote sync
//!
//! Every entry point re-validates the requested file against the
//! environment's allow-list before any path resolution, filesystem access, or
//! process spawn. This is the single authorization choke point; the access
//! modules assume their callers came through here.

use std::sync::Arc;

use serde::Serialize;
use serde_json::json;
use tracing::debug;

use crate::config::{assert_env_key, assert_project_id, EnvironmentConfig};
use crate::dotenv;
use crate::error::{Result, SyncError};
use crate::local::{self, WorkspaceFiles};
use crate::paths::{LocalPath, RemotePath};
use crate::ssh::RemoteFiles;
use crate::store::{AuditSink, ProjectStore};

/// Where the authoritative copy of a fetched file came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Source {
    Local,
    Remote,
}

/// A resolved path on either side; serializes as its string form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum ResolvedPath {
    Local(LocalPath),
    Remote(RemotePath),
}

impl std::fmt::Display for ResolvedPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ResolvedPath::Local(path) => write!(f, "{path}"),
            ResolvedPath::Remote(path) => write!(f, "{path}"),
        }
    }
}

/// The workspace staging copy of a file. Absence is normal: a file that has
/// never been drafted simply has no workspace copy yet.
#[derive(Debug, Clone, Serialize)]
pub struct WorkspaceCopy {
    pub exists: bool,
    pub content: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FetchResult {
    pub content: String,
    pub exists: bool,
    pub source: Source,
    pub path: ResolvedPath,
    pub warnings: Vec<String>,
    pub workspace: WorkspaceCopy,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveResult {
    /// Set only for local environments, where the draft is also mirrored to
    /// the local tree.
    pub target_path: Option<LocalPath>,
    pub workspace_path: LocalPath,
    pub warnings: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncResult {
    pub remote_path: RemotePath,
}

/// Stateless front door for the sync core; each call is a self-contained
/// pipeline of validate, resolve, and at most a handful of sequential
/// external invocations. Nothing here retries: retry policy belongs to the
/// caller.
pub struct SyncOrchestrator {
    store: Arc<dyn ProjectStore>,
    audit: Arc<dyn AuditSink>,
    workspace: WorkspaceFiles,
    remote: RemoteFiles,
}

impl SyncOrchestrator {
    pub fn new(
        store: Arc<dyn ProjectStore>,
        audit: Arc<dyn AuditSink>,
        workspace: WorkspaceFiles,
        remote: RemoteFiles,
    ) -> Self {
        Self {
            store,
            audit,
            workspace,
            remote,
        }
    }

    /// Read the authoritative copy (local tree or remote host, depending on
    /// environment kind) and the workspace copy. A missing workspace copy is
    /// never an error.
    pub async fn fetch(&self, project_id: &str, env_key: &str, file: &str) -> Result<FetchResult> {
        let config = self.authorized_config(project_id, env_key, file).await?;

        let (content, exists, source, path) = if config.kind.is_local() {
            let local = local::read_local(&config.base_path, file).await?;
            (
                local.content,
                local.exists,
                Source::Local,
                ResolvedPath::Local(local.path),
            )
        } else {
            let remote = self
                .remote
                .read(host_alias(&config)?, &config.base_path, file)
                .await?;
            (
                remote.content,
                remote.exists,
                Source::Remote,
                ResolvedPath::Remote(remote.path),
            )
        };

        let workspace = self.workspace.read(project_id, env_key, file).await?;
        let warnings = dotenv::lint(&content);

        Ok(FetchResult {
            content,
            exists,
            source,
            path,
            warnings,
            workspace: WorkspaceCopy {
                exists: workspace.exists,
                content: workspace.content,
            },
        })
    }

    /// Write `content` to the workspace copy, mirroring to the local tree
    /// only for local environments. Remote trees are written by [`sync`]
    /// alone.
    ///
    /// [`sync`]: SyncOrchestrator::sync
    pub async fn save_draft(
        &self,
        project_id: &str,
        env_key: &str,
        file: &str,
        content: &str,
    ) -> Result<SaveResult> {
        let config = self.authorized_config(project_id, env_key, file).await?;
        let warnings = dotenv::lint(content);

        let target_path = if config.kind.is_local() {
            Some(local::write_local(&config.base_path, file, content).await?)
        } else {
            None
        };
        let workspace_path = self.workspace.write(project_id, env_key, file, content).await?;

        self.audit
            .append(
                "env.save",
                json!({ "projectId": project_id, "env": env_key, "file": file }),
            )
            .await?;

        Ok(SaveResult {
            target_path,
            workspace_path,
            warnings,
        })
    }

    /// Push the workspace copy of `file` to the remote environment.
    ///
    /// Refused for local environments and when no workspace draft exists;
    /// pushing absent content is never what the operator meant.
    pub async fn sync(&self, project_id: &str, env_key: &str, file: &str) -> Result<SyncResult> {
        let config = self.authorized_config(project_id, env_key, file).await?;
        if config.kind.is_local() {
            return Err(SyncError::InvalidArgument(
                "sync is only for remote environments".into(),
            ));
        }
        let host = host_alias(&config)?;

        let workspace = self.workspace.read(project_id, env_key, file).await?;
        if !workspace.exists {
            return Err(SyncError::PreconditionFailed(format!(
                "no workspace draft for {file:?}; save one before syncing"
            )));
        }

        let uploaded = self
            .remote
            .upload(host, &config, file, &workspace.path)
            .await?;
        debug!(remote_path = %uploaded.remote_path, "synced workspace draft");

        self.audit
            .append(
                "env.sync",
                json!({
                    "projectId": project_id,
                    "env": env_key,
                    "file": file,
                    "remotePath": uploaded.remote_path,
                }),
            )
            .await?;

        Ok(SyncResult {
            remote_path: uploaded.remote_path,
        })
    }

    /// Load, shape-validate, and allow-list gate the environment config.
    async fn authorized_config(
        &self,
        project_id: &str,
        env_key: &str,
        file: &str,
    ) -> Result<EnvironmentConfig> {
        if file.trim().is_empty() {
            return Err(SyncError::InvalidArgument("file is required".into()));
        }
        // Both identifiers become workspace path segments, so both are held
        // to identifier rules, not just non-emptiness.
        assert_project_id(project_id)?;
        assert_env_key(env_key)?;

        let config = self.store.get_env_config(project_id, env_key).await?;
        config.validate()?;
        if !config.is_file_allowed(file) {
            return Err(SyncError::NotAllowed {
                file: file.to_string(),
            });
        }
        Ok(config)
    }
}

fn host_alias(config: &EnvironmentConfig) -> Result<&str> {
    config
        .host_alias_trimmed()
        .ok_or_else(|| SyncError::InvalidArgument("hostAlias is required".into()))
}
