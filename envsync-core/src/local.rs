//! Local and workspace file access, gated by the path sandbox

use std::path::PathBuf;

use serde::Serialize;

use crate::error::Result;
use crate::fs;
use crate::paths::{resolve_local, LocalPath};

/// Content of a file that may legitimately not exist; `exists: false` is a
/// normal outcome, not an error.
#[derive(Debug, Clone, Serialize)]
pub struct FileContentResult<P> {
    pub content: String,
    pub exists: bool,
    pub path: P,
}

/// Read `file` under `base_path`, resolving through the sandbox first.
pub async fn read_local(base_path: &str, file: &str) -> Result<FileContentResult<LocalPath>> {
    let path = resolve_local(base_path, file)?;
    let content = fs::read_to_string_if_exists(path.as_path()).await?;
    Ok(FileContentResult {
        exists: content.is_some(),
        content: content.unwrap_or_default(),
        path,
    })
}

/// Write `content` to `file` under `base_path`, creating parent directories
/// and overwriting in full.
pub async fn write_local(base_path: &str, file: &str, content: &str) -> Result<LocalPath> {
    let path = resolve_local(base_path, file)?;
    fs::write_creating_dirs(path.as_path(), content).await?;
    Ok(path)
}

/// Staging copies of environment files, one tree per `(project, env)` pair.
///
/// Files are resolved against `root/<project>/<env>` with the same sandbox
/// contract as project base paths.
#[derive(Debug, Clone)]
pub struct WorkspaceFiles {
    root: PathBuf,
}

impl WorkspaceFiles {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn base_for(&self, project_id: &str, env_key: &str) -> String {
        self.root
            .join(project_id)
            .join(env_key)
            .to_string_lossy()
            .into_owned()
    }

    pub async fn read(
        &self,
        project_id: &str,
        env_key: &str,
        file: &str,
    ) -> Result<FileContentResult<LocalPath>> {
        read_local(&self.base_for(project_id, env_key), file).await
    }

    pub async fn write(
        &self,
        project_id: &str,
        env_key: &str,
        file: &str,
        content: &str,
    ) -> Result<LocalPath> {
        write_local(&self.base_for(project_id, env_key), file, content).await
    }
}
