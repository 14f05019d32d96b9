//! Path sandboxing for local and remote file resolution
//!
//! Every filesystem or ssh operation in this crate goes through one of the
//! two resolvers here. `LocalPath` and `RemotePath` are only constructed by
//! this module, so holding one is proof the sandbox checks passed.
//!
//! Remote paths cannot be canonicalized without a round trip to the host, so
//! the remote resolver is stricter than the local one: a whitelist character
//! class plus a literal `..` substring ban, instead of prefix comparison
//! against a normalized base.

use std::env;
use std::path::{Component, Path, PathBuf, MAIN_SEPARATOR};

use serde::Serialize;

use crate::error::{Result, SyncError};

/// An absolute path on the local filesystem, inside a validated base.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct LocalPath(PathBuf);

impl LocalPath {
    pub fn as_path(&self) -> &Path {
        &self.0
    }

    pub fn into_path_buf(self) -> PathBuf {
        self.0
    }
}

impl std::fmt::Display for LocalPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.display())
    }
}

/// A forward-slash joined path on a remote host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct RemotePath(String);

impl RemotePath {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl std::fmt::Display for RemotePath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Resolve `file` relative to `base_path` on the local filesystem.
///
/// The joined path is lexically normalized and must stay within the
/// normalized base. Symlinks are not resolved; the base path is
/// operator-controlled and is the trust boundary here.
pub fn resolve_local(base_path: &str, file: &str) -> Result<LocalPath> {
    if base_path.is_empty() {
        return Err(SyncError::InvalidArgument("basePath is required".into()));
    }
    if file.is_empty() {
        return Err(SyncError::InvalidArgument("file is required".into()));
    }
    if Path::new(file).is_absolute() {
        return Err(SyncError::InvalidArgument(format!(
            "file must be relative, got {file:?}"
        )));
    }

    let base = normalize(&absolutize(Path::new(base_path))?);
    let target = normalize(&base.join(file));

    if !target.starts_with(&base) {
        return Err(SyncError::PathEscape {
            base: base_path.to_string(),
            file: file.to_string(),
        });
    }

    Ok(LocalPath(target))
}

/// Resolve `file` relative to `base_path` on a remote host.
///
/// Both inputs must independently pass [`assert_safe_remote`]; the join is
/// plain posix concatenation with no `.`/`..` normalization.
pub fn resolve_remote(base_path: &str, file: &str) -> Result<RemotePath> {
    if base_path.is_empty() {
        return Err(SyncError::InvalidArgument("basePath is required".into()));
    }
    if file.starts_with('/') {
        return Err(SyncError::InvalidArgument(format!(
            "file must be relative, got {file:?}"
        )));
    }
    assert_safe_remote(base_path, "basePath")?;
    assert_safe_remote(file, "file")?;
    Ok(RemotePath(posix_join(base_path, file)))
}

/// Check that `value` is usable as a remote path segment: non-empty, drawn
/// from `[A-Za-z0-9._~/-]`, and free of any literal `..`.
///
/// Errors name only `label`, never the value itself, so a rejected input is
/// not echoed back into error messages or logs.
pub fn assert_safe_remote(value: &str, label: &str) -> Result<()> {
    let safe = !value.is_empty()
        && value
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '~' | '/' | '-'))
        && !value.contains("..");
    if safe {
        Ok(())
    } else {
        Err(SyncError::UnsafeCharacters {
            label: label.to_string(),
        })
    }
}

fn posix_join(base: &str, file: &str) -> String {
    format!("{}/{}", base.trim_end_matches('/'), file)
}

fn absolutize(path: &Path) -> Result<PathBuf> {
    if path.is_absolute() {
        Ok(path.to_path_buf())
    } else {
        Ok(env::current_dir()?.join(path))
    }
}

/// Lexical normalization: drops `.` segments and applies `..` against the
/// preceding component, without touching the filesystem.
fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::Prefix(_) | Component::RootDir => out.push(component.as_os_str()),
            Component::CurDir => {}
            Component::ParentDir => {
                // Popping past the root leaves the root in place, the same
                // way posix resolution treats "/.." as "/".
                out.pop();
                if out.as_os_str().is_empty() {
                    out.push(std::path::Component::RootDir.as_os_str());
                }
            }
            Component::Normal(part) => out.push(part),
        }
    }
    if out.as_os_str().is_empty() {
        out.push(format!("{MAIN_SEPARATOR}"));
    }
    out
}
