//! Small async filesystem helpers shared by the local stores

use std::io::ErrorKind;
use std::path::Path;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::io::AsyncWriteExt;

use crate::error::Result;

/// Read a file as UTF-8, treating a missing file as `None` rather than an
/// error. Any other filesystem error propagates.
pub async fn read_to_string_if_exists(path: &Path) -> Result<Option<String>> {
    match tokio::fs::read_to_string(path).await {
        Ok(content) => Ok(Some(content)),
        Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
        Err(err) => Err(err.into()),
    }
}

/// Write `content` to `path`, creating missing parent directories and
/// overwriting any existing file in full.
pub async fn write_creating_dirs(path: &Path, content: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    tokio::fs::write(path, content).await?;
    Ok(())
}

/// Append a single line to `path`, creating the file and parents as needed.
pub async fn append_line(path: &Path, line: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    let mut file = tokio::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .await?;
    file.write_all(line.as_bytes()).await?;
    file.write_all(b"\n").await?;
    Ok(())
}

/// Read a JSON document, falling back to `default` if the file is missing.
pub async fn read_json_or_default<T: DeserializeOwned>(path: &Path, default: T) -> Result<T> {
    match read_to_string_if_exists(path).await? {
        Some(raw) => Ok(serde_json::from_str(&raw)?),
        None => Ok(default),
    }
}

/// Write a JSON document pretty-printed with a trailing newline.
pub async fn write_json_pretty<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let mut raw = serde_json::to_string_pretty(value)?;
    raw.push('\n');
    write_creating_dirs(path, &raw).await
}
