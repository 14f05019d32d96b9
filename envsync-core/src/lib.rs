//! Core library for environment-file synchronization
//!
//! Manages ".env"-style configuration files that live in three places per
//! logical environment: a local tree, a remote host reachable over ssh, and a
//! per-project workspace staging copy. Path resolution is sandboxed on both
//! sides, ssh/scp are invoked as external processes with fixed hardened
//! options, and uploads to privileged destinations stage through a temp path
//! with a non-interactive sudo move.

pub mod command;
pub mod config;
pub mod dotenv;
pub mod error;
pub mod fs;
pub mod local;
pub mod paths;
pub mod ssh;
pub mod store;
pub mod sync;

pub use command::{CommandOutcome, CommandRunner, Invocation, ProcessRunner, DEFAULT_TIMEOUT};
pub use config::{
    assert_env_key, assert_project_id, EnvKind, EnvironmentConfig, Project, ProjectsFile,
    UploadMode,
};
pub use error::{Result, SyncError};
pub use local::{FileContentResult, WorkspaceFiles};
pub use paths::{assert_safe_remote, resolve_local, resolve_remote, LocalPath, RemotePath};
pub use ssh::{RemoteFiles, UploadResult};
pub use store::{AuditSink, FileAuditSink, JsonProjectStore, ProjectStore};
pub use sync::{FetchResult, ResolvedPath, SaveResult, Source, SyncOrchestrator, SyncResult};
