//! Remote file access over ssh/scp
//!
//! ssh and scp are treated as opaque external programs invoked with fixed,
//! hardened option sets; the exact argument shapes are relied on by host-side
//! `authorized_keys` and `sudoers` policies and must not drift. BatchMode
//! guarantees the commands fail instead of prompting, so every connection has
//! to be non-interactively authorizable by the operator's ssh configuration.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};
use uuid::Uuid;

use crate::command::{CommandRunner, Invocation, DEFAULT_TIMEOUT};
use crate::config::{EnvironmentConfig, UploadMode};
use crate::error::{Result, SyncError};
use crate::local::FileContentResult;
use crate::paths::{resolve_remote, LocalPath, RemotePath};

const SSH_OPTIONS: [&str; 4] = ["-o", "BatchMode=yes", "-o", "ConnectTimeout=10"];

/// Staging directory for sudo-mediated uploads when the environment does not
/// configure one.
const DEFAULT_UPLOAD_TMP_DIR: &str = "/tmp/envsync";

/// Successful upload; the temp artifact of a sudo-mediated upload never
/// outlives the call, so the final destination is the only path reported.
#[derive(Debug, Clone)]
pub struct UploadResult {
    pub remote_path: RemotePath,
}

/// Remote reads and uploads for one or more hosts. Holds no connection state;
/// every operation is a fresh process invocation.
pub struct RemoteFiles {
    runner: Arc<dyn CommandRunner>,
    timeout: Duration,
}

impl RemoteFiles {
    pub fn new(runner: Arc<dyn CommandRunner>) -> Self {
        Self {
            runner,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Read a remote file via `ssh <host> cat <path>`.
    ///
    /// A "No such file" failure from the remote `cat` is a normal
    /// `exists: false` result; any other failure (auth, connection,
    /// permission, timeout) propagates.
    pub async fn read(
        &self,
        host_alias: &str,
        base_path: &str,
        file: &str,
    ) -> Result<FileContentResult<RemotePath>> {
        let remote_path = resolve_remote(base_path, file)?;
        let invocation = ssh_command(host_alias, ["cat", remote_path.as_str()]);
        match self.runner.run(&invocation, self.timeout).await {
            Ok(outcome) => Ok(FileContentResult {
                content: outcome.stdout,
                exists: true,
                path: remote_path,
            }),
            Err(err) if is_absent_signature(&err) => Ok(FileContentResult {
                content: String::new(),
                exists: false,
                path: remote_path,
            }),
            Err(err) => Err(err),
        }
    }

    /// Upload a local file to `file` under the environment's base path.
    ///
    /// Direct mode is a single scp; a transfer that dies partway can leave a
    /// partially written destination file, which is the accepted risk of that
    /// mode. Sudo mode stages through a temp path so the destination only
    /// ever changes via the final rename.
    pub async fn upload(
        &self,
        host_alias: &str,
        config: &EnvironmentConfig,
        file: &str,
        local: &LocalPath,
    ) -> Result<UploadResult> {
        let remote_path = resolve_remote(&config.base_path, file)?;

        if config.upload_mode != UploadMode::Sudo {
            self.scp(host_alias, local, &remote_path).await?;
            return Ok(UploadResult { remote_path });
        }

        let tmp_dir = config
            .upload_tmp_dir
            .as_deref()
            .map(str::trim)
            .filter(|dir| !dir.is_empty())
            .unwrap_or(DEFAULT_UPLOAD_TMP_DIR);
        self.upload_with_sudo(host_alias, remote_path, local, file, tmp_dir)
            .await
    }

    /// scp to a temp path, then move into place with non-interactive sudo.
    ///
    /// The steps are strictly sequential and not atomic across the network: a
    /// crash between the transfer and the move leaves an orphaned temp file
    /// and an untouched destination. On a failed move the temp artifact is
    /// removed best-effort; a cleanup failure is logged and never replaces
    /// the move error.
    async fn upload_with_sudo(
        &self,
        host_alias: &str,
        remote_path: RemotePath,
        local: &LocalPath,
        file: &str,
        tmp_dir: &str,
    ) -> Result<UploadResult> {
        let tmp_name = build_tmp_name(file);
        // Temp paths get the same sandbox rules as destinations; the
        // privileged path relaxes nothing.
        crate::paths::assert_safe_remote(tmp_dir, "uploadTmpDir")?;
        let tmp_path = resolve_remote(tmp_dir, &tmp_name)?;

        self.ssh(host_alias, ["mkdir", "-p", tmp_dir]).await?;
        self.scp(host_alias, local, &tmp_path).await?;

        let moved = self
            .ssh(
                host_alias,
                ["sudo", "-n", "mv", tmp_path.as_str(), remote_path.as_str()],
            )
            .await;
        if let Err(move_err) = moved {
            if let Err(cleanup_err) = self.ssh(host_alias, ["rm", "-f", tmp_path.as_str()]).await {
                warn!(
                    tmp_path = %tmp_path,
                    error = %cleanup_err,
                    "failed to remove temp artifact after failed move"
                );
            }
            return Err(move_err);
        }

        debug!(remote_path = %remote_path, "sudo-mediated upload complete");
        Ok(UploadResult { remote_path })
    }

    async fn ssh<'a>(
        &self,
        host_alias: &str,
        remote_args: impl IntoIterator<Item = &'a str>,
    ) -> Result<()> {
        self.runner
            .run(&ssh_command(host_alias, remote_args), self.timeout)
            .await?;
        Ok(())
    }

    async fn scp(&self, host_alias: &str, local: &LocalPath, target: &RemotePath) -> Result<()> {
        let mut args: Vec<String> = SSH_OPTIONS.iter().map(|s| s.to_string()).collect();
        args.push(local.as_path().to_string_lossy().into_owned());
        args.push(format!("{host_alias}:{target}"));
        self.runner
            .run(&Invocation::new("scp", args), self.timeout)
            .await?;
        Ok(())
    }
}

fn ssh_command<'a>(host_alias: &str, remote_args: impl IntoIterator<Item = &'a str>) -> Invocation {
    let mut args: Vec<String> = SSH_OPTIONS.iter().map(|s| s.to_string()).collect();
    args.push(host_alias.to_string());
    args.extend(remote_args.into_iter().map(str::to_string));
    Invocation::new("ssh", args)
}

/// `cat` reports a missing file on stderr; other failures (auth, connect,
/// permission) never carry these signatures.
fn is_absent_signature(err: &SyncError) -> bool {
    match err {
        SyncError::RemoteCommandFailed { stderr, .. } => {
            stderr.contains("No such file") || stderr.contains("not found")
        }
        _ => false,
    }
}

/// Unique-per-call temp name: `<basename>.<unix-nanos base36>.<uuid chars>`.
/// Concurrent uploads of the same logical file stage through different temp
/// paths and never collide.
fn build_tmp_name(file: &str) -> String {
    let base = file.rsplit('/').next().unwrap_or(file);
    let stamp = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or(0);
    let rand: String = Uuid::new_v4().simple().to_string().chars().take(6).collect();
    format!("{base}.{}.{rand}", to_base36(stamp))
}

fn to_base36(mut value: u128) -> String {
    const DIGITS: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";
    if value == 0 {
        return "0".to_string();
    }
    let mut out = Vec::new();
    while value > 0 {
        out.push(DIGITS[(value % 36) as usize]);
        value /= 36;
    }
    out.reverse();
    String::from_utf8(out).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::testing::RecordingRunner;
    use crate::config::EnvKind;
    use crate::paths::resolve_local;

    fn remote_config(mode: UploadMode, tmp_dir: Option<&str>) -> EnvironmentConfig {
        EnvironmentConfig {
            kind: EnvKind::Remote,
            base_path: "/srv/app".to_string(),
            host_alias: Some("prod".to_string()),
            files: vec!["config/.env".to_string()],
            upload_mode: mode,
            upload_tmp_dir: tmp_dir.map(str::to_string),
            notes: None,
        }
    }

    fn local_fixture(dir: &tempfile::TempDir) -> LocalPath {
        std::fs::write(dir.path().join(".env"), "A=1\n").unwrap();
        resolve_local(&dir.path().to_string_lossy(), ".env").unwrap()
    }

    fn args_of(invocation: &Invocation) -> Vec<&str> {
        invocation.args.iter().map(String::as_str).collect()
    }

    #[tokio::test]
    async fn test_read_invokes_hardened_cat() {
        let runner = Arc::new(RecordingRunner::new());
        runner.push_stdout("A=1\n");
        let remote = RemoteFiles::new(runner.clone());

        let result = remote.read("prod", "/srv/app", "config/.env").await.unwrap();
        assert!(result.exists);
        assert_eq!(result.content, "A=1\n");
        assert_eq!(result.path.as_str(), "/srv/app/config/.env");

        let calls = runner.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].program, "ssh");
        assert_eq!(
            args_of(&calls[0]),
            vec![
                "-o",
                "BatchMode=yes",
                "-o",
                "ConnectTimeout=10",
                "prod",
                "cat",
                "/srv/app/config/.env"
            ]
        );
    }

    #[tokio::test]
    async fn test_read_absent_file_is_not_an_error() {
        let runner = Arc::new(RecordingRunner::new());
        runner.push_failure(
            "ssh",
            1,
            "cat: /srv/app/config/.env: No such file or directory\n",
        );
        let remote = RemoteFiles::new(runner);

        let result = remote.read("prod", "/srv/app", "config/.env").await.unwrap();
        assert!(!result.exists);
        assert_eq!(result.content, "");
    }

    #[tokio::test]
    async fn test_read_propagates_other_failures() {
        let runner = Arc::new(RecordingRunner::new());
        runner.push_failure("ssh", 255, "Permission denied (publickey).\n");
        let remote = RemoteFiles::new(runner);

        let err = remote
            .read("prod", "/srv/app", "config/.env")
            .await
            .unwrap_err();
        assert!(matches!(err, SyncError::RemoteCommandFailed { code: 255, .. }));
    }

    #[tokio::test]
    async fn test_read_sandbox_violation_spawns_nothing() {
        let runner = Arc::new(RecordingRunner::new());
        let remote = RemoteFiles::new(runner.clone());

        let err = remote
            .read("prod", "/srv/app", "../../etc/passwd")
            .await
            .unwrap_err();
        assert!(matches!(err, SyncError::UnsafeCharacters { .. }));
        assert_eq!(runner.call_count(), 0);
    }

    #[tokio::test]
    async fn test_direct_upload_is_a_single_scp() {
        let dir = tempfile::tempdir().unwrap();
        let local = local_fixture(&dir);
        let runner = Arc::new(RecordingRunner::new());
        let remote = RemoteFiles::new(runner.clone());
        let config = remote_config(UploadMode::Direct, None);

        let result = remote
            .upload("prod", &config, "config/.env", &local)
            .await
            .unwrap();
        assert_eq!(result.remote_path.as_str(), "/srv/app/config/.env");

        let local_str = local.to_string();
        let calls = runner.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].program, "scp");
        assert_eq!(
            args_of(&calls[0]),
            vec![
                "-o",
                "BatchMode=yes",
                "-o",
                "ConnectTimeout=10",
                local_str.as_str(),
                "prod:/srv/app/config/.env"
            ]
        );
    }

    #[tokio::test]
    async fn test_sudo_upload_sequence() {
        let dir = tempfile::tempdir().unwrap();
        let local = local_fixture(&dir);
        let runner = Arc::new(RecordingRunner::new());
        let remote = RemoteFiles::new(runner.clone());
        let config = remote_config(UploadMode::Sudo, Some("/tmp/x"));

        let result = remote
            .upload("prod", &config, "config/.env", &local)
            .await
            .unwrap();
        assert_eq!(result.remote_path.as_str(), "/srv/app/config/.env");

        let calls = runner.calls();
        assert_eq!(calls.len(), 3);

        assert_eq!(calls[0].program, "ssh");
        assert_eq!(
            &args_of(&calls[0])[4..],
            &["prod", "mkdir", "-p", "/tmp/x"][..]
        );

        assert_eq!(calls[1].program, "scp");
        let scp_target = calls[1].args.last().unwrap();
        let tmp_path = scp_target.strip_prefix("prod:").unwrap().to_string();
        assert!(tmp_path.starts_with("/tmp/x/.env."));

        assert_eq!(calls[2].program, "ssh");
        assert_eq!(
            &args_of(&calls[2])[4..],
            &[
                "prod",
                "sudo",
                "-n",
                "mv",
                tmp_path.as_str(),
                "/srv/app/config/.env"
            ][..]
        );
    }

    #[tokio::test]
    async fn test_sudo_upload_uses_default_tmp_dir() {
        let dir = tempfile::tempdir().unwrap();
        let local = local_fixture(&dir);
        let runner = Arc::new(RecordingRunner::new());
        let remote = RemoteFiles::new(runner.clone());
        let config = remote_config(UploadMode::Sudo, None);

        remote
            .upload("prod", &config, "config/.env", &local)
            .await
            .unwrap();
        let calls = runner.calls();
        assert_eq!(args_of(&calls[0])[7], DEFAULT_UPLOAD_TMP_DIR);
    }

    #[tokio::test]
    async fn test_sudo_tmp_names_differ_across_calls() {
        let dir = tempfile::tempdir().unwrap();
        let local = local_fixture(&dir);
        let runner = Arc::new(RecordingRunner::new());
        let remote = RemoteFiles::new(runner.clone());
        let config = remote_config(UploadMode::Sudo, Some("/tmp/x"));

        remote.upload("prod", &config, "config/.env", &local).await.unwrap();
        remote.upload("prod", &config, "config/.env", &local).await.unwrap();

        let calls = runner.calls();
        let first_tmp = calls[1].args.last().unwrap();
        let second_tmp = calls[4].args.last().unwrap();
        assert_ne!(first_tmp, second_tmp);
    }

    #[tokio::test]
    async fn test_concurrent_uploads_of_same_file_stage_separately() {
        let dir = tempfile::tempdir().unwrap();
        let local = local_fixture(&dir);
        let runner = Arc::new(RecordingRunner::new());
        let remote = RemoteFiles::new(runner.clone());
        let config = remote_config(UploadMode::Sudo, Some("/tmp/x"));

        // No serialization between uploads: both succeed, each through its
        // own temp path. The last move to land wins at the destination.
        let (first, second) = tokio::join!(
            remote.upload("prod", &config, "config/.env", &local),
            remote.upload("prod", &config, "config/.env", &local),
        );
        first.unwrap();
        second.unwrap();

        let calls = runner.calls();
        assert_eq!(calls.len(), 6);
        let tmp_paths: Vec<String> = calls
            .iter()
            .filter(|call| call.program == "scp")
            .map(|call| call.args.last().unwrap().clone())
            .collect();
        assert_eq!(tmp_paths.len(), 2);
        assert_ne!(tmp_paths[0], tmp_paths[1]);
    }

    #[tokio::test]
    async fn test_failed_move_cleans_up_and_keeps_original_error() {
        let dir = tempfile::tempdir().unwrap();
        let local = local_fixture(&dir);
        let runner = Arc::new(RecordingRunner::new());
        runner.push_stdout(""); // mkdir
        runner.push_stdout(""); // scp
        runner.push_failure("ssh", 1, "sudo: a password is required\n"); // mv
        runner.push_failure("ssh", 255, "Connection closed\n"); // rm -f also fails
        let remote = RemoteFiles::new(runner.clone());
        let config = remote_config(UploadMode::Sudo, Some("/tmp/x"));

        let err = remote
            .upload("prod", &config, "config/.env", &local)
            .await
            .unwrap_err();
        match err {
            SyncError::RemoteCommandFailed { stderr, .. } => {
                assert!(stderr.contains("password is required"));
            }
            other => panic!("expected the move error, got {other:?}"),
        }

        let calls = runner.calls();
        assert_eq!(calls.len(), 4);
        let rm_args = args_of(&calls[3]);
        assert_eq!(rm_args[5], "rm");
        assert_eq!(rm_args[6], "-f");
        assert!(rm_args[7].starts_with("/tmp/x/.env."));
    }

    #[tokio::test]
    async fn test_direct_and_sudo_target_the_same_final_path() {
        let dir = tempfile::tempdir().unwrap();
        let local = local_fixture(&dir);

        let direct = RemoteFiles::new(Arc::new(RecordingRunner::new()))
            .upload(
                "prod",
                &remote_config(UploadMode::Direct, None),
                "config/.env",
                &local,
            )
            .await
            .unwrap();
        let sudo = RemoteFiles::new(Arc::new(RecordingRunner::new()))
            .upload(
                "prod",
                &remote_config(UploadMode::Sudo, Some("/tmp/x")),
                "config/.env",
                &local,
            )
            .await
            .unwrap();
        assert_eq!(direct.remote_path, sudo.remote_path);
    }

    #[tokio::test]
    async fn test_upload_rejects_unsafe_tmp_dir() {
        let dir = tempfile::tempdir().unwrap();
        let local = local_fixture(&dir);
        let runner = Arc::new(RecordingRunner::new());
        let remote = RemoteFiles::new(runner.clone());
        let config = remote_config(UploadMode::Sudo, Some("/tmp/evil dir"));

        let err = remote
            .upload("prod", &config, "config/.env", &local)
            .await
            .unwrap_err();
        match err {
            SyncError::UnsafeCharacters { label } => assert_eq!(label, "uploadTmpDir"),
            other => panic!("expected UnsafeCharacters, got {other:?}"),
        }
        assert_eq!(runner.call_count(), 0);
    }

    #[test]
    fn test_tmp_name_shape() {
        let name = build_tmp_name("config/.env");
        assert!(name.starts_with(".env."));
        let parts: Vec<&str> = name.split('.').collect();
        // ".env" splits into ["", "env"], then stamp and suffix.
        assert_eq!(parts.len(), 4);
        assert_eq!(parts[3].len(), 6);
    }

    #[test]
    fn test_to_base36() {
        assert_eq!(to_base36(0), "0");
        assert_eq!(to_base36(35), "z");
        assert_eq!(to_base36(36), "10");
    }
}
