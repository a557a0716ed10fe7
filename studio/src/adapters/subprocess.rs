//! Subprocess adapter for the media tools (transcoder, downloader).
//!
//! Commands are argv lists, never shell strings. Each invocation gets an
//! explicit timeout; on expiry the child is killed and the call surfaces a
//! timeout error. Callers that need scratch space create a per-invocation
//! temp directory and let it drop with the call.

use std::path::Path;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::AsyncReadExt;
use tracing::debug;

use super::{AdapterError, AdapterErrorKind};

/// Captured output of one finished command.
#[derive(Clone, Debug)]
pub struct CommandOutput {
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
    pub exit_code: i32,
}

impl CommandOutput {
    pub fn stdout_utf8(&self) -> String {
        String::from_utf8_lossy(&self.stdout).into_owned()
    }

    pub fn stderr_utf8(&self) -> String {
        String::from_utf8_lossy(&self.stderr).into_owned()
    }

    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

/// Runs external commands. Mocked in tests to script tool behavior.
#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Runs `argv[0]` with `argv[1..]`, capturing output. A non-zero exit is
    /// returned as a normal [`CommandOutput`], not an error.
    async fn run(
        &self,
        argv: &[String],
        cwd: Option<&Path>,
        timeout: Duration,
    ) -> Result<CommandOutput, AdapterError>;
}

/// Production runner on top of `tokio::process`.
pub struct ProcessRunner;

#[async_trait]
impl CommandRunner for ProcessRunner {
    async fn run(
        &self,
        argv: &[String],
        cwd: Option<&Path>,
        timeout: Duration,
    ) -> Result<CommandOutput, AdapterError> {
        let (program, args) = argv.split_first().ok_or_else(|| {
            AdapterError::new(AdapterErrorKind::Fatal, "empty argv")
        })?;
        debug!(program, args = ?args, "spawning subprocess");

        let mut cmd = tokio::process::Command::new(program);
        cmd.args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        #[cfg(unix)]
        cmd.process_group(0);
        if let Some(dir) = cwd {
            cmd.current_dir(dir);
        }

        let mut child = cmd
            .spawn()
            .map_err(|e| AdapterError::resource(format!("spawn {program}: {e}")))?;

        let mut stdout_pipe = child.stdout.take();
        let mut stderr_pipe = child.stderr.take();

        let wait = async {
            let mut stdout = Vec::new();
            let mut stderr = Vec::new();
            if let Some(ref mut pipe) = stdout_pipe {
                pipe.read_to_end(&mut stdout).await?;
            }
            if let Some(ref mut pipe) = stderr_pipe {
                pipe.read_to_end(&mut stderr).await?;
            }
            let status = child.wait().await?;
            Ok::<_, std::io::Error>(CommandOutput {
                stdout,
                stderr,
                exit_code: status.code().unwrap_or(-1),
            })
        };

        match tokio::time::timeout(timeout, wait).await {
            Ok(Ok(output)) => Ok(output),
            Ok(Err(e)) => Err(AdapterError::resource(format!("{program}: {e}"))),
            Err(_) => Err(AdapterError::timeout(format!(
                "{program} exceeded {}s",
                timeout.as_secs()
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn captures_stdout_and_exit_code() {
        let out = ProcessRunner
            .run(
                &["sh".into(), "-c".into(), "echo hi; exit 3".into()],
                None,
                Duration::from_secs(5),
            )
            .await
            .unwrap();
        assert_eq!(out.stdout_utf8().trim(), "hi");
        assert_eq!(out.exit_code, 3);
        assert!(!out.success());
    }

    #[tokio::test]
    async fn timeout_kills_and_reports() {
        let err = ProcessRunner
            .run(
                &["sleep".into(), "10".into()],
                None,
                Duration::from_millis(100),
            )
            .await
            .unwrap_err();
        assert_eq!(err.kind, AdapterErrorKind::Timeout);
    }

    #[tokio::test]
    async fn empty_argv_is_fatal() {
        let err = ProcessRunner
            .run(&[], None, Duration::from_secs(1))
            .await
            .unwrap_err();
        assert_eq!(err.kind, AdapterErrorKind::Fatal);
    }
}
