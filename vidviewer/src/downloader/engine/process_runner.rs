//! Spawning and supervising an external download process.

use std::process::Stdio;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

use crate::{Error, Result};

/// How long to wait for the output readers after killing the process.
const READER_GRACE: Duration = Duration::from_secs(2);

/// How a supervised process ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessOutcome {
    /// Exited on its own; `None` when killed by a signal.
    Exited(Option<i32>),
    /// Killed because the token fired.
    Cancelled,
    /// Killed because it ran past the timeout.
    TimedOut,
}

impl ProcessOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Exited(Some(0)))
    }
}

/// Run `command` to completion, feeding each stdout line to `on_line`.
///
/// The process is killed when `cancel` fires or `timeout` elapses. On Unix it
/// runs in its own process group and the whole group is killed, so helpers
/// such as the ffmpeg yt-dlp merges with do not outlive it. Killing a process
/// that already exited is ignored. Stdout is fully drained before a natural
/// exit is reported.
pub async fn run_process<F>(
    tool: &str,
    mut command: Command,
    cancel: CancellationToken,
    timeout: Option<Duration>,
    mut on_line: F,
) -> Result<ProcessOutcome>
where
    F: FnMut(&str) + Send + 'static,
{
    command
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    #[cfg(unix)]
    command.process_group(0);

    let mut child = command
        .spawn()
        .map_err(|e| Error::processing(format!("Failed to spawn {tool}: {e}")))?;

    let stdout_reader = child.stdout.take().map(|stdout| {
        tokio::spawn(async move {
            let mut lines = BufReader::new(stdout).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                on_line(&line);
            }
        })
    });

    let stderr_reader = child.stderr.take().map(|stderr| {
        let tool = tool.to_string();
        tokio::spawn(async move {
            let mut lines = BufReader::new(stderr).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                debug!(tool = %tool, "stderr: {}", line);
            }
        })
    });

    let deadline = async {
        match timeout {
            Some(duration) => tokio::time::sleep(duration).await,
            None => std::future::pending::<()>().await,
        }
    };

    let outcome = tokio::select! {
        _ = cancel.cancelled() => {
            kill(&mut child, tool).await;
            ProcessOutcome::Cancelled
        }
        _ = deadline => {
            warn!(tool = %tool, "Process timed out, killing");
            kill(&mut child, tool).await;
            ProcessOutcome::TimedOut
        }
        status = child.wait() => {
            match status {
                Ok(exit_status) => {
                    let code = exit_status.code();
                    if code != Some(0) {
                        warn!(tool = %tool, code = ?code, "Process exited abnormally");
                    }
                    ProcessOutcome::Exited(code)
                }
                Err(e) => {
                    error!(tool = %tool, error = %e, "Error waiting for process");
                    ProcessOutcome::Exited(None)
                }
            }
        }
    };

    for reader in [stdout_reader, stderr_reader].into_iter().flatten() {
        if matches!(outcome, ProcessOutcome::Exited(_)) {
            let _ = reader.await;
        } else {
            // Descendants may still hold the pipe open after a kill.
            let abort = reader.abort_handle();
            if tokio::time::timeout(READER_GRACE, reader).await.is_err() {
                abort.abort();
            }
        }
    }

    Ok(outcome)
}

async fn kill(child: &mut tokio::process::Child, tool: &str) {
    // `id()` is `None` once the child was reaped, so the group id is never stale.
    #[cfg(unix)]
    if let Some(pid) = child.id().and_then(|pid| i32::try_from(pid).ok()) {
        // SAFETY: plain syscall; a negative pid addresses the process group
        // created for this child by `process_group(0)`.
        let rc = unsafe { libc::kill(-pid, libc::SIGKILL) };
        if rc != 0 {
            debug!(tool = %tool, pid, error = %std::io::Error::last_os_error(), "Group kill failed");
        }
    }

    // Err here means the process already exited.
    if let Err(e) = child.kill().await {
        debug!(tool = %tool, error = %e, "Kill failed, process already gone");
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    fn sh(script: &str) -> Command {
        let mut cmd = Command::new("sh");
        cmd.arg("-c").arg(script);
        cmd
    }

    #[tokio::test]
    async fn test_collects_lines_and_exit_code() {
        let lines = Arc::new(Mutex::new(Vec::new()));
        let sink = lines.clone();

        let outcome = run_process(
            "sh",
            sh("echo one; echo two; exit 3"),
            CancellationToken::new(),
            None,
            move |line| sink.lock().unwrap().push(line.to_string()),
        )
        .await
        .unwrap();

        assert_eq!(outcome, ProcessOutcome::Exited(Some(3)));
        assert_eq!(*lines.lock().unwrap(), vec!["one", "two"]);
    }

    #[tokio::test]
    async fn test_cancellation_kills_process() {
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(100)).await;
            trigger.cancel();
        });

        let started = std::time::Instant::now();
        let outcome = run_process("sh", sh("exec sleep 30"), cancel, None, |_| {})
            .await
            .unwrap();

        assert_eq!(outcome, ProcessOutcome::Cancelled);
        assert!(started.elapsed() < Duration::from_secs(10));
    }

    #[tokio::test]
    async fn test_cancellation_kills_descendants() {
        let dir = tempfile::tempdir().unwrap();
        let marker = dir.path().join("marker");

        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        let mut cmd = sh(r#"(sleep 0.5; touch "$1") & echo started; wait"#);
        cmd.arg("sh").arg(&marker);

        let outcome = run_process("sh", cmd, cancel, None, move |line| {
            if line == "started" {
                trigger.cancel();
            }
        })
        .await
        .unwrap();
        assert_eq!(outcome, ProcessOutcome::Cancelled);

        // The background child would have written the marker by now.
        tokio::time::sleep(Duration::from_millis(1500)).await;
        assert!(!marker.exists());
    }

    #[tokio::test]
    async fn test_timeout() {
        let outcome = run_process(
            "sh",
            sh("exec sleep 30"),
            CancellationToken::new(),
            Some(Duration::from_millis(100)),
            |_| {},
        )
        .await
        .unwrap();
        assert_eq!(outcome, ProcessOutcome::TimedOut);
    }

    #[tokio::test]
    async fn test_cancel_after_exit_is_harmless() {
        let cancel = CancellationToken::new();
        let outcome = run_process("sh", sh("exit 0"), cancel.clone(), None, |_| {})
            .await
            .unwrap();
        cancel.cancel();
        assert!(outcome.is_success());
    }

    #[tokio::test]
    async fn test_spawn_failure() {
        let err = run_process(
            "nope",
            Command::new("/definitely/not/a/binary"),
            CancellationToken::new(),
            None,
            |_| {},
        )
        .await
        .unwrap_err();
        assert!(err.to_string().contains("Failed to spawn nope"));
    }
}
