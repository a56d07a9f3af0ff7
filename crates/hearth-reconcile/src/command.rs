use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;

/// Shell wrapper that sources the nix profile before running the system
/// apply command, so a fresh install works before the operator restarts
/// their terminal.
const DARWIN_REBUILD_SCRIPT: &str = r#"set -e
if [ -e '/nix/var/nix/profiles/default/etc/profile.d/nix-daemon.sh' ]; then
  . '/nix/var/nix/profiles/default/etc/profile.d/nix-daemon.sh'
fi
darwin-rebuild switch"#;

#[derive(Debug, Error)]
/// Failure modes of an external apply invocation.
pub enum ReconcileError {
    #[error("failed to launch '{command}': {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed while driving '{command}': {source}")]
    Io {
        command: String,
        #[source]
        source: std::io::Error,
    },
    #[error("'{command}' failed with status {status}:\n{output}")]
    CommandFailed {
        command: String,
        status: String,
        output: String,
    },
    #[error("'{command}' timed out after {timeout_ms}ms")]
    TimedOut { command: String, timeout_ms: u64 },
}

/// Outcome of a streamed external command: exit status plus everything the
/// command printed, in case the caller must surface it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandCapture {
    pub success: bool,
    pub status: String,
    pub output: String,
}

#[async_trait]
/// Seam for the external system-configuration apply step.
pub trait Reconciler: Send + Sync {
    async fn apply(&self) -> Result<(), ReconcileError>;
}

/// Applies configuration by running one external command, streaming its
/// output live to the operator while capturing it for error reporting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandReconciler {
    program: String,
    args: Vec<String>,
    timeout_ms: Option<u64>,
}

impl CommandReconciler {
    pub fn new(program: &str, args: &[&str]) -> Self {
        Self {
            program: program.to_string(),
            args: args.iter().map(|arg| arg.to_string()).collect(),
            timeout_ms: None,
        }
    }

    /// Bounds the whole invocation; external applies are never unbounded
    /// when a budget is configured.
    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = Some(timeout_ms);
        self
    }

    /// The nix-darwin apply command (`darwin-rebuild switch`).
    pub fn darwin_rebuild() -> Self {
        Self::new("sh", &["-c", DARWIN_REBUILD_SCRIPT])
    }

    fn label(&self) -> String {
        if self.args.is_empty() {
            self.program.clone()
        } else {
            format!("{} {}", self.program, self.args.join(" "))
        }
    }
}

#[async_trait]
impl Reconciler for CommandReconciler {
    async fn apply(&self) -> Result<(), ReconcileError> {
        let args: Vec<&str> = self.args.iter().map(String::as_str).collect();
        let capture = run_streaming(&self.program, &args, self.timeout_ms).await?;
        if capture.success {
            return Ok(());
        }
        Err(ReconcileError::CommandFailed {
            command: self.label(),
            status: capture.status,
            output: capture.output,
        })
    }
}

/// Runs a command with stdin inherited (password prompts reach the
/// operator) and stdout/stderr echoed line by line while being captured.
pub async fn run_streaming(
    program: &str,
    args: &[&str],
    timeout_ms: Option<u64>,
) -> Result<CommandCapture, ReconcileError> {
    let label = if args.is_empty() {
        program.to_string()
    } else {
        format!("{} {}", program, args.join(" "))
    };

    let mut command = Command::new(program);
    command.args(args);
    command.kill_on_drop(true);
    command.stdin(Stdio::inherit());
    command.stdout(Stdio::piped());
    command.stderr(Stdio::piped());

    let mut child = command.spawn().map_err(|source| ReconcileError::Spawn {
        command: label.clone(),
        source,
    })?;
    let stdout_task = tokio::spawn(echo_and_capture(child.stdout.take(), false));
    let stderr_task = tokio::spawn(echo_and_capture(child.stderr.take(), true));

    let drive = async {
        let status = child.wait().await?;
        let stdout = stdout_task.await.unwrap_or_default();
        let stderr = stderr_task.await.unwrap_or_default();
        Ok::<_, std::io::Error>((status, stdout, stderr))
    };

    let (status, stdout, stderr) = match timeout_ms {
        Some(timeout_ms) => tokio::time::timeout(Duration::from_millis(timeout_ms), drive)
            .await
            .map_err(|_| ReconcileError::TimedOut {
                command: label.clone(),
                timeout_ms,
            })?,
        None => drive.await,
    }
    .map_err(|source| ReconcileError::Io {
        command: label.clone(),
        source,
    })?;

    let mut output = stdout;
    if !stderr.is_empty() {
        output.push_str(&stderr);
    }
    let status_label = status
        .code()
        .map(|code| code.to_string())
        .unwrap_or_else(|| "signal".to_string());
    if !status.success() {
        tracing::warn!(command = %label, status = %status_label, "external command failed");
    }
    Ok(CommandCapture {
        success: status.success(),
        status: status_label,
        output,
    })
}

async fn echo_and_capture<R>(reader: Option<R>, to_stderr: bool) -> String
where
    R: AsyncRead + Unpin,
{
    let Some(reader) = reader else {
        return String::new();
    };
    let mut lines = BufReader::new(reader).lines();
    let mut captured = String::new();
    while let Ok(Some(line)) = lines.next_line().await {
        if to_stderr {
            eprintln!("{line}");
        } else {
            println!("{line}");
        }
        captured.push_str(&line);
        captured.push('\n');
    }
    captured
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn functional_apply_succeeds_on_zero_exit() {
        let reconciler = CommandReconciler::new("sh", &["-c", "exit 0"]);
        reconciler.apply().await.expect("zero exit is success");
    }

    #[tokio::test]
    async fn functional_apply_failure_carries_captured_output_verbatim() {
        let reconciler =
            CommandReconciler::new("sh", &["-c", "echo applying; echo broken 1>&2; exit 3"]);

        let error = reconciler.apply().await.expect_err("non-zero exit fails closed");
        match error {
            ReconcileError::CommandFailed { status, output, .. } => {
                assert_eq!(status, "3");
                assert!(output.contains("applying"));
                assert!(output.contains("broken"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn unit_apply_reports_unlaunchable_command() {
        let reconciler = CommandReconciler::new("hearth-no-such-binary", &[]);
        let error = reconciler.apply().await.expect_err("spawn must fail");
        assert!(matches!(error, ReconcileError::Spawn { .. }));
    }

    #[tokio::test]
    async fn functional_apply_honors_timeout_budget() {
        let reconciler =
            CommandReconciler::new("sh", &["-c", "sleep 5"]).with_timeout_ms(50);
        let error = reconciler.apply().await.expect_err("must time out");
        assert!(matches!(error, ReconcileError::TimedOut { timeout_ms: 50, .. }));
    }

    #[tokio::test]
    async fn unit_run_streaming_captures_interleaved_streams() {
        let capture = run_streaming("sh", &["-c", "echo one; echo two 1>&2"], None)
            .await
            .expect("runs");
        assert!(capture.success);
        assert!(capture.output.contains("one\n"));
        assert!(capture.output.contains("two\n"));
    }
}
