//! External command execution.

use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, warn};

use crate::{CommandError, Observer, Severity};

/// Runs a command line and reports whether it succeeded.
///
/// Implementations do not retry; that is the caller's job.
#[async_trait]
pub trait CommandRunner: Send + Sync {
    async fn execute(&self, command_line: &str) -> Result<(), CommandError>;
}

/// Runs command lines through the platform shell.
///
/// Every outcome is also reported to the observer: `Success: <command>` on a
/// zero exit, the diagnostic text otherwise.
pub struct ShellCommandRunner {
    working_dir: Option<PathBuf>,
    observer: Arc<dyn Observer>,
}

impl ShellCommandRunner {
    pub fn new(observer: Arc<dyn Observer>) -> Self {
        Self {
            working_dir: None,
            observer,
        }
    }

    /// Run commands from `dir` instead of the current directory.
    pub fn with_working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    fn shell_command(command_line: &str) -> Command {
        let mut cmd = if cfg!(windows) {
            let mut cmd = Command::new("cmd");
            cmd.arg("/C");
            cmd
        } else {
            let mut cmd = Command::new("sh");
            cmd.arg("-c");
            cmd
        };
        cmd.arg(command_line);
        cmd
    }
}

#[async_trait]
impl CommandRunner for ShellCommandRunner {
    #[tracing::instrument(skip(self))]
    async fn execute(&self, command_line: &str) -> Result<(), CommandError> {
        let mut cmd = Self::shell_command(command_line);
        if let Some(ref dir) = self.working_dir {
            cmd.current_dir(dir);
        }
        cmd.stdin(Stdio::null());
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());

        let output = match cmd.output().await {
            Ok(output) => output,
            Err(source) => {
                let err = CommandError::Spawn {
                    command: command_line.to_string(),
                    source,
                };
                warn!(error = %err, "command could not be started");
                self.observer.on_log(&err.to_string(), Severity::Error);
                return Err(err);
            }
        };

        if output.status.success() {
            debug!("command succeeded");
            self.observer
                .on_log(&format!("Success: {}", command_line), Severity::Success);
            return Ok(());
        }

        let err = CommandError::Failed {
            command: command_line.to_string(),
            exit_status: output.status.code(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
        };
        warn!(
            exit_code = ?output.status.code(),
            diagnostic = %err.diagnostic(),
            "command failed"
        );
        self.observer.on_log(&err.diagnostic(), Severity::Error);
        Err(err)
    }
}
