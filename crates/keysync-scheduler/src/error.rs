//! Error types for the scheduler.

use thiserror::Error;

use crate::SyncAttemptResult;

/// Errors from running a single external command.
#[derive(Debug, Error)]
pub enum CommandError {
    /// The process could not be started.
    #[error("failed to spawn `{command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    /// The process ran and exited with a non-zero status.
    #[error(
        "`{command}` exited with status {}: {}",
        .exit_status.map_or_else(|| "signal".to_string(), |c| c.to_string()),
        .stderr.trim()
    )]
    Failed {
        command: String,
        /// Exit code, or `None` when the process was killed by a signal.
        exit_status: Option<i32>,
        stderr: String,
        stdout: String,
    },
}

impl CommandError {
    /// The diagnostic text captured from the process.
    ///
    /// Prefers stderr, falling back to stdout (git prints some failures,
    /// like an empty commit, on stdout only).
    pub fn diagnostic(&self) -> String {
        match self {
            CommandError::Spawn { source, .. } => source.to_string(),
            CommandError::Failed { stderr, stdout, .. } => {
                if stderr.trim().is_empty() {
                    stdout.trim().to_string()
                } else {
                    stderr.trim().to_string()
                }
            }
        }
    }
}

/// All synchronization attempts failed.
#[derive(Debug, Error)]
#[error("synchronization failed after {} attempts", .attempts.len())]
pub struct SyncFailure {
    /// One entry per attempt, in order.
    pub attempts: Vec<SyncAttemptResult>,
}

impl SyncFailure {
    /// Diagnostic of the final attempt, if any was recorded.
    pub fn last_diagnostic(&self) -> Option<&str> {
        self.attempts
            .last()
            .and_then(|a| a.diagnostic_message.as_deref())
    }
}

/// Rejected run parameters.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    /// A numeric field could not be parsed.
    #[error("{field} must be a number, got {value:?}")]
    InvalidNumber { field: &'static str, value: String },

    /// The wait unit is not one of the supported units.
    #[error("unknown wait unit {0:?}, expected \"seconds\" or \"minutes\"")]
    InvalidUnit(String),

    /// The wait value exceeds the ceiling for its unit.
    #[error("wait time {value} {unit} exceeds maximum allowed ({max} {unit})")]
    WaitTooLong {
        value: f64,
        unit: &'static str,
        max: f64,
    },

    /// A value is below the allowed minimum.
    #[error("{field} is out of range: {reason}")]
    OutOfRange {
        field: &'static str,
        reason: String,
    },
}

/// Errors that end a run.
#[derive(Debug, Error)]
pub enum SchedulerError {
    /// The token file could not be written.
    #[error("failed to write token file {path}: {source}")]
    TokenWrite {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// A step panicked while the run was in progress.
    #[error("run panicked: {0}")]
    Panicked(String),
}
