//! The git synchronization pipeline.
//!
//! One attempt runs pull, stage, commit and push in that order, stopping at
//! the first failing step. Every failed attempt is followed by a fixed delay,
//! up to a bounded number of attempts. Longer backoff is left to the caller.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::{
    CommandError, CommandRunner, Observer, Severity, SyncAttemptResult, SyncFailure, SyncReport,
};

/// Default number of full passes before giving up.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 10;

/// Default pause between attempts.
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(1);

/// Output fragment git prints when a commit has nothing staged.
const NOTHING_TO_COMMIT: &str = "nothing to commit";

/// How a commit with no staged changes is treated.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum EmptyCommitPolicy {
    /// The commit step fails and the attempt is retried.
    #[default]
    Failure,
    /// The commit step is skipped and the attempt continues with push.
    Benign,
}

/// Pipeline settings.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub remote: String,
    pub branch: String,
    pub commit_message: String,
    pub max_attempts: u32,
    pub retry_delay: Duration,
    pub empty_commit: EmptyCommitPolicy,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            remote: "origin".to_string(),
            branch: "main".to_string(),
            commit_message: "update".to_string(),
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            retry_delay: DEFAULT_RETRY_DELAY,
            empty_commit: EmptyCommitPolicy::Failure,
        }
    }
}

/// One step of an attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncStep {
    Pull,
    Stage,
    Commit,
    Push,
}

impl SyncStep {
    /// Steps in execution order.
    pub const ALL: [SyncStep; 4] = [
        SyncStep::Pull,
        SyncStep::Stage,
        SyncStep::Commit,
        SyncStep::Push,
    ];

    pub fn command_line(self, config: &PipelineConfig) -> String {
        match self {
            SyncStep::Pull => format!(
                "git pull {} {}",
                shell_word(&config.remote),
                shell_word(&config.branch)
            ),
            SyncStep::Stage => "git add .".to_string(),
            SyncStep::Commit => format!(
                "git commit -m \"{}\"",
                config.commit_message.replace('\\', "\\\\").replace('"', "\\\"")
            ),
            SyncStep::Push => format!(
                "git push {} {}",
                shell_word(&config.remote),
                shell_word(&config.branch)
            ),
        }
    }
}

/// Single-quote `value` for `sh -c` unless every character is taken
/// literally by the shell.
fn shell_word(value: &str) -> String {
    let literal = !value.is_empty()
        && value
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "-_./:@+=,".contains(c));
    if literal {
        value.to_string()
    } else {
        format!("'{}'", value.replace('\'', "'\\''"))
    }
}

/// Something that can bring the working copy in line with the remote.
#[async_trait]
pub trait Synchronizer: Send + Sync {
    async fn synchronize(&self) -> Result<SyncReport, SyncFailure>;
}

/// Runs the sync steps with bounded retries.
pub struct SyncPipeline {
    runner: Arc<dyn CommandRunner>,
    observer: Arc<dyn Observer>,
    config: PipelineConfig,
}

impl SyncPipeline {
    pub fn new(
        runner: Arc<dyn CommandRunner>,
        observer: Arc<dyn Observer>,
        config: PipelineConfig,
    ) -> Self {
        Self {
            runner,
            observer,
            config,
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Command lines of one attempt, in order.
    pub fn command_lines(&self) -> Vec<String> {
        SyncStep::ALL
            .iter()
            .map(|step| step.command_line(&self.config))
            .collect()
    }

    /// Run attempts until one succeeds or `max_attempts` have failed.
    #[tracing::instrument(skip(self), fields(max_attempts = self.config.max_attempts))]
    pub async fn synchronize(&self) -> Result<SyncReport, SyncFailure> {
        let max_attempts = self.config.max_attempts.max(1);
        let mut attempts = Vec::with_capacity(max_attempts as usize);

        for attempt in 1..=max_attempts {
            match self.run_attempt().await {
                Ok(()) => {
                    info!(attempt, "synchronization succeeded");
                    attempts.push(SyncAttemptResult {
                        attempt_number: attempt,
                        succeeded: true,
                        diagnostic_message: None,
                    });
                    return Ok(SyncReport { attempts });
                }
                Err(err) => {
                    let diagnostic = err.diagnostic();
                    warn!(attempt, max_attempts, error = %err, "sync attempt failed");
                    self.observer.on_log(
                        &format!("Attempt {}/{} failed: {}", attempt, max_attempts, diagnostic),
                        Severity::Warning,
                    );
                    attempts.push(SyncAttemptResult {
                        attempt_number: attempt,
                        succeeded: false,
                        diagnostic_message: Some(diagnostic),
                    });
                    sleep(self.config.retry_delay).await;
                }
            }
        }

        Err(SyncFailure { attempts })
    }

    async fn run_attempt(&self) -> Result<(), CommandError> {
        for step in SyncStep::ALL {
            let command_line = step.command_line(&self.config);
            match self.runner.execute(&command_line).await {
                Ok(()) => {}
                Err(err) if step == SyncStep::Commit && self.is_benign_empty_commit(&err) => {
                    debug!("nothing to commit, continuing");
                    self.observer
                        .on_log("Nothing to commit, continuing", Severity::Info);
                }
                Err(err) => return Err(err),
            }
        }
        Ok(())
    }

    fn is_benign_empty_commit(&self, err: &CommandError) -> bool {
        self.config.empty_commit == EmptyCommitPolicy::Benign
            && matches!(
                err,
                CommandError::Failed { stdout, stderr, .. }
                    if stdout.contains(NOTHING_TO_COMMIT) || stderr.contains(NOTHING_TO_COMMIT)
            )
    }
}

#[async_trait]
impl Synchronizer for SyncPipeline {
    async fn synchronize(&self) -> Result<SyncReport, SyncFailure> {
        SyncPipeline::synchronize(self).await
    }
}
