//! The `run` command: drive a full scheduler run from the terminal.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use miette::Result;
use tracing::{info, warn};

use keysync_scheduler::{
    ChannelObserver, EmptyCommitPolicy, HashTokenSource, PipelineConfig, RawInput, RunOutcome,
    Scheduler, ShellCommandRunner, SyncPipeline, validate,
};

use crate::render::{OutputFormat, Renderer};

/// Everything the `run` command needs besides the raw run parameters.
#[derive(Debug, Clone)]
pub struct RunOptions {
    pub repo_dir: PathBuf,
    pub token_file: PathBuf,
    pub remote: String,
    pub branch: String,
    pub commit_message: String,
    pub benign_empty_commit: bool,
    pub seed_prefix: String,
    pub format: OutputFormat,
}

impl RunOptions {
    /// Token file location; relative paths are resolved against the repo.
    pub fn token_path(&self) -> PathBuf {
        resolve_in(&self.repo_dir, &self.token_file)
    }

    pub fn pipeline_config(&self) -> PipelineConfig {
        PipelineConfig {
            remote: self.remote.clone(),
            branch: self.branch.clone(),
            commit_message: self.commit_message.clone(),
            empty_commit: if self.benign_empty_commit {
                EmptyCommitPolicy::Benign
            } else {
                EmptyCommitPolicy::Failure
            },
            ..Default::default()
        }
    }
}

fn resolve_in(base: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base.join(path)
    }
}

/// Validate the parameters, then run until done or Ctrl-C.
pub async fn run(raw: &RawInput, options: RunOptions) -> Result<()> {
    let config = validate(raw).map_err(|e| miette::miette!("invalid run parameters: {}", e))?;

    if !options.repo_dir.is_dir() {
        return Err(miette::miette!(
            "repository directory {} does not exist",
            options.repo_dir.display()
        ));
    }

    let (observer, rx) = ChannelObserver::new();
    let observer = Arc::new(observer);

    let runner = Arc::new(
        ShellCommandRunner::new(observer.clone()).with_working_dir(&options.repo_dir),
    );
    let pipeline = SyncPipeline::new(runner, observer.clone(), options.pipeline_config());
    let scheduler = Scheduler::new(
        config,
        Arc::new(HashTokenSource::new(options.seed_prefix.clone())),
        Arc::new(pipeline),
    )
    .with_token_path(options.token_path());

    info!(
        iterations = config.iteration_count,
        wait = config.wait_base,
        unit = %config.wait_unit,
        problem_wait_minutes = config.problem_wait_minutes,
        repo = %options.repo_dir.display(),
        "starting run"
    );

    let handle = scheduler.spawn(observer);

    let cancel = handle.cancel_handle();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received, cancelling after the current step");
            cancel.request_cancel();
        }
    });

    let (outcome, ()) = tokio::join!(handle.join(), Renderer::new(options.format).drain(rx));

    match outcome {
        RunOutcome::Finished { iterations } => {
            info!(iterations, "run finished");
            Ok(())
        }
        RunOutcome::Cancelled { completed } => {
            info!(completed, "run cancelled");
            Ok(())
        }
        RunOutcome::Aborted { completed, reason } => Err(miette::miette!(
            "run aborted after {} iterations: {}",
            completed,
            reason
        )),
    }
}
