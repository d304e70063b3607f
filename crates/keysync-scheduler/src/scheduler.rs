//! Iteration scheduler implementation.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU8, AtomicU32, Ordering};

use futures_util::FutureExt;
use serde::Serialize;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::token::write_token;
use crate::{
    Configuration, IterationState, JitteredTimer, Observer, RunOutcome, RunState,
    SchedulerError, Severity, Synchronizer, TokenSource, WaitOutcome,
};

/// Default token file name, relative to the working copy.
pub const DEFAULT_TOKEN_FILE: &str = "key.txt";

/// Shared state of one run.
///
/// The scheduler is the only writer of everything except the cancel flag,
/// which only [`CancelHandle`] sets.
#[derive(Debug, Default)]
pub struct RunStatus {
    cancel_requested: AtomicBool,
    current_iteration: AtomicU32,
    progress_percent: AtomicU8,
    state: AtomicU8,
}

/// Point-in-time copy of a [`RunStatus`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RunStatusSnapshot {
    pub cancel_requested: bool,
    pub current_iteration: u32,
    pub progress_percent: u8,
    pub state: RunState,
}

impl RunStatus {
    pub fn snapshot(&self) -> RunStatusSnapshot {
        RunStatusSnapshot {
            cancel_requested: self.is_cancel_requested(),
            current_iteration: self.current_iteration.load(Ordering::SeqCst),
            progress_percent: self.progress_percent.load(Ordering::SeqCst),
            state: self.state(),
        }
    }

    pub fn is_cancel_requested(&self) -> bool {
        self.cancel_requested.load(Ordering::SeqCst)
    }

    pub fn state(&self) -> RunState {
        RunState::from_u8(self.state.load(Ordering::SeqCst))
    }

    fn set_state(&self, state: RunState) {
        self.state.store(state.as_u8(), Ordering::SeqCst);
    }
}

/// Requests cooperative cancellation of a run.
#[derive(Debug, Clone)]
pub struct CancelHandle {
    status: Arc<RunStatus>,
}

impl CancelHandle {
    /// Stop at the next wait tick or iteration boundary. Commands already
    /// running are allowed to finish.
    pub fn request_cancel(&self) {
        self.status.cancel_requested.store(true, Ordering::SeqCst);
    }

    pub fn is_cancel_requested(&self) -> bool {
        self.status.is_cancel_requested()
    }
}

/// How the iteration loop ended, when it did not fail.
enum LoopExit {
    Completed,
    Cancelled { completed: u32 },
}

/// Drives token generation, waits and synchronization for a whole run.
pub struct Scheduler {
    config: Configuration,
    token_source: Arc<dyn TokenSource>,
    synchronizer: Arc<dyn Synchronizer>,
    token_path: PathBuf,
    timer: JitteredTimer,
    status: Arc<RunStatus>,
}

impl Scheduler {
    /// Create a scheduler writing tokens to [`DEFAULT_TOKEN_FILE`] in the
    /// current directory.
    pub fn new(
        config: Configuration,
        token_source: Arc<dyn TokenSource>,
        synchronizer: Arc<dyn Synchronizer>,
    ) -> Self {
        Self {
            config,
            token_source,
            synchronizer,
            token_path: PathBuf::from(DEFAULT_TOKEN_FILE),
            timer: JitteredTimer::default(),
            status: Arc::new(RunStatus::default()),
        }
    }

    pub fn with_token_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.token_path = path.into();
        self
    }

    pub fn with_timer(mut self, timer: JitteredTimer) -> Self {
        self.timer = timer;
        self
    }

    pub fn config(&self) -> &Configuration {
        &self.config
    }

    pub fn token_path(&self) -> &Path {
        &self.token_path
    }

    pub fn cancel_handle(&self) -> CancelHandle {
        CancelHandle {
            status: Arc::clone(&self.status),
        }
    }

    pub fn status(&self) -> RunStatusSnapshot {
        self.status.snapshot()
    }

    /// Run the scheduler on its own task.
    pub fn spawn(self, observer: Arc<dyn Observer>) -> RunHandle {
        let status = Arc::clone(&self.status);
        let task_observer = Arc::clone(&observer);
        let task = tokio::spawn(async move { self.run(task_observer.as_ref()).await });

        RunHandle {
            status,
            observer,
            task,
        }
    }

    /// Run every iteration, or until cancelled.
    ///
    /// Never fails: errors and panics end the run and are reported to the
    /// observer as critical. `on_finished` is emitted exactly once.
    #[tracing::instrument(skip_all, fields(iterations = self.config.iteration_count))]
    pub async fn run(&self, observer: &dyn Observer) -> RunOutcome {
        info!(config = ?self.config, token_path = %self.token_path.display(), "run starting");
        self.status.set_state(RunState::Running);

        let result = AssertUnwindSafe(self.run_iterations(observer))
            .catch_unwind()
            .await
            .unwrap_or_else(|panic| Err(SchedulerError::Panicked(panic_message(&*panic))));

        let outcome = match result {
            Ok(LoopExit::Completed) => {
                self.status.set_state(RunState::Finished);
                info!("run finished");
                RunOutcome::Finished {
                    iterations: self.config.iteration_count,
                }
            }
            Ok(LoopExit::Cancelled { completed }) => {
                self.status.set_state(RunState::Cancelled);
                info!(completed, "run cancelled");
                observer.on_log(
                    &format!(
                        "Cancelled after {} of {} iterations",
                        completed, self.config.iteration_count
                    ),
                    Severity::Warning,
                );
                RunOutcome::Cancelled { completed }
            }
            Err(err) => {
                self.status.set_state(RunState::Aborted);
                let completed = self.status.current_iteration.load(Ordering::SeqCst);
                error!(error = %err, completed, "run aborted");
                observer.on_log(&format!("Critical error: {}", err), Severity::Critical);
                RunOutcome::Aborted {
                    completed,
                    reason: err.to_string(),
                }
            }
        };

        observer.on_finished();
        outcome
    }

    async fn run_iterations(&self, observer: &dyn Observer) -> Result<LoopExit, SchedulerError> {
        for index in 0..self.config.iteration_count {
            if self.status.is_cancel_requested() {
                return Ok(LoopExit::Cancelled { completed: index });
            }
            self.status.current_iteration.store(index, Ordering::SeqCst);

            let Some(state) = self.run_iteration(index, observer).await? else {
                return Ok(LoopExit::Cancelled { completed: index });
            };
            debug!(
                index = state.index,
                synced = state.last_sync_succeeded,
                "iteration complete"
            );

            let percent = progress_percent(index, self.config.iteration_count);
            self.status.progress_percent.store(percent, Ordering::SeqCst);
            observer.on_progress(percent);
        }

        Ok(LoopExit::Completed)
    }

    /// One iteration. Returns `None` when cancelled before synchronizing.
    #[tracing::instrument(skip(self, observer))]
    async fn run_iteration(
        &self,
        index: u32,
        observer: &dyn Observer,
    ) -> Result<Option<IterationState>, SchedulerError> {
        let token_value = self.token_source.generate();
        write_token(&self.token_path, &token_value).await?;
        observer.on_log(&format!("Generated token: {}", token_value), Severity::Info);

        let wait = self.timer.jittered(self.config.base_wait_secs());
        debug!(wait_secs = wait, "waiting before sync");
        if self.wait(wait, observer).await == WaitOutcome::Cancelled {
            return Ok(None);
        }

        let last_sync_succeeded = match self.synchronizer.synchronize().await {
            Ok(report) => {
                debug!(attempts = report.attempt_count(), "sync succeeded");
                true
            }
            Err(failure) if self.status.is_cancel_requested() => {
                warn!(error = %failure, "sync failed, skipping backoff for cancellation");
                false
            }
            Err(failure) => {
                let problem_wait = self.timer.jittered(self.config.problem_wait_secs());
                warn!(
                    error = %failure,
                    backoff_secs = problem_wait,
                    "sync failed, backing off"
                );
                observer.on_log(
                    &format!(
                        "Waiting {:.2} minutes before next attempt",
                        problem_wait / 60.0
                    ),
                    Severity::Warning,
                );
                // A cancelled backoff still counts the iteration; the loop
                // stops at the next boundary.
                self.wait(problem_wait, observer).await;
                false
            }
        };

        Ok(Some(IterationState {
            index,
            token_value,
            last_sync_succeeded,
        }))
    }

    async fn wait(&self, secs: f64, observer: &dyn Observer) -> WaitOutcome {
        self.timer
            .wait(
                secs,
                |remaining| observer.on_wait_tick(remaining),
                || self.status.is_cancel_requested(),
            )
            .await
    }
}

/// Handle to a run started with [`Scheduler::spawn`].
pub struct RunHandle {
    status: Arc<RunStatus>,
    observer: Arc<dyn Observer>,
    task: JoinHandle<RunOutcome>,
}

impl RunHandle {
    pub fn cancel_handle(&self) -> CancelHandle {
        CancelHandle {
            status: Arc::clone(&self.status),
        }
    }

    pub fn status(&self) -> RunStatusSnapshot {
        self.status.snapshot()
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Wait for the run to end.
    pub async fn join(self) -> RunOutcome {
        match self.task.await {
            Ok(outcome) => outcome,
            Err(join_err) => {
                // The run task itself died, so nothing reported the end.
                let reason = if join_err.is_panic() {
                    "run task panicked".to_string()
                } else {
                    "run task was cancelled".to_string()
                };
                error!(error = %join_err, "run task failed");
                self.status.set_state(RunState::Aborted);
                self.observer
                    .on_log(&format!("Critical error: {}", reason), Severity::Critical);
                self.observer.on_finished();
                RunOutcome::Aborted {
                    completed: self.status.current_iteration.load(Ordering::SeqCst),
                    reason,
                }
            }
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// `floor((index + 1) * 100 / total)`.
fn progress_percent(index: u32, total: u32) -> u8 {
    let total = u64::from(total.max(1));
    let done = u64::from(index) + 1;
    (done * 100 / total).min(100) as u8
}
