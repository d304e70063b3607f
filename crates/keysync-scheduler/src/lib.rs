//! Scheduler and sync engine for keysync.
//!
//! This crate provides:
//! - Validation of raw run parameters into a [`Configuration`]
//! - Jittered, cancellable waits
//! - A git pull/add/commit/push pipeline with bounded retries
//! - The iteration scheduler that ties them together and reports progress
//!   to an [`Observer`]

mod config;
mod error;
mod observer;
mod pipeline;
mod runner;
mod scheduler;
mod timer;
mod token;
mod types;

pub use config::{RawInput, validate};
pub use error::{CommandError, SchedulerError, SyncFailure, ValidationError};
pub use observer::{ChannelObserver, Observer, RecordingObserver};
pub use pipeline::{
    DEFAULT_MAX_ATTEMPTS, DEFAULT_RETRY_DELAY, EmptyCommitPolicy, PipelineConfig, SyncPipeline,
    SyncStep, Synchronizer,
};
pub use runner::{CommandRunner, ShellCommandRunner};
pub use scheduler::{
    CancelHandle, DEFAULT_TOKEN_FILE, RunHandle, RunStatus, RunStatusSnapshot, Scheduler,
};
pub use timer::{DEFAULT_TICK, DEFAULT_VARIANCE, JitteredTimer, WaitOutcome, jittered_duration};
pub use token::{DEFAULT_SEED_PREFIX, HashTokenSource, TokenSource, write_token};
pub use types::{
    Configuration, IterationState, MAX_ITERATIONS, MAX_PROBLEM_WAIT_MINUTES, RunEvent, RunOutcome,
    RunState, Severity, SyncAttemptResult, SyncReport, WaitUnit,
};
