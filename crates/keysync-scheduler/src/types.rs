//! Scheduler types.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::ValidationError;

/// Maximum number of iterations in a single run.
pub const MAX_ITERATIONS: u32 = 1000;

/// Maximum problem (backoff) wait, in minutes.
pub const MAX_PROBLEM_WAIT_MINUTES: u32 = 60;

/// Unit for the base wait between iterations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WaitUnit {
    Seconds,
    Minutes,
}

impl WaitUnit {
    /// Seconds per unit.
    pub fn multiplier(self) -> f64 {
        match self {
            WaitUnit::Seconds => 1.0,
            WaitUnit::Minutes => 60.0,
        }
    }

    /// Largest wait value accepted in this unit (one hour).
    pub fn ceiling(self) -> f64 {
        match self {
            WaitUnit::Seconds => 3600.0,
            WaitUnit::Minutes => 60.0,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            WaitUnit::Seconds => "seconds",
            WaitUnit::Minutes => "minutes",
        }
    }
}

impl fmt::Display for WaitUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for WaitUnit {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "seconds" | "second" | "secs" | "s" => Ok(WaitUnit::Seconds),
            "minutes" | "minute" | "mins" | "m" => Ok(WaitUnit::Minutes),
            _ => Err(ValidationError::InvalidUnit(s.to_string())),
        }
    }
}

/// Validated run parameters.
///
/// Produced by [`crate::validate`]; the scheduler takes it by value so it
/// cannot change once a run has started.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Configuration {
    /// Number of iterations to run (1..=1000).
    pub iteration_count: u32,
    /// Base wait between token generation and sync, in `wait_unit`.
    pub wait_base: f64,
    pub wait_unit: WaitUnit,
    /// Base backoff after a failed sync, in minutes (1..=60).
    pub problem_wait_minutes: u32,
}

impl Configuration {
    /// Base wait in seconds, before jitter.
    pub fn base_wait_secs(&self) -> f64 {
        self.wait_base * self.wait_unit.multiplier()
    }

    /// Base backoff in seconds, before jitter.
    pub fn problem_wait_secs(&self) -> f64 {
        f64::from(self.problem_wait_minutes) * 60.0
    }
}

/// Per-iteration working state. Discarded when the iteration completes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IterationState {
    /// 0-based iteration index.
    pub index: u32,
    pub token_value: String,
    pub last_sync_succeeded: bool,
}

/// Outcome of one pass through the sync steps.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncAttemptResult {
    /// 1-based attempt number.
    pub attempt_number: u32,
    pub succeeded: bool,
    pub diagnostic_message: Option<String>,
}

/// Successful synchronization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncReport {
    /// Every attempt made, the last one being the successful one.
    pub attempts: Vec<SyncAttemptResult>,
}

impl SyncReport {
    pub fn attempt_count(&self) -> usize {
        self.attempts.len()
    }
}

/// Lifecycle of a run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    #[default]
    NotStarted,
    Running,
    Finished,
    Cancelled,
    /// Ended early by an unrecoverable error.
    Aborted,
}

impl RunState {
    pub(crate) fn from_u8(v: u8) -> Self {
        match v {
            1 => RunState::Running,
            2 => RunState::Finished,
            3 => RunState::Cancelled,
            4 => RunState::Aborted,
            _ => RunState::NotStarted,
        }
    }

    pub(crate) fn as_u8(self) -> u8 {
        match self {
            RunState::NotStarted => 0,
            RunState::Running => 1,
            RunState::Finished => 2,
            RunState::Cancelled => 3,
            RunState::Aborted => 4,
        }
    }
}

/// How a run ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum RunOutcome {
    /// All iterations completed.
    Finished { iterations: u32 },
    /// Stopped by a cancel request.
    Cancelled { completed: u32 },
    /// Stopped by an unrecoverable error.
    Aborted { completed: u32, reason: String },
}

/// Severity attached to every log event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Info,
    Success,
    Warning,
    Error,
    Critical,
}

/// An observer callback captured as a value, for crossing task boundaries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RunEvent {
    Log { message: String, severity: Severity },
    Progress { percent: u8 },
    WaitTick { remaining_secs: f64 },
    Finished,
}
