//! Validation of raw run parameters.

use serde::{Deserialize, Serialize};

use crate::{
    Configuration, MAX_ITERATIONS, MAX_PROBLEM_WAIT_MINUTES, ValidationError, WaitUnit,
};

/// Run parameters as typed by a user, before any parsing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawInput {
    pub iterations: String,
    pub wait: String,
    pub unit: String,
    pub problem_wait: String,
}

/// Parse and bound raw run parameters.
///
/// Iteration count and problem wait are clamped to their maxima without
/// error. A wait above one hour in either unit is rejected.
pub fn validate(raw: &RawInput) -> Result<Configuration, ValidationError> {
    let iterations = parse_int("iterations", &raw.iterations)?;
    let wait_base = parse_real("wait", &raw.wait)?;
    let wait_unit: WaitUnit = raw.unit.parse()?;
    let problem_wait = parse_int("problem wait", &raw.problem_wait)?;

    if iterations < 1 {
        return Err(ValidationError::OutOfRange {
            field: "iterations",
            reason: format!("must be at least 1, got {}", iterations),
        });
    }
    if problem_wait < 1 {
        return Err(ValidationError::OutOfRange {
            field: "problem wait",
            reason: format!("must be at least 1 minute, got {}", problem_wait),
        });
    }
    if !wait_base.is_finite() || wait_base <= 0.0 {
        return Err(ValidationError::OutOfRange {
            field: "wait",
            reason: format!("must be a positive number, got {}", wait_base),
        });
    }

    let max = wait_unit.ceiling();
    if wait_base > max {
        return Err(ValidationError::WaitTooLong {
            value: wait_base,
            unit: wait_unit.as_str(),
            max,
        });
    }

    Ok(Configuration {
        iteration_count: clamp_to(iterations, MAX_ITERATIONS),
        wait_base,
        wait_unit,
        problem_wait_minutes: clamp_to(problem_wait, MAX_PROBLEM_WAIT_MINUTES),
    })
}

fn clamp_to(value: i64, max: u32) -> u32 {
    // Callers have already rejected values below 1.
    u32::try_from(value.min(i64::from(max))).unwrap_or(max)
}

fn parse_int(field: &'static str, value: &str) -> Result<i64, ValidationError> {
    let trimmed = value.trim();
    if let Ok(n) = trimmed.parse::<i64>() {
        return Ok(n);
    }

    // Integers outside i64 still clamp, or fail the minimum check, like any other.
    let (negative, digits) = match trimmed.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, trimmed.strip_prefix('+').unwrap_or(trimmed)),
    };
    if !digits.is_empty() && digits.chars().all(|c| c.is_ascii_digit()) {
        return Ok(if negative { i64::MIN } else { i64::MAX });
    }

    Err(ValidationError::InvalidNumber {
        field,
        value: value.to_string(),
    })
}

fn parse_real(field: &'static str, value: &str) -> Result<f64, ValidationError> {
    value
        .trim()
        .parse::<f64>()
        .map_err(|_| ValidationError::InvalidNumber {
            field,
            value: value.to_string(),
        })
}
