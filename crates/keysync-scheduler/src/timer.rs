//! Jittered, cancellable waits.

use std::time::Duration;

use rand::Rng;
use tokio::time::{Instant, sleep};

/// Default jitter: ±20% of the base duration.
pub const DEFAULT_VARIANCE: f64 = 0.2;

/// Default interval between remaining-time callbacks.
pub const DEFAULT_TICK: Duration = Duration::from_millis(100);

/// How a wait ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitOutcome {
    Elapsed,
    Cancelled,
}

/// Sample a duration uniformly from `[base*(1-variance), base*(1+variance)]`.
///
/// Variance is clamped to `0.0..=1.0`. Non-finite input is returned as is.
pub fn jittered_duration(base: f64, variance: f64) -> f64 {
    if !base.is_finite() || !variance.is_finite() {
        return base;
    }
    let variance = variance.clamp(0.0, 1.0);
    let a = base * (1.0 - variance);
    let b = base * (1.0 + variance);
    let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
    if lo == hi {
        return lo;
    }
    rand::thread_rng().gen_range(lo..=hi)
}

/// Computes jittered durations and waits them out in small ticks.
#[derive(Debug, Clone, Copy)]
pub struct JitteredTimer {
    variance: f64,
    tick: Duration,
}

impl Default for JitteredTimer {
    fn default() -> Self {
        Self {
            variance: DEFAULT_VARIANCE,
            tick: DEFAULT_TICK,
        }
    }
}

impl JitteredTimer {
    pub fn new(variance: f64, tick: Duration) -> Self {
        Self { variance, tick }
    }

    pub fn variance(&self) -> f64 {
        self.variance
    }

    pub fn tick(&self) -> Duration {
        self.tick
    }

    /// Jitter `base` seconds by this timer's variance.
    pub fn jittered(&self, base: f64) -> f64 {
        jittered_duration(base, self.variance)
    }

    /// Wait `duration` seconds, calling `on_tick` with the remaining time
    /// every tick.
    ///
    /// Returns [`WaitOutcome::Cancelled`] as soon as `cancel_check` reports
    /// true, which is observed at most one tick late. Non-positive or
    /// non-finite durations return immediately.
    pub async fn wait<T, C>(&self, duration: f64, mut on_tick: T, cancel_check: C) -> WaitOutcome
    where
        T: FnMut(f64),
        C: Fn() -> bool,
    {
        if cancel_check() {
            return WaitOutcome::Cancelled;
        }
        if !duration.is_finite() || duration <= 0.0 {
            return WaitOutcome::Elapsed;
        }

        let total = Duration::from_secs_f64(duration);
        let start = Instant::now();

        loop {
            let elapsed = start.elapsed();
            if elapsed >= total {
                return WaitOutcome::Elapsed;
            }
            let remaining = total - elapsed;
            on_tick(remaining.as_secs_f64());

            sleep(remaining.min(self.tick)).await;

            if cancel_check() {
                return WaitOutcome::Cancelled;
            }
        }
    }
}
