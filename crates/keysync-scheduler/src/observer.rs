//! The event boundary between a run and whatever presents it.

use std::sync::Mutex;

use tokio::sync::mpsc;

use crate::{RunEvent, Severity};

/// Receives progress and log events from a run.
///
/// Callbacks are invoked from the scheduler's task. Implementations with
/// thread affinity should forward events (see [`ChannelObserver`]) rather
/// than touch their own state directly.
pub trait Observer: Send + Sync {
    fn on_log(&self, message: &str, severity: Severity);
    fn on_progress(&self, percent: u8);
    fn on_wait_tick(&self, remaining_secs: f64);
    fn on_finished(&self);
}

/// Observer that forwards every callback as a [`RunEvent`] over a channel.
#[derive(Debug, Clone)]
pub struct ChannelObserver {
    tx: mpsc::UnboundedSender<RunEvent>,
}

impl ChannelObserver {
    /// Create an observer and the receiver that drains its events.
    pub fn new() -> (Self, mpsc::UnboundedReceiver<RunEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    fn send(&self, event: RunEvent) {
        // A dropped receiver means nobody is presenting the run any more.
        let _ = self.tx.send(event);
    }
}

impl Observer for ChannelObserver {
    fn on_log(&self, message: &str, severity: Severity) {
        self.send(RunEvent::Log {
            message: message.to_string(),
            severity,
        });
    }

    fn on_progress(&self, percent: u8) {
        self.send(RunEvent::Progress { percent });
    }

    fn on_wait_tick(&self, remaining_secs: f64) {
        self.send(RunEvent::WaitTick { remaining_secs });
    }

    fn on_finished(&self) {
        self.send(RunEvent::Finished);
    }
}

/// Observer that keeps every event in memory.
#[derive(Debug, Default)]
pub struct RecordingObserver {
    events: Mutex<Vec<RunEvent>>,
}

impl RecordingObserver {
    pub fn new() -> Self {
        Self::default()
    }

    /// All events received so far, in order.
    pub fn events(&self) -> Vec<RunEvent> {
        self.events
            .lock()
            .map(|events| events.clone())
            .unwrap_or_default()
    }

    /// Log messages at the given severity.
    pub fn logs(&self, severity: Severity) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                RunEvent::Log { message, severity: s } if s == severity => Some(message),
                _ => None,
            })
            .collect()
    }

    /// Progress values, in order.
    pub fn progress(&self) -> Vec<u8> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                RunEvent::Progress { percent } => Some(percent),
                _ => None,
            })
            .collect()
    }

    pub fn finished_count(&self) -> usize {
        self.events()
            .iter()
            .filter(|e| matches!(e, RunEvent::Finished))
            .count()
    }

    fn push(&self, event: RunEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event);
        }
    }
}

impl Observer for RecordingObserver {
    fn on_log(&self, message: &str, severity: Severity) {
        self.push(RunEvent::Log {
            message: message.to_string(),
            severity,
        });
    }

    fn on_progress(&self, percent: u8) {
        self.push(RunEvent::Progress { percent });
    }

    fn on_wait_tick(&self, remaining_secs: f64) {
        self.push(RunEvent::WaitTick { remaining_secs });
    }

    fn on_finished(&self) {
        self.push(RunEvent::Finished);
    }
}
