//! Terminal rendering of run events.

use clap::ValueEnum;
use keysync_scheduler::{RunEvent, Severity};
use tokio::sync::mpsc::UnboundedReceiver;

/// How events are written to stdout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable lines.
    Text,
    /// One JSON object per event.
    Json,
}

/// Turns run events into output lines.
///
/// Wait ticks arrive every 100ms; only whole-second changes are rendered,
/// and in text mode only every ten seconds plus the final countdown.
pub struct Renderer {
    format: OutputFormat,
    last_tick_secs: Option<u64>,
}

impl Renderer {
    pub fn new(format: OutputFormat) -> Self {
        Self {
            format,
            last_tick_secs: None,
        }
    }

    /// The line to print for `event`, if any.
    pub fn render(&mut self, event: &RunEvent) -> Option<String> {
        if let RunEvent::WaitTick { remaining_secs } = event {
            let secs = remaining_secs.ceil().max(0.0) as u64;
            if self.last_tick_secs == Some(secs) {
                return None;
            }
            self.last_tick_secs = Some(secs);
            if self.format == OutputFormat::Text && secs % 10 != 0 && secs > 5 {
                return None;
            }
        } else {
            self.last_tick_secs = None;
        }

        match self.format {
            OutputFormat::Json => serde_json::to_string(event).ok(),
            OutputFormat::Text => Some(render_text(event)),
        }
    }

    /// Print events until the run reports it has finished.
    pub async fn drain(mut self, mut rx: UnboundedReceiver<RunEvent>) {
        while let Some(event) = rx.recv().await {
            if let Some(line) = self.render(&event) {
                println!("{}", line);
            }
            if matches!(event, RunEvent::Finished) {
                break;
            }
        }
    }
}

fn render_text(event: &RunEvent) -> String {
    match event {
        RunEvent::Log { message, severity } => format!("{} {}", marker(*severity), message),
        RunEvent::Progress { percent } => format!("Progress: {}%", percent),
        RunEvent::WaitTick { remaining_secs } => format!(
            "Remaining wait time: {} seconds",
            remaining_secs.ceil().max(0.0)
        ),
        RunEvent::Finished => "Process completed!".to_string(),
    }
}

fn marker(severity: Severity) -> &'static str {
    match severity {
        Severity::Info => "[info]",
        Severity::Success => "[ok]",
        Severity::Warning => "[warn]",
        Severity::Error => "[error]",
        Severity::Critical => "[critical]",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn tick(remaining_secs: f64) -> RunEvent {
        RunEvent::WaitTick { remaining_secs }
    }

    #[test]
    fn test_text_lines() {
        let mut renderer = Renderer::new(OutputFormat::Text);
        assert_eq!(
            renderer.render(&RunEvent::Log {
                message: "Success: git add .".to_string(),
                severity: Severity::Success,
            }),
            Some("[ok] Success: git add .".to_string())
        );
        assert_eq!(
            renderer.render(&RunEvent::Progress { percent: 66 }),
            Some("Progress: 66%".to_string())
        );
        assert_eq!(
            renderer.render(&RunEvent::Finished),
            Some("Process completed!".to_string())
        );
    }

    #[test]
    fn test_text_ticks_are_throttled() {
        let mut renderer = Renderer::new(OutputFormat::Text);
        let rendered: Vec<String> = [20.0, 19.95, 19.9, 19.0, 11.0, 10.0, 9.9, 5.0, 4.9, 3.5, 0.05]
            .into_iter()
            .filter_map(|r| renderer.render(&tick(r)))
            .collect();

        assert_eq!(
            rendered,
            vec![
                "Remaining wait time: 20 seconds",
                "Remaining wait time: 10 seconds",
                "Remaining wait time: 5 seconds",
                "Remaining wait time: 4 seconds",
                "Remaining wait time: 1 seconds",
            ]
        );
    }

    #[test]
    fn test_json_lines() {
        let mut renderer = Renderer::new(OutputFormat::Json);
        let line = renderer
            .render(&RunEvent::Progress { percent: 100 })
            .unwrap();
        assert_eq!(line, r#"{"type":"progress","percent":100}"#);

        // Every whole second is emitted in JSON mode.
        assert!(renderer.render(&tick(7.0)).is_some());
        assert!(renderer.render(&tick(6.95)).is_none());
        assert!(renderer.render(&tick(6.0)).is_some());
    }

    #[tokio::test]
    async fn test_drain_stops_at_finished() {
        let (tx, rx) = tokio::sync::mpsc::unbounded_channel();
        tx.send(RunEvent::Progress { percent: 100 }).unwrap();
        tx.send(RunEvent::Finished).unwrap();
        // Sender stays alive; drain must still return.
        Renderer::new(OutputFormat::Text).drain(rx).await;
        drop(tx);
    }
}
