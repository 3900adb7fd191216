use std::fmt::Display;
use std::sync::Mutex;


/// Receives diagnostic events from the assignment loop: path flows, choice probabilities
/// and convergence status.
pub trait Tracer: Send + Sync {
    fn trace(&self, event: &str, fields: &[(&str, &dyn Display)]);
}

/// Forwards trace events to the `log` facade at debug level.
pub struct LogTracer;

impl Tracer for LogTracer {
    fn trace(&self, event: &str, fields: &[(&str, &dyn Display)]) {
        log::debug!(target: "assign::trace", "{} {}", event, format_fields(fields));
    }
}

/// Keeps trace events in memory, formatted as `event key=value ...`.
pub struct RecordingTracer {
    lines: Mutex<Vec<String>>,
}

impl RecordingTracer {
    pub fn new() -> RecordingTracer {
        return RecordingTracer{lines: Mutex::new(vec![])};
    }

    pub fn lines(&self) -> Vec<String> {
        match self.lines.lock() {
            Ok(lines) => lines.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

impl Tracer for RecordingTracer {
    fn trace(&self, event: &str, fields: &[(&str, &dyn Display)]) {
        let line = format!("{} {}", event, format_fields(fields));
        match self.lines.lock() {
            Ok(mut lines) => lines.push(line),
            Err(poisoned) => poisoned.into_inner().push(line),
        }
    }
}

fn format_fields(fields: &[(&str, &dyn Display)]) -> String {
    let parts: Vec<String> = fields.iter().map(|(key, val)| format!("{}={}", key, val)).collect();
    return parts.join(" ");
}
