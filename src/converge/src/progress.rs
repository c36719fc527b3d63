//! Progress reporting for long-running waits.
//!
//! Polling emits one event per iteration so an operator watching the output
//! can tell the process is alive.

use std::io::Write;
use std::sync::{Mutex, MutexGuard};

/// Progress reporter for polling operations.
pub trait ProgressReporter: Send + Sync + 'static {
    /// `percentage` is the share of the deadline already consumed (0..=100).
    fn emit(&self, target: &str, percentage: u32, message: String);

    /// Called once when a wait ends, successfully or not.
    fn finish(&self, _target: &str) {}
}

/// Writes a dot per poll to stderr; a newline closes the line on finish.
///
/// Dots always land on a line labelled with their own target. When targets
/// interleave (parallel stages), each switch starts a new labelled line.
pub struct StderrProgress {
    line: Mutex<OpenLine>,
}

struct OpenLine {
    out: Box<dyn Write + Send>,
    /// Target whose label starts the current unterminated line
    target: Option<String>,
}

impl StderrProgress {
    pub fn new() -> Self {
        Self::with_writer(Box::new(std::io::stderr()))
    }

    /// Same rendering into an arbitrary writer
    pub fn with_writer(out: Box<dyn Write + Send>) -> Self {
        Self {
            line: Mutex::new(OpenLine { out, target: None }),
        }
    }

    fn line(&self) -> MutexGuard<'_, OpenLine> {
        self.line.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Default for StderrProgress {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressReporter for StderrProgress {
    fn emit(&self, target: &str, percentage: u32, message: String) {
        let mut line = self.line();
        if line.target.as_deref() != Some(target) {
            if line.target.is_some() {
                let _ = writeln!(line.out);
            }
            let _ = write!(line.out, "  {}: ", target);
            line.target = Some(target.to_string());
        }
        let _ = write!(line.out, ".");
        let _ = line.out.flush();
        tracing::debug!("[progress] {} {}% {}", target, percentage, message);
    }

    fn finish(&self, target: &str) {
        let mut line = self.line();
        if line.target.as_deref() == Some(target) {
            let _ = writeln!(line.out);
            let _ = line.out.flush();
            line.target = None;
        }
    }
}

/// Emits progress only as debug-level tracing events
pub struct LogProgress;

impl ProgressReporter for LogProgress {
    fn emit(&self, target: &str, percentage: u32, message: String) {
        tracing::debug!("[progress] {} {}% {}", target, percentage, message);
    }
}
