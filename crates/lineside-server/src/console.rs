//! Console sink for human-readable status lines.
//!
//! Separate from `tracing`: these lines are the module's operator-facing
//! output and are mirrored to the data logger.

use std::{
    io::Write,
    sync::{Arc, Mutex},
};

/// Receives human-readable status lines.
pub trait ConsoleSink: Send + Sync {
    /// Show one line.
    fn line(&self, text: &str);
}

/// Writes lines to standard output.
#[derive(Debug, Clone, Copy, Default)]
pub struct StdoutConsole;

impl ConsoleSink for StdoutConsole {
    fn line(&self, text: &str) {
        let mut stdout = std::io::stdout().lock();
        if let Err(e) = writeln!(stdout, "{text}") {
            tracing::debug!(error = %e, "console write failed");
        }
    }
}

/// Keeps lines in memory. Used by tests and simulations.
#[derive(Debug, Clone, Default)]
pub struct MemoryConsole {
    lines: Arc<Mutex<Vec<String>>>,
}

impl MemoryConsole {
    /// Create an empty console.
    pub fn new() -> Self {
        Self::default()
    }

    /// Lines shown so far.
    pub fn lines(&self) -> Vec<String> {
        self.lines.lock().map(|lines| lines.clone()).unwrap_or_default()
    }
}

impl ConsoleSink for MemoryConsole {
    fn line(&self, text: &str) {
        if let Ok(mut lines) = self.lines.lock() {
            lines.push(text.to_string());
        }
    }
}
