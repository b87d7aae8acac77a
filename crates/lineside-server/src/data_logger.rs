//! Data logger telemetry.
//!
//! Best effort and one way: every line goes to the console at once, and is
//! handed to a [`TelemetryWriter`] for the data logger link. A slow or stalled
//! logger only fills the backlog; lines beyond it are dropped and the caller
//! never waits.

use std::sync::Arc;

use tokio::sync::mpsc::{self, error::TrySendError};

use crate::{console::ConsoleSink, link::LineSink};

/// Mirrors module events to the console and the data logger.
#[derive(Clone)]
pub struct DataLogger {
    console: Arc<dyn ConsoleSink>,
    lines: mpsc::Sender<String>,
}

impl DataLogger {
    /// Log to `console`, buffering up to `backlog` lines for the link.
    ///
    /// The returned writer must be run for anything to reach the data logger.
    pub fn new(console: Arc<dyn ConsoleSink>, backlog: usize) -> (Self, TelemetryWriter) {
        let (tx, rx) = mpsc::channel(backlog.max(1));
        (Self { console, lines: tx }, TelemetryWriter { lines: rx })
    }

    /// Record one event. Never blocks.
    pub fn record(&self, text: &str) {
        self.console.line(text);
        match self.lines.try_send(text.to_string()) {
            Ok(()) => {},
            Err(TrySendError::Full(_)) => tracing::trace!("telemetry backlog full, line dropped"),
            Err(TrySendError::Closed(_)) => tracing::trace!("telemetry writer gone, line dropped"),
        }
    }
}

/// Drains recorded lines into the data logger link.
pub struct TelemetryWriter {
    lines: mpsc::Receiver<String>,
}

impl TelemetryWriter {
    /// Forward lines to `link` until every [`DataLogger`] is dropped. Lines
    /// that cannot be written are lost.
    pub async fn run(mut self, link: &dyn LineSink) {
        while let Some(line) = self.lines.recv().await {
            if let Err(e) = link.send_line(&line).await {
                tracing::trace!(error = %e, "telemetry not delivered");
            }
        }
    }
}
