//! Incoming message dispatch.
//!
//! The single consumer of lines read from the interlocking. Every line is
//! validated once here; asset operations are only ever started from this
//! task, so protocol-driven mutations never race.
//!
//! | Type         | Action                                              |
//! |--------------|-----------------------------------------------------|
//! | ACK          | retire the matching outgoing entry                  |
//! | STATE_CHANGE | log, acknowledge                                    |
//! | REQUEST      | acknowledge, parse into a [`Command`], execute it   |

use std::sync::Arc;

use lineside_core::{AssetRegistry, Environment, OperationRejected};
use lineside_proto::{Command, CommandError, Frame, MessageType, ProtocolError};
use tokio::sync::mpsc;

use crate::{data_logger::DataLogger, exchange::OutgoingQueue, link::LineSink};

/// What happened to one incoming line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Dispatched {
    /// Frame failed validation and was dropped.
    Dropped(ProtocolError),
    /// ACK processed; `matched` tells whether an outgoing entry was retired.
    Acknowledged {
        /// Whether an outstanding entry carried the hash.
        matched: bool,
    },
    /// STATE_CHANGE from the interlocking, logged only.
    Informational,
    /// REQUEST body names no operation.
    Unroutable(CommandError),
    /// Command executed.
    Executed(Command),
    /// Command refused by the asset; nothing changed.
    Rejected(Command, OperationRejected),
}

/// Validates and executes lines from the interlocking.
pub struct Dispatcher<E: Environment> {
    module: String,
    peer: String,
    registry: Arc<AssetRegistry<E>>,
    queue: Arc<OutgoingQueue<E>>,
    replies: Arc<dyn LineSink>,
    telemetry: DataLogger,
}

impl<E: Environment> Dispatcher<E> {
    /// Dispatch lines from `peer` to `registry`. ACKs go straight out through
    /// `replies`; snapshots are queued on `queue`.
    pub fn new(
        module: impl Into<String>,
        peer: impl Into<String>,
        registry: Arc<AssetRegistry<E>>,
        queue: Arc<OutgoingQueue<E>>,
        replies: Arc<dyn LineSink>,
        telemetry: DataLogger,
    ) -> Self {
        Self { module: module.into(), peer: peer.into(), registry, queue, replies, telemetry }
    }

    /// Consume `incoming` until every sender is gone.
    pub async fn run(&self, mut incoming: mpsc::UnboundedReceiver<String>) {
        while let Some(line) = incoming.recv().await {
            self.handle_line(&line).await;
        }
        tracing::debug!("incoming queue closed, dispatcher stopping");
    }

    /// Validate and act on one line.
    pub async fn handle_line(&self, line: &str) -> Dispatched {
        let frame = match Frame::decode(line, &self.peer) {
            Ok(frame) => frame,
            Err(e) => {
                tracing::warn!(error = %e, line, "frame dropped");
                return Dispatched::Dropped(e);
            },
        };

        match frame.message_type() {
            MessageType::Ack => {
                let matched = frame
                    .body()
                    .parse::<i32>()
                    .is_ok_and(|hash| self.queue.acknowledge(hash));
                if !matched {
                    tracing::debug!(body = frame.body(), "ACK matches no outstanding message");
                }
                Dispatched::Acknowledged { matched }
            },
            MessageType::StateChange => {
                self.acknowledge(&frame).await;
                tracing::info!(body = frame.body(), "state change from interlocking");
                Dispatched::Informational
            },
            MessageType::Request => {
                self.acknowledge(&frame).await;
                self.telemetry.record(&format!("{} RECEIVED {}", self.module, frame.body()));
                match Command::parse(frame.body()) {
                    Ok(command) => self.execute(command).await,
                    Err(e) => {
                        tracing::warn!(error = %e, body = frame.body(), "request dropped");
                        Dispatched::Unroutable(e)
                    },
                }
            },
        }
    }

    async fn acknowledge(&self, frame: &Frame) {
        let ack = Frame::new(self.module.as_str(), MessageType::Ack, ack_body(frame.hash()));
        if let Err(e) = self.replies.send_line(&ack.encode()).await {
            tracing::debug!(error = %e, "ACK not sent");
        }
    }

    async fn execute(&self, command: Command) -> Dispatched {
        let result = match &command {
            Command::Points { id, position } => self.registry.move_points(id, *position).await,
            Command::ControlledSignal { prefix, id, route_exit, authority, aspect } => {
                self.registry
                    .request_controlled_signal(prefix, id, route_exit.clone(), *authority, *aspect)
                    .await
            },
            Command::AutomaticSignal { prefix, id, most_restrictive } => {
                self.registry.set_automatic_display(prefix, id, *most_restrictive).await
            },
            Command::Handshake { identity } => {
                if *identity != self.peer {
                    tracing::warn!(identity = %identity, peer = %self.peer, "handshake names another peer");
                }
                self.send_snapshot().await;
                Ok(())
            },
        };

        match result {
            Ok(()) => {
                tracing::debug!(command = %command, "command executed");
                Dispatched::Executed(command)
            },
            Err(reason) => {
                tracing::info!(command = %command, reason = %reason, "command rejected");
                Dispatched::Rejected(command, reason)
            },
        }
    }

    /// Queue the current state of every asset.
    pub async fn send_snapshot(&self) {
        let reports = self.registry.snapshot().await;
        tracing::info!(reports = reports.len(), "sending full status");
        for report in reports {
            self.queue.push(MessageType::StateChange, report.to_body());
        }
    }
}

/// ACK body for a frame hash: the decimal hash, zero-padded to satisfy the
/// body grammar.
pub fn ack_body(hash: i32) -> String {
    format!("{hash:04}")
}
