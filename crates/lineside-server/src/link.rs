//! Peer links.
//!
//! A link owns at most one stream at a time. [`LinkDriver`] connects with
//! bounded retry, sends the handshake, then blocks in a liveness read until
//! the stream fails; [`LinkHandle`] is the cheap, cloneable send side the rest
//! of the module writes through.
//!
//! A failed write detaches the stream and wakes the liveness reader, so both
//! directions agree the link is down and the driver reconnects.

use std::{io, sync::Arc};

use async_trait::async_trait;
use lineside_core::{Connector, Environment};
use lineside_proto::codec;
use tokio::{
    io::{AsyncRead, AsyncWrite, ReadHalf},
    net::TcpStream,
    sync::{Mutex, Notify, mpsc, watch},
};

use crate::{
    config::LinkSettings,
    connection::{ConnectionMachine, ConnectionState},
    error::LinkError,
};

/// Destination for outbound protocol lines.
#[async_trait]
pub trait LineSink: Send + Sync {
    /// Send one line. Fails if the peer is unreachable.
    async fn send_line(&self, line: &str) -> Result<(), LinkError>;
}

type BoxedWriter = Box<dyn AsyncWrite + Send + Unpin>;

struct Attached {
    writer: BoxedWriter,
    lost: Arc<Notify>,
}

struct Shared {
    name: &'static str,
    state: watch::Sender<ConnectionState>,
    attached: Mutex<Option<Attached>>,
}

/// Send side and published state of one link.
#[derive(Clone)]
pub struct LinkHandle {
    shared: Arc<Shared>,
}

impl LinkHandle {
    /// Create a disconnected link.
    pub fn new(name: &'static str) -> Self {
        let (state, _) = watch::channel(ConnectionState::NoConnection);
        Self { shared: Arc::new(Shared { name, state, attached: Mutex::new(None) }) }
    }

    /// Link name, for logs.
    pub fn name(&self) -> &'static str {
        self.shared.name
    }

    /// Current state.
    pub fn state(&self) -> ConnectionState {
        *self.shared.state.borrow()
    }

    /// Observe state changes.
    pub fn subscribe(&self) -> watch::Receiver<ConnectionState> {
        self.shared.state.subscribe()
    }

    fn publish(&self, state: ConnectionState) {
        let previous = self.shared.state.send_replace(state);
        if previous != state {
            tracing::info!(link = self.shared.name, from = %previous, to = %state, "link state");
        }
    }

    async fn attach(&self, writer: BoxedWriter, lost: Arc<Notify>) {
        *self.shared.attached.lock().await = Some(Attached { writer, lost });
    }

    async fn detach(&self) {
        self.shared.attached.lock().await.take();
    }
}

#[async_trait]
impl LineSink for LinkHandle {
    async fn send_line(&self, line: &str) -> Result<(), LinkError> {
        let mut slot = self.shared.attached.lock().await;
        let attached = slot.as_mut().ok_or(LinkError::NotConnected(self.shared.name))?;
        if let Err(source) = codec::write_line(&mut attached.writer, line).await {
            attached.lost.notify_one();
            slot.take();
            return Err(LinkError::Write { link: self.shared.name, source });
        }
        Ok(())
    }
}

/// Connects a link and keeps it connected until retries run out.
pub struct LinkDriver<E: Environment, C: Connector> {
    env: E,
    connector: C,
    address: String,
    settings: LinkSettings,
    handle: LinkHandle,
    handshake: String,
    incoming: Option<mpsc::UnboundedSender<String>>,
}

impl<E: Environment, C: Connector> LinkDriver<E, C> {
    /// Drive `handle` towards `address`, sending `handshake` first on every
    /// connection.
    pub fn new(
        env: E,
        connector: C,
        address: String,
        settings: LinkSettings,
        handle: LinkHandle,
        handshake: String,
    ) -> Self {
        Self { env, connector, address, settings, handle, handshake, incoming: None }
    }

    /// Forward every line the peer sends to `incoming`. Without this the
    /// liveness reader discards what it reads.
    #[must_use]
    pub fn with_incoming(mut self, incoming: mpsc::UnboundedSender<String>) -> Self {
        self.incoming = Some(incoming);
        self
    }

    /// Run until the link is terminated. Returns the final machine.
    pub async fn run(self) -> ConnectionMachine {
        let mut machine = ConnectionMachine::new(self.settings.max_attempts);
        let name = self.handle.name();

        while machine.begin_attempt() {
            self.handle.publish(machine.state());

            let stream = match self.connect().await {
                Ok(stream) => stream,
                Err(e) => {
                    let state = machine.attempt_failed();
                    self.handle.publish(state);
                    tracing::info!(attempt = machine.failed_attempts(), error = %e, "connect failed");
                    if machine.terminated() {
                        break;
                    }
                    self.env.sleep(self.settings.retry_delay()).await;
                    continue;
                },
            };

            self.handle.publish(machine.established());
            let (mut reader, mut writer) = tokio::io::split(stream);
            if let Err(source) = codec::write_line(&mut writer, &self.handshake).await {
                let e = LinkError::Write { link: name, source };
                self.handle.publish(machine.attempt_failed());
                tracing::info!(link = name, error = %e, "handshake failed");
                if machine.terminated() {
                    break;
                }
                self.env.sleep(self.settings.retry_delay()).await;
                continue;
            }

            let lost = Arc::new(Notify::new());
            self.handle.attach(Box::new(writer), Arc::clone(&lost)).await;
            self.handle.publish(machine.connected());

            self.read_until_lost(&mut reader, &lost).await;

            self.handle.detach().await;
            self.handle.publish(machine.lost());
        }

        tracing::warn!(
            link = name,
            address = %self.address,
            attempts = machine.failed_attempts(),
            "link terminated, no further attempts"
        );
        machine
    }

    async fn connect(&self) -> Result<C::Stream, LinkError> {
        let link = self.handle.name();
        tokio::select! {
            result = self.connector.connect(&self.address) => {
                result.map_err(|source| LinkError::Connect { link, address: self.address.clone(), source })
            },
            () = self.env.sleep(self.settings.connect_timeout()) => {
                Err(LinkError::Timeout { link, address: self.address.clone() })
            },
        }
    }

    async fn read_until_lost<S: AsyncRead>(&self, reader: &mut ReadHalf<S>, lost: &Notify) {
        loop {
            tokio::select! {
                line = codec::read_line(reader) => match line {
                    Ok(line) => {
                        if let Some(incoming) = &self.incoming {
                            if incoming.send(line).is_err() {
                                tracing::debug!(link = self.handle.name(), "incoming consumer gone");
                            }
                        }
                    },
                    // The whole frame was consumed, so the stream is still aligned.
                    Err(e) if e.kind() == io::ErrorKind::InvalidData => {
                        tracing::warn!(link = self.handle.name(), error = %e, "frame dropped, not UTF-8");
                    },
                    Err(e) => {
                        tracing::info!(link = self.handle.name(), error = %e, "link read failed");
                        return;
                    },
                },
                () = lost.notified() => return,
            }
        }
    }
}

/// Production [`Connector`] over Tokio TCP.
#[derive(Debug, Clone, Copy, Default)]
pub struct TcpConnector;

#[async_trait]
impl Connector for TcpConnector {
    type Stream = TcpStream;

    async fn connect(&self, address: &str) -> io::Result<TcpStream> {
        let stream = TcpStream::connect(address).await?;
        stream.set_nodelay(true)?;
        Ok(stream)
    }
}
