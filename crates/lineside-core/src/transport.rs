//! Transport abstraction for peer links.
//!
//! The connection manager only ever needs to open a byte stream to a
//! `host:port`. Production uses Tokio TCP, simulation uses Turmoil's TCP, and
//! unit tests hand out in-memory duplex pipes.

use std::io;

use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncWrite};

/// Opens outbound byte streams.
#[async_trait]
pub trait Connector: Send + Sync + 'static {
    /// Stream type produced by a successful connect.
    type Stream: AsyncRead + AsyncWrite + Send + Unpin + 'static;

    /// Connect to `address` (`host:port`).
    async fn connect(&self, address: &str) -> io::Result<Self::Stream>;
}
