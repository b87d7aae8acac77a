//! Turmoil network connector.

use std::io;

use async_trait::async_trait;
use lineside_core::Connector;
use turmoil::net::TcpStream;

/// Opens links over Turmoil's simulated TCP.
///
/// Addresses are `host:port` with Turmoil host names, so a module configured
/// with `host = "interlocking"` reaches the simulated host of that name.
#[derive(Debug, Clone, Copy, Default)]
pub struct SimConnector;

#[async_trait]
impl Connector for SimConnector {
    type Stream = TcpStream;

    async fn connect(&self, address: &str) -> io::Result<TcpStream> {
        TcpStream::connect(address).await
    }
}
