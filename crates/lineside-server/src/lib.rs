//! Lineside module runtime.
//!
//! Connects the asset simulation in `lineside-core` to the two peers of a
//! lineside module:
//! - the interlocking, which sends REQUESTs and receives STATE_CHANGEs
//! - the data logger, which receives a best-effort copy of the module's
//!   event stream
//!
//! ## Architecture
//!
//! ```text
//! lineside-server
//!   ├─ SystemEnv          (production Environment impl)
//!   ├─ TcpConnector       (production Connector impl)
//!   ├─ ConfigSource       (TOML module configuration)
//!   ├─ LinkDriver         (bounded-retry connection per peer)
//!   ├─ OutgoingQueue      (ACK-tracked STATE_CHANGE delivery)
//!   ├─ Dispatcher         (frame validation, command execution)
//!   ├─ DataLogger         (console + non-blocking telemetry mirror)
//!   └─ Module             (startup and task wiring)
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod config;
mod connection;
mod console;
mod data_logger;
mod dispatcher;
mod error;
mod exchange;
mod link;
mod module;
mod system_env;

pub use config::{
    ConfigSource, ExchangeSettings, LinkSettings, ModuleConfig, ModuleIdentity, TomlConfigSource,
};
pub use connection::{ConnectionMachine, ConnectionState};
pub use console::{ConsoleSink, MemoryConsole, StdoutConsole};
pub use data_logger::{DataLogger, TelemetryWriter};
pub use dispatcher::{Dispatched, Dispatcher, ack_body};
pub use error::{ConfigError, LinkError, ModuleError};
pub use exchange::OutgoingQueue;
pub use link::{LineSink, LinkDriver, LinkHandle, TcpConnector};
pub use module::Module;
pub use system_env::SystemEnv;
