//! Deterministic simulation harness for lineside modules.
//!
//! Turmoil-based implementations of the `Environment` and `Connector` traits.
//! A whole module (asset registry, both links, the outgoing queue and the
//! dispatcher) runs on Turmoil's virtual clock and network, so reconnect
//! timing and points traversal can be exercised in milliseconds and replayed
//! from a seed.
//!
//! # Example
//!
//! ```rust,ignore
//! use lineside_harness::{SimConnector, SimEnv};
//! use lineside_server::{MemoryConsole, Module, ModuleConfig};
//!
//! let mut sim = turmoil::Builder::new().build();
//!
//! sim.host("module", move || {
//!     let config = config.clone();
//!     async move {
//!         Module::new(config, SimEnv::with_seed(7), SimConnector, console).run().await?;
//!         Ok(())
//!     }
//! });
//!
//! sim.client("interlocking", async {
//!     let listener = turmoil::net::TcpListener::bind("0.0.0.0:9100").await?;
//!     // Scripted interlocking...
//!     Ok(())
//! });
//!
//! sim.run().unwrap();
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod sim_env;
mod sim_transport;

pub use sim_env::SimEnv;
pub use sim_transport::SimConnector;
