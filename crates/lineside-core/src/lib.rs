//! Lineside asset simulation.
//!
//! Pure state machines for the equipment a lineside module controls, plus
//! the registry that owns them and drives their timers.
//!
//! ## Architecture
//!
//! ```text
//! lineside-core
//!   ├─ Environment       (time, sleep, randomness)
//!   ├─ Connector         (outbound byte streams)
//!   ├─ ControlledSignal / AutomaticSignal
//!   ├─ Points
//!   ├─ TrainDetectionSection
//!   └─ AssetRegistry     (keyed assets, timers, status reports)
//! ```
//!
//! The state machines never block and never perform I/O. An operation either
//! returns the [`StatusReport`](lineside_proto::StatusReport) it caused or an
//! [`OperationRejected`] explaining why nothing changed.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod env;
mod error;
pub mod points;
pub mod registry;
pub mod signal;
pub mod train_detection;
pub mod transport;

pub use env::Environment;
pub use error::{ConstructionError, OperationRejected};
pub use points::{DetectionPolicy, MoveOutcome, Points, PointsPower};
pub use registry::AssetRegistry;
pub use signal::{AutomaticSignal, ControlledSignal, LampStatus, SignalIdentity, SignalType};
pub use train_detection::{DetectionTechnology, FailureStatus, TrainDetectionSection};
pub use transport::Connector;

const MAX_IDENTITY_LEN: usize = 16;

/// Validate and upper-case a points or section identity.
///
/// Identities appear as one `.`-separated segment of a message body, so they
/// are restricted to ASCII letters and digits.
pub(crate) fn validate_identity(identity: &str) -> Result<String, ConstructionError> {
    let well_formed = !identity.is_empty()
        && identity.len() <= MAX_IDENTITY_LEN
        && identity.bytes().all(|b| b.is_ascii_alphanumeric());
    if well_formed {
        Ok(identity.to_ascii_uppercase())
    } else {
        Err(ConstructionError::InvalidIdentity(identity.to_string()))
    }
}
