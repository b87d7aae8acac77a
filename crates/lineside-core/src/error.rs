//! Asset error types.

use lineside_proto::{Aspect, MovementAuthorityClass};
use thiserror::Error;

use crate::{
    signal::SignalType,
    train_detection::{DetectionTechnology, FailureStatus},
};

/// An asset could not be created from its configuration record.
///
/// Fatal for that asset only; the module refuses to start with it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConstructionError {
    /// Signal prefix is not two or three letters plus an optional suffix.
    #[error("invalid signal prefix: '{0}'")]
    InvalidPrefix(String),

    /// Signal id is not two to four digits plus an optional `R`.
    #[error("invalid signal id: '{0}'")]
    InvalidId(String),

    /// Points or train detection identity is empty or not alphanumeric.
    #[error("invalid identity: '{0}'")]
    InvalidIdentity(String),

    /// Controlled signals must be able to show danger.
    #[error("signal type {0} cannot be used for a controlled signal")]
    UnsupportedType(SignalType),

    /// Two assets of the same kind share an identity.
    #[error("duplicate identity: '{0}'")]
    Duplicate(String),
}

/// A requested operation was refused and nothing changed.
///
/// Not an error condition for the module: the dispatcher logs it and moves on.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OperationRejected {
    /// No asset is registered under this identity.
    #[error("unknown {kind}: '{identity}'")]
    UnknownAsset {
        /// Asset kind.
        kind: &'static str,
        /// Identity that was looked up.
        identity: String,
    },

    /// BLACK and TOP_YELLOW only ever arise from lamp failures.
    #[error("aspect {0} cannot be requested")]
    DerivedAspect(Aspect),

    /// The signal type has no such aspect.
    #[error("aspect {aspect} is not applicable to {signal_type}")]
    AspectNotApplicable {
        /// Aspect that was requested.
        aspect: Aspect,
        /// Type of the signal.
        signal_type: SignalType,
    },

    /// The signal type cannot show any aspect for this authority.
    #[error("{authority} has no aspect on {signal_type}")]
    NoAspectForAuthority {
        /// Requested authority class.
        authority: MovementAuthorityClass,
        /// Type of the signal.
        signal_type: SignalType,
    },

    /// Proceed authorities must name the exit signal of the route.
    #[error("{0} requires a route exit signal")]
    MissingRouteExit(MovementAuthorityClass),

    /// Lamp index beyond the signal's lamps.
    #[error("lamp {index} out of range, signal has {count} lamps")]
    LampOutOfRange {
        /// Requested lamp index.
        index: usize,
        /// Number of lamps on the signal.
        count: usize,
    },

    /// A move is already in flight.
    #[error("points are already moving")]
    PointsMoving,

    /// The operation is forbidden by the train detection compatibility matrix.
    #[error("{operation} blocked: {condition}")]
    Blocked {
        /// Operation that was refused.
        operation: &'static str,
        /// Condition that blocked it.
        condition: &'static str,
    },

    /// The failure mode does not exist for this detection technology.
    #[error("{status} is not possible on {technology}")]
    TechnologyMismatch {
        /// Requested failure status.
        status: FailureStatus,
        /// Technology of the section.
        technology: DetectionTechnology,
    },

    /// Intermittent failures only affect track circuits.
    #[error("intermittent failures require a track circuit")]
    NotTrackCircuit,

    /// The condition being applied is already in effect.
    #[error("{0} already active")]
    AlreadyActive(&'static str),

    /// The condition being removed is not in effect.
    #[error("{0} not active")]
    NotActive(&'static str),
}
