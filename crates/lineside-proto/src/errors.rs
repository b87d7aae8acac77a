//! Protocol error types.

use thiserror::Error;

/// A string did not name any value of a wire enumeration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown {kind}: '{value}'")]
pub struct UnknownVariant {
    /// Enumeration that was being parsed.
    pub kind: &'static str,
    /// Offending text.
    pub value: String,
}

/// A received frame violates the wire grammar.
///
/// Never fatal: the receiver logs the violation and drops the frame.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolError {
    /// Wrong number of `|`-separated fields.
    #[error("expected {expected} fields, got {actual}")]
    FieldCount {
        /// Required field count.
        expected: usize,
        /// Fields present.
        actual: usize,
    },

    /// Sender field does not match `[A-Z_0-9]{5,15}`.
    #[error("invalid sender: '{0}'")]
    InvalidSender(String),

    /// Sender is well formed but is not the peer we are talking to.
    #[error("unexpected sender: expected '{expected}', got '{actual}'")]
    UnexpectedSender {
        /// Configured peer identity.
        expected: String,
        /// Identity carried by the frame.
        actual: String,
    },

    /// Type field is not a known message type.
    #[error("unknown message type: '{0}'")]
    UnknownType(String),

    /// Body does not match `[A-Za-z0-9._-]{4,}`.
    #[error("invalid body: '{0}'")]
    InvalidBody(String),

    /// Hash field is not a signed 32-bit decimal.
    #[error("malformed hash: '{0}'")]
    MalformedHash(String),

    /// Recomputed hash differs from the carried one.
    #[error("hash mismatch: carried {carried}, computed {computed}")]
    HashMismatch {
        /// Hash carried by the frame.
        carried: i32,
        /// Hash recomputed over `SENDER|TYPE|BODY`.
        computed: i32,
    },

    /// Final field is not the terminator.
    #[error("missing terminator, got '{0}'")]
    MissingTerminator(String),

    /// Encoded line does not fit the 16-bit length prefix.
    #[error("line too long: {0} bytes")]
    LineTooLong(usize),
}

/// A REQUEST body cannot be routed to an asset operation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CommandError {
    /// First segment names no known target.
    #[error("unknown command target: '{0}'")]
    UnknownTarget(String),

    /// Wrong number of `.`-separated segments for the target.
    #[error("{target}: expected {expected} segments, got {actual}")]
    SegmentCount {
        /// Command target.
        target: &'static str,
        /// Accepted segment counts, for the message.
        expected: &'static str,
        /// Segments present.
        actual: usize,
    },

    /// A required segment is empty.
    #[error("{target}: empty {field}")]
    EmptyField {
        /// Command target.
        target: &'static str,
        /// Segment name.
        field: &'static str,
    },

    /// A segment could not be parsed into its value type.
    #[error(transparent)]
    InvalidValue(#[from] UnknownVariant),

    /// Points cannot be commanded to `UNKNOWN`.
    #[error("points cannot be requested to UNKNOWN")]
    UnknownPosition,
}
