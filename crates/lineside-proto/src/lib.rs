//! Lineside module wire protocol.
//!
//! Every message exchanged with the remote interlocking is a single line of
//! text with five `|`-separated fields:
//!
//! ```text
//! SENDER|TYPE|BODY|HASH|END_MESSAGE
//! ```
//!
//! `HASH` is recomputed by the receiver over `SENDER|TYPE|BODY` and the frame
//! is rejected on mismatch. Each line travels on the socket behind a 2-byte
//! big-endian length prefix.
//!
//! ## Layers
//!
//! ```text
//! lineside-proto
//!   ├─ codec     (length-prefixed lines on AsyncRead / AsyncWrite)
//!   ├─ Frame     (field grammar, integrity hash, terminator)
//!   ├─ Command   (REQUEST bodies, parsed once at the boundary)
//!   └─ StatusReport (STATE_CHANGE bodies)
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod codec;
mod command;
mod errors;
mod frame;
pub mod hash;
mod report;
mod types;

pub use command::{Command, HANDSHAKE_KEYWORD, RouteExit};
pub use errors::{CommandError, ProtocolError, UnknownVariant};
pub use frame::{Frame, TERMINATOR, validate_body, validate_sender};
pub use report::StatusReport;
pub use types::{Aspect, DetectionStatus, MessageType, MovementAuthorityClass, PointsPosition};
