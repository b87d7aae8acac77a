//! Frame integrity hash.
//!
//! The 32-bit polynomial string hash `h = 31 * h + c` over UTF-16 code units
//! with wrapping arithmetic. Peers built against the original outstation
//! compute the same value, so it is kept bit-for-bit.

use crate::types::MessageType;

/// Hash of an arbitrary string.
pub fn string_hash(text: &str) -> i32 {
    text.encode_utf16().fold(0i32, |h, unit| h.wrapping_mul(31).wrapping_add(i32::from(unit)))
}

/// Integrity hash of a frame: the hash of `SENDER|TYPE|BODY`.
pub fn frame_hash(sender: &str, message_type: MessageType, body: &str) -> i32 {
    string_hash(&format!("{sender}|{message_type}|{body}"))
}
