//! Fuzz target for inbound line validation and body parsing.
//!
//! Every byte the interlocking sends passes through `Frame::decode` and then
//! `Command::parse`; neither may panic on any input.
//!
//! # Invariants
//!
//! - Decoding never panics, whatever the bytes
//! - An accepted frame re-encodes to a line that decodes to the same frame
//! - An accepted frame's hash is the hash recomputed from its fields
//! - A parsed command or report renders to a body that parses back to itself

#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use lineside_proto::{Command, Frame, StatusReport};

const PEER: &str = "INTERLOCK_01";

#[derive(Debug, Arbitrary)]
enum FuzzInput {
    /// Raw line as read off the wire.
    Line(Vec<u8>),
    /// Well-framed line around a fuzzed body, so body parsing is reached.
    Body { message_type: u8, body: String },
}

fuzz_target!(|input: FuzzInput| {
    let line = match input {
        FuzzInput::Line(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
        FuzzInput::Body { message_type, body } => {
            let types = lineside_proto::MessageType::ALL;
            let message_type = types[usize::from(message_type) % types.len()];
            Frame::new(PEER, message_type, body).encode()
        },
    };

    let Ok(frame) = Frame::decode(&line, PEER) else {
        return;
    };

    let recomputed = Frame::new(frame.sender(), frame.message_type(), frame.body());
    assert_eq!(frame.hash(), recomputed.hash());
    assert_eq!(Frame::decode(&frame.encode(), PEER).as_ref(), Ok(&frame));

    if let Ok(command) = Command::parse(frame.body()) {
        assert_eq!(Command::parse(&command.to_body()), Ok(command));
    }
    if let Ok(report) = StatusReport::parse(frame.body()) {
        assert_eq!(StatusReport::parse(&report.to_body()), Ok(report));
    }
});
