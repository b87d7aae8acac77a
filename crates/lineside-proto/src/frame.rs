//! Frame grammar and validation.

use crate::{errors::ProtocolError, hash::frame_hash, types::MessageType};

/// Literal that must close every frame.
pub const TERMINATOR: &str = "END_MESSAGE";

const FIELD_COUNT: usize = 5;
const SENDER_LEN: std::ops::RangeInclusive<usize> = 5..=15;
const MIN_BODY_LEN: usize = 4;

/// One protocol message.
///
/// The hash is always computed locally from the other three fields; a frame
/// built by [`Frame::decode`] only exists if the carried hash agreed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    sender: String,
    message_type: MessageType,
    body: String,
    hash: i32,
}

impl Frame {
    /// Build a frame and compute its integrity hash.
    pub fn new(sender: impl Into<String>, message_type: MessageType, body: impl Into<String>) -> Self {
        let sender = sender.into();
        let body = body.into();
        let hash = frame_hash(&sender, message_type, &body);
        Self { sender, message_type, body, hash }
    }

    /// Identity of the sending peer.
    pub fn sender(&self) -> &str {
        &self.sender
    }

    /// Frame type.
    pub fn message_type(&self) -> MessageType {
        self.message_type
    }

    /// Body text.
    pub fn body(&self) -> &str {
        &self.body
    }

    /// Integrity hash of `SENDER|TYPE|BODY`.
    pub fn hash(&self) -> i32 {
        self.hash
    }

    /// Render the frame as its wire line.
    pub fn encode(&self) -> String {
        format!("{}|{}|{}|{}|{TERMINATOR}", self.sender, self.message_type, self.body, self.hash)
    }

    /// Parse and validate a wire line received from `expected_sender`.
    ///
    /// # Errors
    ///
    /// Returns the first grammar violation found. The carried hash is never
    /// trusted: it is compared against a fresh computation.
    pub fn decode(line: &str, expected_sender: &str) -> Result<Self, ProtocolError> {
        let fields: Vec<&str> = line.split('|').collect();
        let &[sender, message_type, body, hash, terminator] = fields.as_slice() else {
            return Err(ProtocolError::FieldCount { expected: FIELD_COUNT, actual: fields.len() });
        };

        if terminator != TERMINATOR {
            return Err(ProtocolError::MissingTerminator(terminator.to_string()));
        }

        validate_sender(sender)?;
        if sender != expected_sender {
            return Err(ProtocolError::UnexpectedSender {
                expected: expected_sender.to_string(),
                actual: sender.to_string(),
            });
        }

        let message_type: MessageType = message_type
            .parse()
            .map_err(|_| ProtocolError::UnknownType(message_type.to_string()))?;

        validate_body(body)?;

        let carried: i32 =
            hash.parse().map_err(|_| ProtocolError::MalformedHash(hash.to_string()))?;
        let computed = frame_hash(sender, message_type, body);
        if carried != computed {
            return Err(ProtocolError::HashMismatch { carried, computed });
        }

        Ok(Self {
            sender: sender.to_string(),
            message_type,
            body: body.to_string(),
            hash: computed,
        })
    }
}

/// Check a peer identity against `[A-Z_0-9]{5,15}`.
pub fn validate_sender(sender: &str) -> Result<(), ProtocolError> {
    let well_formed = SENDER_LEN.contains(&sender.len())
        && sender.bytes().all(|b| b.is_ascii_uppercase() || b.is_ascii_digit() || b == b'_');
    if well_formed { Ok(()) } else { Err(ProtocolError::InvalidSender(sender.to_string())) }
}

/// Check a body against `[A-Za-z0-9._-]{4,}`.
pub fn validate_body(body: &str) -> Result<(), ProtocolError> {
    let well_formed = body.len() >= MIN_BODY_LEN
        && body.bytes().all(|b| b.is_ascii_alphanumeric() || matches!(b, b'.' | b'_' | b'-'));
    if well_formed { Ok(()) } else { Err(ProtocolError::InvalidBody(body.to_string())) }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    const PEER: &str = "INTERLOCK_01";

    fn line(sender: &str, ty: &str, body: &str, hash: &str, end: &str) -> String {
        format!("{sender}|{ty}|{body}|{hash}|{end}")
    }

    #[test]
    fn encoded_line_has_five_fields() {
        let frame = Frame::new(PEER, MessageType::Request, "POINTS.940.REVERSE");
        let encoded = frame.encode();
        assert!(encoded.starts_with("INTERLOCK_01|REQUEST|POINTS.940.REVERSE|"));
        assert!(encoded.ends_with("|END_MESSAGE"));
        assert_eq!(encoded.split('|').count(), 5);
    }

    #[test]
    fn decode_accepts_valid_frame() {
        let sent = Frame::new(PEER, MessageType::StateChange, "TRAIN_DETECTION.T100.CLEAR");
        let received = Frame::decode(&sent.encode(), PEER).unwrap();
        assert_eq!(received, sent);
    }

    #[test]
    fn decode_rejects_wrong_field_count() {
        let err = Frame::decode("INTERLOCK_01|REQUEST|POINTS.1.NORMAL|END_MESSAGE", PEER);
        assert_eq!(err, Err(ProtocolError::FieldCount { expected: 5, actual: 4 }));

        let frame = Frame::new(PEER, MessageType::Request, "POINTS.1.NORMAL");
        let err = Frame::decode(&format!("{}|EXTRA", frame.encode()), PEER);
        assert_eq!(err, Err(ProtocolError::FieldCount { expected: 5, actual: 6 }));
    }

    #[test]
    fn decode_rejects_missing_terminator() {
        let frame = Frame::new(PEER, MessageType::Request, "POINTS.1.NORMAL");
        let text = line(PEER, "REQUEST", "POINTS.1.NORMAL", &frame.hash().to_string(), "MESSAGE_END");
        assert!(matches!(Frame::decode(&text, PEER), Err(ProtocolError::MissingTerminator(_))));
    }

    #[test]
    fn decode_rejects_bad_sender_grammar() {
        for sender in ["INT", "interlock", "INTERLOCKING_NUMBER_ONE", "INTER-LOCK"] {
            let frame = Frame::new(sender, MessageType::Request, "POINTS.1.NORMAL");
            assert_eq!(
                Frame::decode(&frame.encode(), sender),
                Err(ProtocolError::InvalidSender(sender.to_string())),
                "sender {sender}"
            );
        }
    }

    #[test]
    fn decode_rejects_other_peer() {
        let frame = Frame::new("INTERLOCK_02", MessageType::Request, "POINTS.1.NORMAL");
        assert!(matches!(
            Frame::decode(&frame.encode(), PEER),
            Err(ProtocolError::UnexpectedSender { .. })
        ));
    }

    #[test]
    fn decode_rejects_unknown_type() {
        let text = line(PEER, "HAND_SHAKE", "HELLO", "0", TERMINATOR);
        assert_eq!(
            Frame::decode(&text, PEER),
            Err(ProtocolError::UnknownType("HAND_SHAKE".to_string()))
        );
    }

    #[test]
    fn decode_rejects_bad_body() {
        for body in ["ABC", "POINTS 940", "POINTS/940/NORMAL", ""] {
            let frame = Frame::new(PEER, MessageType::Request, body);
            assert_eq!(
                Frame::decode(&frame.encode(), PEER),
                Err(ProtocolError::InvalidBody(body.to_string())),
                "body {body:?}"
            );
        }
    }

    #[test]
    fn decode_rejects_non_numeric_hash() {
        let text = line(PEER, "ACK", "1234", "0x1f", TERMINATOR);
        assert_eq!(Frame::decode(&text, PEER), Err(ProtocolError::MalformedHash("0x1f".into())));
    }

    #[test]
    fn body_grammar_accepts_mixed_case_and_punctuation() {
        assert!(validate_body("Points.940-A_reverse").is_ok());
        assert!(validate_body("-123").is_ok());
    }

    fn message_type() -> impl Strategy<Value = MessageType> {
        prop::sample::select(MessageType::ALL.to_vec())
    }

    proptest! {
        #[test]
        fn encode_then_decode_preserves_type_and_body(
            ty in message_type(),
            body in "[A-Za-z0-9._-]{4,48}",
        ) {
            let frame = Frame::new(PEER, ty, body.clone());
            let decoded = Frame::decode(&frame.encode(), PEER).unwrap();
            prop_assert_eq!(decoded.message_type(), ty);
            prop_assert_eq!(decoded.body(), body.as_str());
        }

        #[test]
        fn tampered_hash_is_always_rejected(
            ty in message_type(),
            body in "[A-Za-z0-9._-]{4,48}",
            delta in any::<i32>().prop_filter("non-zero", |d| *d != 0),
        ) {
            let frame = Frame::new(PEER, ty, body.clone());
            let carried = frame.hash().wrapping_add(delta);
            let text = line(PEER, ty.as_str(), &body, &carried.to_string(), TERMINATOR);
            let is_mismatch = matches!(
                Frame::decode(&text, PEER),
                Err(ProtocolError::HashMismatch { .. })
            );
            prop_assert!(is_mismatch);
        }

        #[test]
        fn tampered_body_is_always_rejected(
            body in "[A-Za-z0-9._-]{4,48}",
            replacement in "[A-Za-z0-9._-]{4,48}",
        ) {
            prop_assume!(
                frame_hash(PEER, MessageType::Request, &body)
                    != frame_hash(PEER, MessageType::Request, &replacement)
            );
            let frame = Frame::new(PEER, MessageType::Request, body);
            let text = line(PEER, "REQUEST", &replacement, &frame.hash().to_string(), TERMINATOR);
            prop_assert!(Frame::decode(&text, PEER).is_err());
        }
    }
}
