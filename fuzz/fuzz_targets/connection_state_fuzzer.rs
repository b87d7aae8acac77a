//! Fuzz target for the bounded-retry [`ConnectionMachine`].
//!
//! # Strategy
//!
//! Arbitrary sequences of link outcomes, including ones the driver never
//! produces (failures while connected, losses while attempting).
//!
//! # Invariants
//!
//! - `CONNECTION_TERMINATED` is reached exactly when `max_attempts`
//!   consecutive failures have been recorded
//! - Once terminated, no new attempt begins
//! - A completed connection always clears the failure count
//! - A loss only matters while connected

#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use lineside_server::{ConnectionMachine, ConnectionState};

#[derive(Debug, Clone, Copy, Arbitrary)]
enum LinkEvent {
    BeginAttempt,
    AttemptFailed,
    Established,
    Connected,
    Lost,
}

#[derive(Debug, Arbitrary)]
struct FuzzInput {
    max_attempts: u8,
    events: Vec<LinkEvent>,
}

fuzz_target!(|input: FuzzInput| {
    let max_attempts = u32::from(input.max_attempts.max(1));
    let mut machine = ConnectionMachine::new(max_attempts);

    for event in input.events {
        let before = machine.state();
        let failures = machine.failed_attempts();

        match event {
            LinkEvent::BeginAttempt => {
                let allowed = machine.begin_attempt();
                assert_eq!(allowed, before != ConnectionState::ConnectionTerminated);
            },
            LinkEvent::AttemptFailed => {
                let after = machine.attempt_failed();
                if before == ConnectionState::ConnectionTerminated {
                    assert_eq!(after, before);
                    assert_eq!(machine.failed_attempts(), failures);
                } else {
                    assert_eq!(machine.failed_attempts(), failures + 1);
                    assert_eq!(
                        after == ConnectionState::ConnectionTerminated,
                        machine.failed_attempts() >= max_attempts
                    );
                }
            },
            LinkEvent::Established => {
                assert_eq!(machine.established(), ConnectionState::ConnectionSetup);
            },
            LinkEvent::Connected => {
                assert_eq!(machine.connected(), ConnectionState::Connected);
                assert_eq!(machine.failed_attempts(), 0);
            },
            LinkEvent::Lost => {
                let after = machine.lost();
                if before == ConnectionState::Connected {
                    assert_eq!(after, ConnectionState::AttemptingConnection);
                } else {
                    assert_eq!(after, before);
                }
            },
        }
    }
});
