//! Connection state machine for one peer link.
//!
//! Pure bookkeeping: the link driver performs the I/O and reports each
//! outcome here, and publishes the resulting state.
//!
//! ```text
//! NO_CONNECTION ──► ATTEMPTING_CONNECTION ──► CONNECTION_SETUP ──► CONNECTED
//!                        ▲      │                                     │
//!                        │      │ max_attempts failures               │ I/O failure
//!                        │      ▼                                     │
//!                        │  CONNECTION_TERMINATED                     │
//!                        └────────────────────────────────────────────┘
//! ```
//!
//! The attempt counter resets only when a connection succeeds.

use lineside_proto::wire_enum;

wire_enum! {
    /// Lifecycle of a peer link.
    pub enum ConnectionState {
        /// Never attempted.
        NoConnection => "NO_CONNECTION",
        /// Waiting for a connect to succeed.
        AttemptingConnection => "ATTEMPTING_CONNECTION",
        /// Connected, handshake in progress.
        ConnectionSetup => "CONNECTION_SETUP",
        /// Handshake sent, link usable.
        Connected => "CONNECTED",
        /// Retries exhausted; the link is abandoned.
        ConnectionTerminated => "CONNECTION_TERMINATED",
    }
}

/// Bounded-retry state of one link.
#[derive(Debug, Clone)]
pub struct ConnectionMachine {
    state: ConnectionState,
    failed_attempts: u32,
    max_attempts: u32,
}

impl ConnectionMachine {
    /// Start in `NO_CONNECTION`, giving up after `max_attempts` consecutive
    /// failures.
    pub fn new(max_attempts: u32) -> Self {
        Self { state: ConnectionState::NoConnection, failed_attempts: 0, max_attempts }
    }

    /// Current state.
    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Consecutive failures since the last successful connection.
    pub fn failed_attempts(&self) -> u32 {
        self.failed_attempts
    }

    /// Whether the link has been abandoned.
    pub fn terminated(&self) -> bool {
        self.state == ConnectionState::ConnectionTerminated
    }

    /// About to try connecting. Returns `false` once terminated.
    pub fn begin_attempt(&mut self) -> bool {
        if self.terminated() {
            return false;
        }
        self.state = ConnectionState::AttemptingConnection;
        true
    }

    /// A connect or handshake failed.
    pub fn attempt_failed(&mut self) -> ConnectionState {
        if self.terminated() {
            return self.state;
        }
        self.failed_attempts = self.failed_attempts.saturating_add(1);
        self.state = if self.failed_attempts >= self.max_attempts {
            ConnectionState::ConnectionTerminated
        } else {
            ConnectionState::AttemptingConnection
        };
        self.state
    }

    /// The socket is open; the handshake is next.
    pub fn established(&mut self) -> ConnectionState {
        self.state = ConnectionState::ConnectionSetup;
        self.state
    }

    /// Handshake sent. Also accepted after termination, when a connection is
    /// forced from outside the retry loop.
    pub fn connected(&mut self) -> ConnectionState {
        self.failed_attempts = 0;
        self.state = ConnectionState::Connected;
        self.state
    }

    /// A connected link failed.
    pub fn lost(&mut self) -> ConnectionState {
        if self.state == ConnectionState::Connected {
            self.state = ConnectionState::AttemptingConnection;
        }
        self.state
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    #[test]
    fn five_failures_terminate() {
        let mut machine = ConnectionMachine::new(5);
        for attempt in 1..=4 {
            assert!(machine.begin_attempt());
            assert_eq!(machine.attempt_failed(), ConnectionState::AttemptingConnection);
            assert_eq!(machine.failed_attempts(), attempt);
        }
        assert!(machine.begin_attempt());
        assert_eq!(machine.attempt_failed(), ConnectionState::ConnectionTerminated);
        assert!(!machine.begin_attempt());
        assert_eq!(machine.state(), ConnectionState::ConnectionTerminated);
    }

    #[test]
    fn forced_connection_after_termination_resets_counter() {
        let mut machine = ConnectionMachine::new(5);
        for _ in 0..5 {
            machine.begin_attempt();
            machine.attempt_failed();
        }
        assert!(machine.terminated());

        machine.established();
        assert_eq!(machine.connected(), ConnectionState::Connected);
        assert_eq!(machine.failed_attempts(), 0);
    }

    #[test]
    fn entering_an_attempt_does_not_reset_counter() {
        let mut machine = ConnectionMachine::new(5);
        machine.begin_attempt();
        machine.attempt_failed();
        machine.begin_attempt();
        assert_eq!(machine.failed_attempts(), 1);
    }

    #[test]
    fn lost_connection_returns_to_attempting() {
        let mut machine = ConnectionMachine::new(5);
        machine.begin_attempt();
        assert_eq!(machine.established(), ConnectionState::ConnectionSetup);
        machine.connected();
        assert_eq!(machine.lost(), ConnectionState::AttemptingConnection);
        assert_eq!(machine.failed_attempts(), 0);
    }

    proptest! {
        #[test]
        fn terminates_after_exactly_max_consecutive_failures(
            max in 1u32..10,
            outcomes in prop::collection::vec(any::<bool>(), 0..40),
        ) {
            let mut machine = ConnectionMachine::new(max);
            let mut consecutive = 0;
            for succeeded in outcomes {
                if !machine.begin_attempt() {
                    prop_assert_eq!(consecutive, max);
                    break;
                }
                if succeeded {
                    machine.established();
                    machine.connected();
                    machine.lost();
                    consecutive = 0;
                } else {
                    machine.attempt_failed();
                    consecutive += 1;
                }
                prop_assert_eq!(machine.failed_attempts(), consecutive);
                prop_assert_eq!(machine.terminated(), consecutive >= max);
            }
        }
    }
}
