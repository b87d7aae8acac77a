//! Points state machine.
//!
//! A move under power is split in two so the caller owns the timer:
//! [`Points::begin_move`] puts the points mid-stroke and reports how long the
//! traversal takes; [`Points::complete_move`] lands them. At most one move is
//! in flight per set of points.

use std::time::Duration;

use lineside_proto::{PointsPosition, StatusReport, wire_enum};

use crate::{ConstructionError, error::OperationRejected, validate_identity};

/// Shortest power traversal.
pub const MIN_OPERATION_INTERVAL: Duration = Duration::from_secs(5);

/// Longest power traversal.
pub const MAX_OPERATION_INTERVAL: Duration = Duration::from_secs(60);

wire_enum! {
    /// Positions in which the points can be proven.
    pub enum DetectionPolicy {
        /// Detected in normal only.
        NormalOnly => "NORMAL_ONLY",
        /// Detected in reverse only.
        ReverseOnly => "REVERSE_ONLY",
        /// Detected in either through position.
        Both => "BOTH",
        /// Never detected.
        None => "NONE",
    }
}

impl DetectionPolicy {
    /// Whether the points are proven when lying in `position`.
    pub const fn detects(self, position: PointsPosition) -> bool {
        matches!(
            (self, position),
            (Self::NormalOnly | Self::Both, PointsPosition::Normal)
                | (Self::ReverseOnly | Self::Both, PointsPosition::Reverse)
        )
    }
}

wire_enum! {
    /// How the points are worked.
    pub enum PointsPower {
        /// Point machine moves the switch.
        Power => "POWER",
        /// Hand worked; moves are external to the simulation.
        OffPower => "OFF_POWER",
    }
}

/// Result of a move request that was not refused.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MoveOutcome {
    /// Points are travelling. Reports are the state before the move and the
    /// mid-stroke state; call [`Points::complete_move`] after `duration`.
    Started {
        /// Traversal time.
        duration: Duration,
        /// State before the move started.
        start: StatusReport,
        /// Mid-stroke state (UNKNOWN, undetected).
        mid: StatusReport,
    },

    /// No travel was simulated; detection was re-evaluated.
    Settled(StatusReport),

    /// Points are secured: movement refused and detection lost.
    Secured(StatusReport),
}

/// One set of points.
#[derive(Debug, Clone)]
pub struct Points {
    identity: String,
    position: PointsPosition,
    policy: DetectionPolicy,
    power: PointsPower,
    secured: bool,
    detected: bool,
    moving: Option<PointsPosition>,
    interval: Duration,
}

impl Points {
    /// Create points lying normal under power, detected per `policy`.
    pub fn new(identity: &str, policy: DetectionPolicy) -> Result<Self, ConstructionError> {
        let mut points = Self {
            identity: validate_identity(identity)?,
            position: PointsPosition::Normal,
            policy,
            power: PointsPower::Power,
            secured: false,
            detected: false,
            moving: None,
            interval: MIN_OPERATION_INTERVAL,
        };
        points.attempt_detection();
        Ok(points)
    }

    /// Points identity.
    pub fn identity(&self) -> &str {
        &self.identity
    }

    /// Current lie.
    pub fn position(&self) -> PointsPosition {
        self.position
    }

    /// Whether the lie is proven.
    pub fn detected(&self) -> bool {
        self.detected
    }

    /// Whether a move is in flight.
    pub fn moving(&self) -> bool {
        self.moving.is_some()
    }

    /// Whether the points are clipped or scotched.
    pub fn secured(&self) -> bool {
        self.secured
    }

    /// Power mode.
    pub fn power(&self) -> PointsPower {
        self.power
    }

    /// Detection policy.
    pub fn policy(&self) -> DetectionPolicy {
        self.policy
    }

    /// Power traversal time.
    pub fn operation_interval(&self) -> Duration {
        self.interval
    }

    /// Request a move to `to`.
    pub fn begin_move(&mut self, to: PointsPosition) -> Result<MoveOutcome, OperationRejected> {
        if self.moving.is_some() {
            return Err(OperationRejected::PointsMoving);
        }

        if self.power == PointsPower::OffPower || self.position == to {
            if self.position == to {
                self.attempt_detection();
            } else {
                self.drop_detection();
            }
            return Ok(MoveOutcome::Settled(self.status()));
        }

        if self.secured {
            self.drop_detection();
            return Ok(MoveOutcome::Secured(self.status()));
        }

        let start = self.status();
        self.moving = Some(to);
        self.drop_detection();
        self.position = PointsPosition::Unknown;
        Ok(MoveOutcome::Started { duration: self.interval, start, mid: self.status() })
    }

    /// Land an in-flight move. Returns `None` if no move was in flight.
    pub fn complete_move(&mut self) -> Option<StatusReport> {
        let to = self.moving.take()?;
        self.position = to;
        self.attempt_detection();
        Some(self.status())
    }

    /// Prove the points if the policy allows detection at the current lie.
    pub fn attempt_detection(&mut self) -> bool {
        self.detected = !self.secured && self.policy.detects(self.position);
        self.detected
    }

    /// Lose detection.
    pub fn drop_detection(&mut self) {
        self.detected = false;
    }

    /// Clip or unclip the points. Securing drops detection.
    pub fn set_secured(&mut self, secured: bool) -> Option<StatusReport> {
        if self.secured == secured {
            return None;
        }
        self.secured = secured;
        let was = self.detected;
        if secured {
            self.drop_detection();
        } else if self.moving.is_none() {
            self.attempt_detection();
        }
        (was != self.detected).then(|| self.status())
    }

    /// Switch between power and hand working.
    pub fn set_power(&mut self, power: PointsPower) {
        self.power = power;
    }

    /// Change the detection policy and re-evaluate detection.
    pub fn set_detection_policy(&mut self, policy: DetectionPolicy) -> Option<StatusReport> {
        self.policy = policy;
        if self.moving.is_some() {
            return None;
        }
        let was = self.detected;
        self.attempt_detection();
        (was != self.detected).then(|| self.status())
    }

    /// Set the power traversal time, clamped to
    /// [`MIN_OPERATION_INTERVAL`]..=[`MAX_OPERATION_INTERVAL`].
    pub fn set_operation_interval(&mut self, interval: Duration) {
        self.interval = interval.clamp(MIN_OPERATION_INTERVAL, MAX_OPERATION_INTERVAL);
    }

    /// Current state as a report.
    pub fn status(&self) -> StatusReport {
        StatusReport::Points {
            id: self.identity.clone(),
            position: self.position,
            detected: self.detected,
        }
    }
}
