//! Train detection state machine.
//!
//! A section has a true occupancy (`train_occupying`) and an indicated one
//! (`status`). Technician shunts and failure modes make the two disagree.
//! Which of these conditions may coexist is fixed by a compatibility matrix;
//! each operation checks its row as a precondition before touching any state:
//!
//! ```text
//!                        shunted  intermittent  FCWO  FOWC  MIS_COUNT  train
//! shunt on / off            -         x          x     x       x        x
//! set intermittent          x         -          x     x       x        x
//! restore intermittent      x         -          x     .       x        .
//! FAILED_CLEAR_WHEN_OCC     x         x          x     x       x        x
//! FAILED_OCC_WHEN_CLEAR     x         x          x     x       x        .
//! MIS_COUNT                 x         .          x     x       x        .
//! train occupies / clears   .         .          .     .       .        .
//!
//! x = blocked, . = allowed
//! ```

use lineside_proto::{DetectionStatus, StatusReport, wire_enum};

use crate::{ConstructionError, error::OperationRejected, validate_identity};

wire_enum! {
    /// How occupancy is sensed.
    pub enum DetectionTechnology {
        /// Counts axles in and out.
        AxleCounter => "AXLE_COUNTER",
        /// Train shunts a track-borne current.
        TrackCircuit => "TRACK_CIRCUIT",
    }
}

wire_enum! {
    /// Simulated fault mode.
    pub enum FailureStatus {
        /// Healthy.
        Normal => "NORMAL",
        /// Shows clear under a train (track circuits only).
        FailedClearWhenOccupied => "FAILED_CLEAR_WHEN_OCCUPIED",
        /// Shows occupied with no train.
        FailedOccupiedWhenClear => "FAILED_OCCUPIED_WHEN_CLEAR",
        /// Count out did not match count in (axle counters only).
        MisCount => "MIS_COUNT",
    }
}

/// Conditions that can block an operation.
#[derive(Debug, Clone, Copy, Default)]
struct Blocks {
    shunted: bool,
    intermittent: bool,
    failed_clear_when_occupied: bool,
    failed_occupied_when_clear: bool,
    mis_count: bool,
    train: bool,
}

impl Blocks {
    const ALL: Self = Self {
        shunted: true,
        intermittent: true,
        failed_clear_when_occupied: true,
        failed_occupied_when_clear: true,
        mis_count: true,
        train: true,
    };
}

const SHUNT: Blocks = Blocks { shunted: false, ..Blocks::ALL };
const SET_INTERMITTENT: Blocks = Blocks { intermittent: false, ..Blocks::ALL };
const RESTORE_INTERMITTENT: Blocks =
    Blocks { intermittent: false, failed_occupied_when_clear: false, train: false, ..Blocks::ALL };
const FAILED_CLEAR_WHEN_OCCUPIED: Blocks = Blocks::ALL;
const FAILED_OCCUPIED_WHEN_CLEAR: Blocks = Blocks { train: false, ..Blocks::ALL };
const MIS_COUNT: Blocks = Blocks { intermittent: false, train: false, ..Blocks::ALL };

/// One train detection section.
#[derive(Debug, Clone)]
pub struct TrainDetectionSection {
    identity: String,
    technology: DetectionTechnology,
    status: DetectionStatus,
    failure: FailureStatus,
    shunted: bool,
    train_occupying: bool,
    intermittent: bool,
}

impl TrainDetectionSection {
    /// Create a clear, healthy section.
    pub fn new(identity: &str, technology: DetectionTechnology) -> Result<Self, ConstructionError> {
        Ok(Self {
            identity: validate_identity(identity)?,
            technology,
            status: DetectionStatus::Clear,
            failure: FailureStatus::Normal,
            shunted: false,
            train_occupying: false,
            intermittent: false,
        })
    }

    /// Section identity.
    pub fn identity(&self) -> &str {
        &self.identity
    }

    /// Detection technology.
    pub fn technology(&self) -> DetectionTechnology {
        self.technology
    }

    /// Indicated occupancy.
    pub fn status(&self) -> DetectionStatus {
        self.status
    }

    /// Simulated fault mode.
    pub fn failure(&self) -> FailureStatus {
        self.failure
    }

    /// Whether a technician shunt is applied.
    pub fn shunted(&self) -> bool {
        self.shunted
    }

    /// Whether a train is physically in the section.
    pub fn train_occupying(&self) -> bool {
        self.train_occupying
    }

    /// Whether an intermittent failure is active.
    pub fn intermittent(&self) -> bool {
        self.intermittent
    }

    fn check(&self, operation: &'static str, blocks: Blocks) -> Result<(), OperationRejected> {
        let condition = if blocks.shunted && self.shunted {
            "section shunted"
        } else if blocks.intermittent && self.intermittent {
            "intermittent failure active"
        } else if blocks.failed_clear_when_occupied
            && self.failure == FailureStatus::FailedClearWhenOccupied
        {
            "failed clear when occupied"
        } else if blocks.failed_occupied_when_clear
            && self.failure == FailureStatus::FailedOccupiedWhenClear
        {
            "failed occupied when clear"
        } else if blocks.mis_count && self.failure == FailureStatus::MisCount {
            "mis-count"
        } else if blocks.train && self.train_occupying {
            "train occupying"
        } else {
            return Ok(());
        };
        Err(OperationRejected::Blocked { operation, condition })
    }

    fn indicate(&mut self, status: DetectionStatus) -> Option<StatusReport> {
        if self.status == status {
            return None;
        }
        self.status = status;
        Some(self.report())
    }

    /// Indication implied by true occupancy and the conditions in force.
    fn derived_status(&self) -> DetectionStatus {
        let occupied = match self.failure {
            FailureStatus::FailedOccupiedWhenClear => true,
            FailureStatus::FailedClearWhenOccupied => self.shunted,
            FailureStatus::MisCount => true,
            FailureStatus::Normal => self.train_occupying || self.shunted,
        };
        if occupied { DetectionStatus::Occupied } else { DetectionStatus::Clear }
    }

    /// Apply (`true`) or remove a technician shunt.
    pub fn tec_shunt(&mut self, on: bool) -> Result<Option<StatusReport>, OperationRejected> {
        self.check("shunt", SHUNT)?;
        match (on, self.shunted) {
            (true, true) => Err(OperationRejected::AlreadyActive("shunt")),
            (false, false) => Err(OperationRejected::NotActive("shunt")),
            (true, false) => {
                self.shunted = true;
                Ok(self.indicate(DetectionStatus::Occupied))
            },
            (false, true) => {
                self.shunted = false;
                Ok(self.indicate(DetectionStatus::Clear))
            },
        }
    }

    /// A train enters the section. Never blocked.
    pub fn train_occupies(&mut self) -> Option<StatusReport> {
        self.train_occupying = true;
        if self.failure == FailureStatus::FailedClearWhenOccupied {
            None
        } else {
            self.indicate(DetectionStatus::Occupied)
        }
    }

    /// A train leaves the section. Never blocked.
    pub fn train_clears(&mut self) -> Option<StatusReport> {
        self.train_occupying = false;
        let held = self.shunted
            || self.failure == FailureStatus::FailedOccupiedWhenClear
            || (self.technology == DetectionTechnology::AxleCounter
                && self.failure == FailureStatus::MisCount);
        if held { None } else { self.indicate(DetectionStatus::Clear) }
    }

    /// Start an intermittent failure. The caller drives
    /// [`TrainDetectionSection::intermittent_toggle`] while it is active.
    pub fn set_intermittent(&mut self) -> Result<(), OperationRejected> {
        if self.technology != DetectionTechnology::TrackCircuit {
            return Err(OperationRejected::NotTrackCircuit);
        }
        self.check("set intermittent failure", SET_INTERMITTENT)?;
        if self.intermittent {
            return Err(OperationRejected::AlreadyActive("intermittent failure"));
        }
        self.intermittent = true;
        Ok(())
    }

    /// End an intermittent failure and restore the indication.
    pub fn restore_intermittent(&mut self) -> Result<Option<StatusReport>, OperationRejected> {
        self.check("restore intermittent failure", RESTORE_INTERMITTENT)?;
        if !self.intermittent {
            return Err(OperationRejected::NotActive("intermittent failure"));
        }
        self.intermittent = false;
        Ok(self.indicate(self.derived_status()))
    }

    /// One flicker of an intermittent failure: a clear section shows
    /// occupied, an occupied one shows clear unless something really holds
    /// it occupied.
    pub fn intermittent_toggle(&mut self) -> Option<StatusReport> {
        if !self.intermittent {
            return None;
        }
        match self.status {
            DetectionStatus::Clear => self.indicate(DetectionStatus::Occupied),
            DetectionStatus::Occupied if self.derived_status() == DetectionStatus::Clear => {
                self.indicate(DetectionStatus::Clear)
            },
            DetectionStatus::Occupied => None,
        }
    }

    /// Apply or clear a failure mode.
    pub fn set_failure_status(
        &mut self,
        status: FailureStatus,
    ) -> Result<Option<StatusReport>, OperationRejected> {
        let mismatch = OperationRejected::TechnologyMismatch { status, technology: self.technology };
        match status {
            FailureStatus::Normal => {
                if self.failure == FailureStatus::Normal {
                    return Err(OperationRejected::NotActive("failure"));
                }
                self.failure = FailureStatus::Normal;
                Ok(self.indicate(self.derived_status()))
            },
            FailureStatus::FailedClearWhenOccupied => {
                if self.technology == DetectionTechnology::AxleCounter {
                    return Err(mismatch);
                }
                self.check("set failed clear when occupied", FAILED_CLEAR_WHEN_OCCUPIED)?;
                self.failure = status;
                Ok(None)
            },
            FailureStatus::FailedOccupiedWhenClear => {
                self.check("set failed occupied when clear", FAILED_OCCUPIED_WHEN_CLEAR)?;
                self.failure = status;
                Ok(self.indicate(DetectionStatus::Occupied))
            },
            FailureStatus::MisCount => {
                if self.technology == DetectionTechnology::TrackCircuit {
                    return Err(mismatch);
                }
                self.check("set mis-count", MIS_COUNT)?;
                self.failure = status;
                Ok(None)
            },
        }
    }

    /// Current state as a report.
    pub fn report(&self) -> StatusReport {
        StatusReport::TrainDetection { id: self.identity.clone(), status: self.status }
    }
}
