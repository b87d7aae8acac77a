//! STATE_CHANGE bodies.

use std::fmt;

use crate::{
    errors::{CommandError, UnknownVariant},
    types::{Aspect, DetectionStatus, PointsPosition},
};

/// Current state of one asset, as reported to the interlocking.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatusReport {
    /// `POINTS.<id>.<position>.<detected>`
    Points {
        /// Points identity.
        id: String,
        /// Current lie.
        position: PointsPosition,
        /// Whether the lie is detected.
        detected: bool,
    },

    /// `CONTROLLED_SIGNAL.<prefix>.<id>.<aspect>`
    ControlledSignal {
        /// Signal prefix.
        prefix: String,
        /// Signal id.
        id: String,
        /// Displayed aspect.
        aspect: Aspect,
    },

    /// `AUTOMATIC_SIGNAL.<prefix>.<id>.<aspect>`
    AutomaticSignal {
        /// Signal prefix.
        prefix: String,
        /// Signal id.
        id: String,
        /// Displayed aspect.
        aspect: Aspect,
    },

    /// `TRAIN_DETECTION.<id>.<status>`
    TrainDetection {
        /// Section identity.
        id: String,
        /// Reported occupancy.
        status: DetectionStatus,
    },
}

impl StatusReport {
    /// Render the report as a STATE_CHANGE body.
    pub fn to_body(&self) -> String {
        self.to_string()
    }

    /// Parse a STATE_CHANGE body.
    pub fn parse(body: &str) -> Result<Self, CommandError> {
        let segments: Vec<&str> = body.split('.').collect();
        match segments.as_slice() {
            ["POINTS", id, position, detected] => Ok(Self::Points {
                id: (*id).to_string(),
                position: position.parse()?,
                detected: parse_bool(detected)?,
            }),
            ["CONTROLLED_SIGNAL", prefix, id, aspect] => Ok(Self::ControlledSignal {
                prefix: (*prefix).to_string(),
                id: (*id).to_string(),
                aspect: aspect.parse()?,
            }),
            ["AUTOMATIC_SIGNAL", prefix, id, aspect] => Ok(Self::AutomaticSignal {
                prefix: (*prefix).to_string(),
                id: (*id).to_string(),
                aspect: aspect.parse()?,
            }),
            ["TRAIN_DETECTION", id, status] => {
                Ok(Self::TrainDetection { id: (*id).to_string(), status: status.parse()? })
            },
            [target, ..] => Err(CommandError::UnknownTarget((*target).to_string())),
            [] => Err(CommandError::UnknownTarget(String::new())),
        }
    }
}

fn parse_bool(text: &str) -> Result<bool, UnknownVariant> {
    match text {
        "true" => Ok(true),
        "false" => Ok(false),
        _ => Err(UnknownVariant { kind: "bool", value: text.to_string() }),
    }
}

impl fmt::Display for StatusReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Points { id, position, detected } => write!(f, "POINTS.{id}.{position}.{detected}"),
            Self::ControlledSignal { prefix, id, aspect } => {
                write!(f, "CONTROLLED_SIGNAL.{prefix}.{id}.{aspect}")
            },
            Self::AutomaticSignal { prefix, id, aspect } => {
                write!(f, "AUTOMATIC_SIGNAL.{prefix}.{id}.{aspect}")
            },
            Self::TrainDetection { id, status } => write!(f, "TRAIN_DETECTION.{id}.{status}"),
        }
    }
}
