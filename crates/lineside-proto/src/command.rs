//! REQUEST bodies.
//!
//! Bodies are `.`-separated segments whose first segment names the target:
//!
//! ```text
//! POINTS.<id>.<position>
//! CONTROLLED_SIGNAL.<fromPrefix>.<fromId>.<toPrefix>.<toId>.<class>[.<aspect>]
//! AUTOMATIC_SIGNAL.<prefix>.<id>.<mostRestrictive>
//! HANDSHAKE.<identity>
//! ```
//!
//! A body is parsed into a [`Command`] once, at the protocol boundary; the
//! dispatcher only ever sees the typed value.

use std::{fmt, str::FromStr};

use crate::{
    errors::{CommandError, UnknownVariant},
    types::{Aspect, MovementAuthorityClass, PointsPosition},
};

/// Reserved first segment of a handshake REQUEST.
pub const HANDSHAKE_KEYWORD: &str = "HANDSHAKE";

const POINTS: &str = "POINTS";
const CONTROLLED_SIGNAL: &str = "CONTROLLED_SIGNAL";
const AUTOMATIC_SIGNAL: &str = "AUTOMATIC_SIGNAL";

/// Exit signal of the route a controlled signal is being cleared for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteExit {
    /// Exit signal prefix.
    pub prefix: String,
    /// Exit signal id.
    pub id: String,
}

/// A validated instruction from the interlocking.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Move a set of points.
    Points {
        /// Points identity.
        id: String,
        /// Commanded position (never `UNKNOWN`).
        position: PointsPosition,
    },

    /// Set a controlled signal for a movement authority.
    ControlledSignal {
        /// Signal prefix.
        prefix: String,
        /// Signal id.
        id: String,
        /// Route exit, absent when the interlocking leaves it blank.
        route_exit: Option<RouteExit>,
        /// Authority class driving the aspect.
        authority: MovementAuthorityClass,
        /// Explicit aspect overriding the class default.
        aspect: Option<Aspect>,
    },

    /// Select the most or least restrictive aspect of an automatic signal.
    AutomaticSignal {
        /// Signal prefix.
        prefix: String,
        /// Signal id.
        id: String,
        /// `true` for the most restrictive aspect.
        most_restrictive: bool,
    },

    /// Peer announcing itself; answered with a full status snapshot.
    Handshake {
        /// Identity of the announcing peer.
        identity: String,
    },
}

impl Command {
    /// Parse a REQUEST body.
    pub fn parse(body: &str) -> Result<Self, CommandError> {
        let segments: Vec<&str> = body.split('.').collect();
        match segments.as_slice() {
            [POINTS, rest @ ..] => parse_points(rest),
            [CONTROLLED_SIGNAL, rest @ ..] => parse_controlled_signal(rest),
            [AUTOMATIC_SIGNAL, rest @ ..] => parse_automatic_signal(rest),
            [HANDSHAKE_KEYWORD, rest @ ..] => parse_handshake(rest),
            [target, ..] => Err(CommandError::UnknownTarget((*target).to_string())),
            [] => Err(CommandError::UnknownTarget(String::new())),
        }
    }

    /// Render the command as a REQUEST body.
    pub fn to_body(&self) -> String {
        self.to_string()
    }
}

impl FromStr for Command {
    type Err = CommandError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Points { id, position } => write!(f, "{POINTS}.{id}.{position}"),
            Self::ControlledSignal { prefix, id, route_exit, authority, aspect } => {
                let (to_prefix, to_id) =
                    route_exit.as_ref().map_or(("", ""), |r| (r.prefix.as_str(), r.id.as_str()));
                write!(f, "{CONTROLLED_SIGNAL}.{prefix}.{id}.{to_prefix}.{to_id}.{authority}")?;
                if let Some(aspect) = aspect {
                    write!(f, ".{aspect}")?;
                }
                Ok(())
            },
            Self::AutomaticSignal { prefix, id, most_restrictive } => {
                write!(f, "{AUTOMATIC_SIGNAL}.{prefix}.{id}.{most_restrictive}")
            },
            Self::Handshake { identity } => write!(f, "{HANDSHAKE_KEYWORD}.{identity}"),
        }
    }
}

fn required(target: &'static str, field: &'static str, value: &str) -> Result<String, CommandError> {
    if value.is_empty() {
        Err(CommandError::EmptyField { target, field })
    } else {
        Ok(value.to_string())
    }
}

fn parse_points(rest: &[&str]) -> Result<Command, CommandError> {
    let &[id, position] = rest else {
        return Err(CommandError::SegmentCount {
            target: POINTS,
            expected: "3",
            actual: rest.len() + 1,
        });
    };
    let position: PointsPosition = position.parse()?;
    if position == PointsPosition::Unknown {
        return Err(CommandError::UnknownPosition);
    }
    Ok(Command::Points { id: required(POINTS, "id", id)?, position })
}

fn parse_controlled_signal(rest: &[&str]) -> Result<Command, CommandError> {
    let (prefix, id, to_prefix, to_id, authority, aspect) = match *rest {
        [prefix, id, to_prefix, to_id, authority] => (prefix, id, to_prefix, to_id, authority, None),
        [prefix, id, to_prefix, to_id, authority, aspect] => {
            (prefix, id, to_prefix, to_id, authority, Some(aspect))
        },
        _ => {
            return Err(CommandError::SegmentCount {
                target: CONTROLLED_SIGNAL,
                expected: "6 or 7",
                actual: rest.len() + 1,
            });
        },
    };

    let route_exit = if to_prefix.is_empty() || to_id.is_empty() {
        None
    } else {
        Some(RouteExit { prefix: to_prefix.to_string(), id: to_id.to_string() })
    };

    Ok(Command::ControlledSignal {
        prefix: required(CONTROLLED_SIGNAL, "prefix", prefix)?,
        id: required(CONTROLLED_SIGNAL, "id", id)?,
        route_exit,
        authority: authority.parse()?,
        aspect: aspect.map(parse_optional_aspect).transpose()?.flatten(),
    })
}

fn parse_optional_aspect(text: &str) -> Result<Option<Aspect>, UnknownVariant> {
    if text.is_empty() || text.eq_ignore_ascii_case("NONE") || text.eq_ignore_ascii_case("NULL") {
        Ok(None)
    } else {
        text.parse().map(Some)
    }
}

fn parse_automatic_signal(rest: &[&str]) -> Result<Command, CommandError> {
    let &[prefix, id, most_restrictive] = rest else {
        return Err(CommandError::SegmentCount {
            target: AUTOMATIC_SIGNAL,
            expected: "4",
            actual: rest.len() + 1,
        });
    };
    let most_restrictive = if most_restrictive.eq_ignore_ascii_case("true") {
        true
    } else if most_restrictive.eq_ignore_ascii_case("false") {
        false
    } else {
        return Err(CommandError::InvalidValue(UnknownVariant {
            kind: "bool",
            value: most_restrictive.to_string(),
        }));
    };
    Ok(Command::AutomaticSignal {
        prefix: required(AUTOMATIC_SIGNAL, "prefix", prefix)?,
        id: required(AUTOMATIC_SIGNAL, "id", id)?,
        most_restrictive,
    })
}

fn parse_handshake(rest: &[&str]) -> Result<Command, CommandError> {
    let &[identity] = rest else {
        return Err(CommandError::SegmentCount {
            target: HANDSHAKE_KEYWORD,
            expected: "2",
            actual: rest.len() + 1,
        });
    };
    Ok(Command::Handshake { identity: required(HANDSHAKE_KEYWORD, "identity", identity)? })
}
