//! Enumerations that appear verbatim on the wire.
//!
//! Each value has exactly one spelling (`SCREAMING_SNAKE_CASE`), shared by
//! the frame grammar, the command parser, status reports and configuration
//! files.

/// Declare a fieldless enum whose variants have a fixed wire spelling.
///
/// Generates `ALL`, `as_str`, `Display`, `FromStr` (failing with
/// [`UnknownVariant`](crate::UnknownVariant)) and serde impls using the same
/// spelling. The calling crate must depend on `serde` with `derive`.
#[macro_export]
macro_rules! wire_enum {
    (
        $(#[$meta:meta])*
        pub enum $name:ident {
            $( $(#[$vmeta:meta])* $variant:ident => $wire:literal ),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
        pub enum $name {
            $( $(#[$vmeta])* #[serde(rename = $wire)] $variant ),+
        }

        impl $name {
            /// Every value, in declaration order.
            pub const ALL: &'static [Self] = &[$(Self::$variant),+];

            /// Wire spelling.
            pub const fn as_str(self) -> &'static str {
                match self {
                    $(Self::$variant => $wire),+
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl std::str::FromStr for $name {
            type Err = $crate::UnknownVariant;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($wire => Ok(Self::$variant),)+
                    _ => Err($crate::UnknownVariant { kind: stringify!($name), value: s.to_string() }),
                }
            }
        }
    };
}

wire_enum! {
    /// Frame type.
    pub enum MessageType {
        /// Unsolicited report of an asset's new state.
        StateChange => "STATE_CHANGE",
        /// Command from the interlocking, or our handshake.
        Request => "REQUEST",
        /// Acknowledgement carrying the hash of the frame it retires.
        Ack => "ACK",
    }
}

wire_enum! {
    /// Indication displayed by a signal.
    pub enum Aspect {
        /// Danger.
        Red => "RED",
        /// Caution (three-aspect signals).
        Yellow => "YELLOW",
        /// Caution (four-aspect signals).
        SingleYellow => "SINGLE_YELLOW",
        /// Preliminary caution.
        DoubleYellow => "DOUBLE_YELLOW",
        /// Proceed.
        Green => "GREEN",
        /// Banner repeater showing the repeated signal at danger or caution.
        Caution => "CAUTION",
        /// Banner repeater showing the repeated signal off.
        Clear => "CLEAR",
        /// Subsidiary (position light) proceed.
        SubOff => "SUB_OFF",
        /// Degraded-mode proceed indicator.
        FlashingWhite => "FLASHING_WHITE",
        /// Derived: double yellow with the lower lamp blown.
        TopYellow => "TOP_YELLOW",
        /// Derived: the lamp for the requested aspect has blown.
        Black => "BLACK",
    }
}

impl Aspect {
    /// Aspects that only ever arise as the effect of lamp failures.
    pub const fn is_derived(self) -> bool {
        matches!(self, Self::Black | Self::TopYellow)
    }
}

wire_enum! {
    /// Lie of a set of points.
    pub enum PointsPosition {
        /// Normal through position.
        Normal => "NORMAL",
        /// Reverse through position.
        Reverse => "REVERSE",
        /// Mid-stroke or faulted.
        Unknown => "UNKNOWN",
    }
}

wire_enum! {
    /// Category of permission behind a controlled-signal request.
    pub enum MovementAuthorityClass {
        /// Not an authority: replace the signal to danger.
        SignalOn => "SIGNAL_ON",
        /// Route and full overlap clear.
        Main => "MAIN",
        /// Route clear with a restricted overlap.
        Warning => "WARNING",
        /// Route occupied.
        CallingOn => "CALLING_ON",
        /// Shunting movement; route may be clear or occupied.
        Shunt => "SHUNT",
        /// Degraded working.
        Posa => "POSA",
    }
}

wire_enum! {
    /// Occupancy indication of a train detection section.
    pub enum DetectionStatus {
        /// No train indicated.
        Clear => "CLEAR",
        /// Train (or failure) indicated.
        Occupied => "OCCUPIED",
    }
}
