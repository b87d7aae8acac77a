//! Signal state machines.
//!
//! A signal displays one aspect from the fixed list of its [`SignalType`].
//! Each requestable aspect has its own lamp; a blown lamp degrades what is
//! actually displayed:
//!
//! ```text
//! request DOUBLE_YELLOW, DY lamp blown        -> SINGLE_YELLOW
//! request DOUBLE_YELLOW, SY lamp blown        -> TOP_YELLOW
//! request anything else, its own lamp blown   -> BLACK
//! ```
//!
//! Degradation is recomputed whenever a lamp changes, so restoring a lamp
//! raises the display back to the aspect last asked for.

use std::fmt;

use lineside_proto::{Aspect, MovementAuthorityClass, RouteExit, StatusReport, wire_enum};

use crate::error::{ConstructionError, OperationRejected};

use Aspect::{
    Black, Caution, Clear, DoubleYellow, FlashingWhite, Green, Red, SingleYellow, SubOff, TopYellow,
    Yellow,
};

wire_enum! {
    /// Physical signal head, fixing the aspects it can show.
    pub enum SignalType {
        /// Position light shunt signal.
        PosLight => "POS_LIGHT",
        /// Two-aspect colour light (repeaters, distants).
        ColourLight2 => "COLOUR_LIGHT_2",
        /// Three-aspect colour light.
        ColourLight3 => "COLOUR_LIGHT_3",
        /// Four-aspect colour light.
        ColourLight4 => "COLOUR_LIGHT_4",
        /// Three-aspect colour light with a position light subsidiary.
        ColourLight3Ca => "COLOUR_LIGHT_3_CA",
        /// Four-aspect colour light with a position light subsidiary.
        ColourLight4Ca => "COLOUR_LIGHT_4_CA",
        /// Permanently at danger (buffer stops, ends of lines).
        FixedRed => "FIXED_RED",
        /// Banner repeater.
        BannerRepeater => "BANNER_REPEATER",
    }
}

impl SignalType {
    /// Applicable aspects, most restrictive first, derived aspects last.
    pub const fn aspects(self) -> &'static [Aspect] {
        match self {
            Self::PosLight => &[Red, SubOff, FlashingWhite, Black],
            Self::ColourLight2 => &[Yellow, Green, Black],
            Self::ColourLight3 => &[Red, Yellow, Green, Black],
            Self::ColourLight4 => &[Red, SingleYellow, DoubleYellow, Green, TopYellow, Black],
            Self::ColourLight3Ca => &[SubOff, Red, Yellow, Green, FlashingWhite, Black],
            Self::ColourLight4Ca => {
                &[SubOff, Red, SingleYellow, DoubleYellow, Green, FlashingWhite, TopYellow, Black]
            },
            Self::FixedRed => &[Red, Black],
            Self::BannerRepeater => &[Caution, Clear, Black],
        }
    }

    /// Aspects that can be requested, in list order. Lamp `i` lights
    /// `requestable()[i]`.
    pub fn requestable(self) -> &'static [Aspect] {
        let aspects = self.aspects();
        let derived = aspects.iter().rev().take_while(|a| a.is_derived()).count();
        &aspects[..aspects.len() - derived]
    }

    /// Aspect shown when the requested aspect's lamp has blown.
    pub fn terminal(self) -> Aspect {
        self.aspects().last().copied().unwrap_or(Black)
    }

    /// Whether `aspect` is one of this type's aspects.
    pub fn applies(self, aspect: Aspect) -> bool {
        self.aspects().contains(&aspect)
    }

    fn lamp_index(self, aspect: Aspect) -> Option<usize> {
        self.requestable().iter().position(|a| *a == aspect)
    }

    /// Running-line proceed aspects, least permissive first.
    fn proceed_aspects(self) -> impl DoubleEndedIterator<Item = Aspect> {
        self.requestable().iter().copied().filter(|a| !matches!(a, Red | SubOff | FlashingWhite))
    }
}

/// Filament state of one lamp.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LampStatus {
    /// Lit normally.
    Ok,
    /// Filament failed.
    Blown,
}

/// Validated signal identity.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SignalIdentity {
    prefix: String,
    id: String,
}

impl SignalIdentity {
    /// Validate and upper-case a prefix and id.
    ///
    /// The prefix is two or three letters with an optional alphanumeric
    /// suffix; the id is two to four digits with an optional `R`.
    pub fn new(prefix: &str, id: &str) -> Result<Self, ConstructionError> {
        let prefix = prefix.to_ascii_uppercase();
        let id = id.to_ascii_uppercase();
        if !valid_prefix(&prefix) {
            return Err(ConstructionError::InvalidPrefix(prefix));
        }
        if !valid_id(&id) {
            return Err(ConstructionError::InvalidId(id));
        }
        Ok(Self { prefix, id })
    }

    /// Signal prefix.
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Signal id.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Registry key: prefix and id concatenated.
    pub fn key(&self) -> String {
        format!("{}{}", self.prefix, self.id)
    }
}

impl fmt::Display for SignalIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.prefix, self.id)
    }
}

fn valid_prefix(prefix: &str) -> bool {
    let bytes = prefix.as_bytes();
    let letters = bytes.iter().take_while(|b| b.is_ascii_uppercase()).count();
    match (letters, bytes.len()) {
        (2 | 3, len) if len == letters => true,
        (2 | 3, len) if len == letters + 1 => bytes[letters].is_ascii_alphanumeric(),
        // A fourth letter is the optional suffix.
        (4, 4) => true,
        _ => false,
    }
}

fn valid_id(id: &str) -> bool {
    let digits = id.strip_suffix('R').unwrap_or(id);
    (2..=4).contains(&digits.len()) && digits.bytes().all(|b| b.is_ascii_digit())
}

/// Displayed aspect and lamps of one signal head.
#[derive(Debug, Clone)]
struct Head {
    signal_type: SignalType,
    aspect: Aspect,
    lamps: Vec<LampStatus>,
}

impl Head {
    fn new(signal_type: SignalType, aspect: Aspect) -> Self {
        Self { signal_type, aspect, lamps: vec![LampStatus::Ok; signal_type.requestable().len()] }
    }

    /// Display `requested`, degraded by lamp state. Returns whether the
    /// displayed aspect changed.
    fn request(&mut self, requested: Aspect) -> Result<bool, OperationRejected> {
        if requested.is_derived() {
            return Err(OperationRejected::DerivedAspect(requested));
        }
        let index = self.signal_type.lamp_index(requested).ok_or(
            OperationRejected::AspectNotApplicable {
                aspect: requested,
                signal_type: self.signal_type,
            },
        )?;

        let blown = |i: usize| self.lamps.get(i) == Some(&LampStatus::Blown);
        let displayed = if requested == DoubleYellow && blown(index) {
            SingleYellow
        } else if requested == DoubleYellow && index > 0 && blown(index - 1) {
            TopYellow
        } else if blown(index) {
            self.signal_type.terminal()
        } else {
            requested
        };

        let changed = displayed != self.aspect;
        self.aspect = displayed;
        Ok(changed)
    }

    fn set_lamp(
        &mut self,
        index: usize,
        status: LampStatus,
        intended: Aspect,
    ) -> Result<bool, OperationRejected> {
        let count = self.lamps.len();
        let lamp =
            self.lamps.get_mut(index).ok_or(OperationRejected::LampOutOfRange { index, count })?;
        if *lamp == status {
            return Ok(false);
        }
        *lamp = status;
        self.request(intended)
    }
}

/// Signal worked by the remote interlocking.
#[derive(Debug, Clone)]
pub struct ControlledSignal {
    identity: SignalIdentity,
    head: Head,
    requested: Aspect,
    route_exit: Option<RouteExit>,
}

impl ControlledSignal {
    /// Create a signal at danger.
    pub fn new(identity: SignalIdentity, signal_type: SignalType) -> Result<Self, ConstructionError> {
        if !signal_type.applies(Red) {
            return Err(ConstructionError::UnsupportedType(signal_type));
        }
        Ok(Self { identity, head: Head::new(signal_type, Red), requested: Red, route_exit: None })
    }

    /// Signal identity.
    pub fn identity(&self) -> &SignalIdentity {
        &self.identity
    }

    /// Signal type.
    pub fn signal_type(&self) -> SignalType {
        self.head.signal_type
    }

    /// Displayed aspect.
    pub fn aspect(&self) -> Aspect {
        self.head.aspect
    }

    /// Exit signal of the route currently set from this signal.
    pub fn route_exit(&self) -> Option<&RouteExit> {
        self.route_exit.as_ref()
    }

    /// Lamp states, indexed like [`SignalType::requestable`].
    pub fn lamps(&self) -> &[LampStatus] {
        &self.head.lamps
    }

    /// Attempt to display `aspect`.
    ///
    /// Returns a report when the displayed aspect changed.
    pub fn request_aspect(&mut self, aspect: Aspect) -> Result<Option<StatusReport>, OperationRejected> {
        let changed = self.head.request(aspect)?;
        self.requested = aspect;
        Ok(changed.then(|| self.status()))
    }

    /// Act on a movement authority from the interlocking.
    ///
    /// `SIGNAL_ON` forces danger whatever the lamps; every other class needs
    /// the route exit and maps to a proceed aspect, or to `aspect` when the
    /// interlocking supplied one for MAIN or WARNING.
    pub fn apply_authority(
        &mut self,
        authority: MovementAuthorityClass,
        route_exit: Option<RouteExit>,
        aspect: Option<Aspect>,
    ) -> Result<Option<StatusReport>, OperationRejected> {
        if authority == MovementAuthorityClass::SignalOn {
            return Ok(self.signal_on());
        }

        let route_exit = route_exit.ok_or(OperationRejected::MissingRouteExit(authority))?;
        let target = self.aspect_for(authority, aspect)?;
        let report = self.request_aspect(target)?;
        self.route_exit = Some(route_exit);
        Ok(report)
    }

    /// Replace the signal to danger and forget the route.
    pub fn signal_on(&mut self) -> Option<StatusReport> {
        self.route_exit = None;
        self.requested = Red;
        let changed = self.head.aspect != Red;
        self.head.aspect = Red;
        changed.then(|| self.status())
    }

    fn aspect_for(
        &self,
        authority: MovementAuthorityClass,
        explicit: Option<Aspect>,
    ) -> Result<Aspect, OperationRejected> {
        let signal_type = self.head.signal_type;
        let no_aspect = OperationRejected::NoAspectForAuthority { authority, signal_type };
        match (authority, explicit) {
            (MovementAuthorityClass::Main | MovementAuthorityClass::Warning, Some(aspect)) => {
                if signal_type.proceed_aspects().any(|a| a == aspect) {
                    Ok(aspect)
                } else {
                    Err(OperationRejected::AspectNotApplicable { aspect, signal_type })
                }
            },
            (MovementAuthorityClass::Main, None) => {
                signal_type.proceed_aspects().next_back().ok_or(no_aspect)
            },
            (MovementAuthorityClass::Warning, None) => {
                signal_type.proceed_aspects().rev().nth(1).ok_or(no_aspect)
            },
            (MovementAuthorityClass::CallingOn | MovementAuthorityClass::Shunt, _) => Ok(SubOff),
            (MovementAuthorityClass::Posa, _) => Ok(FlashingWhite),
            (MovementAuthorityClass::SignalOn, _) => Ok(Red),
        }
    }

    /// Set a lamp by index and recompute the display.
    pub fn set_lamp_status(
        &mut self,
        index: usize,
        status: LampStatus,
    ) -> Result<Option<StatusReport>, OperationRejected> {
        let changed = self.head.set_lamp(index, status, self.requested)?;
        Ok(changed.then(|| self.status()))
    }

    /// Set the lamp for `aspect` and recompute the display.
    pub fn set_lamp_status_for(
        &mut self,
        aspect: Aspect,
        status: LampStatus,
    ) -> Result<Option<StatusReport>, OperationRejected> {
        let signal_type = self.head.signal_type;
        let index = signal_type
            .lamp_index(aspect)
            .ok_or(OperationRejected::AspectNotApplicable { aspect, signal_type })?;
        self.set_lamp_status(index, status)
    }

    /// Current state as a report.
    pub fn status(&self) -> StatusReport {
        StatusReport::ControlledSignal {
            prefix: self.identity.prefix.clone(),
            id: self.identity.id.clone(),
            aspect: self.head.aspect,
        }
    }
}

/// Signal worked by train detection rather than by the interlocking.
///
/// Repeaters name the signal whose aspect they repeat.
#[derive(Debug, Clone)]
pub struct AutomaticSignal {
    identity: SignalIdentity,
    head: Head,
    requested: Aspect,
    repeats: Option<String>,
}

impl AutomaticSignal {
    /// Create a signal showing its most restrictive aspect.
    pub fn new(
        identity: SignalIdentity,
        signal_type: SignalType,
        repeats: Option<String>,
    ) -> Result<Self, ConstructionError> {
        let initial =
            signal_type.requestable().first().copied().ok_or(ConstructionError::UnsupportedType(signal_type))?;
        Ok(Self { identity, head: Head::new(signal_type, initial), requested: initial, repeats })
    }

    /// Signal identity.
    pub fn identity(&self) -> &SignalIdentity {
        &self.identity
    }

    /// Signal type.
    pub fn signal_type(&self) -> SignalType {
        self.head.signal_type
    }

    /// Displayed aspect.
    pub fn aspect(&self) -> Aspect {
        self.head.aspect
    }

    /// Identity of the repeated signal, if this is a repeater.
    pub fn repeats(&self) -> Option<&str> {
        self.repeats.as_deref()
    }

    /// Lamp states, indexed like [`SignalType::requestable`].
    pub fn lamps(&self) -> &[LampStatus] {
        &self.head.lamps
    }

    /// Attempt to display `aspect`.
    pub fn request_aspect(&mut self, aspect: Aspect) -> Result<Option<StatusReport>, OperationRejected> {
        let changed = self.head.request(aspect)?;
        self.requested = aspect;
        Ok(changed.then(|| self.status()))
    }

    /// Show the most restrictive (`true`) or least restrictive requestable
    /// aspect.
    pub fn set_display_highest_aspect(
        &mut self,
        most_restrictive: bool,
    ) -> Result<Option<StatusReport>, OperationRejected> {
        let requestable = self.head.signal_type.requestable();
        // The POSA lamp is never part of automatic working.
        let target = if most_restrictive {
            requestable.first()
        } else {
            requestable.iter().rev().find(|a| **a != FlashingWhite)
        };
        match target {
            Some(&aspect) => self.request_aspect(aspect),
            None => Ok(None),
        }
    }

    /// Set a lamp by index and recompute the display.
    pub fn set_lamp_status(
        &mut self,
        index: usize,
        status: LampStatus,
    ) -> Result<Option<StatusReport>, OperationRejected> {
        let changed = self.head.set_lamp(index, status, self.requested)?;
        Ok(changed.then(|| self.status()))
    }

    /// Set the lamp for `aspect` and recompute the display.
    pub fn set_lamp_status_for(
        &mut self,
        aspect: Aspect,
        status: LampStatus,
    ) -> Result<Option<StatusReport>, OperationRejected> {
        let signal_type = self.head.signal_type;
        let index = signal_type
            .lamp_index(aspect)
            .ok_or(OperationRejected::AspectNotApplicable { aspect, signal_type })?;
        self.set_lamp_status(index, status)
    }

    /// Current state as a report.
    pub fn status(&self) -> StatusReport {
        StatusReport::AutomaticSignal {
            prefix: self.identity.prefix.clone(),
            id: self.identity.id.clone(),
            aspect: self.head.aspect,
        }
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    fn ident() -> SignalIdentity {
        SignalIdentity::new("ce", "110").unwrap()
    }

    fn exit() -> Option<RouteExit> {
        Some(RouteExit { prefix: "CE".into(), id: "112".into() })
    }

    #[test]
    fn identity_grammar() {
        for (prefix, id) in [("CE", "10"), ("ABC", "1234"), ("ABC1", "12R"), ("abcd", "0001")] {
            assert!(SignalIdentity::new(prefix, id).is_ok(), "{prefix}{id}");
        }
        assert_eq!(
            SignalIdentity::new("C", "10"),
            Err(ConstructionError::InvalidPrefix("C".into()))
        );
        assert!(SignalIdentity::new("ABCDE", "10").is_err());
        assert!(SignalIdentity::new("1B", "10").is_err());
        assert_eq!(SignalIdentity::new("CE", "1"), Err(ConstructionError::InvalidId("1".into())));
        assert!(SignalIdentity::new("CE", "12345").is_err());
        assert!(SignalIdentity::new("CE", "12RR").is_err());
    }

    #[test]
    fn identity_is_upper_cased() {
        let identity = SignalIdentity::new("ce", "12r").unwrap();
        assert_eq!(identity.key(), "CE12R");
    }

    #[test]
    fn lamps_exclude_derived_aspects() {
        assert_eq!(SignalType::ColourLight4.requestable(), &[Red, SingleYellow, DoubleYellow, Green]);
        assert_eq!(SignalType::PosLight.requestable(), &[Red, SubOff, FlashingWhite]);
        assert_eq!(
            SignalType::ColourLight4Ca.requestable(),
            &[SubOff, Red, SingleYellow, DoubleYellow, Green, FlashingWhite]
        );
        for ty in SignalType::ALL {
            assert_eq!(ty.terminal(), Black);
        }
    }

    #[test]
    fn controlled_signal_starts_at_danger() {
        let signal = ControlledSignal::new(ident(), SignalType::ColourLight4Ca).unwrap();
        assert_eq!(signal.aspect(), Red);
        assert_eq!(signal.lamps().len(), 5);
    }

    #[test]
    fn controlled_signal_needs_a_red_aspect() {
        assert_eq!(
            ControlledSignal::new(ident(), SignalType::BannerRepeater).unwrap_err(),
            ConstructionError::UnsupportedType(SignalType::BannerRepeater)
        );
    }

    #[test]
    fn derived_aspects_cannot_be_requested() {
        let mut signal = ControlledSignal::new(ident(), SignalType::ColourLight4).unwrap();
        assert_eq!(signal.request_aspect(Black), Err(OperationRejected::DerivedAspect(Black)));
        assert_eq!(
            signal.request_aspect(TopYellow),
            Err(OperationRejected::DerivedAspect(TopYellow))
        );
        assert_eq!(signal.aspect(), Red);
    }

    #[test]
    fn blown_double_yellow_lamp_shows_single_yellow() {
        let mut signal = ControlledSignal::new(ident(), SignalType::ColourLight4).unwrap();
        signal.set_lamp_status_for(DoubleYellow, LampStatus::Blown).unwrap();
        signal.request_aspect(DoubleYellow).unwrap();
        assert_eq!(signal.aspect(), SingleYellow);
    }

    #[test]
    fn blown_single_yellow_lamp_shows_top_yellow() {
        let mut signal = ControlledSignal::new(ident(), SignalType::ColourLight4).unwrap();
        signal.set_lamp_status_for(SingleYellow, LampStatus::Blown).unwrap();
        signal.request_aspect(DoubleYellow).unwrap();
        assert_eq!(signal.aspect(), TopYellow);
    }

    #[test]
    fn lamp_change_recomputes_display() {
        let mut signal = ControlledSignal::new(ident(), SignalType::ColourLight3).unwrap();
        signal.request_aspect(Green).unwrap();

        let report = signal.set_lamp_status(2, LampStatus::Blown).unwrap();
        assert_eq!(
            report,
            Some(StatusReport::ControlledSignal {
                prefix: "CE".into(),
                id: "110".into(),
                aspect: Black
            })
        );

        signal.set_lamp_status(2, LampStatus::Ok).unwrap();
        assert_eq!(signal.aspect(), Green);

        // Unchanged status is a no-op.
        assert_eq!(signal.set_lamp_status(2, LampStatus::Ok), Ok(None));
    }

    #[test]
    fn lamp_index_out_of_range() {
        let mut signal = ControlledSignal::new(ident(), SignalType::FixedRed).unwrap();
        assert_eq!(
            signal.set_lamp_status(1, LampStatus::Blown),
            Err(OperationRejected::LampOutOfRange { index: 1, count: 1 })
        );
    }

    #[test]
    fn signal_on_forces_red_over_blown_lamp() {
        let mut signal = ControlledSignal::new(ident(), SignalType::ColourLight3).unwrap();
        signal.set_lamp_status_for(Red, LampStatus::Blown).unwrap();
        signal.apply_authority(MovementAuthorityClass::Main, exit(), None).unwrap();
        assert_eq!(signal.aspect(), Green);

        signal.apply_authority(MovementAuthorityClass::SignalOn, None, None).unwrap();
        assert_eq!(signal.aspect(), Red);
        assert_eq!(signal.route_exit(), None);
    }

    #[test]
    fn main_and_warning_pick_top_two_proceed_aspects() {
        let mut signal = ControlledSignal::new(ident(), SignalType::ColourLight4).unwrap();
        signal.apply_authority(MovementAuthorityClass::Main, exit(), None).unwrap();
        assert_eq!(signal.aspect(), Green);
        assert_eq!(signal.route_exit(), exit().as_ref());

        signal.apply_authority(MovementAuthorityClass::Warning, exit(), None).unwrap();
        assert_eq!(signal.aspect(), DoubleYellow);

        let mut three = ControlledSignal::new(ident(), SignalType::ColourLight3Ca).unwrap();
        three.apply_authority(MovementAuthorityClass::Warning, exit(), None).unwrap();
        assert_eq!(three.aspect(), Yellow);
    }

    #[test]
    fn explicit_aspect_overrides_class_default() {
        let mut signal = ControlledSignal::new(ident(), SignalType::ColourLight4).unwrap();
        signal
            .apply_authority(MovementAuthorityClass::Warning, exit(), Some(SingleYellow))
            .unwrap();
        assert_eq!(signal.aspect(), SingleYellow);
    }

    #[test]
    fn proceed_authority_needs_route_exit() {
        let mut signal = ControlledSignal::new(ident(), SignalType::ColourLight4).unwrap();
        assert_eq!(
            signal.apply_authority(MovementAuthorityClass::Main, None, None),
            Err(OperationRejected::MissingRouteExit(MovementAuthorityClass::Main))
        );
        assert_eq!(signal.aspect(), Red);
    }

    #[test]
    fn subsidiary_authorities_show_sub_off() {
        let mut signal = ControlledSignal::new(ident(), SignalType::ColourLight4Ca).unwrap();
        signal.apply_authority(MovementAuthorityClass::CallingOn, exit(), None).unwrap();
        assert_eq!(signal.aspect(), SubOff);

        let mut plain = ControlledSignal::new(ident(), SignalType::ColourLight4).unwrap();
        assert!(matches!(
            plain.apply_authority(MovementAuthorityClass::Shunt, exit(), None),
            Err(OperationRejected::AspectNotApplicable { aspect: SubOff, .. })
        ));
    }

    #[test]
    fn posa_shows_flashing_white() {
        let mut signal = ControlledSignal::new(ident(), SignalType::ColourLight4Ca).unwrap();
        signal.apply_authority(MovementAuthorityClass::Posa, exit(), None).unwrap();
        assert_eq!(signal.aspect(), FlashingWhite);
        assert_eq!(signal.route_exit(), exit().as_ref());

        signal.set_lamp_status_for(FlashingWhite, LampStatus::Blown).unwrap();
        assert_eq!(signal.aspect(), Black);

        let mut plain = ControlledSignal::new(ident(), SignalType::ColourLight4).unwrap();
        assert!(matches!(
            plain.apply_authority(MovementAuthorityClass::Posa, exit(), None),
            Err(OperationRejected::AspectNotApplicable { aspect: FlashingWhite, .. })
        ));
        assert_eq!(plain.aspect(), Red);
        assert!(plain.route_exit().is_none());
    }

    #[test]
    fn explicit_aspect_must_be_a_proceed_aspect() {
        let mut signal = ControlledSignal::new(ident(), SignalType::ColourLight4Ca).unwrap();
        for aspect in [Red, SubOff, FlashingWhite, TopYellow, Yellow] {
            assert!(matches!(
                signal.apply_authority(MovementAuthorityClass::Main, exit(), Some(aspect)),
                Err(OperationRejected::AspectNotApplicable { .. })
            ));
        }
        assert_eq!(signal.aspect(), Red);
        assert!(signal.route_exit().is_none());
    }

    #[test]
    fn automatic_signal_never_clears_to_flashing_white() {
        let mut signal = AutomaticSignal::new(ident(), SignalType::ColourLight3Ca, None).unwrap();
        signal.set_display_highest_aspect(false).unwrap();
        assert_eq!(signal.aspect(), Green);
    }

    #[test]
    fn position_light_has_no_main_aspect() {
        let mut signal = ControlledSignal::new(ident(), SignalType::PosLight).unwrap();
        assert!(matches!(
            signal.apply_authority(MovementAuthorityClass::Main, exit(), None),
            Err(OperationRejected::NoAspectForAuthority { .. })
        ));
    }

    #[test]
    fn automatic_signal_toggles_between_extremes() {
        let mut signal =
            AutomaticSignal::new(ident(), SignalType::BannerRepeater, Some("CE110".into())).unwrap();
        assert_eq!(signal.aspect(), Caution);

        let report = signal.set_display_highest_aspect(false).unwrap();
        assert_eq!(
            report,
            Some(StatusReport::AutomaticSignal {
                prefix: "CE".into(),
                id: "110".into(),
                aspect: Clear
            })
        );
        assert_eq!(signal.set_display_highest_aspect(false), Ok(None));
        signal.set_display_highest_aspect(true).unwrap();
        assert_eq!(signal.aspect(), Caution);
    }

    #[test]
    fn automatic_signal_lamp_failure() {
        let mut signal = AutomaticSignal::new(ident(), SignalType::ColourLight2, None).unwrap();
        signal.set_display_highest_aspect(false).unwrap();
        signal.set_lamp_status_for(Green, LampStatus::Blown).unwrap();
        assert_eq!(signal.aspect(), Black);
        signal.set_lamp_status_for(Green, LampStatus::Ok).unwrap();
        assert_eq!(signal.aspect(), Green);
    }

    fn requestable_pair() -> impl Strategy<Value = (SignalType, Aspect)> {
        prop::sample::select(SignalType::ALL.to_vec()).prop_flat_map(|ty| {
            (Just(ty), prop::sample::select(ty.requestable().to_vec()))
        })
    }

    proptest! {
        #[test]
        fn healthy_lamps_show_what_is_requested((ty, aspect) in requestable_pair()) {
            let mut signal = AutomaticSignal::new(ident(), ty, None).unwrap();
            signal.request_aspect(aspect).unwrap();
            prop_assert_eq!(signal.aspect(), aspect);
        }

        #[test]
        fn blown_lamp_degrades_and_restores((ty, aspect) in requestable_pair()) {
            prop_assume!(aspect != DoubleYellow);
            let mut signal = AutomaticSignal::new(ident(), ty, None).unwrap();

            signal.set_lamp_status_for(aspect, LampStatus::Blown).unwrap();
            signal.request_aspect(aspect).unwrap();
            prop_assert_eq!(signal.aspect(), ty.terminal());

            signal.set_lamp_status_for(aspect, LampStatus::Ok).unwrap();
            signal.request_aspect(aspect).unwrap();
            prop_assert_eq!(signal.aspect(), aspect);
        }

        #[test]
        fn displayed_aspect_always_belongs_to_type(
            (ty, aspect) in requestable_pair(),
            lamps in prop::collection::vec((0usize..8, any::<bool>()), 0..12),
        ) {
            let mut signal = AutomaticSignal::new(ident(), ty, None).unwrap();
            signal.request_aspect(aspect).unwrap();
            for (index, blown) in lamps {
                let status = if blown { LampStatus::Blown } else { LampStatus::Ok };
                let _ = signal.set_lamp_status(index, status);
                prop_assert!(ty.applies(signal.aspect()));
            }
        }
    }
}
