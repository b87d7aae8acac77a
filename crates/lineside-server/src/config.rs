//! Module configuration.
//!
//! One TOML file describes every module on the railway. A module loads its
//! own `[modules.<IDENTITY>]` table plus the shared data logger address and
//! tuning tables:
//!
//! ```toml
//! [data_logger]
//! host = "logger"
//! port = 9000
//!
//! [modules.MOD01.interlocking]
//! identity = "INTERLOCK_01"
//! host = "interlocking"
//! port = 9100
//!
//! [[modules.MOD01.points]]
//! id = "940"
//! detection = "BOTH"
//!
//! [[modules.MOD01.controlled_signals]]
//! prefix = "CE"
//! id = "110"
//! type = "COLOUR_LIGHT_4"
//! ```

use std::{
    collections::BTreeMap,
    fmt,
    path::{Path, PathBuf},
    str::FromStr,
    time::Duration,
};

use lineside_core::{
    AssetRegistry, AutomaticSignal, ConstructionError, ControlledSignal, DetectionPolicy,
    DetectionTechnology, Environment, Points, PointsPower, SignalIdentity, SignalType,
    TrainDetectionSection,
};
use lineside_proto::{StatusReport, validate_sender};
use serde::Deserialize;
use tokio::sync::mpsc;

use crate::error::ConfigError;

const MODULE_IDENTITY_LEN: usize = 5;

/// Identity of this module, used as the protocol sender.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ModuleIdentity(String);

impl ModuleIdentity {
    /// Identity text.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for ModuleIdentity {
    type Err = ConfigError;

    /// Exactly five characters from `[A-Z0-9_]`, case-folded.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let identity = s.to_ascii_uppercase();
        let well_formed = identity.len() == MODULE_IDENTITY_LEN
            && identity.bytes().all(|b| b.is_ascii_uppercase() || b.is_ascii_digit() || b == b'_');
        if well_formed {
            Ok(Self(identity))
        } else {
            Err(ConfigError::InvalidModuleIdentity(s.to_string()))
        }
    }
}

impl fmt::Display for ModuleIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Supplies the configuration of one module.
pub trait ConfigSource {
    /// Load and validate the configuration of `module`.
    fn load(&self, module: &ModuleIdentity) -> Result<ModuleConfig, ConfigError>;
}

/// [`ConfigSource`] backed by a TOML file.
#[derive(Debug, Clone)]
pub struct TomlConfigSource {
    path: PathBuf,
}

impl TomlConfigSource {
    /// Read from `path` on every load.
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self { path: path.as_ref().to_path_buf() }
    }
}

impl ConfigSource for TomlConfigSource {
    fn load(&self, module: &ModuleIdentity) -> Result<ModuleConfig, ConfigError> {
        let content = std::fs::read_to_string(&self.path)
            .map_err(|source| ConfigError::Io { path: self.path.clone(), source })?;
        ModuleConfig::from_toml(&content, module)
    }
}

/// Host and port of a peer.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PeerAddress {
    /// Host name or address.
    pub host: String,
    /// TCP port.
    pub port: u16,
}

impl PeerAddress {
    /// `host:port`.
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// The interlocking this module answers to.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct InterlockingPeer {
    /// Protocol identity the interlocking sends as.
    pub identity: String,
    /// Host name or address.
    pub host: String,
    /// TCP port.
    pub port: u16,
}

impl InterlockingPeer {
    /// Where to reach it.
    pub fn address(&self) -> PeerAddress {
        PeerAddress { host: self.host.clone(), port: self.port }
    }
}

/// Reconnect behavior shared by both links.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct LinkSettings {
    /// Consecutive failed attempts before a link is given up.
    pub max_attempts: u32,
    /// Pause between attempts (milliseconds).
    pub retry_delay_ms: u64,
    /// Limit on a single connect (milliseconds).
    pub connect_timeout_ms: u64,
}

impl Default for LinkSettings {
    fn default() -> Self {
        Self { max_attempts: 5, retry_delay_ms: 3_000, connect_timeout_ms: 10_000 }
    }
}

impl LinkSettings {
    /// Pause between attempts.
    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    /// Limit on a single connect.
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }
}

/// Retransmission policy for unacknowledged messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ExchangeSettings {
    /// Wait for an ACK before retransmitting (milliseconds).
    pub ack_timeout_ms: u64,
    /// Transmissions after which an unacknowledged message is discarded.
    pub max_transmissions: u32,
}

impl Default for ExchangeSettings {
    fn default() -> Self {
        Self { ack_timeout_ms: 5_000, max_transmissions: 5 }
    }
}

impl ExchangeSettings {
    /// Wait for an ACK before retransmitting.
    pub fn ack_timeout(&self) -> Duration {
        Duration::from_millis(self.ack_timeout_ms)
    }
}

/// A set of points.
#[derive(Debug, Clone, Deserialize)]
pub struct PointsRecord {
    /// Points identity.
    pub id: String,
    /// Positions in which the points are proven.
    #[serde(default = "default_detection")]
    pub detection: DetectionPolicy,
    /// Power or hand working.
    #[serde(default = "default_power")]
    pub power: PointsPower,
    /// Traversal time in seconds, clamped to 5..=60.
    #[serde(default)]
    pub power_operation_secs: Option<u64>,
}

fn default_detection() -> DetectionPolicy {
    DetectionPolicy::Both
}

fn default_power() -> PointsPower {
    PointsPower::Power
}

/// A controlled signal.
#[derive(Debug, Clone, Deserialize)]
pub struct SignalRecord {
    /// Signal prefix.
    pub prefix: String,
    /// Signal id.
    pub id: String,
    /// Signal head.
    #[serde(rename = "type")]
    pub signal_type: SignalType,
}

/// An automatic or repeater signal.
#[derive(Debug, Clone, Deserialize)]
pub struct AutomaticSignalRecord {
    /// Signal prefix.
    pub prefix: String,
    /// Signal id.
    pub id: String,
    /// Signal head.
    #[serde(rename = "type")]
    pub signal_type: SignalType,
    /// Signal whose aspect this one repeats.
    #[serde(default)]
    pub repeats: Option<String>,
}

/// A train detection section.
#[derive(Debug, Clone, Deserialize)]
pub struct SectionRecord {
    /// Section identity.
    pub id: String,
    /// Detection technology.
    pub technology: DetectionTechnology,
}

#[derive(Debug, Deserialize)]
struct ConfigFile {
    data_logger: PeerAddress,
    #[serde(default)]
    links: LinkSettings,
    #[serde(default)]
    exchange: ExchangeSettings,
    #[serde(default)]
    modules: BTreeMap<String, ModuleRecord>,
}

#[derive(Debug, Deserialize)]
struct ModuleRecord {
    interlocking: InterlockingPeer,
    #[serde(default)]
    points: Vec<PointsRecord>,
    #[serde(default)]
    controlled_signals: Vec<SignalRecord>,
    #[serde(default)]
    automatic_signals: Vec<AutomaticSignalRecord>,
    #[serde(default)]
    train_detection: Vec<SectionRecord>,
}

/// Everything one module needs to start.
#[derive(Debug, Clone)]
pub struct ModuleConfig {
    /// This module.
    pub identity: ModuleIdentity,
    /// Control link peer.
    pub interlocking: InterlockingPeer,
    /// Telemetry link peer.
    pub data_logger: PeerAddress,
    /// Reconnect behavior.
    pub links: LinkSettings,
    /// Retransmission policy.
    pub exchange: ExchangeSettings,
    /// Points.
    pub points: Vec<PointsRecord>,
    /// Controlled signals.
    pub controlled_signals: Vec<SignalRecord>,
    /// Automatic and repeater signals.
    pub automatic_signals: Vec<AutomaticSignalRecord>,
    /// Train detection sections.
    pub train_detection: Vec<SectionRecord>,
}

impl ModuleConfig {
    /// Parse a configuration file and extract `module`.
    pub fn from_toml(content: &str, module: &ModuleIdentity) -> Result<Self, ConfigError> {
        let mut file: ConfigFile = toml::from_str(content)?;
        let record = file
            .modules
            .remove(module.as_str())
            .ok_or_else(|| ConfigError::UnknownModule(module.to_string()))?;

        let config = Self {
            identity: module.clone(),
            interlocking: record.interlocking,
            data_logger: file.data_logger,
            links: file.links,
            exchange: file.exchange,
            points: record.points,
            controlled_signals: record.controlled_signals,
            automatic_signals: record.automatic_signals,
            train_detection: record.train_detection,
        };
        config.validate()?;
        Ok(config)
    }

    /// Check everything that can be checked without building assets.
    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_sender(&self.interlocking.identity).map_err(|_| {
            ConfigError::Invalid(format!(
                "interlocking identity '{}' is not a valid sender",
                self.interlocking.identity
            ))
        })?;
        if self.interlocking.identity == self.identity.as_str() {
            return Err(ConfigError::Invalid(
                "interlocking identity equals the module identity".into(),
            ));
        }

        for (name, peer) in
            [("interlocking", &self.interlocking.address()), ("data logger", &self.data_logger)]
        {
            if peer.host.is_empty() || peer.port == 0 {
                return Err(ConfigError::Invalid(format!(
                    "{name} address '{}' is incomplete",
                    peer.address()
                )));
            }
        }

        if self.links.max_attempts == 0 {
            return Err(ConfigError::Invalid("links.max_attempts must be at least 1".into()));
        }
        if self.exchange.max_transmissions == 0 || self.exchange.ack_timeout_ms == 0 {
            return Err(ConfigError::Invalid(
                "exchange.max_transmissions and exchange.ack_timeout_ms must be positive".into(),
            ));
        }

        if self.asset_count() == 0 {
            return Err(ConfigError::Invalid(format!("module {} has no assets", self.identity)));
        }
        Ok(())
    }

    /// Number of asset records.
    pub fn asset_count(&self) -> usize {
        self.points.len()
            + self.controlled_signals.len()
            + self.automatic_signals.len()
            + self.train_detection.len()
    }

    /// Instantiate every asset record into a registry reporting on `reports`.
    pub fn build_registry<E: Environment>(
        &self,
        env: E,
        reports: mpsc::UnboundedSender<StatusReport>,
    ) -> Result<AssetRegistry<E>, ConfigError> {
        let mut registry = AssetRegistry::new(env, reports);

        for record in &self.points {
            let invalid = invalid_asset(&record.id);
            let mut points = Points::new(&record.id, record.detection).map_err(&invalid)?;
            points.set_power(record.power);
            if let Some(secs) = record.power_operation_secs {
                points.set_operation_interval(Duration::from_secs(secs));
            }
            registry.add_points(points).map_err(&invalid)?;
        }

        for record in &self.controlled_signals {
            let key = format!("{}{}", record.prefix, record.id);
            let invalid = invalid_asset(&key);
            let identity = SignalIdentity::new(&record.prefix, &record.id).map_err(&invalid)?;
            let signal = ControlledSignal::new(identity, record.signal_type).map_err(&invalid)?;
            registry.add_controlled_signal(signal).map_err(&invalid)?;
        }

        for record in &self.automatic_signals {
            let key = format!("{}{}", record.prefix, record.id);
            let invalid = invalid_asset(&key);
            let identity = SignalIdentity::new(&record.prefix, &record.id).map_err(&invalid)?;
            let signal =
                AutomaticSignal::new(identity, record.signal_type, record.repeats.clone())
                    .map_err(&invalid)?;
            registry.add_automatic_signal(signal).map_err(&invalid)?;
        }

        for record in &self.train_detection {
            let invalid = invalid_asset(&record.id);
            let section =
                TrainDetectionSection::new(&record.id, record.technology).map_err(&invalid)?;
            registry.add_section(section).map_err(&invalid)?;
        }

        tracing::info!(module = %self.identity, assets = registry.len(), "assets configured");
        Ok(registry)
    }
}

fn invalid_asset(identity: &str) -> impl Fn(ConstructionError) -> ConfigError + '_ {
    move |source| ConfigError::InvalidAsset { identity: identity.to_string(), source }
}
