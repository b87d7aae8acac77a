//! Module error types.

use std::{io, path::PathBuf};

use lineside_core::ConstructionError;
use thiserror::Error;

/// Startup data is missing or malformed. Fatal.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Configuration file could not be read.
    #[error("cannot read {path}: {source}")]
    Io {
        /// File that was being read.
        path: PathBuf,
        /// Underlying I/O error.
        source: io::Error,
    },

    /// Configuration file is not valid TOML for this schema.
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    /// No table for the requested module.
    #[error("no configuration for module '{0}'")]
    UnknownModule(String),

    /// Module identity is not five characters from `[A-Z0-9_]`.
    #[error("invalid module identity: '{0}'")]
    InvalidModuleIdentity(String),

    /// An asset record could not be turned into an asset.
    #[error("asset '{identity}': {source}")]
    InvalidAsset {
        /// Identity as written in the file.
        identity: String,
        /// Construction failure.
        source: ConstructionError,
    },

    /// Any other validation failure.
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// A peer link failed. Recovered by reconnecting.
#[derive(Debug, Error)]
pub enum LinkError {
    /// Connecting to the peer failed.
    #[error("{link} link cannot reach {address}: {source}")]
    Connect {
        /// Link name.
        link: &'static str,
        /// Peer address.
        address: String,
        /// Underlying I/O error.
        source: io::Error,
    },

    /// The peer did not accept within the connect timeout.
    #[error("{link} link timed out connecting to {address}")]
    Timeout {
        /// Link name.
        link: &'static str,
        /// Peer address.
        address: String,
    },

    /// No stream is attached to the link.
    #[error("{0} link not connected")]
    NotConnected(&'static str),

    /// Writing to the attached stream failed; the link is dropped.
    #[error("{link} link write failed: {source}")]
    Write {
        /// Link name.
        link: &'static str,
        /// Underlying I/O error.
        source: io::Error,
    },
}

/// Errors that stop the module process.
#[derive(Debug, Error)]
pub enum ModuleError {
    /// Configuration could not be loaded or applied.
    #[error(transparent)]
    Config(#[from] ConfigError),
}
