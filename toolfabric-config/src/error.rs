//! Error types surfaced by the config loader and meta writer.

use thiserror::Error;

/// Errors surfaced while loading or validating the fabric's configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config file missing at {path}")]
    ConfigMissing { path: String },

    #[error("config file at {path} is malformed: {reason}")]
    ConfigMalformed { path: String, reason: String },

    #[error("server '{name}' has invalid spec: {reason}")]
    InvalidServerSpec { name: String, reason: String },
}
