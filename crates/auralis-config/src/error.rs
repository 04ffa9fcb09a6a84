//! Configuration and preset error types.

use std::path::PathBuf;
use thiserror::Error;

/// Errors from loading and validating [`EngineConfig`].
///
/// [`EngineConfig`]: crate::EngineConfig
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read the config file.
    #[error("failed to read config '{path}': {source}")]
    ReadFile {
        /// Path of the file that could not be read.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// TOML syntax error or unrecognized key.
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    /// A field value violates its documented constraint.
    #[error("invalid config: {field}: {reason}")]
    Invalid {
        /// The offending key.
        field: &'static str,
        /// Why the value is rejected.
        reason: String,
    },
}

/// Errors from the preset resolver.
#[derive(Debug, Error, PartialEq)]
pub enum PresetError {
    /// Preset name is not one of the built-ins. There is deliberately no
    /// silent fallback.
    #[error("unknown preset: '{0}'")]
    Unknown(String),

    /// Intensity is non-finite or outside [0, 1].
    #[error("intensity out of range: {0}")]
    BadIntensity(f32),
}
