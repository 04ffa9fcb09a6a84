//! The recognized configuration surface.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::presets;

/// Engine configuration.
///
/// Every key is optional in the TOML file (defaults below); any key
/// *outside* this set fails the load. Always call
/// [`validate`](Self::validate) after construction - deserialization
/// alone does not check cross-field constraints.
///
/// ```toml
/// sample_rate = 48000
/// chunk_seconds = 10.0
/// overlap_seconds = 0.1
/// context_seconds = 1.0
/// cache_max_size_bytes = 268435456
/// cache_ttl_seconds = 600
/// fingerprint_workers = 4
/// fingerprint_max_retries = 0
/// level_max_change_db = 3.0
/// limiter_ceiling_dbtp = -0.3
/// default_preset = "adaptive"
/// default_intensity = 0.5
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct EngineConfig {
    /// Output sample rate used for position accounting. Input files keep
    /// their native rate internally.
    #[serde(default = "default_sample_rate")]
    pub sample_rate: u32,

    /// Chunk duration, seconds.
    #[serde(default = "default_chunk_seconds")]
    pub chunk_seconds: f64,

    /// Rendered overlap between adjacent chunks, seconds. Must satisfy
    /// `0 < overlap < chunk / 2`.
    #[serde(default = "default_overlap_seconds")]
    pub overlap_seconds: f64,

    /// Pre-roll context for stateful DSP warm-up, seconds. At most 2.0.
    #[serde(default = "default_context_seconds")]
    pub context_seconds: f64,

    /// Rendered-chunk cache size cap, bytes.
    #[serde(default = "default_cache_max_size_bytes")]
    pub cache_max_size_bytes: u64,

    /// Rendered-chunk cache entry TTL, seconds.
    #[serde(default = "default_cache_ttl_seconds")]
    pub cache_ttl_seconds: u64,

    /// Fingerprint worker pool size. 0 means `max(cpu/2, 1)`, resolved
    /// at pool start.
    #[serde(default)]
    pub fingerprint_workers: usize,

    /// Automatic retries for failed fingerprint jobs. 0 (the default)
    /// records the error and moves on.
    #[serde(default)]
    pub fingerprint_max_retries: u32,

    /// Largest RMS step the continuity controller allows between
    /// adjacent chunks, dB.
    #[serde(default = "default_level_max_change_db")]
    pub level_max_change_db: f32,

    /// True-peak limiter ceiling, dBTP.
    #[serde(default = "default_limiter_ceiling_dbtp")]
    pub limiter_ceiling_dbtp: f32,

    /// Preset applied when the player has no explicit selection.
    #[serde(default = "default_preset")]
    pub default_preset: String,

    /// Intensity applied with the default preset, in [0, 1].
    #[serde(default = "default_intensity")]
    pub default_intensity: f32,
}

fn default_sample_rate() -> u32 {
    44100
}
fn default_chunk_seconds() -> f64 {
    10.0
}
fn default_overlap_seconds() -> f64 {
    0.1
}
fn default_context_seconds() -> f64 {
    1.0
}
fn default_cache_max_size_bytes() -> u64 {
    256 * 1024 * 1024
}
fn default_cache_ttl_seconds() -> u64 {
    600
}
fn default_level_max_change_db() -> f32 {
    3.0
}
fn default_limiter_ceiling_dbtp() -> f32 {
    -0.3
}
fn default_preset() -> String {
    "adaptive".to_string()
}
fn default_intensity() -> f32 {
    0.5
}

impl Default for EngineConfig {
    fn default() -> Self {
        // An empty TOML table picks up every field default.
        toml::from_str("").expect("defaults deserialize")
    }
}

impl EngineConfig {
    /// Load a config from a TOML file, validating it.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::ReadFile {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&content)
    }

    /// Parse a config from TOML text, validating it.
    pub fn from_toml(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Check every cross-field constraint.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.sample_rate == 0 {
            return Err(invalid("sample_rate", "must be positive"));
        }
        if !(self.chunk_seconds > 0.0 && self.chunk_seconds.is_finite()) {
            return Err(invalid("chunk_seconds", "must be positive and finite"));
        }
        if !(self.overlap_seconds > 0.0 && self.overlap_seconds < self.chunk_seconds / 2.0) {
            // The legacy system shipped with overlap >= chunk/2 once.
            // Never again.
            return Err(invalid(
                "overlap_seconds",
                format!(
                    "must satisfy 0 < overlap < chunk_seconds/2 (chunk_seconds = {})",
                    self.chunk_seconds
                ),
            ));
        }
        if !(0.0..=2.0).contains(&self.context_seconds) {
            return Err(invalid("context_seconds", "must be within [0, 2]"));
        }
        if self.cache_max_size_bytes == 0 {
            return Err(invalid("cache_max_size_bytes", "must be positive"));
        }
        if !(self.level_max_change_db > 0.0 && self.level_max_change_db.is_finite()) {
            return Err(invalid("level_max_change_db", "must be positive"));
        }
        if !(-6.0..=0.0).contains(&self.limiter_ceiling_dbtp) {
            return Err(invalid("limiter_ceiling_dbtp", "must be within [-6, 0]"));
        }
        if !presets::is_builtin_preset(&self.default_preset) {
            return Err(invalid(
                "default_preset",
                format!("unknown preset '{}'", self.default_preset),
            ));
        }
        if !(0.0..=1.0).contains(&self.default_intensity) || !self.default_intensity.is_finite() {
            return Err(invalid("default_intensity", "must be within [0, 1]"));
        }
        Ok(())
    }

    /// Worker pool size with the `0 = auto` sentinel resolved.
    pub fn resolved_fingerprint_workers(&self, cpu_count: usize) -> usize {
        if self.fingerprint_workers > 0 {
            self.fingerprint_workers
        } else {
            (cpu_count / 2).max(1)
        }
    }
}

fn invalid(field: &'static str, reason: impl Into<String>) -> ConfigError {
    ConfigError::Invalid {
        field,
        reason: reason.into(),
    }
}
