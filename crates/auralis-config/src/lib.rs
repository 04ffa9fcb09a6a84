//! Auralis Config - engine configuration and preset resolution.
//!
//! Two concerns live here:
//!
//! - [`EngineConfig`]: the recognized configuration surface, loaded from
//!   TOML. Unknown keys are load errors, and `validate` enforces every
//!   cross-field constraint - most importantly the chunking invariant
//!   `0 < overlap_seconds < chunk_seconds / 2` that the legacy system
//!   famously got wrong.
//! - [`PresetResolver`]: the pure mapping
//!   `(preset name, fingerprint, intensity) -> ProcessingParameters`.
//!   Four presets are built in: `adaptive` (the one that actually reads
//!   the fingerprint), `gentle`, `warm` and `transparent`. Intensity 0
//!   always resolves to the neutral no-op parameter set.

pub mod error;
pub mod presets;
pub mod settings;

pub use error::{ConfigError, PresetError};
pub use presets::{PRESET_NAMES, PresetResolver, is_builtin_preset, resolve_preset};
pub use settings::EngineConfig;
