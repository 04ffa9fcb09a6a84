//! Engine error taxonomy.
//!
//! Propagation policy: numeric and cache errors are recovered locally
//! with a warning; decode, continuity, preset and state errors surface
//! to the caller; fingerprint extraction errors never block playback
//! (the track renders with the neutral profile instead).

use thiserror::Error;

use crate::track::TrackId;

/// Top-level engine error.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Decoding or chunk extraction failed.
    #[error(transparent)]
    Decode(#[from] auralis_io::DecodeError),

    /// Preset resolution failed.
    #[error(transparent)]
    Preset(#[from] auralis_config::PresetError),

    /// Configuration was invalid.
    #[error(transparent)]
    Config(#[from] auralis_config::ConfigError),

    /// Fingerprint analysis failed.
    #[error(transparent)]
    Analysis(#[from] auralis_analysis::AnalysisError),

    /// The continuity contract was violated at render time; the render
    /// is refused rather than emitting a discontinuous stream.
    #[error("continuity violation: {0}")]
    ContinuityViolation(String),

    /// Chunk cache failure. Recoverable: the entry is dropped and the
    /// operation retried without the cache.
    #[error(transparent)]
    Cache(#[from] CacheError),

    /// Catalog failure.
    #[error(transparent)]
    Catalog(#[from] CatalogError),

    /// Player state machine rejected a transition.
    #[error(transparent)]
    State(#[from] StateError),

    /// An I/O-bound operation exceeded its deadline.
    #[error("timeout during {operation}")]
    Timeout {
        /// What was being waited for.
        operation: &'static str,
    },
}

/// Rendered-chunk cache errors.
#[derive(Debug, Error)]
pub enum CacheError {
    /// Backing storage misbehaved.
    #[error("cache storage error: {0}")]
    Storage(String),

    /// A cached value failed its integrity check.
    #[error("cache corruption: {0}")]
    Corruption(String),
}

/// Catalog repository errors.
#[derive(Debug, Error)]
pub enum CatalogError {
    /// No track with that id.
    #[error("track not found: {0:?}")]
    NotFound(TrackId),

    /// A uniqueness or concurrency conflict (e.g. duplicate path).
    #[error("catalog conflict: {0}")]
    Conflict(String),

    /// Underlying storage failure.
    #[error("catalog storage error: {0}")]
    Storage(String),
}

/// Player state machine errors. The previous state is always preserved
/// when a transition is rejected.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum StateError {
    /// The requested action is not legal in the current state.
    #[error("illegal transition: {action} while {from}")]
    IllegalTransition {
        /// State the machine was in.
        from: &'static str,
        /// Action that was rejected.
        action: &'static str,
    },

    /// Queue manipulation referenced an index or permutation that does
    /// not match the queue.
    #[error("invalid queue operation: {0}")]
    InvalidQueueOp(String),
}
