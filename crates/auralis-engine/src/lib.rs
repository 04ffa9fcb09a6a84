//! Auralis Engine - the continuous adaptive mastering pipeline.
//!
//! This crate ties the lower layers together into the playable engine:
//!
//! - [`TrackRenderer`] decodes a track, plans its chunks, renders each
//!   chunk through the DSP stage graph with preset-resolved parameters,
//!   and hands the results to the continuity controller
//! - [`ContinuityController`] crossfades adjacent rendered chunks with
//!   equal-power gains and clamps chunk-to-chunk level steps
//! - [`TaggedCache`] memoizes rendered chunks (bounded, LRU,
//!   single-flight) and backs the catalog's read caches with targeted,
//!   tag-based invalidation
//! - [`FingerprintQueue`] runs library-wide fingerprint extraction on a
//!   bounded worker pool, honoring `.25d` sidecars
//! - [`Player`] is the single source of truth for transport state; every
//!   mutation flows through its explicit transition table and observers
//!   see a versioned snapshot stream

pub mod cache;
pub mod catalog;
pub mod continuity;
pub mod error;
pub mod events;
pub mod player;
pub mod queue;
pub mod renderer;
pub mod track;

pub use cache::{CacheConfig, CacheStats, TaggedCache};
pub use catalog::{CachedCatalog, Catalog, MemoryCatalog, NewTrack};
pub use continuity::ContinuityController;
pub use error::{CacheError, CatalogError, EngineError, StateError};
pub use events::EngineEvent;
pub use player::{PlaybackState, Player, PlayerState, RepeatMode};
pub use queue::FingerprintQueue;
pub use renderer::{ChunkCache, RenderConfig, TrackRenderer, file_signature};
pub use track::{FingerprintStatus, Track, TrackId};
