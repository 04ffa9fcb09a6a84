//! Events pushed to engine observers.

use auralis_core::ChunkStats;

use crate::player::PlayerState;
use crate::track::TrackId;

/// What the engine tells its observers.
///
/// Delivered over a crossbeam channel per subscriber; the state loop is
/// single-threaded, so events arrive in a total order matching the
/// version counter on [`PlayerState`].
#[derive(Debug, Clone)]
pub enum EngineEvent {
    /// The player state changed; carries the full new snapshot.
    StateChanged(PlayerState),
    /// A rendered chunk is ready for the consumer.
    ChunkReady {
        /// Chunk index within the track plan.
        index: u32,
        /// Peak/RMS/crest of the emitted audio.
        stats: ChunkStats,
        /// Whether non-finite samples had to be repaired.
        repaired: bool,
    },
    /// Playback reached the end of a track.
    TrackEnded {
        /// The finished track.
        id: TrackId,
    },
    /// A recoverable problem worth surfacing (DSP repairs, cache drops).
    Warning {
        /// Human-readable description.
        message: String,
    },
    /// A failure that stopped something.
    Error {
        /// Stable error kind tag ("decode", "preset", "state", ...).
        kind: String,
        /// Human-readable description.
        message: String,
    },
}
