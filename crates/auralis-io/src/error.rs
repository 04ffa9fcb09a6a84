//! Decode and chunking error types.

use std::path::PathBuf;
use thiserror::Error;

/// Errors from opening and decoding audio files, and from chunk
/// planning. Per-file fatal; the caller (library scan, render job)
/// decides whether to skip the file or surface the failure.
#[derive(Debug, Error)]
pub enum DecodeError {
    /// File does not exist or is not readable.
    #[error("audio file missing: '{path}'")]
    Missing {
        /// The offending path.
        path: PathBuf,
    },

    /// Container probed fine but no decodable audio track was found, or
    /// the codec is not supported.
    #[error("unsupported audio in '{path}': {reason}")]
    Unsupported {
        /// The offending path.
        path: PathBuf,
        /// What exactly was unsupported.
        reason: String,
    },

    /// Container probing failed; the file is not a recognized format.
    #[error("unrecognized container format in '{path}': {reason}")]
    Format {
        /// The offending path.
        path: PathBuf,
        /// Probe failure detail.
        reason: String,
    },

    /// The stream decoded partially and then hit a run of corrupt
    /// frames.
    #[error("corrupt audio stream in '{path}': {reason}")]
    Corrupt {
        /// The offending path.
        path: PathBuf,
        /// Corruption detail.
        reason: String,
    },

    /// Chunk plan parameters violate `0 < overlap < chunk/2`.
    #[error("invalid chunking: chunk {chunk_seconds} s, overlap {overlap_seconds} s")]
    InvalidChunking {
        /// Requested chunk duration.
        chunk_seconds: f64,
        /// Requested overlap duration.
        overlap_seconds: f64,
    },

    /// Other filesystem errors.
    #[error("I/O error on '{path}': {source}")]
    Io {
        /// The offending path.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },
}
