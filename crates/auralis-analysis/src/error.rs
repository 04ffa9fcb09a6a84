//! Analysis and sidecar error types.

use std::path::PathBuf;
use thiserror::Error;

/// Errors from fingerprint extraction and sidecar handling.
#[derive(Debug, Error)]
pub enum AnalysisError {
    /// Feature extraction failed on the audio itself.
    #[error("fingerprint extraction failed: {0}")]
    ExtractionFailed(String),

    /// Extraction was cancelled through its [`CancelToken`].
    ///
    /// [`CancelToken`]: crate::CancelToken
    #[error("fingerprint extraction cancelled")]
    Cancelled,

    /// Sidecar payload does not carry exactly 25 dimensions.
    #[error("sidecar dimension mismatch: expected 25, found {0}")]
    DimensionMismatch(u32),

    /// Sidecar payload failed its CRC-32 check.
    #[error("sidecar CRC mismatch: stored {stored:#010x}, computed {computed:#010x}")]
    CrcFail {
        /// CRC stored in the file.
        stored: u32,
        /// CRC computed over the payload.
        computed: u32,
    },

    /// Sidecar magic/version word is unknown.
    #[error("sidecar version mismatch: found {0:#010x}")]
    VersionMismatch(u32),

    /// Sidecar file is truncated or oversized.
    #[error("sidecar has wrong length: {0} bytes")]
    BadLength(usize),

    /// Sidecar is older than the audio file it describes.
    #[error("sidecar is stale (older than audio file)")]
    Stale,

    /// Filesystem error reading or writing a sidecar.
    #[error("sidecar I/O error for '{path}': {source}")]
    Io {
        /// File the operation touched.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
}
