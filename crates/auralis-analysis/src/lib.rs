//! Auralis Analysis - whole-track perceptual fingerprinting.
//!
//! Produces the 25-dimensional [`Fingerprint`] that drives adaptive
//! mastering: seven spectral energy bands, loudness and dynamics,
//! rhythm, spectral shape, harmonic content, temporal variation and
//! stereo image.
//!
//! The entry point is [`FingerprintAnalyzer`]. Internally the track is
//! analyzed once into a magnitude spectrogram which the individual
//! feature extractors share; loudness is measured separately on the
//! K-weighted stereo signal. Extraction is cancellable at least once per
//! second of audio via [`CancelToken`].
//!
//! Fingerprints persist to a 120-byte `.25d` sidecar file next to the
//! audio (see [`sidecar`]), guarded by magic/version, dimension count,
//! CRC-32 and an mtime staleness check.
//!
//! [`Fingerprint`]: auralis_core::Fingerprint

pub mod analyzer;
pub mod error;
pub mod fft;
pub mod harmonic;
pub mod loudness;
pub mod rhythm;
pub mod sidecar;
pub mod spectral;
pub mod stereo_field;
pub mod variation;

pub use analyzer::{AnalyzerConfig, CancelToken, FingerprintAnalyzer};
pub use error::AnalysisError;
pub use fft::{Fft, Window};
pub use loudness::LoudnessMeasurement;
pub use sidecar::{SIDECAR_MAGIC, load_valid_sidecar, save_sidecar, sidecar_path};
