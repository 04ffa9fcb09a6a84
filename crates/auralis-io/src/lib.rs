//! Auralis I/O - decoding and positional chunk extraction.
//!
//! [`decode_file`] turns an audio file into planar stereo PCM at its
//! native sample rate: WAV goes through a fast `hound` path, everything
//! else through Symphonia's probe-and-decode machinery. No resampling
//! happens here; the pipeline preserves the native rate end to end.
//!
//! [`plan_chunks`] tiles a track into contiguous [`ChunkDescriptor`]s and
//! [`ChunkReader`] extracts one chunk's samples with pre-roll context
//! (to warm stateful DSP) and an overlap tail (for the continuity
//! controller's crossfade).
//!
//! [`ChunkDescriptor`]: auralis_core::ChunkDescriptor

pub mod chunker;
pub mod decode;
pub mod error;
pub mod wav;

pub use chunker::{ChunkAudio, ChunkReader, plan_chunks};
pub use decode::{DecodedAudio, decode_file};
pub use error::DecodeError;
pub use wav::{read_wav, write_wav};
