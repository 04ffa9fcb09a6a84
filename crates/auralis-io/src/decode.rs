//! File decoding: WAV fast path plus Symphonia for everything else.

use std::fs::File;
use std::path::Path;

use auralis_core::StereoBuffer;
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{CODEC_TYPE_NULL, DecoderOptions};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use tracing::debug;

use crate::error::DecodeError;
use crate::wav;

/// How many consecutive corrupt packets we tolerate before declaring the
/// stream corrupt. Single bad frames are common in the wild and are
/// skipped; a run of them means the file is broken.
const MAX_CONSECUTIVE_DECODE_ERRORS: u32 = 4;

/// A fully decoded track: planar stereo PCM at the file's native rate.
#[derive(Debug, Clone)]
pub struct DecodedAudio {
    /// Planar stereo samples. Mono sources are duplicated onto both
    /// channels; the `channels` field records the source layout.
    pub samples: StereoBuffer,
    /// Native sample rate in Hz.
    pub sample_rate: u32,
    /// Source channel count, clamped to {1, 2}.
    pub channels: u16,
}

impl DecodedAudio {
    /// Total frames (samples per channel).
    pub fn total_samples(&self) -> u64 {
        self.samples.frames() as u64
    }

    /// Duration in seconds.
    pub fn duration_seconds(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.total_samples() as f64 / f64::from(self.sample_rate)
    }
}

/// Decode an audio file to PCM.
///
/// Dispatches on extension: `.wav` files go through `hound`, anything
/// else through Symphonia's probe. The native sample rate and channel
/// layout are preserved; no resampling happens here.
pub fn decode_file(path: &Path) -> Result<DecodedAudio, DecodeError> {
    if !path.exists() {
        return Err(DecodeError::Missing {
            path: path.to_path_buf(),
        });
    }
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());
    if extension.as_deref() == Some("wav") {
        return wav::read_wav(path);
    }
    decode_with_symphonia(path, extension.as_deref())
}

fn decode_with_symphonia(path: &Path, extension: Option<&str>) -> Result<DecodedAudio, DecodeError> {
    let file = File::open(path).map_err(|source| match source.kind() {
        std::io::ErrorKind::NotFound => DecodeError::Missing {
            path: path.to_path_buf(),
        },
        _ => DecodeError::Io {
            path: path.to_path_buf(),
            source,
        },
    })?;

    let mss = MediaSourceStream::new(Box::new(file), Default::default());
    let mut hint = Hint::new();
    if let Some(ext) = extension {
        hint.with_extension(ext);
    }

    let probed = symphonia::default::get_probe()
        .format(&hint, mss, &FormatOptions::default(), &MetadataOptions::default())
        .map_err(|e| DecodeError::Format {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
    let mut format = probed.format;

    let track = format
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL && t.codec_params.sample_rate.is_some())
        .cloned()
        .ok_or_else(|| DecodeError::Unsupported {
            path: path.to_path_buf(),
            reason: "no decodable audio track".into(),
        })?;

    let sample_rate = track.codec_params.sample_rate.unwrap_or(0);
    if sample_rate == 0 {
        return Err(DecodeError::Unsupported {
            path: path.to_path_buf(),
            reason: "track has no sample rate".into(),
        });
    }

    let mut decoder = symphonia::default::get_codecs()
        .make(&track.codec_params, &DecoderOptions::default())
        .map_err(|e| DecodeError::Unsupported {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

    let mut interleaved: Vec<f32> = Vec::new();
    let mut channels = 0usize;
    let mut sample_buf: Option<SampleBuffer<f32>> = None;
    let mut consecutive_errors = 0u32;

    loop {
        let packet = match format.next_packet() {
            Ok(p) => p,
            // Symphonia signals end-of-stream through an I/O error.
            Err(SymphoniaError::IoError(_)) => break,
            Err(SymphoniaError::ResetRequired) => break,
            Err(e) => {
                return Err(DecodeError::Corrupt {
                    path: path.to_path_buf(),
                    reason: e.to_string(),
                });
            }
        };
        if packet.track_id() != track.id {
            continue;
        }

        match decoder.decode(&packet) {
            Ok(decoded) => {
                consecutive_errors = 0;
                let spec = *decoded.spec();
                channels = spec.channels.count();
                let buf = sample_buf.get_or_insert_with(|| {
                    SampleBuffer::<f32>::new(decoded.capacity() as u64, spec)
                });
                buf.copy_interleaved_ref(decoded);
                interleaved.extend_from_slice(buf.samples());
            }
            // Single corrupt frames are skipped; a run of them aborts.
            Err(SymphoniaError::DecodeError(reason)) => {
                consecutive_errors += 1;
                debug!(?path, %reason, consecutive_errors, "skipping corrupt frame");
                if consecutive_errors > MAX_CONSECUTIVE_DECODE_ERRORS {
                    return Err(DecodeError::Corrupt {
                        path: path.to_path_buf(),
                        reason: reason.to_string(),
                    });
                }
            }
            Err(SymphoniaError::IoError(_)) => break,
            Err(e) => {
                return Err(DecodeError::Corrupt {
                    path: path.to_path_buf(),
                    reason: e.to_string(),
                });
            }
        }
    }

    if channels == 0 || interleaved.is_empty() {
        return Err(DecodeError::Corrupt {
            path: path.to_path_buf(),
            reason: "stream produced no audio".into(),
        });
    }

    let frames = interleaved.len() / channels;
    let samples = match channels {
        1 => StereoBuffer::from_mono(interleaved),
        2 => StereoBuffer::from_interleaved(&interleaved),
        _ => {
            let mut left = Vec::with_capacity(frames);
            let mut right = Vec::with_capacity(frames);
            for frame in interleaved.chunks(channels) {
                left.push(frame[0]);
                right.push(frame[1]);
            }
            StereoBuffer::new(left, right)
        }
    };

    debug!(
        ?path,
        sample_rate,
        channels,
        frames,
        "decoded via symphonia"
    );

    Ok(DecodedAudio {
        samples,
        sample_rate,
        channels: (channels as u16).min(2),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn missing_file() {
        let err = decode_file(Path::new("/nope/missing.flac")).unwrap_err();
        assert!(matches!(err, DecodeError::Missing { .. }));
    }

    #[test]
    fn wav_dispatches_to_hound() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("tone.wav");
        let buf = StereoBuffer::from_mono(vec![0.1; 4800]);
        crate::wav::write_wav(&path, &buf, 44100).unwrap();

        let decoded = decode_file(&path).unwrap();
        assert_eq!(decoded.sample_rate, 44100);
        assert_eq!(decoded.total_samples(), 4800);
    }

    #[test]
    fn garbage_bytes_are_a_format_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("noise.mp3");
        std::fs::write(&path, vec![0x55u8; 4096]).unwrap();
        let err = decode_file(&path).unwrap_err();
        assert!(
            matches!(err, DecodeError::Format { .. } | DecodeError::Corrupt { .. }),
            "{err:?}"
        );
    }
}
