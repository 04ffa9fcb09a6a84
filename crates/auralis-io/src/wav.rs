//! WAV reading and writing via `hound`.

use std::path::Path;

use auralis_core::StereoBuffer;
use hound::{SampleFormat, WavReader, WavWriter};

use crate::decode::DecodedAudio;
use crate::error::DecodeError;

/// Read a WAV file into planar stereo at its native rate.
///
/// Mono files are duplicated onto both channels; files with more than
/// two channels keep the first two.
pub fn read_wav(path: &Path) -> Result<DecodedAudio, DecodeError> {
    let reader = WavReader::open(path).map_err(|e| map_hound_error(path, e))?;
    let spec = reader.spec();
    let channels = spec.channels as usize;
    if channels == 0 {
        return Err(DecodeError::Unsupported {
            path: path.to_path_buf(),
            reason: "zero channels".into(),
        });
    }

    let interleaved: Vec<f32> = match spec.sample_format {
        SampleFormat::Float => reader
            .into_samples::<f32>()
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| corrupt(path, e))?,
        SampleFormat::Int => {
            let max_val = (1i64 << (spec.bits_per_sample - 1)) as f32;
            reader
                .into_samples::<i32>()
                .map(|s| s.map(|v| v as f32 / max_val))
                .collect::<Result<Vec<_>, _>>()
                .map_err(|e| corrupt(path, e))?
        }
    };

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

    Ok(DecodedAudio {
        samples,
        sample_rate: spec.sample_rate,
        channels: (channels as u16).min(2),
    })
}

/// Write planar stereo to a 32-bit float WAV file.
pub fn write_wav(path: &Path, samples: &StereoBuffer, sample_rate: u32) -> Result<(), DecodeError> {
    let spec = hound::WavSpec {
        channels: 2,
        sample_rate,
        bits_per_sample: 32,
        sample_format: SampleFormat::Float,
    };
    let mut writer = WavWriter::create(path, spec).map_err(|e| map_hound_error(path, e))?;
    for (l, r) in samples.left.iter().zip(samples.right.iter()) {
        writer.write_sample(*l).map_err(|e| corrupt(path, e))?;
        writer.write_sample(*r).map_err(|e| corrupt(path, e))?;
    }
    writer.finalize().map_err(|e| corrupt(path, e))?;
    Ok(())
}

fn map_hound_error(path: &Path, err: hound::Error) -> DecodeError {
    match err {
        hound::Error::IoError(source) if source.kind() == std::io::ErrorKind::NotFound => {
            DecodeError::Missing {
                path: path.to_path_buf(),
            }
        }
        hound::Error::IoError(source) => DecodeError::Io {
            path: path.to_path_buf(),
            source,
        },
        hound::Error::FormatError(reason) => DecodeError::Format {
            path: path.to_path_buf(),
            reason: reason.to_string(),
        },
        other => DecodeError::Unsupported {
            path: path.to_path_buf(),
            reason: other.to_string(),
        },
    }
}

fn corrupt(path: &Path, err: hound::Error) -> DecodeError {
    DecodeError::Corrupt {
        path: path.to_path_buf(),
        reason: err.to_string(),
    }
}
