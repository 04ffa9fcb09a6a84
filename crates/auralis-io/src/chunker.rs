//! Chunk planning and positional extraction.
//!
//! [`plan_chunks`] tiles `[0, total_samples)` into contiguous
//! descriptors: full chunks of `chunk_seconds`, with any remainder
//! becoming a final short chunk. [`ChunkReader`] then extracts one
//! chunk's audio: pre-roll context (clipped at the start of the file),
//! the declared range, and an overlap tail into the next chunk for the
//! crossfade. The pre-roll and tail are bookkept explicitly so the
//! continuity controller can strip and blend them precisely.

use auralis_core::{ChunkDescriptor, StereoBuffer};

use crate::decode::DecodedAudio;
use crate::error::DecodeError;

/// Default chunk duration, seconds.
pub const DEFAULT_CHUNK_SECONDS: f64 = 10.0;
/// Default overlap between rendered chunks, seconds.
pub const DEFAULT_OVERLAP_SECONDS: f64 = 0.1;
/// Hard upper bound on pre-roll context, seconds.
pub const MAX_CONTEXT_SECONDS: f64 = 2.0;

/// Tile a track into contiguous chunk descriptors.
///
/// Enforces `0 < overlap_seconds < chunk_seconds / 2`; descriptors
/// always satisfy `desc[i].end_sample == desc[i+1].start_sample` and
/// cover `[0, total_samples)` exactly.
pub fn plan_chunks(
    total_samples: u64,
    sample_rate: u32,
    chunk_seconds: f64,
    overlap_seconds: f64,
) -> Result<Vec<ChunkDescriptor>, DecodeError> {
    if !(chunk_seconds > 0.0 && overlap_seconds > 0.0 && overlap_seconds < chunk_seconds / 2.0) {
        return Err(DecodeError::InvalidChunking {
            chunk_seconds,
            overlap_seconds,
        });
    }
    let chunk_len = (chunk_seconds * f64::from(sample_rate)).round() as u64;
    if chunk_len == 0 || total_samples == 0 {
        return Ok(Vec::new());
    }

    let mut descriptors = Vec::with_capacity((total_samples / chunk_len + 1) as usize);
    let mut start = 0u64;
    let mut index = 0u32;
    while start < total_samples {
        let end = (start + chunk_len).min(total_samples);
        descriptors.push(ChunkDescriptor {
            chunk_index: index,
            start_sample: start,
            end_sample: end,
        });
        start = end;
        index += 1;
    }
    Ok(descriptors)
}

/// One chunk's extracted audio with its context bookkeeping.
#[derive(Debug, Clone)]
pub struct ChunkAudio {
    /// `pre_roll + declared range + overlap tail`, in that order.
    pub samples: StereoBuffer,
    /// Frames of warm-up context before the declared range.
    pub pre_roll_frames: usize,
    /// Frames of the declared range itself.
    pub declared_frames: usize,
    /// Frames of overlap into the next chunk (0 on the last chunk).
    pub tail_frames: usize,
    /// The descriptor this audio was read for.
    pub descriptor: ChunkDescriptor,
    /// Whether this is the final chunk of the track.
    pub is_last: bool,
}

impl ChunkAudio {
    /// The declared range plus tail (everything except pre-roll) - what
    /// the continuity controller consumes.
    pub fn without_pre_roll(&self) -> StereoBuffer {
        self.samples.slice(self.pre_roll_frames, self.samples.frames())
    }
}

/// Positional chunk extraction over a decoded track.
pub struct ChunkReader<'a> {
    audio: &'a DecodedAudio,
    context_seconds: f64,
    overlap_seconds: f64,
}

impl<'a> ChunkReader<'a> {
    /// Create a reader with the given pre-roll and overlap settings.
    ///
    /// `context_seconds` is clamped to [`MAX_CONTEXT_SECONDS`].
    pub fn new(audio: &'a DecodedAudio, context_seconds: f64, overlap_seconds: f64) -> Self {
        Self {
            audio,
            context_seconds: context_seconds.clamp(0.0, MAX_CONTEXT_SECONDS),
            overlap_seconds: overlap_seconds.max(0.0),
        }
    }

    /// Extract the audio for one descriptor.
    ///
    /// The returned frames are exactly
    /// `pre_roll (clipped at 0) + (end - start) + tail (clipped at EOF)`;
    /// no silent padding is ever inserted.
    pub fn read_chunk(&self, descriptor: ChunkDescriptor) -> ChunkAudio {
        let total = self.audio.total_samples();
        let sr = f64::from(self.audio.sample_rate);
        let context_frames = (self.context_seconds * sr).round() as u64;
        let overlap_frames = (self.overlap_seconds * sr).round() as u64;

        let read_start = descriptor.start_sample.saturating_sub(context_frames);
        let tail_end = (descriptor.end_sample + overlap_frames).min(total);

        let samples = self
            .audio
            .samples
            .slice(read_start as usize, tail_end as usize);

        ChunkAudio {
            samples,
            pre_roll_frames: (descriptor.start_sample - read_start) as usize,
            declared_frames: descriptor.len() as usize,
            tail_frames: (tail_end - descriptor.end_sample) as usize,
            descriptor,
            is_last: descriptor.end_sample >= total,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn audio(frames: usize, sample_rate: u32) -> DecodedAudio {
        // Ramp signal so positions are recognizable.
        let v: Vec<f32> = (0..frames).map(|i| i as f32).collect();
        DecodedAudio {
            samples: StereoBuffer::from_mono(v),
            sample_rate,
            channels: 2,
        }
    }

    #[test]
    fn plan_matches_the_25_second_example() {
        // 25 s at 44100 Hz, 10 s chunks: [0, 441000), [441000, 882000),
        // [882000, 1102500).
        let plan = plan_chunks(1_102_500, 44100, 10.0, 0.1).unwrap();
        assert_eq!(plan.len(), 3);
        assert_eq!((plan[0].start_sample, plan[0].end_sample), (0, 441_000));
        assert_eq!((plan[1].start_sample, plan[1].end_sample), (441_000, 882_000));
        assert_eq!((plan[2].start_sample, plan[2].end_sample), (882_000, 1_102_500));
    }

    #[test]
    fn plan_is_contiguous_and_complete() {
        for total in [1u64, 441_000, 441_001, 440_999, 445_410, 48_000 * 3600] {
            let plan = plan_chunks(total, 44100, 10.0, 0.1).unwrap();
            assert_eq!(plan[0].start_sample, 0);
            assert_eq!(plan.last().unwrap().end_sample, total);
            let sum: u64 = plan.iter().map(|d| d.len()).sum();
            assert_eq!(sum, total);
            for pair in plan.windows(2) {
                assert_eq!(pair[0].end_sample, pair[1].start_sample);
                assert_eq!(pair[0].chunk_index + 1, pair[1].chunk_index);
            }
        }
    }

    #[test]
    fn exact_multiple_has_no_tail_chunk() {
        let plan = plan_chunks(441_000 * 2, 44100, 10.0, 0.1).unwrap();
        assert_eq!(plan.len(), 2);
    }

    #[test]
    fn one_sample_over_adds_a_chunk() {
        let plan = plan_chunks(441_000 + 1, 44100, 10.0, 0.1).unwrap();
        assert_eq!(plan.len(), 2);
        assert_eq!(plan[1].len(), 1);
    }

    #[test]
    fn overlap_half_of_chunk_is_rejected() {
        // The legacy configuration bug: overlap >= chunk/2 must fail.
        let err = plan_chunks(441_000, 44100, 10.0, 5.0).unwrap_err();
        assert!(matches!(err, DecodeError::InvalidChunking { .. }));
    }

    #[test]
    fn zero_overlap_is_rejected() {
        assert!(plan_chunks(441_000, 44100, 10.0, 0.0).is_err());
    }

    #[test]
    fn first_chunk_has_clipped_pre_roll() {
        let audio = audio(48_000 * 5, 48000);
        let plan = plan_chunks(audio.total_samples(), 48000, 2.0, 0.1).unwrap();
        let reader = ChunkReader::new(&audio, 0.5, 0.1);

        let first = reader.read_chunk(plan[0]);
        assert_eq!(first.pre_roll_frames, 0);
        assert_eq!(first.declared_frames, 96_000);
        assert_eq!(first.tail_frames, 4800);
        assert!(!first.is_last);
        // Samples start at position 0.
        assert_eq!(first.samples.left[0], 0.0);
    }

    #[test]
    fn middle_chunk_has_full_context_and_tail() {
        let audio = audio(48_000 * 5, 48000);
        let plan = plan_chunks(audio.total_samples(), 48000, 2.0, 0.1).unwrap();
        let reader = ChunkReader::new(&audio, 0.5, 0.1);

        let mid = reader.read_chunk(plan[1]);
        assert_eq!(mid.pre_roll_frames, 24_000);
        assert_eq!(mid.declared_frames, 96_000);
        assert_eq!(mid.tail_frames, 4800);
        // First sample is 0.5 s before the declared start.
        assert_eq!(mid.samples.left[0], (96_000 - 24_000) as f32);
        // The declared range starts where it should.
        assert_eq!(mid.samples.left[mid.pre_roll_frames], 96_000.0);
    }

    #[test]
    fn last_chunk_is_marked_and_tailless() {
        let audio = audio(48_000 * 5, 48000);
        let plan = plan_chunks(audio.total_samples(), 48000, 2.0, 0.1).unwrap();
        let last = ChunkReader::new(&audio, 0.5, 0.1).read_chunk(*plan.last().unwrap());
        assert!(last.is_last);
        assert_eq!(last.tail_frames, 0);
    }

    #[test]
    fn context_clamped_to_bound() {
        let audio = audio(48_000 * 10, 48000);
        let reader = ChunkReader::new(&audio, 30.0, 0.1);
        let plan = plan_chunks(audio.total_samples(), 48000, 4.0, 0.1).unwrap();
        let chunk = reader.read_chunk(plan[1]);
        // 2 s cap at 48 kHz.
        assert_eq!(chunk.pre_roll_frames, 96_000);
    }

    #[test]
    fn without_pre_roll_strips_exactly_the_context() {
        let audio = audio(48_000 * 5, 48000);
        let plan = plan_chunks(audio.total_samples(), 48000, 2.0, 0.1).unwrap();
        let chunk = ChunkReader::new(&audio, 0.5, 0.1).read_chunk(plan[1]);
        let body = chunk.without_pre_roll();
        assert_eq!(body.frames(), chunk.declared_frames + chunk.tail_frames);
        assert_eq!(body.left[0], 96_000.0);
    }
}
