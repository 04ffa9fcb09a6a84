//! The continuous-mode controller.
//!
//! Chunks are rendered independently (each warmed by its own pre-roll),
//! so the controller's job is to make the seams disappear:
//!
//! - **Crossfade**: adjacent rendered chunks overlap; the seam is blended
//!   with equal-power gains `a(n)^2 + b(n)^2 = 1` (quarter-sine law), the
//!   outgoing chunk fading out as the incoming fades in, normalized for
//!   the measured correlation of the two renders so coherent content does
//!   not bulge through the limiter ceiling.
//! - **Level smoothing**: before a chunk is emitted, its RMS is compared
//!   with the rolling output level; a step larger than the configured
//!   budget is clamped by a scalar gain.
//! - **Parameter smoothing**: when adjacent chunks were rendered with
//!   different parameters, the crossfade itself interpolates the audible
//!   result across the overlap; anything categorical simply takes effect
//!   with the incoming chunk, i.e. after the crossfade completes.
//!
//! Emitting every chunk's declared range exactly once makes the
//! concatenated output equal the track length by construction.

use std::f32::consts::FRAC_PI_2;

use auralis_core::{StereoBuffer, db_to_linear, linear_to_db};
use tracing::debug;

use crate::error::EngineError;

/// Stitches independently rendered chunks into one continuous stream.
pub struct ContinuityController {
    /// Largest allowed RMS step between adjacent chunks, dB.
    level_max_change_db: f32,
    /// Processed overlap tail of the previous chunk, if any.
    pending_tail: StereoBuffer,
    /// Rolling output RMS in dB, once any audible audio has passed.
    rolling_rms_db: Option<f32>,
    /// Frames emitted so far.
    emitted_frames: u64,
}

impl ContinuityController {
    /// Create a controller with the given level-step budget.
    pub fn new(level_max_change_db: f32) -> Self {
        Self {
            level_max_change_db,
            pending_tail: StereoBuffer::default(),
            rolling_rms_db: None,
            emitted_frames: 0,
        }
    }

    /// Total frames emitted so far.
    pub fn emitted_frames(&self) -> u64 {
        self.emitted_frames
    }

    /// Stitch in the next rendered chunk and return the frames to emit.
    ///
    /// `body` is the processed chunk without pre-roll: its first
    /// `declared_frames` frames are the chunk's own range, the remaining
    /// `tail_frames` overlap into the next chunk. The emitted buffer is
    /// always exactly `declared_frames` long; the tail is retained for
    /// the next call's crossfade.
    pub fn push_chunk(
        &mut self,
        mut body: StereoBuffer,
        declared_frames: usize,
        tail_frames: usize,
    ) -> Result<StereoBuffer, EngineError> {
        if body.frames() != declared_frames + tail_frames {
            return Err(EngineError::ContinuityViolation(format!(
                "chunk body is {} frames, expected {} declared + {} tail",
                body.frames(),
                declared_frames,
                tail_frames
            )));
        }

        self.smooth_level(&mut body, declared_frames);
        self.crossfade_head(&mut body);

        let tail = body.slice(declared_frames, declared_frames + tail_frames);
        body.truncate(declared_frames);
        self.pending_tail = tail;
        self.emitted_frames += body.frames() as u64;
        Ok(body)
    }

    /// Blend the previous chunk's tail over this chunk's head with
    /// equal-power gains.
    ///
    /// The gain pair satisfies `a(n)^2 + b(n)^2 = 1` (quarter-sine law).
    /// Because adjacent chunks usually render near-identical audio over
    /// the overlap, the coherent part of the sum would bulge by up to
    /// 3 dB and punch through the limiter ceiling; the blend is
    /// therefore normalized by `sqrt(a^2 + b^2 + 2abr)` where `r` is the
    /// measured correlation of the two signals over the fade. Fully
    /// correlated content passes through exactly, uncorrelated content
    /// gets the pure equal-power law.
    fn crossfade_head(&mut self, body: &mut StereoBuffer) {
        let fade = self.pending_tail.frames().min(body.frames());
        if fade == 0 {
            return;
        }

        let mut dot = 0.0f64;
        let mut tail_energy = 0.0f64;
        let mut head_energy = 0.0f64;
        for i in 0..fade {
            for (tail, head) in [
                (self.pending_tail.left[i], body.left[i]),
                (self.pending_tail.right[i], body.right[i]),
            ] {
                dot += f64::from(tail) * f64::from(head);
                tail_energy += f64::from(tail) * f64::from(tail);
                head_energy += f64::from(head) * f64::from(head);
            }
        }
        // Only positive correlation needs compensation; anti-correlated
        // overlap cancels rather than bulges.
        let r = if tail_energy * head_energy > 1e-20 {
            ((dot / (tail_energy.sqrt() * head_energy.sqrt())) as f32).clamp(0.0, 1.0)
        } else {
            0.0
        };

        for i in 0..fade {
            // t runs 0..1 across the overlap; outgoing follows cos,
            // incoming follows sin.
            let t = (i as f32 + 0.5) / fade as f32;
            let a = (t * FRAC_PI_2).cos();
            let b = (t * FRAC_PI_2).sin();
            // >= 1 for r >= 0, so this never amplifies.
            let norm = (1.0 + 2.0 * a * b * r).sqrt();
            body.left[i] = (a * self.pending_tail.left[i] + b * body.left[i]) / norm;
            body.right[i] = (a * self.pending_tail.right[i] + b * body.right[i]) / norm;
        }
        self.pending_tail = StereoBuffer::default();
    }

    /// Clamp the chunk's level step against the rolling output RMS.
    fn smooth_level(&mut self, body: &mut StereoBuffer, declared_frames: usize) {
        let declared = body.slice(0, declared_frames);
        let rms = declared.rms();
        // Silence carries no level information; pass it through and
        // keep the rolling estimate unchanged.
        if rms < 1e-5 {
            return;
        }
        let chunk_db = linear_to_db(rms);
        let emitted_db = match self.rolling_rms_db {
            None => chunk_db,
            Some(rolling) => {
                let lo = rolling - self.level_max_change_db;
                let hi = rolling + self.level_max_change_db;
                let target = chunk_db.clamp(lo, hi);
                if (target - chunk_db).abs() > 1e-3 {
                    let gain = db_to_linear(target - chunk_db);
                    debug!(
                        chunk_db,
                        rolling,
                        clamped_to = target,
                        "level step exceeded budget, clamping"
                    );
                    body.apply_gain(gain);
                }
                target
            }
        };
        self.rolling_rms_db = Some(emitted_db);
    }
}
