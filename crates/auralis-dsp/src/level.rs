//! Target-loudness level match.
//!
//! Measures the chunk's K-weighted loudness and applies one scalar gain
//! toward `target_lufs`. The correction is clamped to a per-chunk budget;
//! the continuity controller applies a second, stricter clamp against the
//! rolling output level so adjacent chunks never step audibly.

use auralis_core::{
    ProcessingParameters, StereoBuffer, db_to_linear, kweight,
};

use crate::stage::Stage;

/// Largest correction the stage will apply to a single chunk, dB.
const MAX_GAIN_DB_PER_CHUNK: f32 = 6.0;

/// Scalar loudness correction stage.
#[derive(Debug, Clone)]
pub struct LevelMatchStage {
    sample_rate: f32,
    /// Gain applied to the most recent chunk, dB. Exposed for the
    /// continuity controller and for tests.
    last_gain_db: f32,
}

impl LevelMatchStage {
    /// Create the stage for the given sample rate.
    pub fn new(sample_rate: f32) -> Self {
        Self {
            sample_rate,
            last_gain_db: 0.0,
        }
    }

    /// Gain in dB applied to the most recently processed chunk.
    pub fn last_gain_db(&self) -> f32 {
        self.last_gain_db
    }
}

impl Stage for LevelMatchStage {
    fn name(&self) -> &'static str {
        "level"
    }

    fn process(&mut self, buffer: &mut StereoBuffer, params: &ProcessingParameters) {
        let Some(target) = params.target_lufs else {
            self.last_gain_db = 0.0;
            return;
        };
        let ms = kweight::weighted_mean_square(&buffer.left, &buffer.right, self.sample_rate);
        let measured = kweight::mean_square_to_lufs(ms);
        // Near-silent chunks are left alone: boosting the noise floor
        // toward a loudness target is never what anyone wants.
        if measured < -50.0 {
            self.last_gain_db = 0.0;
            return;
        }
        let gain_db =
            (target - measured).clamp(-MAX_GAIN_DB_PER_CHUNK, MAX_GAIN_DB_PER_CHUNK);
        self.last_gain_db = gain_db;
        if gain_db.abs() < 1e-3 {
            return;
        }
        buffer.apply_gain(db_to_linear(gain_db));
    }

    fn reset(&mut self) {
        self.last_gain_db = 0.0;
    }

    fn set_sample_rate(&mut self, sample_rate: f32) {
        self.sample_rate = sample_rate;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::f32::consts::PI;

    fn tone(amp: f32, frames: usize) -> StereoBuffer {
        let v: Vec<f32> = (0..frames)
            .map(|i| amp * libm::sinf(2.0 * PI * 997.0 * i as f32 / 48000.0))
            .collect();
        StereoBuffer::from_mono(v)
    }

    fn target(lufs: f32) -> ProcessingParameters {
        let mut p = ProcessingParameters::neutral();
        p.target_lufs = Some(lufs);
        p
    }

    #[test]
    fn no_target_means_no_change() {
        let mut stage = LevelMatchStage::new(48000.0);
        let mut buf = tone(0.5, 48000);
        let original = buf.clone();
        stage.process(&mut buf, &ProcessingParameters::neutral());
        assert_eq!(buf, original);
        assert_eq!(stage.last_gain_db(), 0.0);
    }

    #[test]
    fn quiet_chunk_is_boosted_toward_target() {
        let mut stage = LevelMatchStage::new(48000.0);
        let mut buf = tone(0.05, 48000);
        let before = buf.rms();
        stage.process(&mut buf, &target(-14.0));
        assert!(stage.last_gain_db() > 0.0);
        assert!(buf.rms() > before);
    }

    #[test]
    fn loud_chunk_is_attenuated() {
        let mut stage = LevelMatchStage::new(48000.0);
        let mut buf = tone(0.9, 48000);
        let before = buf.rms();
        stage.process(&mut buf, &target(-24.0));
        assert!(stage.last_gain_db() < 0.0);
        assert!(buf.rms() < before);
    }

    #[test]
    fn correction_respects_per_chunk_budget() {
        let mut stage = LevelMatchStage::new(48000.0);
        // Very quiet but above the -50 LUFS floor; target far away.
        let mut buf = tone(0.02, 48000);
        stage.process(&mut buf, &target(-6.0));
        assert!(stage.last_gain_db() <= MAX_GAIN_DB_PER_CHUNK + 1e-6);
    }

    #[test]
    fn silence_is_never_boosted() {
        let mut stage = LevelMatchStage::new(48000.0);
        let mut buf = StereoBuffer::silence(48000);
        stage.process(&mut buf, &target(-14.0));
        assert_eq!(buf.peak(), 0.0);
        assert_eq!(stage.last_gain_db(), 0.0);
    }
}
