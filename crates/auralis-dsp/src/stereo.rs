//! Stereo image processing: M/S width scaling and mono bass.
//!
//! The signal is split into mid `(L+R)/2` and side `(L-R)/2`; the side
//! channel is scaled by the width parameter, and optionally highpassed so
//! low frequencies collapse to mono (vinyl-style bass management).

use auralis_core::{Biquad, ProcessingParameters, StereoBuffer, filter};

use crate::stage::Stage;

/// M/S stereo width stage with optional mono-bass crossover.
#[derive(Debug, Clone)]
pub struct StereoStage {
    sample_rate: f32,
    /// Highpass on the side channel when mono bass is active.
    side_hp: Biquad,
    /// Cutoff the highpass was built for.
    built_cutoff: Option<f32>,
}

impl StereoStage {
    /// Create the stage for the given sample rate.
    pub fn new(sample_rate: f32) -> Self {
        Self {
            sample_rate,
            side_hp: Biquad::new(),
            built_cutoff: None,
        }
    }

    fn ensure_crossover(&mut self, cutoff_hz: Option<f32>) {
        if self.built_cutoff == cutoff_hz {
            return;
        }
        self.built_cutoff = cutoff_hz;
        if let Some(hz) = cutoff_hz {
            self.side_hp = Biquad::with_coeffs(filter::highpass(
                hz,
                core::f32::consts::FRAC_1_SQRT_2,
                self.sample_rate,
            ));
        } else {
            self.side_hp = Biquad::new();
        }
    }
}

impl Stage for StereoStage {
    fn name(&self) -> &'static str {
        "stereo"
    }

    fn process(&mut self, buffer: &mut StereoBuffer, params: &ProcessingParameters) {
        let width = params.stereo_width;
        let mono_bass = params.mono_bass_hz;
        // Neutral width and no crossover: exact bypass.
        if (width - 1.0).abs() < 1e-6 && mono_bass.is_none() {
            return;
        }
        self.ensure_crossover(mono_bass);

        for i in 0..buffer.frames() {
            let l = buffer.left[i];
            let r = buffer.right[i];
            let mid = (l + r) * 0.5;
            let mut side = (l - r) * 0.5;
            if mono_bass.is_some() {
                // Everything the highpass removes from the side signal
                // folds back into mono.
                side = self.side_hp.process(side);
            }
            side *= width;
            buffer.left[i] = mid + side;
            buffer.right[i] = mid - side;
        }
    }

    fn reset(&mut self) {
        self.side_hp.reset();
    }

    fn set_sample_rate(&mut self, sample_rate: f32) {
        self.sample_rate = sample_rate;
        let cutoff = self.built_cutoff;
        self.built_cutoff = None;
        self.ensure_crossover(cutoff);
    }
}
