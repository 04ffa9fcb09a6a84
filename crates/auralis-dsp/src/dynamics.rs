//! Wide-band dynamics (soft-knee compressor).
//!
//! Envelope follower into gain computer into gain application, with linked
//! stereo detection (`max(|L|, |R|)`) so the image never shifts under
//! compression. The envelope is stateful across the chunk and is warmed
//! by the pre-roll context before the declared range starts.

use auralis_core::{
    DynamicsParams, EnvelopeFollower, ProcessingParameters, SmoothedValue, StereoBuffer,
    db_to_linear, linear_to_db,
};

use crate::stage::Stage;

/// Static gain curve: input level in dB -> gain reduction in dB.
///
/// Below the knee nothing happens; above it the slope is `1 - 1/ratio`;
/// inside the knee the reduction blends in quadratically.
#[derive(Debug, Clone, Copy)]
struct GainCurve {
    threshold_db: f32,
    ratio: f32,
    knee_db: f32,
}

impl GainCurve {
    #[inline]
    fn reduction_db(&self, input_db: f32) -> f32 {
        let overshoot = input_db - self.threshold_db;
        let half_knee = self.knee_db / 2.0;
        if overshoot <= -half_knee {
            0.0
        } else if overshoot > half_knee {
            -overshoot * (1.0 - 1.0 / self.ratio)
        } else {
            let t = (overshoot + half_knee) / self.knee_db;
            -(t * t) * overshoot * (1.0 - 1.0 / self.ratio)
        }
    }
}

/// Soft-knee wide-band compressor stage.
#[derive(Debug, Clone)]
pub struct DynamicsStage {
    envelope: EnvelopeFollower,
    /// Smoothed makeup gain, so a makeup change at a chunk boundary
    /// ramps in over a few milliseconds instead of stepping.
    makeup: SmoothedValue,
    /// Times the envelope is currently configured for, to avoid
    /// recomputing coefficients every call.
    configured: Option<(f32, f32)>,
}

impl DynamicsStage {
    /// Create the stage for the given sample rate.
    pub fn new(sample_rate: f32) -> Self {
        Self {
            envelope: EnvelopeFollower::new(sample_rate),
            makeup: SmoothedValue::new(1.0, sample_rate, 10.0),
            configured: None,
        }
    }

    fn configure(&mut self, p: &DynamicsParams) {
        if self.configured != Some((p.attack_ms, p.release_ms)) {
            self.envelope.set_attack_ms(p.attack_ms);
            self.envelope.set_release_ms(p.release_ms);
            self.configured = Some((p.attack_ms, p.release_ms));
        }
        self.makeup.set_target(db_to_linear(p.makeup_db));
    }
}

impl Stage for DynamicsStage {
    fn name(&self) -> &'static str {
        "dynamics"
    }

    fn process(&mut self, buffer: &mut StereoBuffer, params: &ProcessingParameters) {
        let Some(p) = params.dynamics else {
            return;
        };
        self.configure(&p);

        let curve = GainCurve {
            threshold_db: p.threshold_db,
            ratio: p.ratio,
            knee_db: p.knee_db,
        };

        for i in 0..buffer.frames() {
            let l = buffer.left[i];
            let r = buffer.right[i];
            // Linked detection: loudest channel drives both.
            let detect = l.abs().max(r.abs());
            let env = self.envelope.process(detect);
            let reduction = curve.reduction_db(linear_to_db(env));
            let gain = db_to_linear(reduction) * self.makeup.advance();
            buffer.left[i] = l * gain;
            buffer.right[i] = r * gain;
        }
    }

    fn reset(&mut self) {
        self.envelope.reset();
        // Back to unity so a reset graph always renders a chunk the same
        // way; the ramp toward the configured makeup replays inside the
        // pre-roll region.
        self.makeup.snap_to(1.0);
    }

    fn set_sample_rate(&mut self, sample_rate: f32) {
        self.envelope.set_sample_rate(sample_rate);
        self.envelope.reset();
    }
}
