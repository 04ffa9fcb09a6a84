//! Amplitude envelope detection for the dynamics stage.

use libm::expf;

/// Peak envelope follower with independent attack and release ballistics.
///
/// The dynamics stage drives its gain computer from this envelope; the
/// chunker's pre-roll context is run through it so the envelope is warm by
/// the time the declared chunk range starts.
#[derive(Debug, Clone)]
pub struct EnvelopeFollower {
    envelope: f32,
    attack_coeff: f32,
    release_coeff: f32,
    sample_rate: f32,
    attack_ms: f32,
    release_ms: f32,
}

impl EnvelopeFollower {
    /// Create a follower with mastering-friendly defaults (15 ms / 150 ms).
    pub fn new(sample_rate: f32) -> Self {
        Self::with_times(sample_rate, 15.0, 150.0)
    }

    /// Create a follower with explicit attack and release times.
    pub fn with_times(sample_rate: f32, attack_ms: f32, release_ms: f32) -> Self {
        let mut f = Self {
            envelope: 0.0,
            attack_coeff: 0.0,
            release_coeff: 0.0,
            sample_rate,
            attack_ms: attack_ms.max(0.1),
            release_ms: release_ms.max(1.0),
        };
        f.recalculate();
        f
    }

    /// Set the attack time in milliseconds (floored at 0.1 ms).
    pub fn set_attack_ms(&mut self, attack_ms: f32) {
        self.attack_ms = attack_ms.max(0.1);
        self.recalculate();
    }

    /// Set the release time in milliseconds (floored at 1 ms).
    pub fn set_release_ms(&mut self, release_ms: f32) {
        self.release_ms = release_ms.max(1.0);
        self.recalculate();
    }

    /// Update the sample rate.
    pub fn set_sample_rate(&mut self, sample_rate: f32) {
        self.sample_rate = sample_rate;
        self.recalculate();
    }

    /// Feed one sample, returning the current envelope level (>= 0).
    #[inline]
    pub fn process(&mut self, input: f32) -> f32 {
        let level = input.abs();
        let coeff = if level > self.envelope {
            self.attack_coeff
        } else {
            self.release_coeff
        };
        self.envelope = coeff * self.envelope + (1.0 - coeff) * level;
        self.envelope
    }

    /// Current envelope level.
    pub fn level(&self) -> f32 {
        self.envelope
    }

    /// Clear the envelope to zero.
    pub fn reset(&mut self) {
        self.envelope = 0.0;
    }

    fn recalculate(&mut self) {
        self.attack_coeff = expf(-1.0 / (self.attack_ms * self.sample_rate / 1000.0));
        self.release_coeff = expf(-1.0 / (self.release_ms * self.sample_rate / 1000.0));
    }
}
