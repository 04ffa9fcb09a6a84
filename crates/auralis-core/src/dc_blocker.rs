//! DC offset removal.
//!
//! First-order highpass (Julius O. Smith's DC blocker):
//! `H(z) = (1 - z^-1) / (1 - R*z^-1)`. The cutoff sits around 5 Hz,
//! below anything audible, so the input-conditioning stage can run it
//! unconditionally.

use core::f32::consts::PI;

/// First-order DC blocking highpass.
#[derive(Debug, Clone)]
pub struct DcBlocker {
    coeff: f32,
    x_prev: f32,
    y_prev: f32,
}

impl DcBlocker {
    const CUTOFF_HZ: f32 = 5.0;

    /// Create a blocker with ~5 Hz cutoff at the given sample rate.
    pub fn new(sample_rate: f32) -> Self {
        Self {
            coeff: Self::coeff_for(Self::CUTOFF_HZ, sample_rate),
            x_prev: 0.0,
            y_prev: 0.0,
        }
    }

    /// Process one sample: `y[n] = x[n] - x[n-1] + R * y[n-1]`.
    #[inline]
    pub fn process(&mut self, input: f32) -> f32 {
        let output = input - self.x_prev + self.coeff * self.y_prev;
        self.x_prev = input;
        self.y_prev = output;
        output
    }

    /// Clear the filter state.
    pub fn reset(&mut self) {
        self.x_prev = 0.0;
        self.y_prev = 0.0;
    }

    /// Recompute the pole for a new sample rate.
    pub fn set_sample_rate(&mut self, sample_rate: f32) {
        self.coeff = Self::coeff_for(Self::CUTOFF_HZ, sample_rate);
    }

    // R = 1 - 2*pi*fc/fs, clamped to keep the pole stable and useful.
    fn coeff_for(cutoff_hz: f32, sample_rate: f32) -> f32 {
        (1.0 - 2.0 * PI * cutoff_hz / sample_rate).clamp(0.9, 0.9999)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn removes_dc() {
        let mut blocker = DcBlocker::new(48000.0);
        let mut out = 0.0;
        for _ in 0..48000 {
            out = blocker.process(1.0);
        }
        assert!(out.abs() < 0.01, "residual DC {out}");
    }

    #[test]
    fn passes_audio_band() {
        let mut blocker = DcBlocker::new(48000.0);
        let mut peak = 0.0f32;
        for i in 0..96000 {
            let t = i as f32 / 48000.0;
            let out = blocker.process(libm::sinf(2.0 * PI * 440.0 * t));
            if i > 48000 {
                peak = peak.max(out.abs());
            }
        }
        assert!(peak > 0.95, "440 Hz attenuated to {peak}");
    }
}
