//! One-pole parameter smoothing.
//!
//! Gains, widths and thresholds must not jump between adjacent samples or
//! the output zippers. [`SmoothedValue`] ramps exponentially toward its
//! target with a configurable time constant.

use libm::expf;

/// A value that approaches its target exponentially, one sample at a time.
#[derive(Debug, Clone)]
pub struct SmoothedValue {
    current: f32,
    target: f32,
    coeff: f32,
    sample_rate: f32,
    time_ms: f32,
}

impl SmoothedValue {
    /// Create a smoothed value with the given time constant.
    ///
    /// A `time_ms` of 0 disables smoothing (instant response).
    pub fn new(initial: f32, sample_rate: f32, time_ms: f32) -> Self {
        let mut v = Self {
            current: initial,
            target: initial,
            coeff: 1.0,
            sample_rate,
            time_ms,
        };
        v.recalculate();
        v
    }

    /// Set a new target to ramp toward.
    #[inline]
    pub fn set_target(&mut self, target: f32) {
        self.target = target;
    }

    /// Set the value and target together, skipping the ramp.
    #[inline]
    pub fn snap_to(&mut self, value: f32) {
        self.current = value;
        self.target = value;
    }

    /// Advance one sample and return the smoothed value.
    #[inline]
    pub fn advance(&mut self) -> f32 {
        self.current += self.coeff * (self.target - self.current);
        self.current
    }

    /// Current value without advancing.
    #[inline]
    pub fn value(&self) -> f32 {
        self.current
    }

    /// Target value.
    #[inline]
    pub fn target(&self) -> f32 {
        self.target
    }

    /// Whether the ramp has effectively completed.
    #[inline]
    pub fn is_settled(&self) -> bool {
        (self.current - self.target).abs() < 1e-6
    }

    /// Update the sample rate, preserving the time constant.
    pub fn set_sample_rate(&mut self, sample_rate: f32) {
        self.sample_rate = sample_rate;
        self.recalculate();
    }

    // coeff = 1 - exp(-1 / (tau * sr)); after 5*tau the ramp is within 1 %.
    fn recalculate(&mut self) {
        if self.time_ms <= 0.0 || self.sample_rate <= 0.0 {
            self.coeff = 1.0;
        } else {
            let samples = self.time_ms / 1000.0 * self.sample_rate;
            self.coeff = 1.0 - expf(-1.0 / samples);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ramps_toward_target() {
        let mut v = SmoothedValue::new(0.0, 48000.0, 10.0);
        v.set_target(1.0);
        // 50 ms = 5 time constants
        let mut last = 0.0;
        for _ in 0..2400 {
            last = v.advance();
        }
        assert!(last > 0.99, "got {last}");
    }

    #[test]
    fn zero_time_is_instant() {
        let mut v = SmoothedValue::new(0.0, 48000.0, 0.0);
        v.set_target(0.7);
        assert!((v.advance() - 0.7).abs() < 1e-6);
    }

    #[test]
    fn snap_skips_ramp() {
        let mut v = SmoothedValue::new(0.0, 48000.0, 100.0);
        v.snap_to(0.5);
        assert_eq!(v.value(), 0.5);
        assert!(v.is_settled());
    }
}
