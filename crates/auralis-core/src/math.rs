//! Math helpers shared across the mastering pipeline.
//!
//! Allocation-free, `no_std`-friendly conversions between decibels and
//! linear gain, time units, plus the odd-symmetric saturation transfer
//! used by the saturation stage.

use libm::{expf, logf, tanhf};

/// Convert decibels to linear gain.
///
/// 0 dB maps to 1.0, -6.02 dB to 0.5, +6.02 dB to 2.0.
#[inline]
pub fn db_to_linear(db: f32) -> f32 {
    // 10^(dB/20) = e^(dB * ln(10)/20)
    const FACTOR: f32 = core::f32::consts::LN_10 / 20.0;
    expf(db * FACTOR)
}

/// Convert linear gain to decibels.
///
/// The input is floored at 1e-10 so silence maps to -200 dB rather
/// than negative infinity.
#[inline]
pub fn linear_to_db(linear: f32) -> f32 {
    const FACTOR: f32 = 20.0 / core::f32::consts::LN_10;
    logf(linear.max(1e-10)) * FACTOR
}

/// Linear interpolation between `a` and `b` by `t` in [0, 1].
#[inline]
pub fn lerp(a: f32, b: f32, t: f32) -> f32 {
    a + (b - a) * t
}

/// Convert a duration in milliseconds to a sample count at `sample_rate`.
#[inline]
pub fn ms_to_samples(ms: f32, sample_rate: f32) -> usize {
    ((ms * sample_rate) / 1000.0) as usize
}

/// Odd-symmetric, monotone saturation transfer.
///
/// `amount` in [0, 1] blends between identity (0) and a driven tanh curve
/// (1). At `amount == 0.0` the function returns `x` exactly, which the
/// saturation stage relies on for its bypass contract.
///
/// The drive is normalized by `tanh(k)` so a full-scale input still maps
/// to full scale; only the shape of the transfer changes with `amount`.
#[inline]
pub fn odd_saturate(x: f32, amount: f32) -> f32 {
    if amount <= 0.0 {
        return x;
    }
    // k in (0, 3]: higher amount = harder knee.
    let k = 3.0 * amount.min(1.0);
    tanhf(k * x) / tanhf(k)
}
