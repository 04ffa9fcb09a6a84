//! Second-order IIR filter sections.
//!
//! [`Biquad`] is a Direct Form I section; coefficient constructors follow
//! the RBJ Audio EQ Cookbook. The parametric EQ stage builds its cascade
//! from [`low_shelf`], [`peaking`] and [`high_shelf`] sections; the stereo
//! stage uses [`lowpass`]/[`highpass`] for its mono-bass crossover.

use core::f32::consts::PI;
use libm::{cosf, powf, sinf, sqrtf};

/// Normalized biquad coefficients (`a0` already divided out).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FilterCoeffs {
    /// Feedforward coefficients.
    pub b0: f32,
    /// Feedforward z^-1 coefficient.
    pub b1: f32,
    /// Feedforward z^-2 coefficient.
    pub b2: f32,
    /// Feedback z^-1 coefficient.
    pub a1: f32,
    /// Feedback z^-2 coefficient.
    pub a2: f32,
}

impl FilterCoeffs {
    /// Identity (passthrough) coefficients.
    pub const IDENTITY: Self = Self {
        b0: 1.0,
        b1: 0.0,
        b2: 0.0,
        a1: 0.0,
        a2: 0.0,
    };

    fn normalize(b0: f32, b1: f32, b2: f32, a0: f32, a1: f32, a2: f32) -> Self {
        let inv = 1.0 / a0;
        Self {
            b0: b0 * inv,
            b1: b1 * inv,
            b2: b2 * inv,
            a1: a1 * inv,
            a2: a2 * inv,
        }
    }
}

/// One biquad section with its state.
///
/// ```text
/// y[n] = b0*x[n] + b1*x[n-1] + b2*x[n-2] - a1*y[n-1] - a2*y[n-2]
/// ```
#[derive(Debug, Clone)]
pub struct Biquad {
    coeffs: FilterCoeffs,
    x1: f32,
    x2: f32,
    y1: f32,
    y2: f32,
}

impl Biquad {
    /// Create a passthrough section.
    pub fn new() -> Self {
        Self::with_coeffs(FilterCoeffs::IDENTITY)
    }

    /// Create a section with the given coefficients.
    pub fn with_coeffs(coeffs: FilterCoeffs) -> Self {
        Self {
            coeffs,
            x1: 0.0,
            x2: 0.0,
            y1: 0.0,
            y2: 0.0,
        }
    }

    /// Replace the coefficients, keeping the filter state.
    pub fn set_coeffs(&mut self, coeffs: FilterCoeffs) {
        self.coeffs = coeffs;
    }

    /// Current coefficients.
    pub fn coeffs(&self) -> FilterCoeffs {
        self.coeffs
    }

    /// Process one sample.
    #[inline]
    pub fn process(&mut self, input: f32) -> f32 {
        let c = &self.coeffs;
        let output =
            c.b0 * input + c.b1 * self.x1 + c.b2 * self.x2 - c.a1 * self.y1 - c.a2 * self.y2;
        self.x2 = self.x1;
        self.x1 = input;
        self.y2 = self.y1;
        self.y1 = output;
        output
    }

    /// Clear the delay-line state without touching coefficients.
    pub fn reset(&mut self) {
        self.x1 = 0.0;
        self.x2 = 0.0;
        self.y1 = 0.0;
        self.y2 = 0.0;
    }
}

impl Default for Biquad {
    fn default() -> Self {
        Self::new()
    }
}

/// Shared RBJ intermediates.
struct Rbj {
    cos_w: f32,
    alpha: f32,
}

fn rbj(frequency: f32, q: f32, sample_rate: f32) -> Rbj {
    let omega = 2.0 * PI * frequency / sample_rate;
    Rbj {
        cos_w: cosf(omega),
        alpha: sinf(omega) / (2.0 * q),
    }
}

/// RBJ low-pass section.
pub fn lowpass(frequency: f32, q: f32, sample_rate: f32) -> FilterCoeffs {
    let Rbj { cos_w, alpha } = rbj(frequency, q, sample_rate);
    FilterCoeffs::normalize(
        (1.0 - cos_w) / 2.0,
        1.0 - cos_w,
        (1.0 - cos_w) / 2.0,
        1.0 + alpha,
        -2.0 * cos_w,
        1.0 - alpha,
    )
}

/// RBJ high-pass section.
pub fn highpass(frequency: f32, q: f32, sample_rate: f32) -> FilterCoeffs {
    let Rbj { cos_w, alpha } = rbj(frequency, q, sample_rate);
    FilterCoeffs::normalize(
        (1.0 + cos_w) / 2.0,
        -(1.0 + cos_w),
        (1.0 + cos_w) / 2.0,
        1.0 + alpha,
        -2.0 * cos_w,
        1.0 - alpha,
    )
}

/// RBJ peaking EQ section.
///
/// Boosts or cuts `gain_db` around `frequency` with bandwidth set by `q`.
pub fn peaking(frequency: f32, q: f32, gain_db: f32, sample_rate: f32) -> FilterCoeffs {
    let a = powf(10.0, gain_db / 40.0);
    let Rbj { cos_w, alpha } = rbj(frequency, q, sample_rate);
    FilterCoeffs::normalize(
        1.0 + alpha * a,
        -2.0 * cos_w,
        1.0 - alpha * a,
        1.0 + alpha / a,
        -2.0 * cos_w,
        1.0 - alpha / a,
    )
}

/// RBJ low-shelf section with shelf slope 1.
pub fn low_shelf(frequency: f32, gain_db: f32, sample_rate: f32) -> FilterCoeffs {
    let a = powf(10.0, gain_db / 40.0);
    let omega = 2.0 * PI * frequency / sample_rate;
    let cos_w = cosf(omega);
    let sin_w = sinf(omega);
    // Shelf slope fixed at 1: alpha reduces to sin(w)/2 * sqrt(2).
    let alpha = sin_w / 2.0 * core::f32::consts::SQRT_2;
    let two_sqrt_a_alpha = 2.0 * sqrtf(a) * alpha;

    FilterCoeffs::normalize(
        a * ((a + 1.0) - (a - 1.0) * cos_w + two_sqrt_a_alpha),
        2.0 * a * ((a - 1.0) - (a + 1.0) * cos_w),
        a * ((a + 1.0) - (a - 1.0) * cos_w - two_sqrt_a_alpha),
        (a + 1.0) + (a - 1.0) * cos_w + two_sqrt_a_alpha,
        -2.0 * ((a - 1.0) + (a + 1.0) * cos_w),
        (a + 1.0) + (a - 1.0) * cos_w - two_sqrt_a_alpha,
    )
}

/// RBJ high-shelf section with shelf slope 1.
pub fn high_shelf(frequency: f32, gain_db: f32, sample_rate: f32) -> FilterCoeffs {
    let a = powf(10.0, gain_db / 40.0);
    let omega = 2.0 * PI * frequency / sample_rate;
    let cos_w = cosf(omega);
    let sin_w = sinf(omega);
    let alpha = sin_w / 2.0 * core::f32::consts::SQRT_2;
    let two_sqrt_a_alpha = 2.0 * sqrtf(a) * alpha;

    FilterCoeffs::normalize(
        a * ((a + 1.0) + (a - 1.0) * cos_w + two_sqrt_a_alpha),
        -2.0 * a * ((a - 1.0) + (a + 1.0) * cos_w),
        a * ((a + 1.0) + (a - 1.0) * cos_w - two_sqrt_a_alpha),
        (a + 1.0) - (a - 1.0) * cos_w + two_sqrt_a_alpha,
        2.0 * ((a - 1.0) - (a + 1.0) * cos_w),
        (a + 1.0) - (a - 1.0) * cos_w - two_sqrt_a_alpha,
    )
}
