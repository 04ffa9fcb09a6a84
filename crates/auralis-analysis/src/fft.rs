//! FFT wrapper and analysis windows.

use rustfft::{FftPlanner, num_complex::Complex};
use std::f32::consts::PI;
use std::sync::Arc;

/// Analysis window functions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Window {
    /// No windowing.
    Rectangular,
    /// Hann (raised cosine) - the analyzer's default.
    Hann,
    /// Blackman, for when sidelobe leakage matters more than width.
    Blackman,
}

impl Window {
    /// Apply the window in place.
    pub fn apply(&self, buffer: &mut [f32]) {
        let n = buffer.len();
        if n == 0 {
            return;
        }
        match self {
            Window::Rectangular => {}
            Window::Hann => {
                for (i, sample) in buffer.iter_mut().enumerate() {
                    *sample *= 0.5 * (1.0 - (2.0 * PI * i as f32 / n as f32).cos());
                }
            }
            Window::Blackman => {
                for (i, sample) in buffer.iter_mut().enumerate() {
                    let x = 2.0 * PI * i as f32 / n as f32;
                    *sample *= 0.42 - 0.5 * x.cos() + 0.08 * (2.0 * x).cos();
                }
            }
        }
    }
}

/// Real-input FFT with a cached plan.
pub struct Fft {
    fft: Arc<dyn rustfft::Fft<f32>>,
    size: usize,
}

impl Fft {
    /// Plan an FFT of the given size.
    pub fn new(size: usize) -> Self {
        let mut planner = FftPlanner::new();
        Self {
            fft: planner.plan_fft_forward(size),
            size,
        }
    }

    /// FFT size.
    pub fn size(&self) -> usize {
        self.size
    }

    /// Magnitude spectrum of a real signal: `size/2 + 1` bins from DC to
    /// Nyquist. Input shorter than the FFT size is zero-padded; longer
    /// input is truncated.
    pub fn magnitudes(&self, input: &[f32], window: Window) -> Vec<f32> {
        let mut windowed: Vec<f32> = input.iter().copied().take(self.size).collect();
        windowed.resize(self.size, 0.0);
        window.apply(&mut windowed);

        let mut buffer: Vec<Complex<f32>> =
            windowed.into_iter().map(|x| Complex::new(x, 0.0)).collect();
        self.fft.process(&mut buffer);
        buffer.truncate(self.size / 2 + 1);
        buffer.into_iter().map(|c| c.norm()).collect()
    }
}
