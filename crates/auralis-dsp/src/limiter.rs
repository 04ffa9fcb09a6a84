//! Look-ahead true-peak limiter.
//!
//! The final, non-bypassable stage. A circular delay buffer gives the
//! limiter `LOOKAHEAD_MS` of future signal; the peak detector scans that
//! window (including midpoint inter-sample estimates, giving a ~4x
//! oversampled view of reconstruction peaks) and gain is reduced *before*
//! the peak arrives. Attack is instant (the lookahead makes that
//! click-free) and release is a one-pole exponential.
//!
//! The lookahead delay is compensated inside `process`: the stage flushes
//! itself with zeros at the end of each chunk, so externally it has zero
//! latency and preserves the frame count exactly.

#[cfg(not(feature = "std"))]
use alloc::{vec, vec::Vec};

use auralis_core::{ProcessingParameters, StereoBuffer, db_to_linear, ms_to_samples};
use libm::expf;

use crate::stage::Stage;

/// Look-ahead window length in milliseconds.
const LOOKAHEAD_MS: f32 = 2.0;

/// Release time constant in milliseconds.
const RELEASE_MS: f32 = 100.0;

/// Brickwall limiter with inter-sample peak detection.
#[derive(Debug, Clone)]
pub struct LimiterStage {
    sample_rate: f32,
    lookahead: usize,
    release_coeff: f32,
    buf_l: Vec<f32>,
    buf_r: Vec<f32>,
    write_pos: usize,
    gain: f32,
}

impl LimiterStage {
    /// Create the stage for the given sample rate.
    pub fn new(sample_rate: f32) -> Self {
        let lookahead = ms_to_samples(LOOKAHEAD_MS, sample_rate).max(1);
        Self {
            sample_rate,
            lookahead,
            release_coeff: release_coeff(RELEASE_MS, sample_rate),
            buf_l: vec![0.0; lookahead + 1],
            buf_r: vec![0.0; lookahead + 1],
            write_pos: 0,
            gain: 1.0,
        }
    }

    /// Estimate the reconstruction peak of one channel's window.
    ///
    /// Scans sample peaks plus Catmull-Rom midpoints between adjacent
    /// samples; midpoints capture the bulk of inter-sample overshoot for
    /// band-limited material.
    fn window_peak(&self, buf: &[f32]) -> f32 {
        let len = buf.len();
        let mut peak = 0.0f32;
        let at = |i: usize| buf[(self.write_pos + i) % len];
        for i in 0..len {
            let s = at(i).abs();
            if s > peak {
                peak = s;
            }
            if i + 1 < len {
                // Catmull-Rom midpoint between samples i and i+1.
                let p0 = if i == 0 { at(0) } else { at(i - 1) };
                let p1 = at(i);
                let p2 = at(i + 1);
                let p3 = if i + 2 < len { at(i + 2) } else { at(i + 1) };
                let mid = 0.5625 * (p1 + p2) - 0.0625 * (p0 + p3);
                let m = mid.abs();
                if m > peak {
                    peak = m;
                }
            }
        }
        peak
    }

    #[inline]
    fn step(&mut self, left: f32, right: f32, ceiling: f32) -> (f32, f32) {
        // Non-finite input must never enter the delay line.
        let left = if left.is_finite() { left } else { 0.0 };
        let right = if right.is_finite() { right } else { 0.0 };

        self.buf_l[self.write_pos] = left;
        self.buf_r[self.write_pos] = right;

        let peak = self.window_peak(&self.buf_l).max(self.window_peak(&self.buf_r));
        let target = if peak > ceiling && peak > 1e-9 {
            ceiling / peak
        } else {
            1.0
        };

        // Instant attack, exponential release.
        self.gain = if target < self.gain {
            target
        } else {
            self.release_coeff * self.gain + (1.0 - self.release_coeff) * target
        };

        let len = self.buf_l.len();
        let read_pos = (self.write_pos + 1) % len;
        let out = (self.buf_l[read_pos] * self.gain, self.buf_r[read_pos] * self.gain);
        self.write_pos = read_pos;
        out
    }
}

impl Stage for LimiterStage {
    fn name(&self) -> &'static str {
        "limiter"
    }

    fn process(&mut self, buffer: &mut StereoBuffer, params: &ProcessingParameters) {
        let ceiling = db_to_linear(params.limiter_ceiling_dbtp);
        let frames = buffer.frames();
        let la = self.lookahead;

        let mut out_l = Vec::with_capacity(frames);
        let mut out_r = Vec::with_capacity(frames);
        for i in 0..frames + la {
            let (il, ir) = if i < frames {
                (buffer.left[i], buffer.right[i])
            } else {
                // Flush: the tail of the chunk drains out of the delay line.
                (0.0, 0.0)
            };
            let (ol, or_) = self.step(il, ir, ceiling);
            if i >= la {
                out_l.push(ol);
                out_r.push(or_);
            }
        }
        buffer.left = out_l;
        buffer.right = out_r;
    }

    fn reset(&mut self) {
        self.buf_l.fill(0.0);
        self.buf_r.fill(0.0);
        self.write_pos = 0;
        self.gain = 1.0;
    }

    fn set_sample_rate(&mut self, sample_rate: f32) {
        *self = Self::new(sample_rate);
    }
}

// coeff = exp(-1 / (ms * sr / 1000)); 0 means instant.
fn release_coeff(ms: f32, sample_rate: f32) -> f32 {
    let tau = ms * sample_rate / 1000.0;
    if tau < 1.0 { 0.0 } else { expf(-1.0 / tau) }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::f32::consts::PI;

    #[test]
    fn hot_signal_is_capped_at_ceiling() {
        let mut stage = LimiterStage::new(48000.0);
        let mut buf = StereoBuffer::from_mono(vec![1.0; 9600]);
        stage.process(&mut buf, &ProcessingParameters::neutral());
        let ceiling = db_to_linear(-0.3);
        for s in buf.left.iter().chain(buf.right.iter()) {
            assert!(s.abs() <= ceiling + 1e-5, "sample {s} over ceiling {ceiling}");
        }
    }

    #[test]
    fn quiet_signal_passes_untouched_in_level() {
        let mut stage = LimiterStage::new(48000.0);
        let v: Vec<f32> = (0..9600)
            .map(|i| 0.1 * libm::sinf(2.0 * PI * 440.0 * i as f32 / 48000.0))
            .collect();
        let mut buf = StereoBuffer::from_mono(v);
        stage.process(&mut buf, &ProcessingParameters::neutral());
        let peak = buf.peak();
        assert!((peak - 0.1).abs() < 1e-3, "peak {peak}");
    }

    #[test]
    fn frame_count_preserved() {
        let mut stage = LimiterStage::new(44100.0);
        let mut buf = StereoBuffer::from_mono(vec![0.9; 1337]);
        stage.process(&mut buf, &ProcessingParameters::neutral());
        assert_eq!(buf.frames(), 1337);
    }

    #[test]
    fn nonfinite_input_is_scrubbed() {
        let mut stage = LimiterStage::new(48000.0);
        let mut v = vec![0.5f32; 512];
        v[100] = f32::NAN;
        v[200] = f32::INFINITY;
        let mut buf = StereoBuffer::from_mono(v);
        stage.process(&mut buf, &ProcessingParameters::neutral());
        for s in buf.left.iter().chain(buf.right.iter()) {
            assert!(s.is_finite());
        }
    }

    #[test]
    fn stereo_reduction_is_linked() {
        let mut stage = LimiterStage::new(48000.0);
        let mut buf = StereoBuffer::new(vec![1.2; 4800], vec![0.1; 4800]);
        stage.process(&mut buf, &ProcessingParameters::neutral());
        // Right channel shares the gain reduction driven by the left.
        let right_tail = buf.right[4000..].iter().fold(0.0f32, |m, s| m.max(s.abs()));
        assert!(right_tail < 0.1, "right tail {right_tail}");
    }

    #[test]
    fn deterministic() {
        let run = || {
            let mut stage = LimiterStage::new(48000.0);
            let v: Vec<f32> = (0..4096)
                .map(|i| 1.1 * libm::sinf(2.0 * PI * 97.0 * i as f32 / 48000.0))
                .collect();
            let mut buf = StereoBuffer::from_mono(v);
            stage.process(&mut buf, &ProcessingParameters::neutral());
            buf
        };
        assert_eq!(run(), run());
    }
}
