//! Parametric EQ stage.
//!
//! The resolver hands the graph a dense frequency/gain table
//! ([`EqCurve`]); this stage reduces it to an IIR cascade: a low shelf at
//! the first control point, peaking sections at the interior points and a
//! high shelf at the last. Coefficients are rebuilt only when the curve
//! actually changes, detected by comparing tables.
//!
//! [`EqCurve`]: auralis_core::EqCurve

#[cfg(not(feature = "std"))]
use alloc::vec::Vec;

use auralis_core::{
    Biquad, EqCurve, ProcessingParameters, StereoBuffer, filter,
};

use crate::stage::Stage;

/// Gains below this magnitude are treated as flat (stage bypass).
const FLAT_TOLERANCE_DB: f32 = 1e-4;

/// Q for interior peaking sections; roughly one octave of reach, which
/// suits the log-spaced control grid the presets emit.
const PEAKING_Q: f32 = 1.1;

/// IIR-cascade parametric EQ.
#[derive(Debug, Clone)]
pub struct EqStage {
    sample_rate: f32,
    /// Curve the current cascade was built for.
    built_for: EqCurve,
    sections_l: Vec<Biquad>,
    sections_r: Vec<Biquad>,
    bypass: bool,
}

impl EqStage {
    /// Create the stage for the given sample rate.
    pub fn new(sample_rate: f32) -> Self {
        Self {
            sample_rate,
            built_for: EqCurve::flat(),
            sections_l: Vec::new(),
            sections_r: Vec::new(),
            bypass: true,
        }
    }

    /// Number of active cascade sections (for tests and reports).
    pub fn section_count(&self) -> usize {
        self.sections_l.len()
    }

    fn rebuild(&mut self, curve: &EqCurve) {
        self.built_for = curve.clone();
        self.sections_l.clear();
        self.sections_r.clear();
        self.bypass = curve.is_flat(FLAT_TOLERANCE_DB);
        if self.bypass {
            return;
        }

        let points = &curve.points;
        let last = points.len() - 1;
        for (i, p) in points.iter().enumerate() {
            // Skip sections that would be identities anyway.
            if p.gain_db.abs() <= FLAT_TOLERANCE_DB {
                continue;
            }
            let coeffs = if i == 0 {
                filter::low_shelf(p.freq_hz, p.gain_db, self.sample_rate)
            } else if i == last {
                filter::high_shelf(p.freq_hz, p.gain_db, self.sample_rate)
            } else {
                filter::peaking(p.freq_hz, PEAKING_Q, p.gain_db, self.sample_rate)
            };
            self.sections_l.push(Biquad::with_coeffs(coeffs));
            self.sections_r.push(Biquad::with_coeffs(coeffs));
        }
        // A curve of all-skipped points degenerates to bypass.
        self.bypass = self.sections_l.is_empty();
    }
}

impl Stage for EqStage {
    fn name(&self) -> &'static str {
        "eq"
    }

    fn process(&mut self, buffer: &mut StereoBuffer, params: &ProcessingParameters) {
        if params.eq != self.built_for {
            self.rebuild(&params.eq);
        }
        if self.bypass {
            return;
        }
        for s in buffer.left.iter_mut() {
            let mut x = *s;
            for section in self.sections_l.iter_mut() {
                x = section.process(x);
            }
            *s = x;
        }
        for s in buffer.right.iter_mut() {
            let mut x = *s;
            for section in self.sections_r.iter_mut() {
                x = section.process(x);
            }
            *s = x;
        }
    }

    fn reset(&mut self) {
        for section in self.sections_l.iter_mut().chain(self.sections_r.iter_mut()) {
            section.reset();
        }
    }

    fn set_sample_rate(&mut self, sample_rate: f32) {
        self.sample_rate = sample_rate;
        let curve = self.built_for.clone();
        self.rebuild(&curve);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::f32::consts::PI;

    fn sine(freq: f32, sample_rate: f32, frames: usize) -> StereoBuffer {
        let v: Vec<f32> = (0..frames)
            .map(|i| 0.25 * libm::sinf(2.0 * PI * freq * i as f32 / sample_rate))
            .collect();
        StereoBuffer::from_mono(v)
    }

    fn tail_peak(buf: &StereoBuffer) -> f32 {
        let n = buf.frames();
        buf.left[n / 2..].iter().fold(0.0f32, |m, s| m.max(s.abs()))
    }

    #[test]
    fn flat_curve_is_exact_bypass() {
        let mut stage = EqStage::new(48000.0);
        let mut buf = sine(1000.0, 48000.0, 4800);
        let original = buf.clone();
        stage.process(&mut buf, &ProcessingParameters::neutral());
        assert_eq!(buf, original);
        assert_eq!(stage.section_count(), 0);
    }

    #[test]
    fn boost_at_one_khz_raises_level() {
        let mut stage = EqStage::new(48000.0);
        let mut params = ProcessingParameters::neutral();
        params.eq = EqCurve::from_gains([0.0, 0.0, 0.0, 6.0, 0.0, 0.0, 0.0, 0.0]);

        let mut buf = sine(1000.0, 48000.0, 48000);
        let before = tail_peak(&buf);
        stage.process(&mut buf, &params);
        let after = tail_peak(&buf);
        // +6 dB is a factor of ~2.
        assert!(after / before > 1.6, "gain {}", after / before);
    }

    #[test]
    fn cut_at_one_khz_lowers_level() {
        let mut stage = EqStage::new(48000.0);
        let mut params = ProcessingParameters::neutral();
        params.eq = EqCurve::from_gains([0.0, 0.0, 0.0, -6.0, 0.0, 0.0, 0.0, 0.0]);

        let mut buf = sine(1000.0, 48000.0, 48000);
        let before = tail_peak(&buf);
        stage.process(&mut buf, &params);
        let after = tail_peak(&buf);
        assert!(after / before < 0.63, "gain {}", after / before);
    }

    #[test]
    fn distant_band_untouched() {
        let mut stage = EqStage::new(48000.0);
        let mut params = ProcessingParameters::neutral();
        // Boost way up high; a 120 Hz tone should barely move.
        params.eq = EqCurve::from_gains([0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 9.0]);

        let mut buf = sine(120.0, 48000.0, 48000);
        let before = tail_peak(&buf);
        stage.process(&mut buf, &params);
        let after = tail_peak(&buf);
        assert!((after / before - 1.0).abs() < 0.15, "gain {}", after / before);
    }

    #[test]
    fn rebuild_only_on_curve_change() {
        let mut stage = EqStage::new(48000.0);
        let mut params = ProcessingParameters::neutral();
        params.eq = EqCurve::from_gains([1.0; 8]);
        let mut buf = sine(440.0, 48000.0, 512);
        stage.process(&mut buf, &params);
        let sections = stage.section_count();
        stage.process(&mut buf, &params);
        assert_eq!(stage.section_count(), sections);
    }

    #[test]
    fn deterministic() {
        let mut params = ProcessingParameters::neutral();
        params.eq = EqCurve::from_gains([3.0, -2.0, 1.0, 4.0, -1.0, 2.0, -3.0, 5.0]);

        let run = || {
            let mut stage = EqStage::new(44100.0);
            let mut buf = sine(777.0, 44100.0, 4096);
            stage.process(&mut buf, &params);
            buf
        };
        assert_eq!(run(), run());
    }
}
