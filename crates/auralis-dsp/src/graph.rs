//! The fixed mastering chain.
//!
//! [`StageGraph`] owns one instance of every stage and applies them in
//! mastering order. It is the single entry point the renderer calls per
//! chunk; it also enforces the numeric-safety contract: after the
//! nonlinear stages and again after the limiter, non-finite samples are
//! replaced with silence and counted, so a numerically misbehaving chunk
//! is repaired rather than propagated.

use auralis_core::{ProcessingParameters, StereoBuffer};

use crate::{
    DynamicsStage, EqStage, InputStage, LevelMatchStage, LimiterStage, SaturationStage, Stage,
    StereoStage,
};

/// What happened while rendering one chunk.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ChunkReport {
    /// Number of non-finite samples replaced with 0. Zero in healthy
    /// renders; a non-zero count is surfaced as a warning event.
    pub repaired_samples: u32,
}

impl ChunkReport {
    /// Whether any sample needed repair.
    pub fn is_repaired(&self) -> bool {
        self.repaired_samples > 0
    }
}

/// The complete per-chunk processing chain, in fixed order.
pub struct StageGraph {
    sample_rate: f32,
    input: InputStage,
    eq: EqStage,
    dynamics: DynamicsStage,
    stereo: StereoStage,
    saturation: SaturationStage,
    level: LevelMatchStage,
    limiter: LimiterStage,
}

impl StageGraph {
    /// Build the chain for the given sample rate.
    pub fn new(sample_rate: f32) -> Self {
        Self {
            sample_rate,
            input: InputStage::new(sample_rate),
            eq: EqStage::new(sample_rate),
            dynamics: DynamicsStage::new(sample_rate),
            stereo: StereoStage::new(sample_rate),
            saturation: SaturationStage::new(),
            level: LevelMatchStage::new(sample_rate),
            limiter: LimiterStage::new(sample_rate),
        }
    }

    /// Sample rate the chain is configured for.
    pub fn sample_rate(&self) -> f32 {
        self.sample_rate
    }

    /// Gain the level-match stage applied to the last chunk, dB.
    pub fn last_level_gain_db(&self) -> f32 {
        self.level.last_gain_db()
    }

    /// Process one chunk in place.
    ///
    /// The buffer may include pre-roll context and overlap tail; the
    /// graph is agnostic to that: it processes whatever it is handed and
    /// preserves the frame count. Callers that want chunk purity must
    /// [`reset`](Self::reset) between chunks.
    pub fn process_chunk(
        &mut self,
        buffer: &mut StereoBuffer,
        params: &ProcessingParameters,
    ) -> ChunkReport {
        let frames = buffer.frames();
        let mut report = ChunkReport::default();

        self.input.process(buffer, params);
        self.eq.process(buffer, params);
        self.dynamics.process(buffer, params);
        self.stereo.process(buffer, params);
        self.saturation.process(buffer, params);
        self.level.process(buffer, params);

        // Scrub before the limiter so its delay line stays clean.
        report.repaired_samples += scrub(buffer);

        self.limiter.process(buffer, params);

        // The limiter is the last line of defense; anything non-finite
        // past this point is replaced outright.
        report.repaired_samples += scrub(buffer);

        debug_assert_eq!(buffer.frames(), frames, "stage changed frame count");
        report
    }

    /// Clear all stage state. Call between independent chunks.
    pub fn reset(&mut self) {
        self.input.reset();
        self.eq.reset();
        self.dynamics.reset();
        self.stereo.reset();
        self.saturation.reset();
        self.level.reset();
        self.limiter.reset();
    }

    /// Reconfigure every stage for a new sample rate.
    pub fn set_sample_rate(&mut self, sample_rate: f32) {
        self.sample_rate = sample_rate;
        self.input.set_sample_rate(sample_rate);
        self.eq.set_sample_rate(sample_rate);
        self.dynamics.set_sample_rate(sample_rate);
        self.stereo.set_sample_rate(sample_rate);
        self.saturation.set_sample_rate(sample_rate);
        self.level.set_sample_rate(sample_rate);
        self.limiter.set_sample_rate(sample_rate);
    }
}

/// Replace non-finite samples with 0, returning how many were touched.
fn scrub(buffer: &mut StereoBuffer) -> u32 {
    let mut count = 0;
    for s in buffer.left.iter_mut().chain(buffer.right.iter_mut()) {
        if !s.is_finite() {
            *s = 0.0;
            count += 1;
        }
    }
    count
}

#[cfg(test)]
mod tests {
    use super::*;
    use auralis_core::{DynamicsParams, EqCurve, db_to_linear};
    use core::f32::consts::PI;

    fn working_params() -> ProcessingParameters {
        let mut p = ProcessingParameters::neutral();
        p.dc_block = true;
        p.eq = EqCurve::from_gains([1.5, 0.5, -0.5, 0.0, 0.5, 1.0, 1.5, 2.0]);
        p.dynamics = Some(DynamicsParams {
            threshold_db: -18.0,
            ratio: 2.5,
            knee_db: 6.0,
            attack_ms: 15.0,
            release_ms: 150.0,
            makeup_db: 1.0,
        });
        p.saturation_amount = 0.3;
        p.target_lufs = Some(-14.0);
        p
    }

    fn sine(freq: f32, amp: f32, frames: usize) -> StereoBuffer {
        let v: Vec<f32> = (0..frames)
            .map(|i| amp * libm::sinf(2.0 * PI * freq * i as f32 / 48000.0))
            .collect();
        StereoBuffer::from_mono(v)
    }

    #[test]
    fn neutral_params_pass_audio_through() {
        let mut graph = StageGraph::new(48000.0);
        let mut buf = sine(997.0, 0.25, 9600);
        let original = buf.clone();
        let report = graph.process_chunk(&mut buf, &ProcessingParameters::neutral());
        assert_eq!(report.repaired_samples, 0);
        assert_eq!(buf.frames(), 9600);
        // Sub-ceiling audio through all-bypassed stages is untouched.
        for (a, b) in buf.left.iter().zip(original.left.iter()) {
            assert!((a - b).abs() < 2.0f32.powi(-18), "delta {}", (a - b).abs());
        }
    }

    #[test]
    fn full_chain_holds_ceiling() {
        let mut graph = StageGraph::new(48000.0);
        let mut buf = sine(60.0, 1.0, 48000);
        graph.process_chunk(&mut buf, &working_params());
        let ceiling = db_to_linear(-0.3);
        assert!(buf.peak() <= ceiling + 1e-4, "peak {}", buf.peak());
    }

    #[test]
    fn repairs_injected_nan() {
        let mut graph = StageGraph::new(48000.0);
        let mut buf = sine(440.0, 0.5, 4800);
        buf.left[1000] = f32::NAN;
        let report = graph.process_chunk(&mut buf, &ProcessingParameters::neutral());
        assert!(report.is_repaired());
        for s in buf.left.iter().chain(buf.right.iter()) {
            assert!(s.is_finite());
        }
    }

    #[test]
    fn deterministic_end_to_end() {
        let params = working_params();
        let run = || {
            let mut graph = StageGraph::new(48000.0);
            let mut buf = sine(333.0, 0.7, 19200);
            graph.process_chunk(&mut buf, &params);
            buf
        };
        assert_eq!(run(), run());
    }

    #[test]
    fn reset_restores_purity() {
        let params = working_params();
        let mut graph = StageGraph::new(48000.0);

        let mut first = sine(333.0, 0.7, 9600);
        graph.process_chunk(&mut first, &params);

        // Process something else, then reset and repeat the first chunk.
        let mut other = sine(90.0, 0.9, 9600);
        graph.process_chunk(&mut other, &params);
        graph.reset();

        let mut again = sine(333.0, 0.7, 9600);
        graph.process_chunk(&mut again, &params);
        assert_eq!(first, again);
    }

    #[test]
    fn sample_count_preserved_through_all_stages() {
        let mut graph = StageGraph::new(44100.0);
        graph.set_sample_rate(44100.0);
        for frames in [1usize, 63, 4096, 44100] {
            let mut buf = sine(1000.0, 0.6, frames);
            graph.process_chunk(&mut buf, &working_params());
            assert_eq!(buf.frames(), frames);
        }
    }
}
