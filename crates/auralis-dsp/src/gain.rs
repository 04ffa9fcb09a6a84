//! Input conditioning: trim gain and DC removal.

use auralis_core::{DcBlocker, ProcessingParameters, StereoBuffer, db_to_linear};

use crate::stage::Stage;

/// First stage of the chain.
///
/// Applies the input trim from `params.input_gain_db` and, when
/// `params.dc_block` is set, removes DC offset with a ~5 Hz first-order
/// highpass ahead of the nonlinear stages. Both halves sit at exact
/// bypass for neutral parameters.
#[derive(Debug, Clone)]
pub struct InputStage {
    dc_l: DcBlocker,
    dc_r: DcBlocker,
}

impl InputStage {
    /// Create the stage for the given sample rate.
    pub fn new(sample_rate: f32) -> Self {
        Self {
            dc_l: DcBlocker::new(sample_rate),
            dc_r: DcBlocker::new(sample_rate),
        }
    }
}

impl Stage for InputStage {
    fn name(&self) -> &'static str {
        "input"
    }

    fn process(&mut self, buffer: &mut StereoBuffer, params: &ProcessingParameters) {
        let trim = params.input_gain_db != 0.0;
        if !trim && !params.dc_block {
            return;
        }
        let gain = if trim { db_to_linear(params.input_gain_db) } else { 1.0 };
        if params.dc_block {
            for s in buffer.left.iter_mut() {
                *s = self.dc_l.process(*s * gain);
            }
            for s in buffer.right.iter_mut() {
                *s = self.dc_r.process(*s * gain);
            }
        } else {
            buffer.apply_gain(gain);
        }
    }

    fn reset(&mut self) {
        self.dc_l.reset();
        self.dc_r.reset();
    }

    fn set_sample_rate(&mut self, sample_rate: f32) {
        self.dc_l.set_sample_rate(sample_rate);
        self.dc_r.set_sample_rate(sample_rate);
        self.reset();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params_with_gain(db: f32) -> ProcessingParameters {
        let mut p = ProcessingParameters::neutral();
        p.input_gain_db = db;
        p
    }

    #[test]
    fn neutral_params_are_exact_bypass() {
        let mut stage = InputStage::new(48000.0);
        let mut buf = StereoBuffer::from_mono(vec![0.3; 128]);
        let original = buf.clone();
        stage.process(&mut buf, &ProcessingParameters::neutral());
        assert_eq!(buf, original);
    }

    #[test]
    fn applies_trim_gain() {
        let mut stage = InputStage::new(48000.0);
        let mut buf = StereoBuffer::from_mono(vec![0.25; 64]);
        stage.process(&mut buf, &params_with_gain(6.02));
        for s in &buf.left {
            assert!((s - 0.5).abs() < 1e-3, "sample {s}");
        }
    }

    #[test]
    fn strips_dc_offset_when_enabled() {
        let mut stage = InputStage::new(48000.0);
        let mut p = ProcessingParameters::neutral();
        p.dc_block = true;
        // Pure DC at 0.3.
        let mut buf = StereoBuffer::from_mono(vec![0.3; 48000]);
        stage.process(&mut buf, &p);
        assert!(buf.left.last().unwrap().abs() < 0.01);
    }

    #[test]
    fn preserves_frame_count() {
        let mut stage = InputStage::new(48000.0);
        let mut buf = StereoBuffer::silence(1234);
        stage.process(&mut buf, &params_with_gain(-3.0));
        assert_eq!(buf.frames(), 1234);
    }
}
