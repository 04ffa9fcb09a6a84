//! BS.1770-style loudness measurement.
//!
//! Integrated loudness is computed from 400 ms K-weighted blocks with
//! 75 % overlap, gated twice: an absolute gate at -70 LUFS and a relative
//! gate 10 LU under the ungated mean. The short-term series (the block
//! loudnesses themselves) also feeds the temporal-variation features and
//! the level-match stage's notion of loudness agrees with this measure by
//! construction (same K-weighting prefilter).

use auralis_core::{KWeighting, StereoBuffer, mean_square_to_lufs};

/// Block length in milliseconds.
const BLOCK_MS: f32 = 400.0;
/// Hop between blocks (75 % overlap).
const HOP_MS: f32 = 100.0;
/// Absolute gate threshold, LUFS.
const ABSOLUTE_GATE_LUFS: f32 = -70.0;
/// Relative gate offset under the ungated mean, LU.
const RELATIVE_GATE_LU: f32 = 10.0;

/// Result of a loudness analysis pass.
#[derive(Debug, Clone)]
pub struct LoudnessMeasurement {
    /// Gated integrated loudness, LUFS. -70 for silence.
    pub integrated_lufs: f32,
    /// Short-term (400 ms block) loudness series, LUFS.
    pub short_term_lufs: Vec<f32>,
    /// Whole-track crest factor in dB.
    pub crest_db: f32,
}

impl LoudnessMeasurement {
    /// Measure a whole track.
    pub fn measure(buffer: &StereoBuffer, sample_rate: f32) -> Self {
        let block = ((BLOCK_MS / 1000.0) * sample_rate) as usize;
        let hop = ((HOP_MS / 1000.0) * sample_rate) as usize;

        let block_ms_values = block_mean_squares(buffer, sample_rate, block.max(1), hop.max(1));
        let short_term_lufs: Vec<f32> =
            block_ms_values.iter().map(|&ms| mean_square_to_lufs(ms)).collect();

        let integrated_lufs = gated_integrated(&block_ms_values);

        let peak = buffer.peak();
        let rms = buffer.rms();
        let crest_db = if rms > 0.0 {
            auralis_core::linear_to_db(peak / rms).clamp(0.0, 40.0)
        } else {
            0.0
        };

        Self {
            integrated_lufs,
            short_term_lufs,
            crest_db,
        }
    }
}

/// K-weighted mean square per block. One filter pair runs over the whole
/// track; block sums are drawn from the running weighted signal so
/// overlapping blocks share filter state, as the standard prescribes.
fn block_mean_squares(
    buffer: &StereoBuffer,
    sample_rate: f32,
    block: usize,
    hop: usize,
) -> Vec<f32> {
    let frames = buffer.frames();
    if frames == 0 {
        return Vec::new();
    }

    let mut kw_l = KWeighting::new(sample_rate);
    let mut kw_r = KWeighting::new(sample_rate);
    let mut weighted_sq = Vec::with_capacity(frames);
    for i in 0..frames {
        let wl = kw_l.process(buffer.left[i]);
        let wr = kw_r.process(buffer.right[i]);
        weighted_sq.push(wl * wl + wr * wr);
    }

    // Prefix sums make each block sum O(1).
    let mut prefix = Vec::with_capacity(frames + 1);
    prefix.push(0.0f64);
    for &sq in &weighted_sq {
        prefix.push(prefix.last().unwrap() + f64::from(sq));
    }

    let mut blocks = Vec::new();
    let mut start = 0usize;
    while start + block <= frames {
        let sum = prefix[start + block] - prefix[start];
        blocks.push((sum / block as f64) as f32);
        start += hop;
    }
    // Tracks shorter than one block still get a single measurement.
    if blocks.is_empty() {
        blocks.push((prefix[frames] / frames as f64) as f32);
    }
    blocks
}

fn gated_integrated(block_ms_values: &[f32]) -> f32 {
    // Absolute gate.
    let above_absolute: Vec<f32> = block_ms_values
        .iter()
        .copied()
        .filter(|&ms| mean_square_to_lufs(ms) > ABSOLUTE_GATE_LUFS)
        .collect();
    if above_absolute.is_empty() {
        return ABSOLUTE_GATE_LUFS;
    }

    // Relative gate 10 LU below the mean of the absolutely-gated blocks.
    let mean_ms = above_absolute.iter().sum::<f32>() / above_absolute.len() as f32;
    let relative_gate = mean_square_to_lufs(mean_ms) - RELATIVE_GATE_LU;
    let gated: Vec<f32> = above_absolute
        .into_iter()
        .filter(|&ms| mean_square_to_lufs(ms) > relative_gate)
        .collect();
    if gated.is_empty() {
        return ABSOLUTE_GATE_LUFS;
    }
    let final_ms = gated.iter().sum::<f32>() / gated.len() as f32;
    mean_square_to_lufs(final_ms).clamp(-70.0, 0.0)
}
