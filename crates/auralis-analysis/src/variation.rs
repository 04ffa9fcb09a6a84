//! Temporal variation features: how the track's dynamics move over time.

use auralis_core::StereoBuffer;

/// Window length for the per-window statistics, seconds.
const WINDOW_SECONDS: f32 = 1.0;

/// The three temporal-variation fingerprint features.
#[derive(Debug, Clone, Copy)]
pub struct VariationFeatures {
    /// Spread of per-window crest factors, normalized to [0, 1].
    pub dynamic_range_variation: f32,
    /// Normalized standard deviation of short-term loudness, [0, 1].
    pub loudness_variation_std: f32,
    /// Consistency of per-window peak levels, [0, 1].
    pub peak_consistency: f32,
}

/// Measure the variation features.
///
/// `short_term_lufs` is the loudness analyzer's 400 ms block series; the
/// windowed peak/crest statistics are computed here over 1 s windows.
pub fn analyze(
    buffer: &StereoBuffer,
    sample_rate: f32,
    short_term_lufs: &[f32],
) -> VariationFeatures {
    let window = ((WINDOW_SECONDS * sample_rate) as usize).max(1);
    let mono = buffer.to_mono();

    let mut crests = Vec::new();
    let mut peaks = Vec::new();
    for chunk in mono.chunks(window) {
        let peak = chunk.iter().fold(0.0f32, |m, s| m.max(s.abs()));
        let rms = (chunk.iter().map(|s| s * s).sum::<f32>() / chunk.len() as f32).sqrt();
        if rms > 1e-6 {
            crests.push(auralis_core::linear_to_db(peak / rms));
        }
        peaks.push(peak);
    }

    // Crest spread: 10 dB of standard deviation maps to 1.0.
    let dynamic_range_variation = (std_dev(&crests) / 10.0).clamp(0.0, 1.0);

    // Loudness spread: 10 LU of standard deviation maps to 1.0. Silent
    // blocks are pinned at -70 and would dominate; drop them.
    let audible: Vec<f32> = short_term_lufs.iter().copied().filter(|&l| l > -69.0).collect();
    let loudness_variation_std = (std_dev(&audible) / 10.0).clamp(0.0, 1.0);

    // Peak consistency: 1 - coefficient of variation of window peaks.
    let peak_consistency = {
        let audible_peaks: Vec<f32> = peaks.into_iter().filter(|&p| p > 1e-6).collect();
        if audible_peaks.len() < 2 {
            1.0
        } else {
            let mean = audible_peaks.iter().sum::<f32>() / audible_peaks.len() as f32;
            let cv = if mean > 0.0 { std_dev(&audible_peaks) / mean } else { 0.0 };
            (1.0 - cv.min(1.0)).clamp(0.0, 1.0)
        }
    };

    VariationFeatures {
        dynamic_range_variation,
        loudness_variation_std,
        peak_consistency,
    }
}

fn std_dev(values: &[f32]) -> f32 {
    if values.len() < 2 {
        return 0.0;
    }
    let mean = values.iter().sum::<f32>() / values.len() as f32;
    let variance =
        values.iter().map(|v| (v - mean) * (v - mean)).sum::<f32>() / values.len() as f32;
    variance.sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::PI;

    #[test]
    fn steady_tone_is_maximally_consistent() {
        let tone: Vec<f32> = (0..48000 * 4)
            .map(|i| 0.5 * (2.0 * PI * 440.0 * i as f32 / 48000.0).sin())
            .collect();
        let f = analyze(
            &StereoBuffer::from_mono(tone),
            48000.0,
            &[-14.0, -14.0, -14.0, -14.0],
        );
        assert!(f.dynamic_range_variation < 0.05);
        assert!(f.loudness_variation_std < 0.05);
        assert!(f.peak_consistency > 0.95);
    }

    #[test]
    fn alternating_loud_quiet_varies() {
        // 1 s loud, 1 s quiet, repeated.
        let mut samples = Vec::new();
        for block in 0..6 {
            let amp = if block % 2 == 0 { 0.9 } else { 0.05 };
            for i in 0..48000 {
                samples.push(amp * (2.0 * PI * 440.0 * i as f32 / 48000.0).sin());
            }
        }
        let st: Vec<f32> = (0..6).map(|b| if b % 2 == 0 { -8.0 } else { -33.0 }).collect();
        let f = analyze(&StereoBuffer::from_mono(samples), 48000.0, &st);
        assert!(f.loudness_variation_std > 0.5, "lvs {}", f.loudness_variation_std);
        assert!(f.peak_consistency < 0.7, "pc {}", f.peak_consistency);
    }

    #[test]
    fn silence_is_harmless() {
        let f = analyze(&StereoBuffer::silence(48000), 48000.0, &[]);
        assert_eq!(f.dynamic_range_variation, 0.0);
        assert_eq!(f.loudness_variation_std, 0.0);
        assert_eq!(f.peak_consistency, 1.0);
    }
}
