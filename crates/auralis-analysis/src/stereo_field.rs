//! Stereo image features: width and phase correlation.

use auralis_core::StereoBuffer;

/// The two stereo fingerprint features.
#[derive(Debug, Clone, Copy)]
pub struct StereoFeatures {
    /// Mid/side energy balance mapped to [0, 1]: 0 = mono, 1 = fully
    /// decorrelated or anti-phase.
    pub stereo_width: f32,
    /// Pearson correlation between channels in [-1, 1]: +1 mono,
    /// 0 uncorrelated, -1 anti-phase.
    pub phase_correlation: f32,
}

/// Measure the stereo image of a whole track.
pub fn analyze(buffer: &StereoBuffer) -> StereoFeatures {
    let frames = buffer.frames();
    if frames == 0 {
        return StereoFeatures {
            stereo_width: 0.0,
            phase_correlation: 1.0,
        };
    }

    let mut mid_energy = 0.0f64;
    let mut side_energy = 0.0f64;
    let mut sum_l = 0.0f64;
    let mut sum_r = 0.0f64;
    let mut sum_ll = 0.0f64;
    let mut sum_rr = 0.0f64;
    let mut sum_lr = 0.0f64;

    for i in 0..frames {
        let l = f64::from(buffer.left[i]);
        let r = f64::from(buffer.right[i]);
        let mid = (l + r) * 0.5;
        let side = (l - r) * 0.5;
        mid_energy += mid * mid;
        side_energy += side * side;
        sum_l += l;
        sum_r += r;
        sum_ll += l * l;
        sum_rr += r * r;
        sum_lr += l * r;
    }

    let total = mid_energy + side_energy;
    let stereo_width = if total > 1e-12 {
        ((2.0 * side_energy / total) as f32).clamp(0.0, 1.0)
    } else {
        0.0
    };

    let n = frames as f64;
    let cov = sum_lr / n - (sum_l / n) * (sum_r / n);
    let var_l = sum_ll / n - (sum_l / n) * (sum_l / n);
    let var_r = sum_rr / n - (sum_r / n) * (sum_r / n);
    let denom = (var_l * var_r).sqrt();
    let phase_correlation = if denom > 1e-12 {
        ((cov / denom) as f32).clamp(-1.0, 1.0)
    } else {
        // Silent or constant channels: mono-compatible by definition.
        1.0
    };

    StereoFeatures {
        stereo_width,
        phase_correlation,
    }
}
