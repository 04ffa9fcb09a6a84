//! Frame-level spectral features and the seven-band energy split.

/// Band edges in Hz for the seven spectral energy bands. The last band
/// runs to Nyquist.
pub const BAND_EDGES_HZ: [f32; 7] = [60.0, 250.0, 500.0, 2000.0, 4000.0, 8000.0, f32::INFINITY];

/// Spectral centroid of one magnitude frame, normalized to Nyquist.
pub fn centroid(magnitudes: &[f32], sample_rate: f32) -> f32 {
    let nyquist = sample_rate / 2.0;
    let bin_hz = nyquist / (magnitudes.len() - 1) as f32;
    let mut weighted = 0.0;
    let mut total = 0.0;
    for (i, &m) in magnitudes.iter().enumerate() {
        weighted += i as f32 * bin_hz * m;
        total += m;
    }
    if total > 1e-10 {
        (weighted / total / nyquist).clamp(0.0, 1.0)
    } else {
        0.0
    }
}

/// Frequency below which `fraction` of the frame's energy lies,
/// normalized to Nyquist.
pub fn rolloff(magnitudes: &[f32], fraction: f32) -> f32 {
    let total: f32 = magnitudes.iter().map(|m| m * m).sum();
    if total <= 1e-12 {
        return 0.0;
    }
    let threshold = total * fraction;
    let mut cumulative = 0.0;
    for (i, &m) in magnitudes.iter().enumerate() {
        cumulative += m * m;
        if cumulative >= threshold {
            return i as f32 / (magnitudes.len() - 1) as f32;
        }
    }
    1.0
}

/// Spectral flatness of one frame: geometric over arithmetic mean of the
/// power spectrum. 0 = pure tone, 1 = white noise.
pub fn flatness(magnitudes: &[f32]) -> f32 {
    // Skip DC; it carries no tonality information.
    let power: Vec<f32> = magnitudes.iter().skip(1).map(|m| (m * m).max(1e-12)).collect();
    if power.is_empty() {
        return 0.0;
    }
    let n = power.len() as f32;
    let log_mean = power.iter().map(|p| p.ln()).sum::<f32>() / n;
    let arith_mean = power.iter().sum::<f32>() / n;
    if arith_mean > 1e-12 {
        (log_mean.exp() / arith_mean).clamp(0.0, 1.0)
    } else {
        0.0
    }
}

/// Positive spectral flux between two frames (onset strength).
pub fn flux(prev: &[f32], curr: &[f32]) -> f32 {
    prev.iter()
        .zip(curr.iter())
        .map(|(&p, &c)| {
            let d = c - p;
            if d > 0.0 { d * d } else { 0.0 }
        })
        .sum::<f32>()
        .sqrt()
}

/// Split one frame's energy over the seven bands, returning percentages
/// that sum to ~100 (all zeros for a silent frame).
pub fn band_energies_pct(magnitudes: &[f32], sample_rate: f32) -> [f32; 7] {
    let nyquist = sample_rate / 2.0;
    let bin_hz = nyquist / (magnitudes.len() - 1) as f32;
    let mut bands = [0.0f32; 7];
    for (i, &m) in magnitudes.iter().enumerate() {
        let freq = i as f32 * bin_hz;
        let band = BAND_EDGES_HZ.iter().position(|&edge| freq < edge).unwrap_or(6);
        bands[band] += m * m;
    }
    let total: f32 = bands.iter().sum();
    if total > 1e-12 {
        for b in &mut bands {
            *b = *b / total * 100.0;
        }
    }
    bands
}
