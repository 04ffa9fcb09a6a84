//! Temporal and rhythm features: tempo, beat regularity, transient
//! density and silence.
//!
//! Tempo is read from the autocorrelation of the onset envelope (positive
//! spectral flux per analysis frame), searched over the 40-240 BPM lag
//! range. Rhythm stability is the normalized height of the chosen
//! autocorrelation peak; a metronomic groove autocorrelates strongly at
//! its beat period, a rubato performance does not.

use crate::spectral;

/// Lower bound of the tempo search range, BPM.
const MIN_BPM: f32 = 40.0;
/// Upper bound of the tempo search range, BPM.
const MAX_BPM: f32 = 240.0;
/// RMS threshold treated as silence, linear (-60 dBFS).
const SILENCE_RMS: f32 = 0.001;

/// The four temporal/rhythm fingerprint features.
#[derive(Debug, Clone, Copy)]
pub struct RhythmFeatures {
    /// Estimated tempo, BPM.
    pub tempo_bpm: f32,
    /// Beat-grid regularity in [0, 1].
    pub rhythm_stability: f32,
    /// Share of frames carrying an onset in [0, 1].
    pub transient_density: f32,
    /// Share of near-silent 20 ms windows in [0, 1].
    pub silence_ratio: f32,
}

/// Extract rhythm features from the shared spectrogram and the mono
/// signal.
pub fn analyze(
    spectrogram: &[Vec<f32>],
    mono: &[f32],
    sample_rate: f32,
    hop: usize,
) -> RhythmFeatures {
    let onsets = onset_envelope(spectrogram);
    let (tempo_bpm, rhythm_stability) = tempo_from_onsets(&onsets, sample_rate, hop);
    RhythmFeatures {
        tempo_bpm,
        rhythm_stability,
        transient_density: transient_density(&onsets),
        silence_ratio: silence_ratio(mono, sample_rate),
    }
}

/// Positive spectral flux per frame.
fn onset_envelope(spectrogram: &[Vec<f32>]) -> Vec<f32> {
    let mut onsets = Vec::with_capacity(spectrogram.len());
    for pair in spectrogram.windows(2) {
        onsets.push(spectral::flux(&pair[0], &pair[1]));
    }
    onsets
}

/// Autocorrelation tempo pick over the 40-240 BPM lag range.
///
/// Returns `(tempo_bpm, stability)`; defaults to `(120, 0)` when the
/// track is too short or has no periodic onset structure.
fn tempo_from_onsets(onsets: &[f32], sample_rate: f32, hop: usize) -> (f32, f32) {
    let frames_per_second = sample_rate / hop as f32;
    let min_lag = ((60.0 / MAX_BPM) * frames_per_second).floor() as usize;
    let max_lag = ((60.0 / MIN_BPM) * frames_per_second).ceil() as usize;
    if onsets.len() < max_lag * 2 || min_lag == 0 {
        return (120.0, 0.0);
    }

    // Mean-removed autocorrelation so a constant envelope scores zero.
    let mean = onsets.iter().sum::<f32>() / onsets.len() as f32;
    let centered: Vec<f32> = onsets.iter().map(|o| o - mean).collect();
    let energy: f32 = centered.iter().map(|c| c * c).sum();
    if energy <= 1e-12 {
        return (120.0, 0.0);
    }

    let mut best_lag = 0usize;
    let mut best_score = 0.0f32;
    for lag in min_lag..=max_lag.min(centered.len() - 1) {
        let score: f32 = centered[lag..]
            .iter()
            .zip(centered.iter())
            .map(|(a, b)| a * b)
            .sum();
        if score > best_score {
            best_score = score;
            best_lag = lag;
        }
    }
    if best_lag == 0 {
        return (120.0, 0.0);
    }

    let tempo = (60.0 * frames_per_second / best_lag as f32).clamp(MIN_BPM, MAX_BPM);
    let stability = (best_score / energy).clamp(0.0, 1.0);
    (tempo, stability)
}

/// Share of frames whose onset strength clears 1.5x the mean.
fn transient_density(onsets: &[f32]) -> f32 {
    if onsets.is_empty() {
        return 0.0;
    }
    let mean = onsets.iter().sum::<f32>() / onsets.len() as f32;
    if mean <= 1e-12 {
        return 0.0;
    }
    let hits = onsets.iter().filter(|&&o| o > 1.5 * mean).count();
    (hits as f32 / onsets.len() as f32).clamp(0.0, 1.0)
}

/// Share of 20 ms windows under -60 dBFS RMS.
fn silence_ratio(mono: &[f32], sample_rate: f32) -> f32 {
    let window = ((sample_rate * 0.02) as usize).max(1);
    let mut silent = 0usize;
    let mut total = 0usize;
    for chunk in mono.chunks(window) {
        let rms = (chunk.iter().map(|s| s * s).sum::<f32>() / chunk.len() as f32).sqrt();
        if rms < SILENCE_RMS {
            silent += 1;
        }
        total += 1;
    }
    if total == 0 {
        return 0.0;
    }
    silent as f32 / total as f32
}
