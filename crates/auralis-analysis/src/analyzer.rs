//! The fingerprint analyzer: one pass over a track, 25 features out.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use auralis_core::{Fingerprint, StereoBuffer};
use tracing::debug;

use crate::error::AnalysisError;
use crate::fft::{Fft, Window};
use crate::loudness::LoudnessMeasurement;
use crate::{harmonic, rhythm, spectral, stereo_field, variation};

/// Cooperative cancellation handle for fingerprint jobs.
///
/// The analyzer checks the token at least once per second of audio
/// processed; a cancelled job returns [`AnalysisError::Cancelled`] and
/// leaves no partial state behind (extraction is pure).
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    /// Create a fresh, uncancelled token.
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation.
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Relaxed);
    }

    /// Whether cancellation has been requested.
    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Relaxed)
    }
}

/// Analyzer tuning knobs. The defaults suit 44.1-48 kHz material.
#[derive(Debug, Clone, Copy)]
pub struct AnalyzerConfig {
    /// STFT frame length in samples.
    pub frame_size: usize,
    /// STFT hop in samples.
    pub hop_size: usize,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            frame_size: 2048,
            hop_size: 1024,
        }
    }
}

/// Whole-track 25-dimensional fingerprint extraction.
pub struct FingerprintAnalyzer {
    config: AnalyzerConfig,
}

impl FingerprintAnalyzer {
    /// Create an analyzer with default configuration.
    pub fn new() -> Self {
        Self {
            config: AnalyzerConfig::default(),
        }
    }

    /// Create an analyzer with explicit configuration.
    pub fn with_config(config: AnalyzerConfig) -> Self {
        Self { config }
    }

    /// Analyze a decoded track.
    ///
    /// Deterministic: the same samples and sample rate always produce the
    /// same fingerprint. Every feature is clamped to its documented
    /// domain before returning.
    pub fn analyze(
        &self,
        buffer: &StereoBuffer,
        sample_rate: u32,
        cancel: &CancelToken,
    ) -> Result<Fingerprint, AnalysisError> {
        if buffer.is_empty() {
            return Err(AnalysisError::ExtractionFailed("empty audio".into()));
        }
        if sample_rate == 0 {
            return Err(AnalysisError::ExtractionFailed("zero sample rate".into()));
        }
        let sr = sample_rate as f32;
        let mono = buffer.to_mono();

        let spectrogram = self.spectrogram(&mono, sr, cancel)?;
        debug!(
            frames = spectrogram.len(),
            samples = mono.len(),
            "computed analysis spectrogram"
        );

        // Aggregate spectral features, energy-weighted over frames.
        let mut band_energy = [0.0f64; 7];
        let mut centroid_acc = 0.0f64;
        let mut rolloff_acc = 0.0f64;
        let mut flatness_acc = 0.0f64;
        let mut energy_acc = 0.0f64;
        for frame in &spectrogram {
            let energy: f32 = frame.iter().map(|m| m * m).sum();
            let pct = spectral::band_energies_pct(frame, sr);
            for (acc, p) in band_energy.iter_mut().zip(pct.iter()) {
                *acc += f64::from(p * energy);
            }
            centroid_acc += f64::from(spectral::centroid(frame, sr) * energy);
            rolloff_acc += f64::from(spectral::rolloff(frame, 0.85) * energy);
            flatness_acc += f64::from(spectral::flatness(frame) * energy);
            energy_acc += f64::from(energy);
        }
        let (bands, spectral_centroid, spectral_rolloff, spectral_flatness) = if energy_acc > 0.0 {
            let mut bands = [0.0f32; 7];
            for (b, acc) in bands.iter_mut().zip(band_energy.iter()) {
                *b = (acc / energy_acc) as f32;
            }
            (
                bands,
                (centroid_acc / energy_acc) as f32,
                (rolloff_acc / energy_acc) as f32,
                (flatness_acc / energy_acc) as f32,
            )
        } else {
            // Silent track: declare nothing about its spectrum.
            ([0.0; 7], 0.0, 0.0, 0.0)
        };

        if cancel.is_cancelled() {
            return Err(AnalysisError::Cancelled);
        }

        let loudness = LoudnessMeasurement::measure(buffer, sr);
        let rhythm = rhythm::analyze(&spectrogram, &mono, sr, self.config.hop_size);

        if cancel.is_cancelled() {
            return Err(AnalysisError::Cancelled);
        }

        let harmonic = harmonic::analyze(&spectrogram, &mono, sr);
        let stereo = stereo_field::analyze(buffer);
        let var = variation::analyze(buffer, sr, &loudness.short_term_lufs);

        let mid_pct = bands[3].max(0.1);
        let fingerprint = Fingerprint {
            sub_bass_pct: bands[0],
            bass_pct: bands[1],
            low_mid_pct: bands[2],
            mid_pct: bands[3],
            upper_mid_pct: bands[4],
            presence_pct: bands[5],
            air_pct: bands[6],
            lufs: loudness.integrated_lufs,
            crest_db: loudness.crest_db,
            bass_mid_ratio: bands[1] / mid_pct,
            tempo_bpm: rhythm.tempo_bpm,
            rhythm_stability: rhythm.rhythm_stability,
            transient_density: rhythm.transient_density,
            silence_ratio: rhythm.silence_ratio,
            spectral_centroid,
            spectral_rolloff,
            spectral_flatness,
            harmonic_ratio: harmonic.harmonic_ratio,
            pitch_stability: harmonic.pitch_stability,
            chroma_energy: harmonic.chroma_energy,
            dynamic_range_variation: var.dynamic_range_variation,
            loudness_variation_std: var.loudness_variation_std,
            peak_consistency: var.peak_consistency,
            stereo_width: stereo.stereo_width,
            phase_correlation: stereo.phase_correlation,
        };

        // Last defense: clip every feature into its documented domain.
        Ok(fingerprint.clamped())
    }

    /// Magnitude spectrogram with a cancellation checkpoint at least once
    /// per second of audio.
    fn spectrogram(
        &self,
        mono: &[f32],
        sample_rate: f32,
        cancel: &CancelToken,
    ) -> Result<Vec<Vec<f32>>, AnalysisError> {
        let frame = self.config.frame_size;
        let hop = self.config.hop_size;
        let fft = Fft::new(frame);
        let frames_per_second = ((sample_rate as usize).div_ceil(hop)).max(1);

        let mut frames = Vec::new();
        let mut start = 0usize;
        while start + frame <= mono.len() {
            frames.push(fft.magnitudes(&mono[start..start + frame], Window::Hann));
            start += hop;
            if frames.len() % frames_per_second == 0 && cancel.is_cancelled() {
                return Err(AnalysisError::Cancelled);
            }
        }
        // Short tracks still get one (zero-padded) frame.
        if frames.is_empty() {
            frames.push(fft.magnitudes(mono, Window::Hann));
        }
        Ok(frames)
    }
}

impl Default for FingerprintAnalyzer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::PI;

    fn analyze(buffer: &StereoBuffer, sr: u32) -> Fingerprint {
        FingerprintAnalyzer::new()
            .analyze(buffer, sr, &CancelToken::new())
            .unwrap()
    }

    #[test]
    fn silence_fingerprint() {
        let fp = analyze(&StereoBuffer::silence(48000 * 2), 48000);
        assert!(fp.lufs <= -60.0, "lufs {}", fp.lufs);
        assert_eq!(fp.silence_ratio, 1.0);
        assert_eq!(fp.stereo_width, 0.0);
        assert!(fp.is_valid());
    }

    #[test]
    fn bass_tone_lands_in_bass_band() {
        let tone: Vec<f32> = (0..44100 * 3)
            .map(|i| 0.5 * (2.0 * PI * 100.0 * i as f32 / 44100.0).sin())
            .collect();
        let fp = analyze(&StereoBuffer::from_mono(tone), 44100);
        assert!(fp.bass_pct > 60.0, "bass {}", fp.bass_pct);
        assert!(fp.bass_mid_ratio > 1.0);
        assert!(fp.spectral_centroid < 0.1);
        assert!(fp.is_valid());
    }

    #[test]
    fn deterministic() {
        let tone: Vec<f32> = (0..44100 * 2)
            .map(|i| 0.4 * (2.0 * PI * 440.0 * i as f32 / 44100.0).sin())
            .collect();
        let buf = StereoBuffer::from_mono(tone);
        assert_eq!(analyze(&buf, 44100), analyze(&buf, 44100));
    }

    #[test]
    fn cancelled_token_aborts() {
        let tone: Vec<f32> = (0..48000 * 10).map(|i| (i as f32 * 0.01).sin()).collect();
        let token = CancelToken::new();
        token.cancel();
        let err = FingerprintAnalyzer::new()
            .analyze(&StereoBuffer::from_mono(tone), 48000, &token)
            .unwrap_err();
        assert!(matches!(err, AnalysisError::Cancelled));
    }

    #[test]
    fn empty_audio_is_an_error() {
        let err = FingerprintAnalyzer::new()
            .analyze(&StereoBuffer::default(), 48000, &CancelToken::new())
            .unwrap_err();
        assert!(matches!(err, AnalysisError::ExtractionFailed(_)));
    }

    #[test]
    fn one_sample_track_produces_valid_fingerprint() {
        let fp = analyze(&StereoBuffer::from_mono(vec![0.5]), 48000);
        assert!(fp.is_valid());
    }
}
