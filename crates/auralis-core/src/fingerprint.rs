//! The 25-dimensional perceptual fingerprint.
//!
//! A [`Fingerprint`] characterizes a whole track across seven feature
//! groups: spectral energy distribution (7), loudness and dynamics (3),
//! temporal/rhythm (4), spectral shape (3), harmonic/pitch (3), temporal
//! variation (3) and stereo image (2). The field order below is the
//! canonical key order; the sidecar codec serializes features in exactly
//! this order and rejects files that disagree.

/// Number of fingerprint dimensions.
pub const FEATURE_COUNT: usize = 25;

/// Canonical feature names, index-aligned with [`Fingerprint::as_array`].
pub const FEATURE_NAMES: [&str; FEATURE_COUNT] = [
    "sub_bass_pct",
    "bass_pct",
    "low_mid_pct",
    "mid_pct",
    "upper_mid_pct",
    "presence_pct",
    "air_pct",
    "lufs",
    "crest_db",
    "bass_mid_ratio",
    "tempo_bpm",
    "rhythm_stability",
    "transient_density",
    "silence_ratio",
    "spectral_centroid",
    "spectral_rolloff",
    "spectral_flatness",
    "harmonic_ratio",
    "pitch_stability",
    "chroma_energy",
    "dynamic_range_variation",
    "loudness_variation_std",
    "peak_consistency",
    "stereo_width",
    "phase_correlation",
];

/// 25-dimensional perceptual feature vector for one track.
///
/// Numeric domains (enforced by [`clamped`](Self::clamped)):
/// band energies in percent `[0, 100]` summing to ~100, `lufs` in
/// `[-70, 0]`, `crest_db` in `[0, 40]`, `bass_mid_ratio` in `[0, 10]`,
/// `tempo_bpm` in `(0, 300]`, `phase_correlation` in `[-1, 1]`, all other
/// features normalized to `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Fingerprint {
    /// Energy share below 60 Hz, percent.
    pub sub_bass_pct: f32,
    /// Energy share 60-250 Hz, percent.
    pub bass_pct: f32,
    /// Energy share 250-500 Hz, percent.
    pub low_mid_pct: f32,
    /// Energy share 500-2000 Hz, percent.
    pub mid_pct: f32,
    /// Energy share 2-4 kHz, percent.
    pub upper_mid_pct: f32,
    /// Energy share 4-8 kHz, percent.
    pub presence_pct: f32,
    /// Energy share above 8 kHz, percent.
    pub air_pct: f32,
    /// Integrated loudness, LUFS (BS.1770-style gating).
    pub lufs: f32,
    /// Peak-to-RMS ratio in dB.
    pub crest_db: f32,
    /// Bass-band over mid-band energy ratio.
    pub bass_mid_ratio: f32,
    /// Estimated tempo in beats per minute.
    pub tempo_bpm: f32,
    /// Regularity of the beat grid, 0 = free, 1 = metronomic.
    pub rhythm_stability: f32,
    /// Share of frames carrying an onset transient.
    pub transient_density: f32,
    /// Share of near-silent frames.
    pub silence_ratio: f32,
    /// Spectral centroid normalized to Nyquist.
    pub spectral_centroid: f32,
    /// 85 % energy rolloff frequency normalized to Nyquist.
    pub spectral_rolloff: f32,
    /// Geometric/arithmetic spectral mean ratio, 0 = tonal, 1 = noise.
    pub spectral_flatness: f32,
    /// Harmonic share of total energy.
    pub harmonic_ratio: f32,
    /// Stability of the fundamental pitch track.
    pub pitch_stability: f32,
    /// Mean normalized chroma energy.
    pub chroma_energy: f32,
    /// Spread of per-window crest factors.
    pub dynamic_range_variation: f32,
    /// Normalized standard deviation of short-term loudness.
    pub loudness_variation_std: f32,
    /// Consistency of per-window peak levels.
    pub peak_consistency: f32,
    /// Stereo width from mid/side energy balance.
    pub stereo_width: f32,
    /// Inter-channel phase correlation, -1 = anti-phase, +1 = mono.
    pub phase_correlation: f32,
}

impl Fingerprint {
    /// A neutral profile used when a track has no fingerprint yet:
    /// flat-ish spectrum, moderate loudness and dynamics, mono-compatible
    /// stereo. `adaptive` resolves to a near-no-op against this.
    pub fn neutral() -> Self {
        Self {
            sub_bass_pct: 8.0,
            bass_pct: 18.0,
            low_mid_pct: 16.0,
            mid_pct: 28.0,
            upper_mid_pct: 16.0,
            presence_pct: 9.0,
            air_pct: 5.0,
            lufs: -14.0,
            crest_db: 14.0,
            bass_mid_ratio: 1.0,
            tempo_bpm: 120.0,
            rhythm_stability: 0.5,
            transient_density: 0.5,
            silence_ratio: 0.0,
            spectral_centroid: 0.5,
            spectral_rolloff: 0.85,
            spectral_flatness: 0.5,
            harmonic_ratio: 0.5,
            pitch_stability: 0.5,
            chroma_energy: 0.5,
            dynamic_range_variation: 0.5,
            loudness_variation_std: 0.5,
            peak_consistency: 0.5,
            stereo_width: 0.5,
            phase_correlation: 1.0,
        }
    }

    /// Flatten to the canonical 25-element array (sidecar payload order).
    pub fn as_array(&self) -> [f32; FEATURE_COUNT] {
        [
            self.sub_bass_pct,
            self.bass_pct,
            self.low_mid_pct,
            self.mid_pct,
            self.upper_mid_pct,
            self.presence_pct,
            self.air_pct,
            self.lufs,
            self.crest_db,
            self.bass_mid_ratio,
            self.tempo_bpm,
            self.rhythm_stability,
            self.transient_density,
            self.silence_ratio,
            self.spectral_centroid,
            self.spectral_rolloff,
            self.spectral_flatness,
            self.harmonic_ratio,
            self.pitch_stability,
            self.chroma_energy,
            self.dynamic_range_variation,
            self.loudness_variation_std,
            self.peak_consistency,
            self.stereo_width,
            self.phase_correlation,
        ]
    }

    /// Rebuild from the canonical array order.
    pub fn from_array(values: [f32; FEATURE_COUNT]) -> Self {
        Self {
            sub_bass_pct: values[0],
            bass_pct: values[1],
            low_mid_pct: values[2],
            mid_pct: values[3],
            upper_mid_pct: values[4],
            presence_pct: values[5],
            air_pct: values[6],
            lufs: values[7],
            crest_db: values[8],
            bass_mid_ratio: values[9],
            tempo_bpm: values[10],
            rhythm_stability: values[11],
            transient_density: values[12],
            silence_ratio: values[13],
            spectral_centroid: values[14],
            spectral_rolloff: values[15],
            spectral_flatness: values[16],
            harmonic_ratio: values[17],
            pitch_stability: values[18],
            chroma_energy: values[19],
            dynamic_range_variation: values[20],
            loudness_variation_std: values[21],
            peak_consistency: values[22],
            stereo_width: values[23],
            phase_correlation: values[24],
        }
    }

    /// Clip every feature to its documented domain.
    ///
    /// The analyzer applies this as a last defense before persisting; a
    /// non-finite feature collapses to the neutral profile's value.
    pub fn clamped(&self) -> Self {
        let neutral = Self::neutral();
        let fix = |v: f32, lo: f32, hi: f32, fallback: f32| {
            if v.is_finite() { v.clamp(lo, hi) } else { fallback }
        };
        Self {
            sub_bass_pct: fix(self.sub_bass_pct, 0.0, 100.0, neutral.sub_bass_pct),
            bass_pct: fix(self.bass_pct, 0.0, 100.0, neutral.bass_pct),
            low_mid_pct: fix(self.low_mid_pct, 0.0, 100.0, neutral.low_mid_pct),
            mid_pct: fix(self.mid_pct, 0.0, 100.0, neutral.mid_pct),
            upper_mid_pct: fix(self.upper_mid_pct, 0.0, 100.0, neutral.upper_mid_pct),
            presence_pct: fix(self.presence_pct, 0.0, 100.0, neutral.presence_pct),
            air_pct: fix(self.air_pct, 0.0, 100.0, neutral.air_pct),
            lufs: fix(self.lufs, -70.0, 0.0, neutral.lufs),
            crest_db: fix(self.crest_db, 0.0, 40.0, neutral.crest_db),
            bass_mid_ratio: fix(self.bass_mid_ratio, 0.0, 10.0, neutral.bass_mid_ratio),
            tempo_bpm: fix(self.tempo_bpm, 1.0, 300.0, neutral.tempo_bpm),
            rhythm_stability: fix(self.rhythm_stability, 0.0, 1.0, neutral.rhythm_stability),
            transient_density: fix(self.transient_density, 0.0, 1.0, neutral.transient_density),
            silence_ratio: fix(self.silence_ratio, 0.0, 1.0, neutral.silence_ratio),
            spectral_centroid: fix(self.spectral_centroid, 0.0, 1.0, neutral.spectral_centroid),
            spectral_rolloff: fix(self.spectral_rolloff, 0.0, 1.0, neutral.spectral_rolloff),
            spectral_flatness: fix(self.spectral_flatness, 0.0, 1.0, neutral.spectral_flatness),
            harmonic_ratio: fix(self.harmonic_ratio, 0.0, 1.0, neutral.harmonic_ratio),
            pitch_stability: fix(self.pitch_stability, 0.0, 1.0, neutral.pitch_stability),
            chroma_energy: fix(self.chroma_energy, 0.0, 1.0, neutral.chroma_energy),
            dynamic_range_variation: fix(
                self.dynamic_range_variation,
                0.0,
                1.0,
                neutral.dynamic_range_variation,
            ),
            loudness_variation_std: fix(
                self.loudness_variation_std,
                0.0,
                1.0,
                neutral.loudness_variation_std,
            ),
            peak_consistency: fix(self.peak_consistency, 0.0, 1.0, neutral.peak_consistency),
            stereo_width: fix(self.stereo_width, 0.0, 1.0, neutral.stereo_width),
            phase_correlation: fix(self.phase_correlation, -1.0, 1.0, neutral.phase_correlation),
        }
    }

    /// Whether every feature already sits inside its domain.
    pub fn is_valid(&self) -> bool {
        *self == self.clamped()
    }

    /// Stable 64-bit digest of the feature vector (FNV-1a over the IEEE
    /// bit patterns). Used in cache keys so a fingerprint change
    /// invalidates dependent rendered chunks.
    pub fn signature(&self) -> u64 {
        let mut hash = 0xcbf2_9ce4_8422_2325u64;
        for v in self.as_array() {
            for byte in v.to_bits().to_le_bytes() {
                hash ^= u64::from(byte);
                hash = hash.wrapping_mul(0x0000_0100_0000_01b3);
            }
        }
        hash
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn array_roundtrip_preserves_order() {
        let fp = Fingerprint::neutral();
        let arr = fp.as_array();
        assert_eq!(arr.len(), FEATURE_COUNT);
        assert_eq!(Fingerprint::from_array(arr), fp);
        // Spot-check the canonical order against the names table.
        assert_eq!(FEATURE_NAMES[7], "lufs");
        assert!((arr[7] - fp.lufs).abs() < f32::EPSILON);
        assert_eq!(FEATURE_NAMES[24], "phase_correlation");
        assert!((arr[24] - fp.phase_correlation).abs() < f32::EPSILON);
    }

    #[test]
    fn neutral_is_valid() {
        assert!(Fingerprint::neutral().is_valid());
    }

    #[test]
    fn clamp_fixes_out_of_domain_values() {
        let mut fp = Fingerprint::neutral();
        fp.lufs = 10.0;
        fp.harmonic_ratio = 1.5;
        fp.phase_correlation = -2.0;
        let fixed = fp.clamped();
        assert_eq!(fixed.lufs, 0.0);
        assert_eq!(fixed.harmonic_ratio, 1.0);
        assert_eq!(fixed.phase_correlation, -1.0);
    }

    #[test]
    fn clamp_replaces_non_finite_with_neutral() {
        let mut fp = Fingerprint::neutral();
        fp.tempo_bpm = f32::NAN;
        let fixed = fp.clamped();
        assert_eq!(fixed.tempo_bpm, Fingerprint::neutral().tempo_bpm);
    }

    #[test]
    fn signature_changes_with_any_feature() {
        let a = Fingerprint::neutral();
        let mut b = a;
        b.air_pct += 0.25;
        assert_ne!(a.signature(), b.signature());
        assert_eq!(a.signature(), Fingerprint::neutral().signature());
    }
}
