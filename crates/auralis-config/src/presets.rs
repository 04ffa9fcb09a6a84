//! Built-in presets and the parameter resolver.
//!
//! `resolve_preset` is a pure function: the same
//! `(name, fingerprint, intensity)` triple always yields byte-identical
//! [`ProcessingParameters`]. Intensity scales every "amount" control
//! linearly, so increasing intensity only ever deepens a correction -
//! never flips its sign - and intensity 0 is exactly the neutral no-op.
//!
//! Of the four built-ins only `adaptive` reads the fingerprint; the
//! others are fixed curves scaled by intensity.
//!
//! [`ProcessingParameters`]: auralis_core::ProcessingParameters

use std::collections::HashMap;

use auralis_core::{DynamicsParams, EqCurve, Fingerprint, ProcessingParameters};
use parking_lot::Mutex;

use crate::error::PresetError;

/// The built-in preset names, in display order.
pub const PRESET_NAMES: [&str; 4] = ["adaptive", "gentle", "warm", "transparent"];

/// Whether `name` is one of the built-in presets.
pub fn is_builtin_preset(name: &str) -> bool {
    PRESET_NAMES.contains(&name)
}

/// Resolve a preset to processing parameters.
///
/// Errors: [`PresetError::Unknown`] for an unrecognized name (no silent
/// fallback), [`PresetError::BadIntensity`] for a non-finite or
/// out-of-range intensity.
pub fn resolve_preset(
    name: &str,
    fingerprint: &Fingerprint,
    intensity: f32,
) -> Result<ProcessingParameters, PresetError> {
    if !intensity.is_finite() || !(0.0..=1.0).contains(&intensity) {
        return Err(PresetError::BadIntensity(intensity));
    }
    if !is_builtin_preset(name) {
        return Err(PresetError::Unknown(name.to_string()));
    }
    // Intensity 0 is the no-op for every preset, by contract.
    if intensity == 0.0 {
        return Ok(ProcessingParameters::neutral());
    }

    let params = match name {
        "adaptive" => adaptive(fingerprint, intensity),
        "gentle" => gentle(intensity),
        "warm" => warm(intensity),
        "transparent" => transparent(),
        _ => unreachable!("guarded by is_builtin_preset"),
    };
    Ok(params.clamped())
}

/// Safety-only mastering: DC hygiene and the true-peak ceiling, nothing
/// else. Intensity beyond zero does not deepen anything because there is
/// nothing to deepen.
fn transparent() -> ProcessingParameters {
    let mut p = ProcessingParameters::neutral();
    p.dc_block = true;
    p
}

/// Soft glue: gentle wide-band compression and a whisper of top end.
fn gentle(intensity: f32) -> ProcessingParameters {
    let mut p = ProcessingParameters::neutral();
    p.dc_block = true;
    p.eq = EqCurve::from_gains([0.0, 0.0, 0.0, 0.0, 0.0, 0.5, 1.0, 1.5]).scaled(intensity);
    p.dynamics = Some(DynamicsParams {
        threshold_db: -10.0 - 8.0 * intensity,
        ratio: 1.0 + 1.5 * intensity,
        knee_db: 8.0,
        attack_ms: 20.0,
        release_ms: 250.0,
        makeup_db: 1.0 * intensity,
    });
    p
}

/// Analog-flavored warmth: low shelf, mild mid scoop, saturation.
fn warm(intensity: f32) -> ProcessingParameters {
    let mut p = ProcessingParameters::neutral();
    p.dc_block = true;
    p.eq = EqCurve::from_gains([2.0, 1.5, 0.5, 0.0, -0.5, 0.0, 0.0, -1.0]).scaled(intensity);
    p.dynamics = Some(DynamicsParams {
        threshold_db: -12.0 - 6.0 * intensity,
        ratio: 1.0 + intensity,
        knee_db: 6.0,
        attack_ms: 25.0,
        release_ms: 200.0,
        makeup_db: 0.5 * intensity,
    });
    p.saturation_amount = 0.25 * intensity;
    p
}

/// Reference spectral balance `adaptive` steers toward, percent per
/// band. Matches the neutral fingerprint profile.
const TARGET_BANDS_PCT: [f32; 7] = [8.0, 18.0, 16.0, 28.0, 16.0, 9.0, 5.0];

/// How much of a band's deviation one full-intensity pass corrects.
const BAND_CORRECTION_RATE: f32 = 0.25;
/// EQ correction clamp per band, dB.
const MAX_BAND_CORRECTION_DB: f32 = 4.5;

/// The adaptive preset: reads the fingerprint and steers the track
/// toward a balanced reference.
fn adaptive(fp: &Fingerprint, intensity: f32) -> ProcessingParameters {
    let mut p = ProcessingParameters::neutral();
    p.dc_block = true;

    // Spectral tilt correction. Each of the 8 EQ control points sits in
    // one of the 7 bands; its gain nudges that band toward the target
    // share. The deviation is in percentage points; the rate converts it
    // to a sane dB move.
    let measured = [
        fp.sub_bass_pct,
        fp.bass_pct,
        fp.low_mid_pct,
        fp.mid_pct,
        fp.upper_mid_pct,
        fp.presence_pct,
        fp.air_pct,
    ];
    // Control frequency -> band index for the standard 8-point grid.
    const CONTROL_BAND: [usize; 8] = [0, 1, 2, 3, 4, 5, 6, 6];
    let mut gains = [0.0f32; 8];
    for (g, &band) in gains.iter_mut().zip(CONTROL_BAND.iter()) {
        let deviation = TARGET_BANDS_PCT[band] - measured[band];
        *g = (deviation * BAND_CORRECTION_RATE)
            .clamp(-MAX_BAND_CORRECTION_DB, MAX_BAND_CORRECTION_DB)
            * intensity;
    }
    p.eq = EqCurve::from_gains(gains);

    // Compression depth follows the crest factor: squashed material is
    // left alone, very dynamic material gets glued.
    let depth = ((fp.crest_db - 10.0) / 20.0).clamp(0.0, 1.0);
    if depth > 0.0 {
        p.dynamics = Some(DynamicsParams {
            threshold_db: -8.0 - 12.0 * depth * intensity,
            ratio: 1.0 + 2.5 * depth * intensity,
            knee_db: 6.0,
            attack_ms: 15.0,
            release_ms: 180.0,
            makeup_db: 1.5 * depth * intensity,
        });
    }

    // Narrow mixes get widened a little, phase-suspect mixes narrowed.
    if fp.phase_correlation < 0.0 {
        p.stereo_width = 1.0 - 0.3 * intensity;
    } else if fp.stereo_width < 0.3 {
        p.stereo_width = 1.0 + (0.3 - fp.stereo_width) * intensity;
    }

    // Wide, bass-heavy mixes get their low end folded to mono.
    if fp.stereo_width > 0.6 && fp.bass_pct + fp.sub_bass_pct > 30.0 {
        p.mono_bass_hz = Some(100.0);
    }

    // Dull material gets a touch of saturation for harmonic sheen.
    if fp.presence_pct + fp.air_pct < 8.0 {
        p.saturation_amount = 0.2 * intensity;
    }

    // Loudness: steer toward -14 LUFS, proportionally to intensity.
    p.target_lufs = Some(fp.lufs + (-14.0 - fp.lufs) * intensity);

    p
}

/// Memoizing resolver.
///
/// Resolution is cheap but runs once per chunk; the cache keys on
/// `(preset, fingerprint signature, intensity bits)` and makes repeat
/// lookups a hash probe.
pub struct PresetResolver {
    cache: Mutex<HashMap<(String, u64, u32), ProcessingParameters>>,
}

impl PresetResolver {
    /// Create an empty resolver cache.
    pub fn new() -> Self {
        Self {
            cache: Mutex::new(HashMap::new()),
        }
    }

    /// Resolve with memoization. Same contract as [`resolve_preset`].
    pub fn resolve(
        &self,
        name: &str,
        fingerprint: &Fingerprint,
        intensity: f32,
    ) -> Result<ProcessingParameters, PresetError> {
        let key = (name.to_string(), fingerprint.signature(), intensity.to_bits());
        if let Some(hit) = self.cache.lock().get(&key) {
            return Ok(hit.clone());
        }
        let params = resolve_preset(name, fingerprint, intensity)?;
        self.cache.lock().insert(key, params.clone());
        Ok(params)
    }

    /// Drop all memoized entries.
    pub fn clear(&self) {
        self.cache.lock().clear();
    }
}

impl Default for PresetResolver {
    fn default() -> Self {
        Self::new()
    }
}
