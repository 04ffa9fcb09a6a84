//! Domain checks over the standard bank of test signals, plus sidecar
//! round-trip properties.

use auralis_analysis::{CancelToken, FingerprintAnalyzer, sidecar};
use auralis_core::{FEATURE_COUNT, Fingerprint, StereoBuffer};
use proptest::prelude::*;
use std::f32::consts::PI;

fn analyze(buffer: &StereoBuffer) -> Fingerprint {
    FingerprintAnalyzer::new()
        .analyze(buffer, 48000, &CancelToken::new())
        .unwrap()
}

fn tone(freq: f32, amp: f32, seconds: f32) -> Vec<f32> {
    (0..(48000.0 * seconds) as usize)
        .map(|i| amp * (2.0 * PI * freq * i as f32 / 48000.0).sin())
        .collect()
}

fn white_noise(seconds: f32) -> Vec<f32> {
    let mut state = 0xDEADBEEFu64;
    (0..(48000.0 * seconds) as usize)
        .map(|_| {
            state = state
                .wrapping_mul(6364136223846793005)
                .wrapping_add(1442695040888963407);
            0.5 * (((state >> 33) as f32 / (u32::MAX >> 1) as f32) - 1.0)
        })
        .collect()
}

/// Every feature within its declared domain, for each bank signal.
#[test]
fn feature_domains_hold_for_signal_bank() {
    let bank: Vec<(&str, StereoBuffer)> = vec![
        ("silence", StereoBuffer::silence(48000 * 2)),
        ("full_scale_tone", StereoBuffer::from_mono(tone(997.0, 1.0, 2.0))),
        ("white_noise", StereoBuffer::from_mono(white_noise(2.0))),
        ("anti_phase", {
            let left = tone(440.0, 0.5, 2.0);
            let right: Vec<f32> = left.iter().map(|s| -s).collect();
            StereoBuffer::new(left, right)
        }),
    ];

    for (name, buffer) in bank {
        let fp = analyze(&buffer);
        assert!(fp.is_valid(), "{name}: fingerprint out of domain: {fp:?}");
        let pct_sum: f32 = fp.as_array()[..7].iter().sum();
        assert!(
            pct_sum <= 100.5,
            "{name}: band percentages sum to {pct_sum}"
        );
    }
}

#[test]
fn anti_phase_reads_as_wide_and_negative() {
    let left = tone(440.0, 0.5, 2.0);
    let right: Vec<f32> = left.iter().map(|s| -s).collect();
    let fp = analyze(&StereoBuffer::new(left, right));
    assert!(fp.stereo_width > 0.9);
    assert!(fp.phase_correlation < -0.9);
}

#[test]
fn noise_and_tone_disagree_on_flatness() {
    let fp_tone = analyze(&StereoBuffer::from_mono(tone(997.0, 0.5, 2.0)));
    let fp_noise = analyze(&StereoBuffer::from_mono(white_noise(2.0)));
    assert!(fp_tone.spectral_flatness < fp_noise.spectral_flatness);
    assert!(fp_tone.harmonic_ratio > fp_noise.harmonic_ratio);
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// Sidecar round-trip is byte-identical for any finite fingerprint.
    #[test]
    fn sidecar_roundtrip(values in prop::array::uniform25(-1e3f32..1e3), mtime in any::<u64>()) {
        let fp = Fingerprint::from_array(values);
        let bytes = sidecar::encode(&fp, mtime);
        let (back, back_mtime) = sidecar::decode(&bytes).unwrap();
        prop_assert_eq!(back.as_array(), fp.as_array());
        prop_assert_eq!(back_mtime, mtime);
    }

    /// Any single-bit flip in the payload region is rejected.
    #[test]
    fn sidecar_payload_bitflip_rejected(
        values in prop::array::uniform25(-1e3f32..1e3),
        byte in 16usize..116,
        bit in 0u8..8,
    ) {
        let fp = Fingerprint::from_array(values);
        let mut bytes = sidecar::encode(&fp, 0);
        bytes[byte] ^= 1 << bit;
        prop_assert!(sidecar::decode(&bytes).is_err());
    }
}

#[test]
fn feature_count_is_twenty_five() {
    assert_eq!(FEATURE_COUNT, 25);
}
