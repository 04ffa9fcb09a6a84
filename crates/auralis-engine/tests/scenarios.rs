//! End-to-end render scenarios over real files.

use std::f32::consts::PI;
use std::sync::Arc;

use auralis_config::PresetResolver;
use auralis_core::{StereoBuffer, db_to_linear};
use auralis_engine::{RenderConfig, TrackRenderer};
use auralis_io::write_wav;
use tempfile::TempDir;

fn write_sine(
    dir: &TempDir,
    name: &str,
    freq: f32,
    amp: f32,
    seconds: f64,
    sample_rate: u32,
) -> std::path::PathBuf {
    let frames = (seconds * f64::from(sample_rate)) as usize;
    let v: Vec<f32> = (0..frames)
        .map(|i| amp * (2.0 * PI * freq * i as f32 / sample_rate as f32).sin())
        .collect();
    let path = dir.path().join(name);
    write_wav(&path, &StereoBuffer::from_mono(v), sample_rate).unwrap();
    path
}

fn render(path: &std::path::Path, preset: &str, intensity: f32) -> StereoBuffer {
    let config = RenderConfig {
        preset: preset.into(),
        intensity,
        ..RenderConfig::default()
    };
    TrackRenderer::open(path, config, None, Arc::new(PresetResolver::new()), None)
        .unwrap()
        .render_all()
        .unwrap()
}

/// S2: 25 s stereo 1 kHz sine at -6 dBFS, 44.1 kHz, preset `gentle`
/// at 0.5, 10 s chunks with 0.1 s overlap.
#[test]
fn chunk_boundary_continuity() {
    let dir = TempDir::new().unwrap();
    let path = write_sine(&dir, "s2.wav", 1000.0, 0.5, 25.0, 44100);

    let config = RenderConfig {
        preset: "gentle".into(),
        intensity: 0.5,
        ..RenderConfig::default()
    };
    let mut renderer =
        TrackRenderer::open(&path, config, None, Arc::new(PresetResolver::new()), None).unwrap();

    // Three descriptors covering [0, 441000), [441000, 882000),
    // [882000, 1102500).
    let plan = renderer.plan().to_vec();
    assert_eq!(plan.len(), 3);
    assert_eq!(plan[2].end_sample, 1_102_500);

    let out = renderer.render_all().unwrap();

    // Output length within one sample of the input.
    assert!((out.frames() as i64 - 1_102_500).unsigned_abs() <= 1);

    // No sample above the -0.3 dBTP ceiling, no NaN/Inf.
    let ceiling = db_to_linear(-0.3);
    for s in out.left.iter().chain(out.right.iter()) {
        assert!(s.is_finite());
        assert!(s.abs() <= ceiling + 1e-4);
    }

    // No audible discontinuity at the chunk boundaries: per-sample step
    // near each seam stays small relative to the local RMS.
    let local_rms = out.slice(430_000, 450_000).rms();
    for boundary in [441_000usize, 882_000] {
        for i in boundary.saturating_sub(200)..boundary + 200 {
            let step = (out.left[i] - out.left[i - 1]).abs();
            // A 1 kHz sine at 44.1 kHz moves at most ~14% of its
            // amplitude per sample; anything well beyond that is a seam
            // click.
            assert!(
                step <= 0.25 * local_rms.max(0.05) * 2.0_f32.sqrt() * 2.0,
                "discontinuity at {i}: step {step}"
            );
        }
    }
}

/// Universal invariant 3: the full render preserves length, finiteness
/// and the ceiling for a bank of inputs.
#[test]
fn render_invariants_across_inputs() {
    let dir = TempDir::new().unwrap();
    let cases = [
        ("tiny.wav", 60.0, 0.9, 0.01, 8000u32),
        ("short.wav", 440.0, 1.0, 2.5, 22050),
        ("hot.wav", 90.0, 1.0, 12.0, 44100),
    ];
    for (name, freq, amp, seconds, sr) in cases {
        let path = write_sine(&dir, name, freq, amp, seconds, sr);
        let out = render(&path, "warm", 0.8);
        let expected = (seconds * f64::from(sr)) as i64;
        assert!(
            (out.frames() as i64 - expected).unsigned_abs() <= 1,
            "{name}: {} vs {expected}",
            out.frames()
        );
        let ceiling = db_to_linear(-0.3);
        for s in out.left.iter().chain(out.right.iter()) {
            assert!(s.is_finite(), "{name}: non-finite output");
            assert!(s.abs() <= ceiling + 1e-4, "{name}: over ceiling");
        }
    }
}

/// Universal invariant 4: the pipeline is deterministic end to end.
#[test]
fn full_pipeline_is_deterministic() {
    let dir = TempDir::new().unwrap();
    let path = write_sine(&dir, "det.wav", 333.0, 0.7, 15.0, 44100);
    let a = render(&path, "adaptive", 0.8);
    let b = render(&path, "adaptive", 0.8);
    assert_eq!(a, b, "two renders of the same input must be byte-identical");
}

/// One-sample audio renders successfully (boundary behavior).
#[test]
fn one_sample_track_renders() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("one.wav");
    write_wav(&path, &StereoBuffer::from_mono(vec![0.5]), 48000).unwrap();
    let out = render(&path, "gentle", 0.5);
    assert_eq!(out.frames(), 1);
    assert!(out.left[0].is_finite());
}

/// Durations straddling exact chunk multiples produce the expected
/// chunk counts.
#[test]
fn chunk_count_boundaries() {
    let dir = TempDir::new().unwrap();
    let sr = 44100u32;
    let chunk_frames = 441_000u64;

    for (frames, expected_chunks) in [
        (chunk_frames, 1usize),
        (chunk_frames - 1, 1),
        (chunk_frames + 1, 2),
        (chunk_frames + 4410, 2),
    ] {
        let path = dir.path().join(format!("b{frames}.wav"));
        let v = vec![0.1f32; frames as usize];
        write_wav(&path, &StereoBuffer::from_mono(v), sr).unwrap();

        let renderer = TrackRenderer::open(
            &path,
            RenderConfig::default(),
            None,
            Arc::new(PresetResolver::new()),
            None,
        )
        .unwrap();
        assert_eq!(
            renderer.plan().len(),
            expected_chunks,
            "frames {frames}: plan {:?}",
            renderer.plan()
        );
    }
}
