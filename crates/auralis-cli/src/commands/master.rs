//! Offline mastering: decode, fingerprint, render, write.

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::Ordering;

use anyhow::Context;
use auralis_analysis::{CancelToken, FingerprintAnalyzer, load_valid_sidecar, save_sidecar};
use auralis_config::{EngineConfig, PresetResolver};
use auralis_engine::{RenderConfig, TrackRenderer};
use auralis_io::{decode_file, write_wav};
use clap::Args;
use indicatif::{ProgressBar, ProgressStyle};

#[derive(Args)]
pub struct MasterArgs {
    /// Input audio file (WAV, FLAC, MP3, OGG, ...)
    #[arg(value_name = "INPUT")]
    input: PathBuf,

    /// Output WAV file
    #[arg(value_name = "OUTPUT")]
    output: PathBuf,

    /// Mastering preset
    #[arg(short, long, default_value = "adaptive")]
    preset: String,

    /// Mastering intensity, 0.0 - 1.0
    #[arg(short, long, default_value = "0.5")]
    intensity: f32,

    /// Engine config TOML (defaults apply when omitted)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Skip fingerprinting and master with the neutral profile
    #[arg(long)]
    no_fingerprint: bool,
}

pub fn run(args: MasterArgs) -> anyhow::Result<()> {
    let engine_config = match &args.config {
        Some(path) => EngineConfig::load(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => EngineConfig::default(),
    };

    // Fingerprint first (sidecar-aware) so `adaptive` has something to
    // adapt to. Extraction failure falls back to the neutral profile
    // rather than blocking the render.
    let fingerprint = if args.no_fingerprint {
        None
    } else if let Some(fp) = load_valid_sidecar(&args.input) {
        println!("Fingerprint: loaded from sidecar");
        Some(fp)
    } else {
        println!("Fingerprint: analyzing {}...", args.input.display());
        let audio = decode_file(&args.input)?;
        match FingerprintAnalyzer::new().analyze(
            &audio.samples,
            audio.sample_rate,
            &CancelToken::new(),
        ) {
            Ok(fp) => {
                if let Err(err) = save_sidecar(&args.input, &fp) {
                    eprintln!("warning: could not write sidecar: {err}");
                }
                Some(fp)
            }
            Err(err) => {
                eprintln!("warning: fingerprint extraction failed ({err}), using neutral profile");
                None
            }
        }
    };

    let render_config = RenderConfig::from_engine(&engine_config, args.preset.clone(), args.intensity);
    let mut renderer = TrackRenderer::open(
        &args.input,
        render_config,
        fingerprint,
        Arc::new(PresetResolver::new()),
        None,
    )?;

    let total = renderer.total_samples();
    let sample_rate = renderer.sample_rate();
    println!(
        "Mastering {} ({} samples @ {} Hz) with '{}' at {:.2}",
        args.input.display(),
        total,
        sample_rate,
        args.preset,
        args.intensity
    );

    // Ctrl-C cancels at the next chunk boundary.
    let cancel = renderer.cancel_handle();
    let ctrlc_cancel = Arc::clone(&cancel);
    let _ = ctrlc::set_handler(move || {
        ctrlc_cancel.store(true, Ordering::Relaxed);
    });

    let bar = ProgressBar::new(total);
    bar.set_style(
        ProgressStyle::with_template("{bar:40} {pos}/{len} samples {msg}")
            .expect("valid progress template"),
    );

    let mut rendered = auralis_core::StereoBuffer::default();
    loop {
        let block = renderer.next_frames((sample_rate as usize) * 2)?;
        if block.is_empty() {
            break;
        }
        rendered.extend(&block);
        bar.set_position(renderer.position_samples());
    }
    bar.finish_and_clear();

    if cancel.load(Ordering::Relaxed) {
        anyhow::bail!("cancelled after {} samples", rendered.frames());
    }

    write_wav(&args.output, &rendered, sample_rate)
        .with_context(|| format!("writing {}", args.output.display()))?;
    println!(
        "Wrote {} ({} samples, peak {:.1} dBFS)",
        args.output.display(),
        rendered.frames(),
        auralis_core::linear_to_db(rendered.peak())
    );
    Ok(())
}
