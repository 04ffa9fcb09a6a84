//! Decode and chunk-plan inspection.

use std::path::PathBuf;

use auralis_config::EngineConfig;
use auralis_io::{decode_file, plan_chunks};
use clap::Args;

#[derive(Args)]
pub struct ProbeArgs {
    /// Audio file to inspect
    #[arg(value_name = "INPUT")]
    input: PathBuf,

    /// Engine config TOML for the chunk plan
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Print every chunk descriptor
    #[arg(long)]
    chunks: bool,
}

pub fn run(args: ProbeArgs) -> anyhow::Result<()> {
    let config = match &args.config {
        Some(path) => EngineConfig::load(path)?,
        None => EngineConfig::default(),
    };

    let audio = decode_file(&args.input)?;
    println!("{}", args.input.display());
    println!("  sample rate : {} Hz", audio.sample_rate);
    println!("  channels    : {}", audio.channels);
    println!("  frames      : {}", audio.total_samples());
    println!("  duration    : {:.3} s", audio.duration_seconds());
    println!("  peak        : {:.1} dBFS", auralis_core::linear_to_db(audio.samples.peak()));

    let plan = plan_chunks(
        audio.total_samples(),
        audio.sample_rate,
        config.chunk_seconds,
        config.overlap_seconds,
    )?;
    println!(
        "  plan        : {} chunk(s) of {} s, {} s overlap",
        plan.len(),
        config.chunk_seconds,
        config.overlap_seconds
    );
    if args.chunks {
        for d in &plan {
            println!(
                "    #{:<4} [{:>12}, {:>12})  {} samples",
                d.chunk_index,
                d.start_sample,
                d.end_sample,
                d.len()
            );
        }
    }
    Ok(())
}
