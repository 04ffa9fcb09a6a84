//! Auralis CLI - offline mastering and fingerprinting.

mod commands;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "auralis")]
#[command(author, version, about = "Auralis adaptive mastering engine", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Master an audio file to WAV with a preset
    Master(commands::master::MasterArgs),

    /// Compute or refresh 25-dimensional fingerprints
    Fingerprint(commands::fingerprint::FingerprintArgs),

    /// Show decode and chunk-plan information for a file
    Probe(commands::probe::ProbeArgs),
}

fn main() -> anyhow::Result<()> {
    use tracing_subscriber::EnvFilter;

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "warn".into()))
        .init();

    let cli = Cli::parse();

    tracing::debug!(command = ?std::mem::discriminant(&cli.command), "dispatching command");

    match cli.command {
        Commands::Master(args) => commands::master::run(args),
        Commands::Fingerprint(args) => commands::fingerprint::run(args),
        Commands::Probe(args) => commands::probe::run(args),
    }
}
