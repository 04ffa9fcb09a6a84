//! Fingerprint extraction and sidecar maintenance.

use std::path::PathBuf;

use auralis_analysis::{CancelToken, FingerprintAnalyzer, load_valid_sidecar, save_sidecar};
use auralis_core::FEATURE_NAMES;
use auralis_io::decode_file;
use clap::Args;
use indicatif::{ProgressBar, ProgressStyle};

#[derive(Args)]
pub struct FingerprintArgs {
    /// Audio files to fingerprint
    #[arg(value_name = "FILES", required = true)]
    files: Vec<PathBuf>,

    /// Recompute even when a valid sidecar exists
    #[arg(long)]
    force: bool,

    /// Print all 25 features per file
    #[arg(long)]
    verbose: bool,
}

pub fn run(args: FingerprintArgs) -> anyhow::Result<()> {
    let bar = ProgressBar::new(args.files.len() as u64);
    bar.set_style(ProgressStyle::with_template("{bar:30} {pos}/{len} {msg}").expect("template"));

    let analyzer = FingerprintAnalyzer::new();
    let cancel = CancelToken::new();
    let mut failures = 0usize;

    for path in &args.files {
        bar.set_message(path.display().to_string());

        let cached = if args.force { None } else { load_valid_sidecar(path) };
        let fingerprint = match cached {
            Some(fp) => {
                bar.println(format!("{}: sidecar valid, skipping", path.display()));
                Some(fp)
            }
            None => match decode_file(path)
                .map_err(anyhow::Error::from)
                .and_then(|audio| {
                    analyzer
                        .analyze(&audio.samples, audio.sample_rate, &cancel)
                        .map_err(anyhow::Error::from)
                }) {
                Ok(fp) => {
                    save_sidecar(path, &fp)?;
                    bar.println(format!("{}: fingerprinted", path.display()));
                    Some(fp)
                }
                Err(err) => {
                    // A bad file must not abort the whole scan.
                    bar.println(format!("{}: FAILED ({err})", path.display()));
                    failures += 1;
                    None
                }
            },
        };

        if args.verbose
            && let Some(fp) = fingerprint
        {
            for (name, value) in FEATURE_NAMES.iter().zip(fp.as_array().iter()) {
                bar.println(format!("  {name:>24}: {value:.3}"));
            }
        }
        bar.inc(1);
    }
    bar.finish_and_clear();

    if failures > 0 {
        anyhow::bail!("{failures} of {} files failed", args.files.len());
    }
    Ok(())
}
