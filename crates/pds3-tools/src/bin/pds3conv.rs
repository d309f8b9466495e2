use std::fs;
use std::path::PathBuf;
use std::process;

use anyhow::Context;
use clap::Parser;
use env_logger::{Builder, Env};
use log::{error, info};
use pds3_pure::ConvertOptions;
use pds3_tools::{convert_to_folder, FileStatus};
use rayon::prelude::*;

#[derive(Parser)]
#[command(
    name = "pds3conv",
    about = "Convert PDS3 image products to an 8-bit PNG and a JSON label"
)]
struct Args {
    /// Label files to convert
    #[arg(required = true)]
    labels: Vec<PathBuf>,

    /// Directory receiving <stem>.png and <stem>.json
    #[arg(short, long, default_value = ".")]
    output: PathBuf,

    /// Convert again even if both outputs already exist
    #[arg(short, long)]
    force: bool,

    /// Drop label statements using this unit (repeatable; default degC)
    #[arg(long = "disallow-unit", value_name = "UNIT")]
    disallow_units: Vec<String>,

    /// Required extension of detached image files
    #[arg(long, default_value = ".IMG")]
    extension: String,

    /// Divisor applied to every sample before the 8-bit cast
    #[arg(long, default_value_t = 16)]
    divisor: u32,

    /// Worker threads (defaults to the number of CPUs)
    #[arg(short, long)]
    jobs: Option<usize>,
}

fn main() -> anyhow::Result<()> {
    Builder::from_env(Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    if let Some(jobs) = args.jobs {
        rayon::ThreadPoolBuilder::new()
            .num_threads(jobs)
            .build_global()?;
    }
    fs::create_dir_all(&args.output)
        .with_context(|| format!("creating {}", args.output.display()))?;

    let mut options = ConvertOptions {
        image_extension: args.extension,
        sample_divisor: args.divisor,
        ..ConvertOptions::default()
    };
    if !args.disallow_units.is_empty() {
        options.disallowed_units = args.disallow_units;
    }

    let results: Vec<_> = args
        .labels
        .par_iter()
        .map(|label| (label, convert_to_folder(label, &args.output, &options, args.force)))
        .collect();

    let (mut converted, mut existing, mut skipped, mut failed) = (0, 0, 0, 0);
    for (label, result) in results {
        match result {
            Ok(FileStatus::Converted) => converted += 1,
            Ok(FileStatus::AlreadyConverted) => existing += 1,
            Ok(FileStatus::Skipped(_)) => skipped += 1,
            Err(e) => {
                error!("{}: {e:#}", label.display());
                failed += 1;
            }
        }
    }
    info!("converted {converted}, already present {existing}, skipped {skipped}, failed {failed}");

    if failed > 0 {
        process::exit(1);
    }
    Ok(())
}
