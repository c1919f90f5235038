use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use montebrick_core::runlist::RunCatalog;
use montebrick_core::versions::{HARNESS_MODULE, PIPELINE_MODULE};

#[derive(Args)]
pub struct RunlistArgs {
    /// Output directory of earlier passes
    pub output_dir: PathBuf,

    /// Write the run list to a file instead of stdout
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Merge with an existing run list, keeping its entries first
    #[arg(long)]
    pub merge: Option<PathBuf>,

    /// Modules whose versions distinguish runs
    #[arg(long, value_delimiter = ',', default_values_t = [PIPELINE_MODULE.to_string(), HARNESS_MODULE.to_string()])]
    pub modules: Vec<String>,
}

pub fn run(args: &RunlistArgs) -> Result<()> {
    let modules: Vec<&str> = args.modules.iter().map(String::as_str).collect();
    let found = RunCatalog::from_output_dir(&args.output_dir, &modules)
        .with_context(|| format!("Failed to scan {}", args.output_dir.display()))?;

    let mut runs = match args.merge {
        Some(ref path) => RunCatalog::read(path)
            .with_context(|| format!("Failed to read run list {}", path.display()))?,
        None => RunCatalog::new(),
    };
    for run in found.runs() {
        runs.push(run.clone());
    }

    if let Some(ref path) = args.output {
        runs.write(path)
            .with_context(|| format!("Failed to write run list to {}", path.display()))?;
        println!("{} runs saved to {}", runs.len(), path.display());
    } else {
        for run in runs.runs() {
            println!("{run}");
        }
    }
    Ok(())
}
