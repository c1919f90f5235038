use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, ValueEnum};
use montebrick_core::config::SimConfig;
use montebrick_core::inject::NoiseMode;
use montebrick_core::orchestrator::run_brick;
use montebrick_core::pipeline::SyntheticPipeline;
use montebrick_core::stamp::RenderStrategy;

use crate::summary::{print_outcome, print_run_summary};

#[derive(Clone, Copy, ValueEnum)]
pub enum StrategyArg {
    TractorModel,
    Convolution,
}

impl From<StrategyArg> for RenderStrategy {
    fn from(arg: StrategyArg) -> Self {
        match arg {
            StrategyArg::TractorModel => RenderStrategy::TractorModel,
            StrategyArg::Convolution => RenderStrategy::Convolution,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
pub enum NoiseArg {
    None,
    Gaussian,
    Poisson,
}

impl From<NoiseArg> for NoiseMode {
    fn from(arg: NoiseArg) -> Self {
        match arg {
            NoiseArg::None => NoiseMode::None,
            NoiseArg::Gaussian => NoiseMode::Gaussian,
            NoiseArg::Poisson => NoiseMode::Poisson,
        }
    }
}

#[derive(Args)]
pub struct RunArgs {
    /// Brick to process
    #[arg(long)]
    pub brick: Option<String>,

    /// Run config file (TOML)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Candidate catalog (CSV)
    #[arg(long)]
    pub injected_fn: Option<PathBuf>,

    /// Output directory
    #[arg(short, long)]
    pub output_dir: Option<PathBuf>,

    /// Candidate file id
    #[arg(long)]
    pub fileid: Option<u32>,

    /// First candidate row of the brick to inject
    #[arg(long)]
    pub rowstart: Option<usize>,

    /// Number of candidate rows to inject
    #[arg(long)]
    pub nobj: Option<usize>,

    /// Pass id; above zero retries the previous pass's collided sources
    #[arg(long)]
    pub skipid: Option<u32>,

    /// Seed of the per-source noise seeds
    #[arg(long)]
    pub seed: Option<u64>,

    /// Collision radius in arcsec (<= 0 disables)
    #[arg(long, allow_hyphen_values = true)]
    pub col_radius: Option<f64>,

    /// Stamp rendering strategy
    #[arg(long, value_enum)]
    pub strategy: Option<StrategyArg>,

    /// Noise added to injected sources
    #[arg(long, value_enum)]
    pub noise: Option<NoiseArg>,

    /// Replace the image by the injected model
    #[arg(long)]
    pub image_eq_model: bool,

    /// Only reduce blobs touching an injected source
    #[arg(long)]
    pub sim_blobs: bool,

    /// Recompute even if the injected catalog exists
    #[arg(long)]
    pub force: bool,

    /// Reproduce the environment recorded in this version header
    #[arg(long)]
    pub env_header: Option<PathBuf>,
}

/// Config file (or defaults) with the command-line overrides applied.
pub fn load_config(args: &RunArgs) -> Result<SimConfig> {
    let config = if let Some(ref config_path) = args.config {
        let contents = std::fs::read_to_string(config_path)
            .with_context(|| format!("Failed to read config {}", config_path.display()))?;
        toml::from_str(&contents).context("Invalid run config")?
    } else {
        SimConfig::default()
    };
    Ok(apply_overrides(config, args))
}

/// Per-brick log under the pass's `logs/` directory.
pub fn default_log_file(config: &SimConfig) -> Option<PathBuf> {
    (!config.brickname.is_empty()).then(|| config.layout().log(&config.brickname))
}

pub fn run(config: &SimConfig) -> Result<()> {
    print_run_summary(config);

    let pipeline = SyntheticPipeline::new(config.synthetic.clone());
    let outcome = run_brick(config, &pipeline)
        .with_context(|| format!("Injection pass failed for brick {}", config.brickname))?;
    // Nothing to do is a clean completion.
    print_outcome(&outcome);
    Ok(())
}

fn apply_overrides(mut config: SimConfig, args: &RunArgs) -> SimConfig {
    if let Some(ref brick) = args.brick {
        config.brickname = brick.clone();
    }
    if let Some(ref path) = args.injected_fn {
        config.injected_fn = Some(path.clone());
    }
    if let Some(ref dir) = args.output_dir {
        config.output_dir = dir.clone();
    }
    if let Some(ref path) = args.env_header {
        config.env_header = Some(path.clone());
    }

    let selection = &mut config.selection;
    if let Some(fileid) = args.fileid {
        selection.fileid = fileid;
    }
    if let Some(rowstart) = args.rowstart {
        selection.rowstart = rowstart;
    }
    if args.nobj.is_some() {
        selection.nobj = args.nobj;
    }
    if let Some(skipid) = args.skipid {
        selection.skipid = skipid;
    }
    if args.seed.is_some() {
        selection.seed = args.seed;
    }
    if let Some(radius) = args.col_radius {
        selection.col_radius_arcsec = radius;
    }

    let injection = &mut config.injection;
    if let Some(strategy) = args.strategy {
        injection.strategy = strategy.into();
    }
    if let Some(noise) = args.noise {
        injection.noise = noise.into();
    }
    injection.image_eq_model |= args.image_eq_model;

    config.sim_blobs |= args.sim_blobs;
    config.force |= args.force;
    config
}
