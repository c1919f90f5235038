mod commands;
mod summary;

use std::fs::File;
use std::path::Path;
use std::sync::Mutex;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "montebrick", about = "Monte-Carlo source injection and recovery")]
#[command(version)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Write the log to this file (`run` defaults to the brick's log)
    #[arg(long, global = true)]
    log_file: Option<std::path::PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one injection pass over a brick
    Run(commands::run::RunArgs),
    /// Print or save the default configuration
    Config(commands::config::ConfigArgs),
    /// Show the environment recorded in a version header
    Env(commands::env::EnvArgs),
    /// Build a run list from an output directory
    Runlist(commands::runlist::RunlistArgs),
    /// Show the contents of a catalog file
    Info(commands::info::InfoArgs),
}

fn init_logging(verbose: bool, log_file: Option<&Path>) -> Result<()> {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };
    match log_file {
        Some(path) => {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("Failed to create {}", parent.display()))?;
            }
            let file = File::create(path)
                .with_context(|| format!("Failed to create log file {}", path.display()))?;
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_ansi(false)
                .with_writer(Mutex::new(file))
                .init();
        }
        None => tracing_subscriber::fmt().with_env_filter(filter).init(),
    }
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let log_file = cli.log_file.as_deref();

    match &cli.command {
        Commands::Run(args) => {
            let config = commands::run::load_config(args)?;
            let brick_log = commands::run::default_log_file(&config);
            init_logging(cli.verbose, log_file.or(brick_log.as_deref()))?;
            commands::run::run(&config)
        }
        Commands::Config(args) => {
            init_logging(cli.verbose, log_file)?;
            commands::config::run(args)
        }
        Commands::Env(args) => {
            init_logging(cli.verbose, log_file)?;
            commands::env::run(args)
        }
        Commands::Runlist(args) => {
            init_logging(cli.verbose, log_file)?;
            commands::runlist::run(args)
        }
        Commands::Info(args) => {
            init_logging(cli.verbose, log_file)?;
            commands::info::run(args)
        }
    }
}
