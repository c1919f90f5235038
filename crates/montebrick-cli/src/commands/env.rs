use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use montebrick_core::versions::{
    match_image, module_search_path, EnvironmentManager, HeaderVersions, Stage, PIPELINE_MODULE,
};

#[derive(Args)]
pub struct EnvArgs {
    /// Catalog whose version header records the run
    pub header: PathBuf,

    /// Stage whose versions to resolve
    #[arg(long, default_value = "writecat")]
    pub stage: String,

    /// Directory holding one `<module>_<version>` directory per module
    #[arg(long)]
    pub module_dir: Option<PathBuf>,

    /// Modules to pin on the search path
    #[arg(long, value_delimiter = ',', default_value = "legacypipe")]
    pub modules: Vec<String>,
}

pub fn run(args: &EnvArgs) -> Result<()> {
    let versions = HeaderVersions::read(&args.header)
        .with_context(|| format!("Failed to read header of {}", args.header.display()))?;
    let stage: Stage = args.stage.parse()?;

    let pipeline = versions.module_version(PIPELINE_MODULE, stage)?;
    println!("Stage:       {stage}");
    println!("Pipeline:    {pipeline}");
    match match_image(&versions, stage) {
        Ok(image) => println!("Image:       {image}"),
        Err(e) => println!("Image:       none ({e})"),
    }

    let mut env = EnvironmentManager::from_header(&versions);
    env.check_environ().context("Recorded environment is not usable")?;
    if env.environ().is_empty() {
        println!("Environment: nothing recorded");
    } else {
        println!("Environment:");
        for (name, value) in env.environ() {
            println!("  {name}={value}");
        }
    }

    if let Some(ref module_dir) = args.module_dir {
        let pinned = args
            .modules
            .iter()
            .map(|m| Ok((m.clone(), versions.module_version(m, stage)?)))
            .collect::<Result<Vec<_>>>()?;
        let inherited = std::env::var("PYTHONPATH").ok();
        let paths = module_search_path(module_dir, &pinned, inherited.as_deref())?;
        println!("Module path:");
        for path in paths {
            println!("  {}", path.display());
        }
    }

    Ok(())
}
