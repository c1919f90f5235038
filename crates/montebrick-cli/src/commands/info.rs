use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use montebrick_core::catalog::read_catalog;

#[derive(Args)]
pub struct InfoArgs {
    /// Catalog file (CSV)
    pub file: PathBuf,

    /// Also print the header cards
    #[arg(long)]
    pub header: bool,
}

pub fn run(args: &InfoArgs) -> Result<()> {
    let catalog = read_catalog(&args.file)
        .with_context(|| format!("Failed to read catalog {}", args.file.display()))?;
    let n_fitted = catalog.sources.iter().filter(|s| s.fit.is_some()).count();

    println!("File:        {}", args.file.display());
    println!("Sources:     {}", catalog.len());
    println!("Bands:       {}", catalog.bands().join(","));
    println!("Collided:    {}", catalog.n_collided());
    println!("Recovered:   {}", n_fitted);
    if let Some(prodtype) = catalog.header.get("PRODTYPE") {
        println!("Product:     {}", prodtype);
    }

    if args.header {
        println!();
        for card in catalog.header.cards() {
            match card.comment {
                Some(ref comment) => println!("{:<8} = {} / {}", card.key, card.value, comment),
                None => println!("{:<8} = {}", card.key, card.value),
            }
        }
    }

    Ok(())
}
