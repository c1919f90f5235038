//! Persisted list of runs to (re)submit: one brick, pass and set of stage
//! versions per line.
//!
//! ```text
//! # brick fileid rowstart skipid stage[:module=version,...] ...
//! 1500p020 0 0 0 fitblobs:legacypipe=DR9.6.5 writecat:legacypipe=DR9.6.9
//! ```

use std::fmt;
use std::fs::{self, File};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;
use std::str::FromStr;

use tracing::{debug, info, warn};

use crate::error::{MonteBrickError, Result};
use crate::layout::{scan_injected, OutputLayout};
use crate::simid::SimId;
use crate::versions::{HeaderVersions, ModuleVersions, Stage};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RunDescriptor {
    pub brickname: String,
    pub simid: SimId,
    /// Stages to run up to, each with the module versions it needs.
    pub stages: Vec<(Stage, ModuleVersions)>,
}

impl RunDescriptor {
    fn parse(line: &str, lineno: usize) -> Result<Self> {
        let invalid = |reason: String| MonteBrickError::InvalidRunList { line: lineno, reason };
        let tokens: Vec<&str> = line.split_whitespace().collect();
        if tokens.len() < 4 {
            return Err(invalid(format!("expected at least 4 fields, got {}", tokens.len())));
        }
        let simid = SimId::new(
            parse_field(&tokens, 1, lineno)?,
            parse_field(&tokens, 2, lineno)?,
            parse_field(&tokens, 3, lineno)?,
        );

        let mut stages = Vec::new();
        for &token in &tokens[4..] {
            let (name, modules) = token.split_once(':').unwrap_or((token, ""));
            let stage: Stage = name.parse().map_err(|_| invalid(format!("unknown stage {name}")))?;
            let mut versions = ModuleVersions::new();
            for pair in modules.split(',').filter(|p| !p.is_empty()) {
                let (module, version) = pair
                    .split_once('=')
                    .ok_or_else(|| invalid(format!("expected module=version, got {pair}")))?;
                versions.insert(module.to_string(), version.to_string());
            }
            stages.push((stage, versions));
        }
        Ok(Self {
            brickname: tokens[0].to_string(),
            simid,
            stages,
        })
    }
}

fn parse_field<T: FromStr>(tokens: &[&str], i: usize, lineno: usize) -> Result<T> {
    tokens[i].parse().map_err(|_| MonteBrickError::InvalidRunList {
        line: lineno,
        reason: format!("field {} is not an integer in range: {}", i + 1, tokens[i]),
    })
}

impl fmt::Display for RunDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {} {}",
            self.brickname, self.simid.fileid, self.simid.rowstart, self.simid.skipid
        )?;
        for (stage, versions) in &self.stages {
            write!(f, " {stage}")?;
            for (i, (module, version)) in versions.iter().enumerate() {
                let sep = if i == 0 { ':' } else { ',' };
                write!(f, "{sep}{module}={version}")?;
            }
        }
        Ok(())
    }
}

/// Ordered run descriptors without duplicates.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RunCatalog {
    runs: Vec<RunDescriptor>,
}

impl RunCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `run` unless an identical descriptor is already listed.
    /// Returns whether it was added.
    pub fn push(&mut self, run: RunDescriptor) -> bool {
        if self.runs.contains(&run) {
            return false;
        }
        self.runs.push(run);
        true
    }

    pub fn runs(&self) -> &[RunDescriptor] {
        &self.runs
    }

    pub fn len(&self) -> usize {
        self.runs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.runs.is_empty()
    }

    pub fn read(path: &Path) -> Result<Self> {
        let reader = BufReader::new(File::open(path)?);
        let mut catalog = Self::new();
        for (i, line) in reader.lines().enumerate() {
            let line = line?;
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            if !catalog.push(RunDescriptor::parse(line, i + 1)?) {
                debug!(line = i + 1, "Dropping duplicate run");
            }
        }
        Ok(catalog)
    }

    pub fn write(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut out = BufWriter::new(File::create(path)?);
        writeln!(out, "# brick fileid rowstart skipid stage[:module=version,...]")?;
        for run in &self.runs {
            writeln!(out, "{run}")?;
        }
        out.flush()?;
        Ok(())
    }

    /// One run per injected catalog found under `output_dir`, with the
    /// versions of `modules` recorded in its header. Catalogs written
    /// without version cards (passes with nothing to inject) are skipped.
    pub fn from_output_dir(output_dir: &Path, modules: &[&str]) -> Result<Self> {
        let mut catalog = Self::new();
        for (brickname, simid) in scan_injected(output_dir)? {
            let path = OutputLayout::new(output_dir, simid).injected(&brickname);
            let versions = HeaderVersions::read(&path)?;
            let stages = match versions.stage_versions(modules) {
                Ok(stages) => stages,
                Err(MonteBrickError::VersionNotFound { module, stage }) => {
                    warn!(path = %path.display(), module, stage, "Skipping catalog without versions");
                    continue;
                }
                Err(e) => return Err(e),
            };
            catalog.push(RunDescriptor {
                brickname,
                simid,
                stages,
            });
        }
        info!(nruns = catalog.len(), output_dir = %output_dir.display(), "Built run list");
        Ok(catalog)
    }
}
