use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::consts::{DEFAULT_COLLISION_RADIUS_ARCSEC, DEFAULT_MATCH_RADIUS_ARCSEC, DEFAULT_STAMP_SIZE};
use crate::error::{MonteBrickError, Result};
use crate::inject::NoiseMode;
use crate::layout::OutputLayout;
use crate::pipeline::SyntheticConfig;
use crate::simid::SimId;
use crate::stamp::RenderStrategy;

/// Everything one injection pass over one brick needs.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    pub brickname: String,
    pub output_dir: PathBuf,
    /// Candidate catalog. Without one (and at pass 0) the brick is reduced
    /// with nothing injected.
    pub injected_fn: Option<PathBuf>,
    /// Version header of a previous run whose environment should be
    /// reproduced.
    pub env_header: Option<PathBuf>,
    /// Restrict the reduction to blobs touching an injected source.
    pub sim_blobs: bool,
    /// Recompute even if the injected catalog already exists.
    pub force: bool,
    /// Radius (arcsec) for matching fitted sources back to injected rows.
    pub match_radius_arcsec: f64,
    pub selection: SelectionConfig,
    pub injection: InjectionConfig,
    pub synthetic: SyntheticConfig,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            brickname: String::new(),
            output_dir: PathBuf::from("."),
            injected_fn: None,
            env_header: None,
            sim_blobs: false,
            force: false,
            match_radius_arcsec: DEFAULT_MATCH_RADIUS_ARCSEC,
            selection: SelectionConfig::default(),
            injection: InjectionConfig::default(),
            synthetic: SyntheticConfig::default(),
        }
    }
}

/// Which candidate rows a pass works on.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SelectionConfig {
    pub fileid: u32,
    /// First row of the brick's candidates to use.
    pub rowstart: usize,
    /// Number of rows from `rowstart`; all remaining rows when unset.
    pub nobj: Option<usize>,
    /// Pass id. Above zero, the previous pass's collided rows are retried.
    pub skipid: u32,
    /// Seed of the per-source seed stream.
    pub seed: Option<u64>,
    /// Collision radius (arcsec); non-positive disables collision checks.
    pub col_radius_arcsec: f64,
}

impl Default for SelectionConfig {
    fn default() -> Self {
        Self {
            fileid: 0,
            rowstart: 0,
            nobj: None,
            skipid: 0,
            seed: None,
            col_radius_arcsec: DEFAULT_COLLISION_RADIUS_ARCSEC,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InjectionConfig {
    pub strategy: RenderStrategy,
    pub noise: NoiseMode,
    /// Replace the image by the injected model and its variance.
    pub image_eq_model: bool,
    /// Side length of model-renderer stamps.
    pub stamp_size: usize,
}

impl Default for InjectionConfig {
    fn default() -> Self {
        Self {
            strategy: RenderStrategy::default(),
            noise: NoiseMode::default(),
            image_eq_model: false,
            stamp_size: DEFAULT_STAMP_SIZE,
        }
    }
}

impl SimConfig {
    pub fn simid(&self) -> SimId {
        SimId::new(self.selection.fileid, self.selection.rowstart, self.selection.skipid)
    }

    pub fn layout(&self) -> OutputLayout {
        OutputLayout::new(&self.output_dir, self.simid())
    }

    pub fn validate(&self) -> Result<()> {
        if self.brickname.is_empty() {
            return Err(MonteBrickError::Config("brickname is required".to_string()));
        }
        if self.injection.stamp_size == 0 {
            return Err(MonteBrickError::Config("stamp_size must be positive".to_string()));
        }
        if self.match_radius_arcsec.is_nan() || self.match_radius_arcsec <= 0.0 {
            return Err(MonteBrickError::Config(format!(
                "match_radius_arcsec must be positive, got {}",
                self.match_radius_arcsec
            )));
        }
        if let Some(path) = &self.injected_fn {
            check_file(path)?;
        }
        if let Some(path) = &self.env_header {
            check_file(path)?;
        }
        Ok(())
    }
}

fn check_file(path: &Path) -> Result<()> {
    if path.is_file() {
        Ok(())
    } else {
        Err(MonteBrickError::Config(format!("{} does not exist", path.display())))
    }
}
