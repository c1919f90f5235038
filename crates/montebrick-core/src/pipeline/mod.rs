//! Contract with the reduction pipeline run over each brick.

pub mod detection;
pub mod fit;
pub mod synthetic;

use std::path::PathBuf;

use crate::catalog::FittedSource;
use crate::error::Result;
use crate::exposure::Subimage;
use crate::header::Header;

pub use synthetic::{DependencyConfig, ExposureConfig, SyntheticConfig, SyntheticPipeline};

/// Extension points the pipeline calls back into while reducing a brick.
pub trait SubimageHook {
    /// Called once per exposure subimage after it is read and before any
    /// detection or fitting.
    fn on_subimage(&self, tim: &mut Subimage) -> Result<()>;

    /// Amend the pipeline's version header before outputs are written.
    fn on_version_header(&self, header: Header) -> Header {
        header
    }
}

/// One brick to reduce.
#[derive(Clone, Debug)]
pub struct BrickRequest {
    pub brickname: String,
    /// Where the fitted catalog is written.
    pub tractor_path: PathBuf,
    /// Restrict fitting to blobs containing one of these (ra, dec).
    pub blob_radec: Option<Vec<(f64, f64)>>,
}

#[derive(Clone, Debug)]
pub struct BrickOutput {
    pub sources: Vec<FittedSource>,
    pub version_header: Header,
}

pub trait ReductionPipeline {
    fn run_brick(&self, request: &BrickRequest, hook: &dyn SubimageHook) -> Result<BrickOutput>;
}
