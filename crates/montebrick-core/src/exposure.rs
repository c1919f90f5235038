use ndarray::Array2;

use crate::geometry::{PixelBounds, TanWcs};
use crate::header::Header;
use crate::psf::GaussianPsf;

/// One exposure subimage as handed to the injection hook: pixel data and
/// inverse variance in nanomaggies, data-quality mask, and the calibration
/// needed to render and convert injected flux.
#[derive(Clone, Debug)]
pub struct Subimage {
    /// Camera family name, e.g. `decam`.
    pub camera: String,
    pub ccdname: String,
    pub band: String,
    /// Zero-indexed column of this subimage's first pixel on the full CCD.
    pub x0: i64,
    /// Zero-indexed row of this subimage's first pixel on the full CCD.
    pub y0: i64,
    /// Full CCD width in pixels.
    pub ccd_width: usize,
    pub ccd_height: usize,
    /// Photometric zero-point (magnitudes for one image unit per exposure).
    pub zpt: f64,
    /// Exposure time in seconds.
    pub exptime: f64,
    /// Primary header of the exposure (amplifier gains, CCD sections).
    pub header: Header,
    /// World coordinates of this subimage (pixel 0 is its first pixel).
    pub wcs: TanWcs,
    pub psf: GaussianPsf,
    pub data: Array2<f32>,
    pub invvar: Array2<f32>,
    pub dq: Array2<u16>,
    /// Injected flux only, set by the injection hook.
    pub sims_image: Option<Array2<f32>>,
    /// Inverse error of the injected flux only, set by the injection hook.
    pub sims_inverr: Option<Array2<f32>>,
}

impl Subimage {
    pub fn width(&self) -> usize {
        self.data.ncols()
    }

    pub fn height(&self) -> usize {
        self.data.nrows()
    }

    /// Local pixel bounds of the subimage.
    pub fn bounds(&self) -> PixelBounds {
        PixelBounds::from_origin(0, 0, self.height(), self.width())
    }
}
