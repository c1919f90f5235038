//! Rendering of one source into a pixel stamp of one exposure subimage.

mod convolution;
mod model;

use ndarray::{s, Array2, ArrayView2};
use serde::{Deserialize, Serialize};

use crate::catalog::InjectedSource;
use crate::exposure::Subimage;
use crate::geometry::PixelBounds;

pub use convolution::ConvolutionRenderer;
pub use model::ModelRenderer;

/// Noiseless flux patch in nanomaggies, positioned in the subimage's local
/// pixel frame.
#[derive(Clone, Debug)]
pub struct Stamp {
    pub bounds: PixelBounds,
    pub image: Array2<f64>,
}

impl Stamp {
    pub fn sum(&self) -> f64 {
        self.image.sum()
    }

    /// View of the stamp restricted to `region`, which must lie within the
    /// stamp bounds.
    pub fn view(&self, region: &PixelBounds) -> ArrayView2<'_, f64> {
        let r0 = (region.ymin - self.bounds.ymin) as usize;
        let c0 = (region.xmin - self.bounds.xmin) as usize;
        self.image
            .slice(s![r0..r0 + region.height(), c0..c0 + region.width()])
    }
}

/// Strategy turning a source into a stamp for one subimage.
pub trait StampRenderer {
    fn name(&self) -> &'static str;

    /// Render `source` in the subimage's band. `None` when no stamp pixel can
    /// overlap the subimage.
    fn render(&self, source: &InjectedSource, tim: &Subimage) -> Option<Stamp>;
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RenderStrategy {
    /// Analytic model evaluated over a fixed window.
    #[default]
    TractorModel,
    /// Profile convolved with the PSF in Fourier space on an auto-sized stamp.
    #[serde(alias = "convolution-model")]
    Convolution,
}

impl RenderStrategy {
    pub fn renderer(self, stamp_size: usize) -> Box<dyn StampRenderer> {
        match self {
            RenderStrategy::TractorModel => Box::new(ModelRenderer::new(stamp_size)),
            RenderStrategy::Convolution => Box::new(ConvolutionRenderer),
        }
    }
}

impl std::fmt::Display for RenderStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RenderStrategy::TractorModel => write!(f, "tractor-model"),
            RenderStrategy::Convolution => write!(f, "convolution"),
        }
    }
}

/// Half-light radius in pixels of a source whose `shape_r` is in arcsec.
fn radius_pixels(source: &InjectedSource, tim: &Subimage) -> f64 {
    source.shape_r / tim.wcs.pixel_scale()
}
