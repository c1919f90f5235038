use crate::catalog::InjectedSource;
use crate::consts::PROFILE_OVERSAMPLE;
use crate::exposure::Subimage;
use crate::geometry::PixelBounds;
use crate::profile::{EllipseShape, SersicProfile};

use super::{radius_pixels, Stamp, StampRenderer};

/// Evaluates the analytic source model over a square window centered on the
/// rounded source position, clipped at the subimage edges.
pub struct ModelRenderer {
    stamp_size: usize,
}

impl ModelRenderer {
    pub fn new(stamp_size: usize) -> Self {
        Self {
            stamp_size: stamp_size.max(1),
        }
    }

    fn window(&self, x: f64, y: f64, tim: &Subimage) -> PixelBounds {
        let low = (self.stamp_size / 2) as i64;
        let high = (self.stamp_size - self.stamp_size / 2) as i64;
        let (xc, yc) = (x.round() as i64, y.round() as i64);
        PixelBounds::new(xc - low, xc + high - 1, yc - low, yc + high - 1).intersect(&tim.bounds())
    }
}

impl StampRenderer for ModelRenderer {
    fn name(&self) -> &'static str {
        "tractor-model"
    }

    fn render(&self, source: &InjectedSource, tim: &Subimage) -> Option<Stamp> {
        let (x, y) = tim.wcs.radec_to_pixel(source.ra, source.dec)?;
        let bounds = self.window(x, y, tim);
        if bounds.is_empty() {
            return None;
        }
        let flux = source.flux_in(&tim.band);

        let image = if source.is_point_source() {
            let mut image = tim.psf.render(x, y, &bounds);
            image.mapv_inplace(|v| v * flux);
            image
        } else {
            let shape = EllipseShape::from_soft(
                radius_pixels(source, tim).ln(),
                source.shape_e1,
                source.shape_e2,
            );
            let profile = SersicProfile::new(source.sersic, shape);
            let galaxy = profile.render(flux, x, y, &bounds, PROFILE_OVERSAMPLE);
            tim.psf.convolve(&galaxy)
        };
        Some(Stamp { bounds, image })
    }
}
