use std::f64::consts::PI;

use ndarray::Array2;
use num_complex::Complex;

use crate::catalog::InjectedSource;
use crate::consts::{MAX_FFT_STAMP_SIZE, MIN_FFT_STAMP_SIZE, PROFILE_EXTENT_HLR, PROFILE_OVERSAMPLE};
use crate::exposure::Subimage;
use crate::fft::{fft2d, frequency, ifft2d};
use crate::geometry::PixelBounds;
use crate::profile::{EllipseShape, SersicProfile};

use super::{radius_pixels, Stamp, StampRenderer};

/// Draws a flux-normalized delta or sheared Sersic profile at the center of
/// an auto-sized square grid, convolves it with the PSF patch and shifts it to
/// the source's subpixel offset in Fourier space.
pub struct ConvolutionRenderer;

impl ConvolutionRenderer {
    /// Power-of-two grid size holding the PSF and profile wings.
    pub fn stamp_size(half_extent: usize) -> usize {
        (2 * half_extent + 1)
            .next_power_of_two()
            .clamp(MIN_FFT_STAMP_SIZE, MAX_FFT_STAMP_SIZE)
    }
}

impl StampRenderer for ConvolutionRenderer {
    fn name(&self) -> &'static str {
        "convolution"
    }

    fn render(&self, source: &InjectedSource, tim: &Subimage) -> Option<Stamp> {
        let (x, y) = tim.wcs.radec_to_pixel(source.ra, source.dec)?;
        let flux = source.flux_in(&tim.band);

        let profile = if source.is_point_source() {
            None
        } else {
            let shape = EllipseShape::from_shear(
                radius_pixels(source, tim),
                source.shape_e1,
                source.shape_e2,
            );
            Some(SersicProfile::new(source.sersic, shape))
        };
        let extent = profile.map_or(0, |p| (PROFILE_EXTENT_HLR * p.shape.a).ceil() as usize);
        let n = Self::stamp_size(tim.psf.half_width() + extent);
        let center = (n / 2) as i64;

        let (xint, yint) = (x.floor() as i64, y.floor() as i64);
        let bounds = PixelBounds::new(
            xint - center,
            xint - center + n as i64 - 1,
            yint - center,
            yint - center + n as i64 - 1,
        );
        if bounds.intersect(&tim.bounds()).is_empty() {
            return None;
        }

        let grid = match profile {
            None => {
                let mut grid = Array2::<f64>::zeros((n, n));
                grid[[center as usize, center as usize]] = flux;
                grid
            }
            Some(profile) => {
                let grid_bounds = PixelBounds::from_origin(0, 0, n, n);
                profile.render(flux, center as f64, center as f64, &grid_bounds, PROFILE_OVERSAMPLE)
            }
        };

        // PSF patch wrapped so that its center sits at the origin.
        let patch = tim.psf.patch();
        let hw = (patch.nrows() / 2) as i64;
        let mut kernel = Array2::<f64>::zeros((n, n));
        for ((r, c), &v) in patch.indexed_iter() {
            let kr = (r as i64 - hw).rem_euclid(n as i64) as usize;
            let kc = (c as i64 - hw).rem_euclid(n as i64) as usize;
            kernel[[kr, kc]] += v;
        }

        let (dx, dy) = (x - xint as f64, y - yint as f64);
        let mut spectrum = fft2d(&grid);
        let kernel_spectrum = fft2d(&kernel);
        for ((r, c), value) in spectrum.indexed_iter_mut() {
            let phase = -2.0 * PI * (frequency(c, n) * dx + frequency(r, n) * dy);
            *value *= kernel_spectrum[[r, c]] * Complex::from_polar(1.0, phase);
        }

        Some(Stamp {
            bounds,
            image: ifft2d(&spectrum),
        })
    }
}
