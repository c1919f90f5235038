//! Pixel-integrated circular Gaussian point-spread function.

use ndarray::Array2;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::consts::{PARALLEL_PIXEL_THRESHOLD, PSF_PATCH_NSIGMA};
use crate::geometry::PixelBounds;

const FRAC_1_SQRT_2PI: f64 = 0.398_942_280_401_432_7;

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct GaussianPsf {
    /// Standard deviation in pixels.
    pub sigma: f64,
}

impl GaussianPsf {
    pub fn new(sigma: f64) -> Self {
        Self { sigma }
    }

    pub fn fwhm(&self) -> f64 {
        2.0 * (2.0 * std::f64::consts::LN_2).sqrt() * self.sigma
    }

    /// Half-width in pixels of the patch returned by [`GaussianPsf::patch`].
    pub fn half_width(&self) -> usize {
        (PSF_PATCH_NSIGMA * self.sigma).ceil().max(1.0) as usize
    }

    /// Fraction of a unit-flux profile centered at `center` falling in each of
    /// the `n` pixels starting at `start`.
    pub fn pixel_weights(&self, center: f64, start: i64, n: usize) -> Vec<f64> {
        let scale = std::f64::consts::SQRT_2 * self.sigma;
        (0..n)
            .map(|i| {
                let p = (start + i as i64) as f64 - center;
                0.5 * (erf((p + 0.5) / scale) - erf((p - 0.5) / scale))
            })
            .collect()
    }

    /// Derivative of [`GaussianPsf::pixel_weights`] with respect to `center`.
    pub fn pixel_weight_derivatives(&self, center: f64, start: i64, n: usize) -> Vec<f64> {
        let s2 = 2.0 * self.sigma * self.sigma;
        let norm = FRAC_1_SQRT_2PI / self.sigma;
        (0..n)
            .map(|i| {
                let p = (start + i as i64) as f64 - center;
                let hi = p + 0.5;
                let lo = p - 0.5;
                -norm * ((-hi * hi / s2).exp() - (-lo * lo / s2).exp())
            })
            .collect()
    }

    /// Unit-flux PSF centered at `(x, y)`, evaluated over `bounds`.
    pub fn render(&self, x: f64, y: f64, bounds: &PixelBounds) -> Array2<f64> {
        let wx = self.pixel_weights(x, bounds.xmin, bounds.width());
        let wy = self.pixel_weights(y, bounds.ymin, bounds.height());
        Array2::from_shape_fn((wy.len(), wx.len()), |(r, c)| wy[r] * wx[c])
    }

    /// Centered, unit-sum PSF image of odd size `2 * half_width + 1`.
    pub fn patch(&self) -> Array2<f64> {
        let hw = self.half_width() as i64;
        let bounds = PixelBounds::new(-hw, hw, -hw, hw);
        let mut patch = self.render(0.0, 0.0, &bounds);
        let sum = patch.sum();
        if sum > 0.0 {
            patch.mapv_inplace(|v| v / sum);
        }
        patch
    }

    /// Convolve an image with the PSF (separable, zero outside the image).
    pub fn convolve(&self, data: &Array2<f64>) -> Array2<f64> {
        let hw = self.half_width() as i64;
        let kernel = self.pixel_weights(0.0, -hw, (2 * hw + 1) as usize);
        let rows = convolve_rows(data, &kernel);
        convolve_rows(&rows.t().to_owned(), &kernel).t().to_owned()
    }
}

fn convolve_row(src: &[f64], kernel: &[f64], out: &mut [f64]) {
    let radius = (kernel.len() / 2) as isize;
    let w = src.len() as isize;
    for (col, o) in out.iter_mut().enumerate() {
        let mut sum = 0.0;
        for (ki, &kv) in kernel.iter().enumerate() {
            let src_col = col as isize + ki as isize - radius;
            if src_col >= 0 && src_col < w {
                sum += src[src_col as usize] * kv;
            }
        }
        *o = sum;
    }
}

fn convolve_rows(data: &Array2<f64>, kernel: &[f64]) -> Array2<f64> {
    let (h, w) = data.dim();
    let mut result = Array2::<f64>::zeros((h, w));
    if h * w >= PARALLEL_PIXEL_THRESHOLD {
        let rows: Vec<Vec<f64>> = (0..h)
            .into_par_iter()
            .map(|r| {
                let src = data.row(r).to_vec();
                let mut row = vec![0.0; w];
                convolve_row(&src, kernel, &mut row);
                row
            })
            .collect();
        for (r, row) in rows.into_iter().enumerate() {
            for (c, v) in row.into_iter().enumerate() {
                result[[r, c]] = v;
            }
        }
    } else {
        let mut row = vec![0.0; w];
        for (r, src) in data.outer_iter().enumerate() {
            let src = src.to_vec();
            convolve_row(&src, kernel, &mut row);
            for (c, &v) in row.iter().enumerate() {
                result[[r, c]] = v;
            }
        }
    }
    result
}

// ---------------------------------------------------------------------------
// Error function: Abramowitz & Stegun 7.1.26 (|error| < 1.5e-7)
// ---------------------------------------------------------------------------

pub fn erf(x: f64) -> f64 {
    let t = 1.0 / (1.0 + 0.327_591_1 * x.abs());
    let poly = t
        * (0.254_829_592
            + t * (-0.284_496_736 + t * (1.421_413_741 + t * (-1.453_152_027 + t * 1.061_405_429))));
    let y = 1.0 - poly * (-x * x).exp();
    if x < 0.0 {
        -y
    } else {
        y
    }
}
