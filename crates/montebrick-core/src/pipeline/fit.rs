//! Weighted least-squares fitting of a pixel-integrated PSF model.

use ndarray::Array2;

use crate::consts::{FIT_HALF_WIDTH, FIT_ITERATIONS};
use crate::geometry::PixelBounds;
use crate::psf::GaussianPsf;

/// Result of a point-source fit, in the image's pixel frame.
#[derive(Clone, Debug, PartialEq)]
pub struct PsfFit {
    pub x: f64,
    pub y: f64,
    pub flux: f64,
    /// Covariance of (x, y, flux).
    pub covariance: [[f64; 3]; 3],
}

fn fit_window(row: usize, col: usize, dim: (usize, usize)) -> PixelBounds {
    let hw = FIT_HALF_WIDTH as i64;
    let (r, c) = (row as i64, col as i64);
    PixelBounds::new(c - hw, c + hw, r - hw, r + hw).intersect(&PixelBounds::from_origin(0, 0, dim.0, dim.1))
}

/// Fit position and flux of a point source starting from the peak pixel
/// `(row, col)`. Gauss-Newton on a window around the peak; steps are capped
/// at one pixel. `None` when the window has no weight or the normal matrix is
/// singular.
pub fn fit_point_source(
    data: &Array2<f32>,
    invvar: &Array2<f32>,
    psf: &GaussianPsf,
    peak: (usize, usize),
) -> Option<PsfFit> {
    let window = fit_window(peak.0, peak.1, data.dim());
    let mut x = peak.1 as f64;
    let mut y = peak.0 as f64;
    let (mut flux, _) = forced_flux(data, invvar, psf, x, y, &window);

    let mut fisher = [[0.0; 3]; 3];
    for _ in 0..FIT_ITERATIONS {
        let wx = psf.pixel_weights(x, window.xmin, window.width());
        let wy = psf.pixel_weights(y, window.ymin, window.height());
        let dwx = psf.pixel_weight_derivatives(x, window.xmin, window.width());
        let dwy = psf.pixel_weight_derivatives(y, window.ymin, window.height());

        fisher = [[0.0; 3]; 3];
        let mut gradient = [0.0; 3];
        for (j, yy) in (window.ymin..=window.ymax).enumerate() {
            for (i, xx) in (window.xmin..=window.xmax).enumerate() {
                let (r, c) = (yy as usize, xx as usize);
                let w = f64::from(invvar[[r, c]]);
                if !(w.is_finite() && w > 0.0) {
                    continue;
                }
                let model = wx[i] * wy[j];
                let jac = [flux * dwx[i] * wy[j], flux * wx[i] * dwy[j], model];
                let resid = f64::from(data[[r, c]]) - flux * model;
                for a in 0..3 {
                    gradient[a] += w * jac[a] * resid;
                    for b in 0..3 {
                        fisher[a][b] += w * jac[a] * jac[b];
                    }
                }
            }
        }

        let step = solve3(&fisher, &gradient)?;
        x += step[0].clamp(-1.0, 1.0);
        y += step[1].clamp(-1.0, 1.0);
        flux += step[2];
        if step.iter().all(|s| s.abs() < 1e-8) {
            break;
        }
    }

    Some(PsfFit {
        x,
        y,
        flux,
        covariance: invert3(&fisher)?,
    })
}

/// Linear flux and its inverse variance of a PSF at fixed `(x, y)` over
/// `window`.
pub fn forced_flux(
    data: &Array2<f32>,
    invvar: &Array2<f32>,
    psf: &GaussianPsf,
    x: f64,
    y: f64,
    window: &PixelBounds,
) -> (f64, f64) {
    let model = psf.render(x, y, window);
    let (mut num, mut den) = (0.0, 0.0);
    for ((j, i), &p) in model.indexed_iter() {
        let (r, c) = ((window.ymin + j as i64) as usize, (window.xmin + i as i64) as usize);
        let w = f64::from(invvar[[r, c]]);
        if w.is_finite() && w > 0.0 {
            num += w * p * f64::from(data[[r, c]]);
            den += w * p * p;
        }
    }
    if den > 0.0 {
        (num / den, den)
    } else {
        (0.0, 0.0)
    }
}

/// [`forced_flux`] on the standard fitting window around `(x, y)`.
pub fn forced_flux_at(data: &Array2<f32>, invvar: &Array2<f32>, psf: &GaussianPsf, x: f64, y: f64) -> (f64, f64) {
    let (row, col) = (y.round().max(0.0) as usize, x.round().max(0.0) as usize);
    let window = fit_window(row, col, data.dim());
    if window.is_empty() {
        return (0.0, 0.0);
    }
    forced_flux(data, invvar, psf, x, y, &window)
}

fn det3(m: &[[f64; 3]; 3]) -> f64 {
    m[0][0] * (m[1][1] * m[2][2] - m[1][2] * m[2][1]) - m[0][1] * (m[1][0] * m[2][2] - m[1][2] * m[2][0])
        + m[0][2] * (m[1][0] * m[2][1] - m[1][1] * m[2][0])
}

fn invert3(m: &[[f64; 3]; 3]) -> Option<[[f64; 3]; 3]> {
    let det = det3(m);
    if det.abs() < f64::MIN_POSITIVE || !det.is_finite() {
        return None;
    }
    let mut inv = [[0.0; 3]; 3];
    for (r, row) in inv.iter_mut().enumerate() {
        for (c, v) in row.iter_mut().enumerate() {
            // Cofactor of (c, r): transpose of the cofactor matrix.
            let (r1, r2) = ((c + 1) % 3, (c + 2) % 3);
            let (c1, c2) = ((r + 1) % 3, (r + 2) % 3);
            *v = (m[r1][c1] * m[r2][c2] - m[r1][c2] * m[r2][c1]) / det;
        }
    }
    Some(inv)
}

fn solve3(m: &[[f64; 3]; 3], b: &[f64; 3]) -> Option<[f64; 3]> {
    let inv = invert3(m)?;
    let mut x = [0.0; 3];
    for (r, xr) in x.iter_mut().enumerate() {
        *xr = (0..3).map(|c| inv[r][c] * b[c]).sum();
    }
    Some(x)
}
