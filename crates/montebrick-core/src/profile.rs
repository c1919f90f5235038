//! Elliptical Sersic surface-brightness profiles.

use ndarray::Array2;

use crate::geometry::PixelBounds;

/// Elliptical isophote: half-light semi-major axis `a` (pixels), axis ratio
/// `q` in (0, 1], position angle `phi` (radians, from the +x axis).
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct EllipseShape {
    pub a: f64,
    pub q: f64,
    pub phi: f64,
}

impl EllipseShape {
    pub fn circular(radius: f64) -> Self {
        Self {
            a: radius,
            q: 1.0,
            phi: 0.0,
        }
    }

    /// Soft-ellipticity parameterization: `ln r` of the semi-major axis and two
    /// unbounded components squashed by `tanh` into an ellipticity below one.
    pub fn from_soft(log_r: f64, ee1: f64, ee2: f64) -> Self {
        let ee = ee1.hypot(ee2);
        let e = ee.tanh();
        Self {
            a: log_r.exp(),
            q: axis_ratio(e),
            phi: 0.5 * ee2.atan2(ee1),
        }
    }

    /// Reduced-shear parameterization. Shearing preserves area, so the
    /// semi-major axis grows as the axis ratio drops.
    pub fn from_shear(half_light_radius: f64, g1: f64, g2: f64) -> Self {
        let g = g1.hypot(g2).min(0.99);
        let q = axis_ratio(g);
        Self {
            a: half_light_radius / q.sqrt(),
            q,
            phi: 0.5 * g2.atan2(g1),
        }
    }

    /// Squared elliptical radius of offset `(dx, dy)` in units of `a`.
    pub fn radius_sq(&self, dx: f64, dy: f64) -> f64 {
        let (s, c) = self.phi.sin_cos();
        let u = (dx * c + dy * s) / self.a;
        let v = (-dx * s + dy * c) / (self.a * self.q);
        u * u + v * v
    }
}

fn axis_ratio(e: f64) -> f64 {
    let e = e.clamp(0.0, 0.99);
    (1.0 - e) / (1.0 + e)
}

/// Sersic `b_n` such that the half-light radius encloses half the flux.
pub fn sersic_b(n: f64) -> f64 {
    if n > 0.36 {
        // Ciotti & Bertin (1999) asymptotic expansion
        2.0 * n - 1.0 / 3.0 + 4.0 / (405.0 * n) + 46.0 / (25515.0 * n * n)
            + 131.0 / (1_148_175.0 * n * n * n)
    } else {
        // MacArthur, Courteau & Holtzman (2003) low-n fit
        0.01945 - 0.8902 * n + 10.95 * n * n - 19.67 * n.powi(3) + 13.43 * n.powi(4)
    }
}

#[derive(Clone, Copy, Debug)]
pub struct SersicProfile {
    pub index: f64,
    pub shape: EllipseShape,
    b: f64,
}

impl SersicProfile {
    pub fn new(index: f64, shape: EllipseShape) -> Self {
        Self {
            index,
            shape,
            b: sersic_b(index),
        }
    }

    /// Unnormalized surface brightness, 1 at the center.
    pub fn value(&self, dx: f64, dy: f64) -> f64 {
        let r = self.shape.radius_sq(dx, dy).sqrt();
        (-self.b * r.powf(1.0 / self.index)).exp()
    }

    /// Integral of [`SersicProfile::value`] over the whole plane.
    pub fn total(&self) -> f64 {
        let n = self.index;
        let a = self.shape.a;
        let log_integral = ln_gamma(2.0 * n) - 2.0 * n * self.b.ln();
        2.0 * std::f64::consts::PI * n * a * a * self.shape.q * log_integral.exp()
    }

    /// Pixel-integrated image of a profile carrying `flux` in total, centered
    /// at `(xc, yc)`, over `bounds`. Flux beyond the bounds is lost.
    pub fn render(
        &self,
        flux: f64,
        xc: f64,
        yc: f64,
        bounds: &PixelBounds,
        oversample: usize,
    ) -> Array2<f64> {
        let os = oversample.max(1);
        let step = 1.0 / os as f64;
        let norm = flux / self.total() / (os * os) as f64;
        Array2::from_shape_fn((bounds.height(), bounds.width()), |(r, c)| {
            let px = (bounds.xmin + c as i64) as f64;
            let py = (bounds.ymin + r as i64) as f64;
            let mut sum = 0.0;
            for j in 0..os {
                let dy = py - 0.5 + (j as f64 + 0.5) * step - yc;
                for i in 0..os {
                    let dx = px - 0.5 + (i as f64 + 0.5) * step - xc;
                    sum += self.value(dx, dy);
                }
            }
            sum * norm
        })
    }
}

// ---------------------------------------------------------------------------
// Log-gamma: Lanczos approximation (g = 7, 9 terms)
// ---------------------------------------------------------------------------

const LANCZOS_G: f64 = 7.0;
const LANCZOS_COEFFS: [f64; 9] = [
    0.999_999_999_999_809_9,
    676.520_368_121_885_1,
    -1_259.139_216_722_402_8,
    771.323_428_777_653_1,
    -176.615_029_162_140_6,
    12.507_343_278_686_905,
    -0.138_571_095_265_720_12,
    9.984_369_578_019_572e-6,
    1.505_632_735_149_311_6e-7,
];

pub fn ln_gamma(x: f64) -> f64 {
    if x < 0.5 {
        // Reflection formula
        let pi = std::f64::consts::PI;
        return (pi / (pi * x).sin()).ln() - ln_gamma(1.0 - x);
    }
    let x = x - 1.0;
    let mut acc = LANCZOS_COEFFS[0];
    for (i, &c) in LANCZOS_COEFFS.iter().enumerate().skip(1) {
        acc += c / (x + i as f64);
    }
    let t = x + LANCZOS_G + 0.5;
    0.5 * (2.0 * std::f64::consts::PI).ln() + (x + 0.5) * t.ln() - t + acc.ln()
}
