//! Sky and pixel geometry: gnomonic (TAN) world coordinates, integer pixel
//! bounds and great-circle separations.
//!
//! Pixel coordinates are zero-indexed throughout the crate: pixel `(col, row)`
//! covers `[col - 0.5, col + 0.5) x [row - 0.5, row + 0.5)`.

use serde::{Deserialize, Serialize};

use crate::consts::ARCSEC_PER_DEGREE;

/// Tangent-plane projection with a linear CD matrix (degrees per pixel).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TanWcs {
    /// Reference sky position (ra, dec) in degrees.
    pub crval: (f64, f64),
    /// Zero-indexed pixel position (x, y) of the reference sky position.
    pub crpix: (f64, f64),
    /// CD matrix `[[cd1_1, cd1_2], [cd2_1, cd2_2]]`.
    pub cd: [[f64; 2]; 2],
}

impl TanWcs {
    /// North-up, east-left projection with square pixels of `pixel_scale` arcsec.
    pub fn simple(ra: f64, dec: f64, crpix: (f64, f64), pixel_scale: f64) -> Self {
        let scale = pixel_scale / ARCSEC_PER_DEGREE;
        Self {
            crval: (ra, dec),
            crpix,
            cd: [[-scale, 0.0], [0.0, scale]],
        }
    }

    /// Same projection expressed in the frame of a subimage whose origin is
    /// pixel `(x0, y0)` of this one.
    pub fn shifted(&self, x0: f64, y0: f64) -> Self {
        Self {
            crval: self.crval,
            crpix: (self.crpix.0 - x0, self.crpix.1 - y0),
            cd: self.cd,
        }
    }

    /// Mean pixel scale in arcsec/pixel.
    pub fn pixel_scale(&self) -> f64 {
        let det = self.cd[0][0] * self.cd[1][1] - self.cd[0][1] * self.cd[1][0];
        det.abs().sqrt() * ARCSEC_PER_DEGREE
    }

    /// Project `(ra, dec)` to pixel `(x, y)`. `None` for positions on the far
    /// hemisphere.
    pub fn radec_to_pixel(&self, ra: f64, dec: f64) -> Option<(f64, f64)> {
        let (ra0, dec0) = (self.crval.0.to_radians(), self.crval.1.to_radians());
        let (ra, dec) = (ra.to_radians(), dec.to_radians());
        let dra = ra - ra0;
        let cos_c = dec0.sin() * dec.sin() + dec0.cos() * dec.cos() * dra.cos();
        if cos_c <= 0.0 {
            return None;
        }
        let xi = (dec.cos() * dra.sin() / cos_c).to_degrees();
        let eta = ((dec0.cos() * dec.sin() - dec0.sin() * dec.cos() * dra.cos()) / cos_c)
            .to_degrees();

        let [[a, b], [c, d]] = self.cd;
        let det = a * d - b * c;
        if det == 0.0 {
            return None;
        }
        let dx = (d * xi - b * eta) / det;
        let dy = (-c * xi + a * eta) / det;
        Some((self.crpix.0 + dx, self.crpix.1 + dy))
    }

    /// Inverse projection of pixel `(x, y)` to `(ra, dec)` in degrees.
    pub fn pixel_to_radec(&self, x: f64, y: f64) -> (f64, f64) {
        let dx = x - self.crpix.0;
        let dy = y - self.crpix.1;
        let xi = (self.cd[0][0] * dx + self.cd[0][1] * dy).to_radians();
        let eta = (self.cd[1][0] * dx + self.cd[1][1] * dy).to_radians();
        let (ra0, dec0) = (self.crval.0.to_radians(), self.crval.1.to_radians());

        let denom = dec0.cos() - eta * dec0.sin();
        let ra = ra0 + xi.atan2(denom);
        let dec = (dec0.sin() + eta * dec0.cos()).atan2((xi * xi + denom * denom).sqrt());
        (ra.to_degrees().rem_euclid(360.0), dec.to_degrees())
    }
}

/// Inclusive integer pixel bounding box. Empty when `xmin > xmax` or
/// `ymin > ymax`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PixelBounds {
    pub xmin: i64,
    pub xmax: i64,
    pub ymin: i64,
    pub ymax: i64,
}

impl PixelBounds {
    pub fn new(xmin: i64, xmax: i64, ymin: i64, ymax: i64) -> Self {
        Self {
            xmin,
            xmax,
            ymin,
            ymax,
        }
    }

    /// Bounds of an array of shape `(height, width)` whose first pixel sits at
    /// `(x0, y0)`.
    pub fn from_origin(x0: i64, y0: i64, height: usize, width: usize) -> Self {
        Self::new(x0, x0 + width as i64 - 1, y0, y0 + height as i64 - 1)
    }

    pub fn is_empty(&self) -> bool {
        self.xmin > self.xmax || self.ymin > self.ymax
    }

    pub fn width(&self) -> usize {
        if self.is_empty() {
            0
        } else {
            (self.xmax - self.xmin + 1) as usize
        }
    }

    pub fn height(&self) -> usize {
        if self.is_empty() {
            0
        } else {
            (self.ymax - self.ymin + 1) as usize
        }
    }

    pub fn intersect(&self, other: &PixelBounds) -> PixelBounds {
        PixelBounds::new(
            self.xmin.max(other.xmin),
            self.xmax.min(other.xmax),
            self.ymin.max(other.ymin),
            self.ymax.min(other.ymax),
        )
    }

    pub fn contains(&self, x: i64, y: i64) -> bool {
        x >= self.xmin && x <= self.xmax && y >= self.ymin && y <= self.ymax
    }
}

/// Great-circle separation between two sky positions, in degrees (haversine).
pub fn angular_separation(ra1: f64, dec1: f64, ra2: f64, dec2: f64) -> f64 {
    let (d1, d2) = (dec1.to_radians(), dec2.to_radians());
    let ddec = d2 - d1;
    let dra = (ra2 - ra1).to_radians();
    let h = (ddec / 2.0).sin().powi(2) + d1.cos() * d2.cos() * (dra / 2.0).sin().powi(2);
    2.0 * h.sqrt().min(1.0).asin().to_degrees()
}

/// Brick name for a custom brick centered on `(ra, dec)`.
pub fn custom_brickname(ra: f64, dec: f64) -> String {
    format!(
        "custom-{:06}{}{:05}",
        (1000.0 * ra) as i64,
        if dec < 0.0 { 'm' } else { 'p' },
        (1000.0 * dec.abs()) as i64
    )
}
