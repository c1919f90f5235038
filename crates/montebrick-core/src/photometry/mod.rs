//! Conversion of injected flux (nanomaggies) to detector electrons.
//!
//! `nano2e = zpscale * g`, where `zpscale` converts nanomaggies to image
//! units and `g` converts image units to electrons: an amplifier gain for
//! cameras whose images are in ADU, the exposure time for cameras whose images
//! are in electrons per second.

mod cameras;

use ndarray::Array2;

use crate::consts::NANOMAGGY_ZEROPOINT;
use crate::error::{MonteBrickError, Result};
use crate::exposure::Subimage;
use crate::geometry::PixelBounds;

pub use cameras::{Decam, DecamPlusNoise, ExposureTimeCamera, MegaPrime, Ptf};

/// Image units per nanomaggy for a zero-point `zpt`.
pub fn zpscale(zpt: f64) -> f64 {
    10f64.powf((zpt - NANOMAGGY_ZEROPOINT) / 2.5)
}

/// Per-camera-family conversion from image units to electrons.
pub trait SimCamera: Sync {
    fn name(&self) -> &'static str;

    /// Electrons per image unit for each absolute one-indexed CCD column.
    fn gain_columns(&self, tim: &Subimage, columns: &[i64]) -> Result<Vec<f64>>;
}

static CAMERAS: &[(&str, &dyn SimCamera)] = &[
    ("decam", &Decam),
    ("decam+noise", &DecamPlusNoise),
    ("mosaic", &ExposureTimeCamera),
    ("mosaic3", &ExposureTimeCamera),
    ("90prime", &ExposureTimeCamera),
    ("ptf", &Ptf),
    ("megaprime", &MegaPrime),
];

/// Names of all supported camera families.
pub fn camera_names() -> impl Iterator<Item = &'static str> {
    CAMERAS.iter().map(|(name, _)| *name)
}

/// Look up the camera family implementation by camera name.
pub fn camera_for(name: &str) -> Result<&'static dyn SimCamera> {
    CAMERAS
        .iter()
        .find(|(n, _)| n.eq_ignore_ascii_case(name.trim()))
        .map(|(_, camera)| *camera)
        .ok_or_else(|| MonteBrickError::UnknownCamera(name.to_string()))
}

/// Nanomaggies-to-electrons factor for every pixel of `region`, given in the
/// subimage's local zero-indexed pixel frame. Shape is `(height, width)` of
/// the region.
pub fn nano_to_electrons(tim: &Subimage, region: &PixelBounds) -> Result<Array2<f64>> {
    let camera = camera_for(&tim.camera)?;
    let columns: Vec<i64> = (region.xmin..=region.xmax)
        .map(|x| tim.x0 + x + 1)
        .collect();
    let gains = camera.gain_columns(tim, &columns)?;
    let scale = zpscale(tim.zpt);
    Ok(Array2::from_shape_fn(
        (region.height(), region.width()),
        |(_, c)| scale * gains[c],
    ))
}
