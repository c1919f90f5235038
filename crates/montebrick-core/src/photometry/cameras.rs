use std::sync::LazyLock;

use regex::Regex;
use tracing::warn;

use crate::consts::DECAM_HALF_WIDTH;
use crate::error::{MonteBrickError, Result};
use crate::exposure::Subimage;

use super::SimCamera;

/// Integers of a `[x0:x1,y0:y1]` section card.
static SECTION_NUMBERS: LazyLock<std::result::Result<Regex, regex::Error>> = LazyLock::new(|| Regex::new(r"\d+"));

/// Two-amplifier CCD in ADU. Amplifier B covers the half of the CCD read out
/// on the far side for north CCDs and the near side for south CCDs.
pub struct Decam;

impl SimCamera for Decam {
    fn name(&self) -> &'static str {
        "decam"
    }

    fn gain_columns(&self, tim: &Subimage, columns: &[i64]) -> Result<Vec<f64>> {
        let gain_a = tim.header.require_f64("GAINA")?;
        let gain_b = tim.header.require_f64("GAINB")?;
        let halfw = (tim.ccd_width / 2) as i64;
        if halfw != DECAM_HALF_WIDTH {
            warn!(
                halfw,
                expected = DECAM_HALF_WIDTH,
                camera = self.name(),
                "Unexpected amplifier half-width, using average of GAINA and GAINB"
            );
            return Ok(vec![0.5 * (gain_a + gain_b); columns.len()]);
        }
        let amp_b: fn(i64, i64) -> bool = if tim.ccdname.starts_with('N') {
            |col, halfw| col > halfw
        } else if tim.ccdname.starts_with('S') {
            |col, halfw| col <= halfw
        } else {
            return Err(MonteBrickError::InvalidCcdName(tim.ccdname.clone()));
        };
        Ok(columns
            .iter()
            .map(|&col| if amp_b(col, halfw) { gain_b } else { gain_a })
            .collect())
    }
}

/// DECam images carrying extra synthetic noise. The gain model for these has
/// not been worked out.
pub struct DecamPlusNoise;

impl SimCamera for DecamPlusNoise {
    fn name(&self) -> &'static str {
        "decam+noise"
    }

    fn gain_columns(&self, _tim: &Subimage, _columns: &[i64]) -> Result<Vec<f64>> {
        Err(MonteBrickError::NotImplemented {
            camera: self.name().to_string(),
            what: "nanomaggies to electrons conversion".to_string(),
        })
    }
}

/// Cameras whose images are in electrons per second.
pub struct ExposureTimeCamera;

impl SimCamera for ExposureTimeCamera {
    fn name(&self) -> &'static str {
        "exptime"
    }

    fn gain_columns(&self, tim: &Subimage, columns: &[i64]) -> Result<Vec<f64>> {
        Ok(vec![tim.exptime; columns.len()])
    }
}

/// Single-gain CCD in ADU.
pub struct Ptf;

impl SimCamera for Ptf {
    fn name(&self) -> &'static str {
        "ptf"
    }

    fn gain_columns(&self, tim: &Subimage, columns: &[i64]) -> Result<Vec<f64>> {
        let gain = tim.header.require_f64("GAIN")?;
        Ok(vec![gain; columns.len()])
    }
}

/// Two-amplifier CCD in ADU; amplifier B spans the column range given by the
/// first two integers of the `CSECB` section card.
pub struct MegaPrime;

impl SimCamera for MegaPrime {
    fn name(&self) -> &'static str {
        "megaprime"
    }

    fn gain_columns(&self, tim: &Subimage, columns: &[i64]) -> Result<Vec<f64>> {
        let gain_a = tim.header.require_f64("GAINA")?;
        let gain_b = tim.header.require_f64("GAINB")?;
        let section = tim.header.require("CSECB")?;
        let limits: Vec<i64> = SECTION_NUMBERS
            .as_ref()
            .map_err(Clone::clone)?
            .find_iter(section)
            .filter_map(|m| m.as_str().parse().ok())
            .collect();
        let (lo, hi) = match limits.as_slice() {
            [lo, hi, ..] => (*lo, *hi),
            _ => {
                return Err(MonteBrickError::InvalidHeaderValue {
                    key: "CSECB".to_string(),
                    value: section.to_string(),
                })
            }
        };
        Ok(columns
            .iter()
            .map(|&col| if (lo..=hi).contains(&col) { gain_b } else { gain_a })
            .collect())
    }
}
