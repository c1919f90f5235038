//! Reference reduction pipeline over simulated blank exposures.
//!
//! Each exposure covers the whole brick with Gaussian sky noise matching its
//! inverse variance. Sources are detected as blobs of the stacked
//! signal-to-noise map and fit as point sources.

use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::Path;

use ndarray::Array2;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rand_distr::{Distribution, Normal};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::catalog::FittedSource;
use crate::consts::{ARCSEC_PER_DEGREE, DEFAULT_BRICK_SIZE, DEFAULT_DETECT_NSIGMA, DEFAULT_PIXEL_SCALE};
use crate::error::{MonteBrickError, Result};
use crate::exposure::Subimage;
use crate::geometry::TanWcs;
use crate::header::Header;
use crate::psf::GaussianPsf;
use crate::versions::{Stage, PIPELINE_VERSION_KEY};

use super::detection::{chi_map, detect_blobs, Blob};
use super::fit::{fit_point_source, forced_flux_at};
use super::{BrickOutput, BrickRequest, ReductionPipeline, SubimageHook};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExposureConfig {
    pub camera: String,
    pub ccdname: String,
    pub band: String,
    pub zpt: f64,
    pub exptime: f64,
    /// PSF standard deviation in pixels.
    pub psf_sigma: f64,
    /// Per-pixel sky noise in nanomaggies.
    pub sky_sigma: f64,
    /// Header gain cards written for the exposure, when set.
    pub gain_a: Option<f64>,
    pub gain_b: Option<f64>,
    pub gain: Option<f64>,
    pub csecb: Option<String>,
    pub ccd_width: usize,
    pub ccd_height: usize,
    /// Position of the brick's first pixel on the CCD.
    pub x0: i64,
    pub y0: i64,
}

impl Default for ExposureConfig {
    fn default() -> Self {
        Self {
            camera: "decam".to_string(),
            ccdname: "N4".to_string(),
            band: "g".to_string(),
            zpt: 25.0,
            exptime: 90.0,
            psf_sigma: 1.8,
            sky_sigma: 0.05,
            gain_a: Some(4.0),
            gain_b: Some(4.2),
            gain: None,
            csecb: None,
            ccd_width: 2046,
            ccd_height: 4094,
            x0: 500,
            y0: 1000,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DependencyConfig {
    pub name: String,
    pub version: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyntheticConfig {
    /// Brick center (degrees).
    pub ra: f64,
    pub dec: f64,
    pub width: usize,
    pub height: usize,
    /// Arcsec per pixel.
    pub pixel_scale: f64,
    pub detect_nsigma: f64,
    /// Seed of the sky noise; exposure `i` uses `noise_seed + i`.
    pub noise_seed: u64,
    pub pipeline_version: String,
    pub dependencies: Vec<DependencyConfig>,
    pub exposures: Vec<ExposureConfig>,
}

impl Default for SyntheticConfig {
    fn default() -> Self {
        Self {
            ra: 150.0,
            dec: 2.0,
            width: DEFAULT_BRICK_SIZE,
            height: DEFAULT_BRICK_SIZE,
            pixel_scale: DEFAULT_PIXEL_SCALE,
            detect_nsigma: DEFAULT_DETECT_NSIGMA,
            noise_seed: 42,
            pipeline_version: "DR9.6.9".to_string(),
            dependencies: vec![
                DependencyConfig {
                    name: "astrometry".to_string(),
                    version: "0.84-15-g48bdcb08".to_string(),
                },
                DependencyConfig {
                    name: "tractor".to_string(),
                    version: "dr9.5".to_string(),
                },
            ],
            exposures: vec![ExposureConfig::default()],
        }
    }
}

impl SyntheticConfig {
    pub fn wcs(&self) -> TanWcs {
        let crpix = ((self.width as f64 - 1.0) / 2.0, (self.height as f64 - 1.0) / 2.0);
        TanWcs::simple(self.ra, self.dec, crpix, self.pixel_scale)
    }
}

pub struct SyntheticPipeline {
    config: SyntheticConfig,
}

impl SyntheticPipeline {
    pub fn new(config: SyntheticConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &SyntheticConfig {
        &self.config
    }

    /// Blank exposure `index`: sky noise only.
    pub fn exposure(&self, index: usize) -> Result<Subimage> {
        let cfg = &self.config;
        let exp = cfg.exposures.get(index).ok_or_else(|| {
            MonteBrickError::Config(format!("no exposure {index} in synthetic configuration"))
        })?;
        if exp.sky_sigma <= 0.0 {
            return Err(MonteBrickError::Config(format!(
                "sky_sigma must be positive, got {}",
                exp.sky_sigma
            )));
        }

        let mut rng = ChaCha8Rng::seed_from_u64(cfg.noise_seed.wrapping_add(index as u64));
        let normal = Normal::new(0.0, exp.sky_sigma)
            .map_err(|e| MonteBrickError::Noise(format!("sky_sigma = {}: {e}", exp.sky_sigma)))?;
        let data = Array2::from_shape_simple_fn((cfg.height, cfg.width), || normal.sample(&mut rng) as f32);
        let invvar = Array2::from_elem((cfg.height, cfg.width), (1.0 / (exp.sky_sigma * exp.sky_sigma)) as f32);

        let mut header = Header::new();
        for (key, value) in [("GAINA", exp.gain_a), ("GAINB", exp.gain_b), ("GAIN", exp.gain)] {
            if let Some(v) = value {
                header.push(key, &v.to_string(), None);
            }
        }
        if let Some(csecb) = &exp.csecb {
            header.push("CSECB", csecb, None);
        }

        Ok(Subimage {
            camera: exp.camera.clone(),
            ccdname: exp.ccdname.clone(),
            band: exp.band.clone(),
            x0: exp.x0,
            y0: exp.y0,
            ccd_width: exp.ccd_width,
            ccd_height: exp.ccd_height,
            zpt: exp.zpt,
            exptime: exp.exptime,
            header,
            wcs: cfg.wcs(),
            psf: GaussianPsf::new(exp.psf_sigma),
            dq: Array2::zeros((cfg.height, cfg.width)),
            data,
            invvar,
            sims_image: None,
            sims_inverr: None,
        })
    }

    fn version_header(&self) -> Header {
        let mut header = Header::new();
        header.push(
            PIPELINE_VERSION_KEY,
            &self.config.pipeline_version,
            Some("pipeline version"),
        );
        for (i, dep) in self.config.dependencies.iter().enumerate() {
            header.push(&format!("DEPNAM{i:02}"), &dep.name, None);
            header.push(&format!("DEPVER{i:02}"), &dep.version, None);
        }
        header
    }

    fn add_stage_version(&self, header: &mut Header, stage: Stage) {
        debug!(stage = %stage, "Running stage");
        header.push(
            &stage.pipeline_key(),
            &self.config.pipeline_version,
            Some(&format!("pipeline version for stage_{}", stage.name())),
        );
    }

    fn fit_blob(&self, blob: &Blob, tims: &[Subimage]) -> Option<FittedSource> {
        let reference = tims.first()?;
        let fit = fit_point_source(&reference.data, &reference.invvar, &reference.psf, blob.peak)?;
        let (ra, dec) = reference.wcs.pixel_to_radec(fit.x, fit.y);

        // Per-band flux at the fitted position, inverse-variance weighted
        // over exposures of the same band.
        let mut sums: BTreeMap<String, (f64, f64)> = BTreeMap::new();
        for tim in tims {
            let Some((x, y)) = tim.wcs.radec_to_pixel(ra, dec) else {
                continue;
            };
            let (flux, ivar) = forced_flux_at(&tim.data, &tim.invvar, &tim.psf, x, y);
            let entry = sums.entry(tim.band.clone()).or_insert((0.0, 0.0));
            entry.0 += flux * ivar;
            entry.1 += ivar;
        }
        let flux = sums
            .iter()
            .map(|(band, &(num, ivar))| (band.clone(), if ivar > 0.0 { num / ivar } else { 0.0 }))
            .collect();
        let flux_ivar = sums.iter().map(|(band, &(_, ivar))| (band.clone(), ivar)).collect();

        let scale = reference.wcs.pixel_scale() / ARCSEC_PER_DEGREE;
        let var_x = fit.covariance[0][0] * scale * scale;
        let var_y = fit.covariance[1][1] * scale * scale;
        let cos_dec = dec.to_radians().cos();
        Some(FittedSource {
            ra,
            dec,
            ra_ivar: if var_x > 0.0 { cos_dec * cos_dec / var_x } else { 0.0 },
            dec_ivar: if var_y > 0.0 { 1.0 / var_y } else { 0.0 },
            model_type: "PSF".to_string(),
            sersic: 0.0,
            shape_r: 0.0,
            flux,
            flux_ivar,
        })
    }
}

impl ReductionPipeline for SyntheticPipeline {
    fn run_brick(&self, request: &BrickRequest, hook: &dyn SubimageHook) -> Result<BrickOutput> {
        info!(
            brick = %request.brickname,
            nexposures = self.config.exposures.len(),
            blobs_restricted = request.blob_radec.is_some(),
            "Running synthetic pipeline"
        );
        if self.config.exposures.is_empty() {
            return Err(MonteBrickError::Pipeline(format!(
                "no exposures overlap brick {}",
                request.brickname
            )));
        }
        let mut header = self.version_header();

        self.add_stage_version(&mut header, Stage::Tims);
        let mut tims = Vec::with_capacity(self.config.exposures.len());
        for index in 0..self.config.exposures.len() {
            let mut tim = self.exposure(index)?;
            hook.on_subimage(&mut tim)?;
            tims.push(tim);
        }
        for stage in [Stage::Refs, Stage::Outliers, Stage::Halos] {
            self.add_stage_version(&mut header, stage);
        }

        self.add_stage_version(&mut header, Stage::Srcs);
        let blobs = match chi_map(tims.iter().map(|t| (&t.data, &t.invvar))) {
            Some(chi) => detect_blobs(&chi, self.config.detect_nsigma),
            None => Vec::new(),
        };
        let blobs: Vec<Blob> = match (&request.blob_radec, tims.first()) {
            (Some(radec), Some(reference)) => {
                let targets: Vec<(usize, usize)> = radec
                    .iter()
                    .filter_map(|&(ra, dec)| reference.wcs.radec_to_pixel(ra, dec))
                    .filter(|&(x, y)| x >= -0.5 && y >= -0.5)
                    .map(|(x, y)| (y.round() as usize, x.round() as usize))
                    .collect();
                blobs
                    .into_iter()
                    .filter(|b| targets.iter().any(|&(r, c)| b.contains(r, c)))
                    .collect()
            }
            _ => blobs,
        };
        info!(nblobs = blobs.len(), "Detected blobs");

        self.add_stage_version(&mut header, Stage::Fitblobs);
        let sources: Vec<FittedSource> = blobs.iter().filter_map(|b| self.fit_blob(b, &tims)).collect();
        info!(nsources = sources.len(), "Fit sources");

        self.add_stage_version(&mut header, Stage::Coadds);
        self.add_stage_version(&mut header, Stage::Writecat);
        let header = hook.on_version_header(header);
        write_tractor(&request.tractor_path, &request.brickname, &header, &sources)?;

        Ok(BrickOutput {
            sources,
            version_header: header,
        })
    }
}

fn write_tractor(path: &Path, brickname: &str, header: &Header, sources: &[FittedSource]) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let mut out = BufWriter::new(File::create(path)?);
    header.write_to(&mut out)?;

    let mut bands: Vec<&String> = sources.iter().flat_map(|s| s.flux.keys()).collect();
    bands.sort();
    bands.dedup();

    let mut columns: Vec<String> = [
        "brickname", "objid", "type", "ra", "dec", "ra_ivar", "dec_ivar", "sersic", "shape_r",
    ]
    .iter()
    .map(|c| c.to_string())
    .collect();
    columns.extend(bands.iter().map(|b| format!("flux_{b}")));
    columns.extend(bands.iter().map(|b| format!("flux_ivar_{b}")));

    let mut writer = csv::Writer::from_writer(&mut out);
    writer.write_record(&columns)?;
    for (objid, source) in sources.iter().enumerate() {
        let mut record = vec![
            brickname.to_string(),
            objid.to_string(),
            source.model_type.clone(),
            source.ra.to_string(),
            source.dec.to_string(),
            source.ra_ivar.to_string(),
            source.dec_ivar.to_string(),
            source.sersic.to_string(),
            source.shape_r.to_string(),
        ];
        record.extend(bands.iter().map(|b| source.flux.get(*b).map(f64::to_string).unwrap_or_default()));
        record.extend(bands.iter().map(|b| source.flux_ivar.get(*b).map(f64::to_string).unwrap_or_default()));
        writer.write_record(&record)?;
    }
    writer.flush()?;
    drop(writer);
    out.flush()?;
    debug!(path = %path.display(), nsources = sources.len(), "Wrote tractor catalog");
    Ok(())
}
