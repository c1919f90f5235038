//! Compositing of rendered stamps into exposure subimages.

use std::time::Instant;

use ndarray::{s, Array2, Zip};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rand_distr::{Distribution, Poisson, StandardNormal};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::catalog::InjectedSource;
use crate::error::{MonteBrickError, Result};
use crate::exposure::Subimage;
use crate::header::Header;
use crate::photometry::nano_to_electrons;
use crate::pipeline::SubimageHook;
use crate::stamp::{RenderStrategy, StampRenderer};
use crate::versions::HarnessVersions;

/// Synthetic noise added on top of the injected flux.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NoiseMode {
    #[default]
    None,
    /// Zero-mean Gaussian with the photon-noise variance of the added flux.
    Gaussian,
    /// Poisson draw in electrons minus its expectation.
    Poisson,
}

impl std::fmt::Display for NoiseMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NoiseMode::None => write!(f, "none"),
            NoiseMode::Gaussian => write!(f, "gaussian"),
            NoiseMode::Poisson => write!(f, "poisson"),
        }
    }
}

/// Per-subimage injection outcome.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct InjectionSummary {
    /// Sources with at least one pixel on the subimage.
    pub n_overlapping: usize,
    /// Noiseless flux added to the subimage (nanomaggies).
    pub added_flux: f64,
}

/// Pixel hook injecting a fixed list of sources into every subimage it sees.
pub struct SimImageHook {
    sources: Vec<InjectedSource>,
    renderer: Box<dyn StampRenderer>,
    noise: NoiseMode,
    image_eq_model: bool,
    versions: Option<HarnessVersions>,
}

impl SimImageHook {
    pub fn new(
        sources: Vec<InjectedSource>,
        strategy: RenderStrategy,
        stamp_size: usize,
        noise: NoiseMode,
        image_eq_model: bool,
    ) -> Self {
        Self {
            sources,
            renderer: strategy.renderer(stamp_size),
            noise,
            image_eq_model,
            versions: None,
        }
    }

    /// Also stamp harness version cards onto the pipeline's version header.
    pub fn with_versions(mut self, versions: HarnessVersions) -> Self {
        self.versions = Some(versions);
        self
    }

    /// Add every source to `tim` in catalog order. An empty source list leaves
    /// the subimage untouched.
    pub fn inject(&self, tim: &mut Subimage) -> Result<InjectionSummary> {
        let mut summary = InjectionSummary::default();
        if self.sources.is_empty() {
            return Ok(summary);
        }

        let mut image = tim.data.mapv(f64::from);
        let mut var = tim.invvar.mapv(|iv| 1.0 / f64::from(iv));
        let mut sims_image = Array2::<f64>::zeros(image.dim());
        let mut sims_var = Array2::<f64>::zeros(image.dim());

        for source in &self.sources {
            let t0 = Instant::now();
            info!(
                renderer = self.renderer.name(),
                id = source.id,
                band = %tim.band,
                seed = source.seed,
                flux = source.flux_in(&tim.band),
                sersic = source.sersic,
                shape_r = source.shape_r,
                shape_e1 = source.shape_e1,
                shape_e2 = source.shape_e2,
                "Drawing source"
            );
            let Some(stamp) = self.renderer.render(source, tim) else {
                debug!(id = source.id, "Stamp does not overlap subimage");
                continue;
            };
            debug!(
                id = source.id,
                band = %tim.band,
                added_flux = stamp.sum(),
                elapsed_ms = t0.elapsed().as_secs_f64() * 1e3,
                "Finished drawing source"
            );

            let overlap = stamp.bounds.intersect(&tim.bounds());
            if overlap.is_empty() {
                debug!(id = source.id, "Stamp does not overlap subimage");
                continue;
            }
            summary.n_overlapping += 1;

            let noiseless = stamp.view(&overlap).to_owned();
            summary.added_flux += noiseless.sum();
            let nano2e = nano_to_electrons(tim, &overlap)?;
            let noisy = add_noise(&noiseless, &nano2e, self.noise, source.seed)?;

            let (rows, cols) = (
                overlap.ymin as usize..=overlap.ymax as usize,
                overlap.xmin as usize..=overlap.xmax as usize,
            );
            let dq = tim.dq.slice(s![rows.clone(), cols.clone()]);
            let mut stamp_var = Array2::<f64>::zeros(noiseless.dim());
            Zip::from(&mut stamp_var)
                .and(&noiseless)
                .and(&nano2e)
                .and(&dq)
                .for_each(|v, &s, &n, &q| {
                    *v = if q > 0 { 0.0 } else { s.abs() / n };
                });

            let region = s![rows, cols];
            image.slice_mut(region).zip_mut_with(&noisy, |a, &b| *a += b);
            sims_image.slice_mut(region).zip_mut_with(&noisy, |a, &b| *a += b);
            var.slice_mut(region).zip_mut_with(&stamp_var, |a, &b| *a += b);
            sims_var.slice_mut(region).zip_mut_with(&stamp_var, |a, &b| *a += b);
        }

        let sims_image = sims_image.mapv(|v| v as f32);
        let sims_inverr = sims_var.mapv(|v| if v > 0.0 { (1.0 / v.sqrt()) as f32 } else { 0.0 });
        if self.image_eq_model {
            tim.data = sims_image.clone();
            tim.invvar = sims_inverr.mapv(|e| e * e);
        } else if summary.n_overlapping > 0 {
            tim.data = image.mapv(|v| v as f32);
            tim.invvar = var.mapv(|v| (1.0 / v) as f32);
        }
        tim.sims_image = Some(sims_image);
        tim.sims_inverr = Some(sims_inverr);

        info!(
            band = %tim.band,
            ccdname = %tim.ccdname,
            noverlap = summary.n_overlapping,
            added_flux = summary.added_flux,
            "Injected sources into subimage"
        );
        Ok(summary)
    }
}

impl SubimageHook for SimImageHook {
    fn on_subimage(&self, tim: &mut Subimage) -> Result<()> {
        self.inject(tim).map(|_| ())
    }

    fn on_version_header(&self, header: Header) -> Header {
        match &self.versions {
            Some(versions) => versions.decorate(&header),
            None => header,
        }
    }
}

/// Noisy copy of `stamp` using a generator seeded from the source's own seed.
/// Pixels are drawn in row-major order.
pub fn add_noise(
    stamp: &Array2<f64>,
    nano2e: &Array2<f64>,
    mode: NoiseMode,
    seed: u64,
) -> Result<Array2<f64>> {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut noisy = stamp.clone();
    match mode {
        NoiseMode::None => {}
        NoiseMode::Gaussian => {
            debug!("Adding Gaussian noise");
            Zip::from(&mut noisy).and(nano2e).for_each(|v, &n| {
                let sigma = (v.max(0.0) / n).sqrt();
                let z: f64 = StandardNormal.sample(&mut rng);
                *v += sigma * z;
            });
        }
        NoiseMode::Poisson => {
            debug!("Adding Poisson noise");
            for (v, &n) in noisy.iter_mut().zip(nano2e.iter()) {
                let expected = v.max(0.0);
                let lambda = expected * n;
                let counts = if lambda > 0.0 {
                    Poisson::new(lambda)
                        .map_err(|e| MonteBrickError::Noise(format!("lambda = {lambda}: {e}")))?
                        .sample(&mut rng)
                } else {
                    0.0
                };
                *v += counts / n - expected;
            }
        }
    }
    Ok(noisy)
}
