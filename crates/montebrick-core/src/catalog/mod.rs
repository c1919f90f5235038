//! Candidate and injected source catalogs.

pub mod collision;
pub mod io;
pub mod matching;

use std::collections::BTreeMap;

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use crate::header::Header;

pub use collision::resolve_collisions;
pub use io::{read_catalog, write_catalog};
pub use matching::match_one_to_one;

/// Model fit of a recovered source, as measured by the reduction pipeline.
#[derive(Clone, Debug, PartialEq)]
pub struct FittedSource {
    pub ra: f64,
    pub dec: f64,
    pub ra_ivar: f64,
    pub dec_ivar: f64,
    /// Model type, e.g. `PSF`.
    pub model_type: String,
    pub sersic: f64,
    /// Half-light radius in arcsec.
    pub shape_r: f64,
    /// Linear flux per band (nanomaggies).
    pub flux: BTreeMap<String, f64>,
    pub flux_ivar: BTreeMap<String, f64>,
}

impl FittedSource {
    /// Position error along dec in arcsec, or infinity when unconstrained.
    pub fn dec_sigma_arcsec(&self) -> f64 {
        sigma(self.dec_ivar) * crate::consts::ARCSEC_PER_DEGREE
    }

    /// Position error along ra (on the sky) in arcsec.
    pub fn ra_sigma_arcsec(&self) -> f64 {
        sigma(self.ra_ivar) * crate::consts::ARCSEC_PER_DEGREE * self.dec.to_radians().cos()
    }

    pub fn flux_sigma(&self, band: &str) -> f64 {
        self.flux_ivar.get(band).copied().map_or(f64::INFINITY, sigma)
    }
}

fn sigma(ivar: f64) -> f64 {
    if ivar > 0.0 {
        1.0 / ivar.sqrt()
    } else {
        f64::INFINITY
    }
}

/// One synthetic source to inject.
#[derive(Clone, Debug, PartialEq)]
pub struct InjectedSource {
    pub id: i64,
    pub ra: f64,
    pub dec: f64,
    pub brickname: String,
    /// Linear flux per band (nanomaggies).
    pub flux: BTreeMap<String, f64>,
    /// Sersic index; 0 means point source.
    pub sersic: f64,
    /// Half-light radius in arcsec; 0 means point source.
    pub shape_r: f64,
    pub shape_e1: f64,
    pub shape_e2: f64,
    /// Seed of this source's noise draws.
    pub seed: u64,
    pub collided: bool,
    /// Columns carried through unchanged.
    pub extra: BTreeMap<String, String>,
    pub fit: Option<FittedSource>,
}

impl InjectedSource {
    pub fn point(id: i64, ra: f64, dec: f64, brickname: &str) -> Self {
        Self {
            id,
            ra,
            dec,
            brickname: brickname.to_string(),
            flux: BTreeMap::new(),
            sersic: 0.0,
            shape_r: 0.0,
            shape_e1: 0.0,
            shape_e2: 0.0,
            seed: 0,
            collided: false,
            extra: BTreeMap::new(),
            fit: None,
        }
    }

    pub fn with_flux(mut self, band: &str, flux: f64) -> Self {
        self.flux.insert(band.to_string(), flux);
        self
    }

    /// Flux in `band`, zero when the band is not listed.
    pub fn flux_in(&self, band: &str) -> f64 {
        self.flux.get(band).copied().unwrap_or(0.0)
    }

    pub fn is_point_source(&self) -> bool {
        self.sersic == 0.0 || self.shape_r == 0.0
    }
}

/// A catalog with its header cards.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SimCatalog {
    pub header: Header,
    pub sources: Vec<InjectedSource>,
    /// Whether seeds were read from the file rather than defaulted.
    pub seeded: bool,
}

impl SimCatalog {
    pub fn new(sources: Vec<InjectedSource>) -> Self {
        Self {
            header: Header::new(),
            sources,
            seeded: true,
        }
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    /// Draw per-source seeds from a stream seeded with `seed`. Existing seeds
    /// are kept only when no run seed is given.
    pub fn fill_defaults(&mut self, seed: Option<u64>) {
        if seed.is_none() && self.seeded {
            return;
        }
        let mut rng = ChaCha8Rng::seed_from_u64(seed.unwrap_or(0));
        for source in &mut self.sources {
            source.seed = u64::from(rng.random::<u32>());
        }
        self.seeded = true;
    }

    /// Keep only sources whose brick is `brickname`.
    pub fn cut_to_brick(&mut self, brickname: &str) {
        self.sources.retain(|s| s.brickname == brickname);
    }

    /// Keep `count` rows starting at `start` (fewer near the end).
    pub fn window(&mut self, start: usize, count: usize) {
        let start = start.min(self.sources.len());
        let end = start.saturating_add(count).min(self.sources.len());
        self.sources = self.sources.drain(start..end).collect();
    }

    /// Keep only rows flagged collided.
    pub fn retain_collided(&mut self) {
        self.sources.retain(|s| s.collided);
    }

    pub fn n_collided(&self) -> usize {
        self.sources.iter().filter(|s| s.collided).count()
    }

    /// Sorted union of the flux bands over all rows.
    pub fn bands(&self) -> Vec<String> {
        let mut bands: Vec<String> = self
            .sources
            .iter()
            .flat_map(|s| s.flux.keys().cloned())
            .collect();
        bands.sort();
        bands.dedup();
        bands
    }
}
