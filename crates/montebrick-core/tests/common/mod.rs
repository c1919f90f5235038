use std::path::Path;

use ndarray::Array2;

use montebrick_core::catalog::{write_catalog, InjectedSource, SimCatalog};
use montebrick_core::config::SimConfig;
use montebrick_core::exposure::Subimage;
use montebrick_core::geometry::TanWcs;
use montebrick_core::header::Header;
use montebrick_core::psf::GaussianPsf;

pub const BRICK: &str = "1500p020";
pub const BRICK_RA: f64 = 150.0;
pub const BRICK_DEC: f64 = 2.0;
pub const PIXEL_SCALE: f64 = 0.262;
pub const SKY_SIGMA: f64 = 0.05;

/// Linear flux in nanomaggies of an AB magnitude.
pub fn mag_to_nanomaggies(mag: f64) -> f64 {
    10f64.powf((22.5 - mag) / 2.5)
}

/// Blank DECam subimage of `size x size` pixels centered on the test brick,
/// with zero data and a constant sky inverse variance.
pub fn blank_subimage(size: usize) -> Subimage {
    let mut header = Header::new();
    header.push("GAINA", "4.0", None);
    header.push("GAINB", "4.2", None);
    let center = (size as f64 - 1.0) / 2.0;
    Subimage {
        camera: "decam".to_string(),
        ccdname: "N4".to_string(),
        band: "g".to_string(),
        x0: 500,
        y0: 1000,
        ccd_width: 2046,
        ccd_height: 4094,
        zpt: 25.0,
        exptime: 90.0,
        header,
        wcs: TanWcs::simple(BRICK_RA, BRICK_DEC, (center, center), PIXEL_SCALE),
        psf: GaussianPsf::new(1.8),
        data: Array2::zeros((size, size)),
        invvar: Array2::from_elem((size, size), (1.0 / (SKY_SIGMA * SKY_SIGMA)) as f32),
        dq: Array2::zeros((size, size)),
        sims_image: None,
        sims_inverr: None,
    }
}

/// Sky position of pixel `(x, y)` of `tim`.
pub fn radec_at(tim: &Subimage, x: f64, y: f64) -> (f64, f64) {
    tim.wcs.pixel_to_radec(x, y)
}

/// Point source in band g at `(ra, dec)`.
pub fn point_source(id: i64, ra: f64, dec: f64, flux: f64, seed: u64) -> InjectedSource {
    let mut source = InjectedSource::point(id, ra, dec, BRICK).with_flux("g", flux);
    source.seed = seed;
    source
}

/// Sources spread along a line, `step_arcsec` apart in dec.
pub fn line_of_sources(n: usize, step_arcsec: f64) -> Vec<InjectedSource> {
    (0..n)
        .map(|i| {
            let dec = BRICK_DEC + i as f64 * step_arcsec / 3600.0;
            point_source(i as i64, BRICK_RA, dec, 10.0, 100 + i as u64)
        })
        .collect()
}

pub fn write_candidates(path: &Path, sources: Vec<InjectedSource>) {
    write_catalog(path, &SimCatalog::new(sources)).unwrap();
}

/// Run configuration over the default synthetic brick writing under `dir`.
pub fn brick_config(dir: &Path) -> SimConfig {
    let mut config = SimConfig {
        brickname: BRICK.to_string(),
        output_dir: dir.join("out"),
        ..SimConfig::default()
    };
    config.synthetic.ra = BRICK_RA;
    config.synthetic.dec = BRICK_DEC;
    config.synthetic.pixel_scale = PIXEL_SCALE;
    config
}
