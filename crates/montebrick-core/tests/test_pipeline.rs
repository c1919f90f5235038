#[allow(dead_code)]
mod common;

use approx::assert_abs_diff_eq;
use ndarray::Array2;
use tempfile::TempDir;

use montebrick_core::error::{MonteBrickError, Result};
use montebrick_core::exposure::Subimage;
use montebrick_core::geometry::PixelBounds;
use montebrick_core::header::read_header;
use montebrick_core::pipeline::detection::{chi_map, detect_blobs};
use montebrick_core::pipeline::fit::{fit_point_source, forced_flux_at};
use montebrick_core::pipeline::{BrickRequest, ReductionPipeline, SubimageHook, SyntheticConfig, SyntheticPipeline};
use montebrick_core::psf::GaussianPsf;
use montebrick_core::versions::{HeaderVersions, Stage, PIPELINE_MODULE};

struct Untouched;

impl SubimageHook for Untouched {
    fn on_subimage(&self, _tim: &mut Subimage) -> Result<()> {
        Ok(())
    }
}

#[test]
fn test_detect_blobs_eight_connected() {
    let mut chi = Array2::<f64>::zeros((8, 10));
    // A U shape whose arms only join on the bottom row.
    for &(r, c) in &[(1, 1), (2, 1), (3, 1), (3, 2), (3, 3), (2, 3), (1, 3)] {
        chi[[r, c]] = 6.0;
    }
    chi[[2, 3]] = 9.0;
    // Diagonal neighbours.
    chi[[5, 7]] = 7.0;
    chi[[6, 8]] = 8.0;
    // At threshold: not detected.
    chi[[0, 9]] = 5.0;

    let blobs = detect_blobs(&chi, 5.0);
    assert_eq!(blobs.len(), 2);
    assert_eq!(blobs[0].area, 7);
    assert_eq!(blobs[0].bbox, (1, 3, 1, 3));
    assert_eq!(blobs[0].peak, (2, 3));
    assert!(blobs[0].contains(2, 2));
    assert_eq!(blobs[1].area, 2);
    assert_eq!(blobs[1].bbox, (5, 6, 7, 8));
    assert_eq!(blobs[1].peak, (6, 8));
    assert_eq!(blobs[1].peak_value, 8.0);

    assert!(detect_blobs(&Array2::zeros((0, 0)), 5.0).is_empty());
}

#[test]
fn test_chi_map_stacks_weighted_exposures() {
    let data1 = Array2::from_elem((2, 2), 1.0f32);
    let data2 = Array2::from_elem((2, 2), 3.0f32);
    let mut ivar1 = Array2::from_elem((2, 2), 4.0f32);
    let mut ivar2 = Array2::from_elem((2, 2), 4.0f32);
    ivar1[[0, 0]] = 0.0;
    ivar1[[1, 1]] = 0.0;
    ivar2[[1, 1]] = 0.0;

    let chi = chi_map([(&data1, &ivar1), (&data2, &ivar2)]).unwrap();
    // (1*4 + 3*4) / sqrt(8)
    assert_abs_diff_eq!(chi[[0, 1]], 16.0 / 8f64.sqrt(), epsilon = 1e-12);
    // Only the second exposure: 3 * 4 / 2
    assert_abs_diff_eq!(chi[[0, 0]], 6.0, epsilon = 1e-12);
    assert_eq!(chi[[1, 1]], 0.0);

    assert!(chi_map(std::iter::empty::<(&Array2<f32>, &Array2<f32>)>()).is_none());
}

#[test]
fn test_point_source_fit_noiseless() {
    let psf = GaussianPsf::new(1.8);
    let bounds = PixelBounds::from_origin(0, 0, 40, 40);
    let data = psf.render(20.3, 18.7, &bounds).mapv(|v| (100.0 * v) as f32);
    let invvar = Array2::from_elem((40, 40), 1.0f32);

    let fit = fit_point_source(&data, &invvar, &psf, (19, 20)).unwrap();
    assert_abs_diff_eq!(fit.x, 20.3, epsilon = 1e-4);
    assert_abs_diff_eq!(fit.y, 18.7, epsilon = 1e-4);
    assert_abs_diff_eq!(fit.flux, 100.0, epsilon = 1e-3);
    for i in 0..3 {
        assert!(fit.covariance[i][i] > 0.0);
    }

    let (flux, ivar) = forced_flux_at(&data, &invvar, &psf, 20.3, 18.7);
    assert_abs_diff_eq!(flux, 100.0, epsilon = 1e-3);
    assert!(ivar > 0.0);

    let masked = Array2::zeros((40, 40));
    assert!(fit_point_source(&data, &masked, &psf, (19, 20)).is_none());
    assert_eq!(forced_flux_at(&data, &masked, &psf, 20.3, 18.7), (0.0, 0.0));
}

#[test]
fn test_synthetic_exposures_are_reproducible() {
    let pipeline = SyntheticPipeline::new(SyntheticConfig::default());
    let a = pipeline.exposure(0).unwrap();
    let b = pipeline.exposure(0).unwrap();
    assert_eq!(a.data, b.data);
    assert_eq!(a.header.get("GAINA"), Some("4"));
    assert_eq!(a.data.dim(), (200, 200));

    let n = a.data.len() as f64;
    let mean = a.data.iter().map(|&v| f64::from(v)).sum::<f64>() / n;
    let var = a.data.iter().map(|&v| (f64::from(v) - mean).powi(2)).sum::<f64>() / n;
    assert_abs_diff_eq!(var.sqrt(), 0.05, epsilon = 0.002);

    assert!(matches!(pipeline.exposure(1), Err(MonteBrickError::Config(_))));

    let mut config = SyntheticConfig::default();
    config.exposures[0].sky_sigma = 0.0;
    assert!(SyntheticPipeline::new(config).exposure(0).is_err());
}

#[test]
fn test_synthetic_brick_records_versions() {
    let dir = TempDir::new().unwrap();
    let pipeline = SyntheticPipeline::new(SyntheticConfig::default());
    let request = BrickRequest {
        brickname: common::BRICK.to_string(),
        tractor_path: dir.path().join("tractor").join("tractor-1500p020.csv"),
        blob_radec: Some(Vec::new()),
    };
    let output = pipeline.run_brick(&request, &Untouched).unwrap();
    assert!(output.sources.is_empty());

    let header = read_header(&request.tractor_path).unwrap();
    assert_eq!(header, output.version_header);
    let versions = HeaderVersions::from_header(&header);
    assert_eq!(versions.dependency("tractor"), Some("dr9.5"));
    for stage in Stage::ALL.into_iter().filter(|&s| s != Stage::WiseForced) {
        assert_eq!(versions.module_version(PIPELINE_MODULE, stage).unwrap(), "DR9.6.9");
    }
    assert!(versions.module_version(PIPELINE_MODULE, Stage::WiseForced).is_err());
    assert_eq!(versions.module_version("image", Stage::Writecat).unwrap(), "DR9.6.9");
}

#[test]
fn test_brick_without_exposures_fails() {
    let dir = TempDir::new().unwrap();
    let config = SyntheticConfig {
        exposures: Vec::new(),
        ..SyntheticConfig::default()
    };
    let request = BrickRequest {
        brickname: common::BRICK.to_string(),
        tractor_path: dir.path().join("tractor-1500p020.csv"),
        blob_radec: None,
    };
    let result = SyntheticPipeline::new(config).run_brick(&request, &Untouched);
    assert!(matches!(result, Err(MonteBrickError::Pipeline(_))));
    assert!(!request.tractor_path.exists());
}
