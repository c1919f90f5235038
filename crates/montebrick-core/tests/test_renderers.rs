#[allow(dead_code)]
mod common;

use approx::assert_relative_eq;

use montebrick_core::consts::RENDER_FLUX_TOLERANCE;
use montebrick_core::stamp::{ConvolutionRenderer, ModelRenderer, RenderStrategy, Stamp, StampRenderer};

const SIZE: usize = 96;

fn centroid(stamp: &Stamp) -> (f64, f64) {
    let (mut sx, mut sy, mut sum) = (0.0, 0.0, 0.0);
    for ((r, c), &v) in stamp.image.indexed_iter() {
        sx += v * (stamp.bounds.xmin + c as i64) as f64;
        sy += v * (stamp.bounds.ymin + r as i64) as f64;
        sum += v;
    }
    (sx / sum, sy / sum)
}

/// Flux of the part of a stamp that lands on the subimage.
fn flux_on(stamp: &Stamp, size: usize) -> f64 {
    let tim = common::blank_subimage(size);
    let overlap = stamp.bounds.intersect(&tim.bounds());
    stamp.view(&overlap).sum()
}

#[test]
fn test_point_source_flux_agrees_across_renderers() {
    let tim = common::blank_subimage(SIZE);
    let flux = common::mag_to_nanomaggies(19.5);
    let renderers: Vec<Box<dyn StampRenderer>> = vec![
        RenderStrategy::TractorModel.renderer(64),
        RenderStrategy::Convolution.renderer(64),
    ];

    for (x, y) in [(47.0, 48.0), (40.3, 52.71), (55.5, 44.49)] {
        let (ra, dec) = common::radec_at(&tim, x, y);
        let source = common::point_source(0, ra, dec, flux, 1);
        let mut fluxes = Vec::new();
        for renderer in &renderers {
            let stamp = renderer.render(&source, &tim).unwrap();
            let total = flux_on(&stamp, SIZE);
            assert_relative_eq!(total, flux, max_relative = RENDER_FLUX_TOLERANCE);

            let (cx, cy) = centroid(&stamp);
            assert!((cx - x).abs() < 0.02, "{}: x {cx} vs {x}", renderer.name());
            assert!((cy - y).abs() < 0.02, "{}: y {cy} vs {y}", renderer.name());
            fluxes.push(total);
        }
        assert_relative_eq!(fluxes[0], fluxes[1], max_relative = RENDER_FLUX_TOLERANCE);
    }
}

#[test]
fn test_galaxy_flux_agrees_across_renderers() {
    let tim = common::blank_subimage(SIZE);
    let (ra, dec) = common::radec_at(&tim, 48.2, 47.7);
    let mut source = common::point_source(0, ra, dec, 20.0, 1);
    source.sersic = 1.0;
    source.shape_r = 0.5;
    source.shape_e1 = 0.1;
    source.shape_e2 = -0.05;

    let model = ModelRenderer::new(64).render(&source, &tim).unwrap();
    let convolved = ConvolutionRenderer.render(&source, &tim).unwrap();
    assert_relative_eq!(flux_on(&model, SIZE), 20.0, max_relative = 1e-2);
    assert_relative_eq!(flux_on(&convolved, SIZE), 20.0, max_relative = 1e-2);

    let (mx, my) = centroid(&model);
    let (cx, cy) = centroid(&convolved);
    assert!((mx - cx).abs() < 0.05 && (my - cy).abs() < 0.05);
}

#[test]
fn test_model_stamp_is_clipped_to_subimage() {
    let tim = common::blank_subimage(SIZE);
    let (ra, dec) = common::radec_at(&tim, 2.0, 93.0);
    let source = common::point_source(0, ra, dec, 10.0, 1);

    let stamp = ModelRenderer::new(32).render(&source, &tim).unwrap();
    assert_eq!(stamp.bounds.xmin, 0);
    assert_eq!(stamp.bounds.ymax, SIZE as i64 - 1);
    assert_eq!(stamp.bounds.xmax, 2 + 16 - 1);
    assert_eq!(stamp.image.dim(), (stamp.bounds.height(), stamp.bounds.width()));
    // Part of the PSF falls off the edge.
    assert!(stamp.sum() < 10.0 && stamp.sum() > 2.0);
}

#[test]
fn test_no_overlap_renders_nothing() {
    let tim = common::blank_subimage(SIZE);
    let (ra, dec) = common::radec_at(&tim, 48.0, -2000.0);
    let source = common::point_source(0, ra, dec, 10.0, 1);
    assert!(ModelRenderer::new(64).render(&source, &tim).is_none());
    assert!(ConvolutionRenderer.render(&source, &tim).is_none());
}

#[test]
fn test_convolution_stamp_size() {
    assert_eq!(ConvolutionRenderer::stamp_size(0), 16);
    assert_eq!(ConvolutionRenderer::stamp_size(10), 32);
    assert_eq!(ConvolutionRenderer::stamp_size(16), 64);
    assert_eq!(ConvolutionRenderer::stamp_size(500), 256);
}

#[test]
fn test_flux_in_other_band_is_zero() {
    let mut tim = common::blank_subimage(SIZE);
    tim.band = "z".to_string();
    let (ra, dec) = common::radec_at(&tim, 48.0, 48.0);
    let source = common::point_source(0, ra, dec, 10.0, 1);
    let stamp = ModelRenderer::new(32).render(&source, &tim).unwrap();
    assert_eq!(stamp.sum(), 0.0);
}
