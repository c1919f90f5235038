#[allow(dead_code)]
mod common;

use std::collections::BTreeMap;
use std::fs;

use tempfile::TempDir;

use montebrick_core::catalog::{read_catalog, write_catalog, FittedSource, SimCatalog};

fn fitted(ra: f64, dec: f64) -> FittedSource {
    FittedSource {
        ra,
        dec,
        ra_ivar: 1.234_567_890_123e12,
        dec_ivar: 9.87e11,
        model_type: "PSF".to_string(),
        sersic: 0.0,
        shape_r: 0.0,
        flux: BTreeMap::from([("g".to_string(), 15.848_931_924_611_133)]),
        flux_ivar: BTreeMap::from([("g".to_string(), 1.0 / 3.0)]),
    }
}

#[test]
fn test_round_trip_reproduces_every_column() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("sim").join("150").join("injected-1500p020.csv");

    let mut sources = common::line_of_sources(4, 0.7);
    sources[0].sersic = 4.0;
    sources[0].shape_r = 0.45;
    sources[0].shape_e1 = -0.1;
    sources[0].shape_e2 = 0.2;
    sources[1].collided = true;
    sources[2].seed = u64::from(u32::MAX);
    sources[2].flux.insert("r".to_string(), 1.0 / 7.0);
    sources[3].extra.insert("objid".to_string(), "00417".to_string());
    sources[0].fit = Some(fitted(sources[0].ra + 1e-6, sources[0].dec - 3e-7));

    let mut catalog = SimCatalog::new(sources);
    catalog.header.push("PIPEVER", "DR9.6.9", Some("pipeline version"));
    catalog.header.push("PRODTYPE", "injected", None);
    write_catalog(&path, &catalog).unwrap();

    let back = read_catalog(&path).unwrap();
    assert_eq!(back.header, catalog.header);
    assert_eq!(back.sources.len(), 4);
    for (a, b) in catalog.sources.iter().zip(&back.sources) {
        assert_eq!(a.id, b.id);
        assert_eq!(a.ra.to_bits(), b.ra.to_bits());
        assert_eq!(a.dec.to_bits(), b.dec.to_bits());
        assert_eq!(a.seed, b.seed);
        assert_eq!(a.collided, b.collided);
        assert_eq!(a.extra, b.extra);
        assert_eq!(a.fit, b.fit);
    }
    // Missing bands are read back absent rather than zero.
    assert!(!back.sources[0].flux.contains_key("r"));
    assert_eq!(back.sources[2].flux["r"], 1.0 / 7.0);
    assert_eq!(back.sources, catalog.sources);
    assert!(back.seeded);
}

#[test]
fn test_rewrite_is_byte_identical() {
    let dir = TempDir::new().unwrap();
    let first = dir.path().join("a.csv");
    let second = dir.path().join("b.csv");

    let mut sources = common::line_of_sources(3, 2.0);
    sources[1].fit = Some(fitted(sources[1].ra, sources[1].dec));
    write_catalog(&first, &SimCatalog::new(sources)).unwrap();
    write_catalog(&second, &read_catalog(&first).unwrap()).unwrap();

    assert_eq!(fs::read(&first).unwrap(), fs::read(&second).unwrap());
}

#[test]
fn test_candidate_defaults() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("candidates.csv");
    fs::write(
        &path,
        "ra,dec,brickname,sersic,shape_r,shape_e1,shape_e2,flux_g,flux_r,mag_g\n\
         150.0,2.0,1500p020,0,0,0,0,10.0,12.5,20.0\n\
         150.001,2.001,1500p020,1,0.5,0.1,0,3.0,4.0,21.3\n",
    )
    .unwrap();

    let catalog = read_catalog(&path).unwrap();
    assert!(catalog.header.is_empty());
    assert!(!catalog.seeded);
    assert_eq!(catalog.bands(), vec!["g".to_string(), "r".to_string()]);
    let ids: Vec<i64> = catalog.sources.iter().map(|s| s.id).collect();
    assert_eq!(ids, vec![0, 1]);
    assert!(catalog.sources.iter().all(|s| !s.collided && s.fit.is_none()));
    assert_eq!(catalog.sources[1].sersic, 1.0);
    assert_eq!(catalog.sources[1].extra["mag_g"], "21.3");
}

#[test]
fn test_flux_errors_are_not_bands() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("candidates.csv");
    fs::write(
        &path,
        "ra,dec,brickname,flux_g,flux_ivar_g\n150.0,2.0,1500p020,10.0,25.0\n",
    )
    .unwrap();

    let catalog = read_catalog(&path).unwrap();
    assert_eq!(catalog.bands(), vec!["g".to_string()]);
    let source = &catalog.sources[0];
    assert_eq!(source.flux_in("g"), 10.0);
    assert_eq!(source.extra["flux_ivar_g"], "25.0");

    let copy = dir.path().join("copy.csv");
    write_catalog(&copy, &catalog).unwrap();
    let back = read_catalog(&copy).unwrap();
    assert_eq!(back.bands(), vec!["g".to_string()]);
    assert_eq!(back.sources[0].extra["flux_ivar_g"], "25.0");
}

#[test]
fn test_missing_position_is_an_error() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("bad.csv");
    fs::write(&path, "ra,brickname,flux_g\n150.0,1500p020,1.0\n").unwrap();
    assert!(read_catalog(&path).is_err());
}

#[test]
fn test_fill_defaults_and_selection() {
    let mut catalog = SimCatalog {
        sources: common::line_of_sources(6, 10.0),
        ..SimCatalog::default()
    };
    catalog.sources[4].brickname = "1501p020".to_string();

    catalog.fill_defaults(Some(7));
    let seeds: Vec<u64> = catalog.sources.iter().map(|s| s.seed).collect();
    let mut again = catalog.clone();
    again.fill_defaults(Some(7));
    assert_eq!(again.sources.iter().map(|s| s.seed).collect::<Vec<_>>(), seeds);
    // Seeded catalogs keep their seeds without a run seed.
    again.fill_defaults(None);
    assert_eq!(again.sources.iter().map(|s| s.seed).collect::<Vec<_>>(), seeds);

    catalog.cut_to_brick(common::BRICK);
    assert_eq!(catalog.len(), 5);
    catalog.window(1, 2);
    let ids: Vec<i64> = catalog.sources.iter().map(|s| s.id).collect();
    assert_eq!(ids, vec![1, 2]);

    catalog.window(5, 3);
    assert!(catalog.is_empty());
}
