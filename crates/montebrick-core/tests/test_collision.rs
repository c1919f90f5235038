#[allow(dead_code)]
mod common;

use montebrick_core::catalog::resolve_collisions;

const ARCSEC: f64 = 1.0 / 3600.0;

#[test]
fn test_non_positive_radius_disables_collisions() {
    let sources = common::line_of_sources(10, 0.5);
    for radius in [0.0, -1.0, -5.0 * ARCSEC] {
        assert_eq!(resolve_collisions(&sources, radius), vec![false; 10]);
    }
    assert!(resolve_collisions(&[], 0.0).is_empty());
    assert!(resolve_collisions(&[], 5.0 * ARCSEC).is_empty());
}

#[test]
fn test_single_source_never_collides() {
    let sources = common::line_of_sources(1, 1.0);
    assert_eq!(resolve_collisions(&sources, 5.0 * ARCSEC), vec![false]);
}

#[test]
fn test_ten_source_chain_keeps_first_row() {
    // Neighbours 1" apart: every source links to the next, forming one
    // cluster although the ends are 9" apart.
    let sources = common::line_of_sources(10, 1.0);
    let collided = resolve_collisions(&sources, 1.5 * ARCSEC);
    assert!(!collided[0]);
    assert!(collided[1..].iter().all(|&c| c));
}

#[test]
fn test_catalog_order_picks_survivor() {
    let mut sources = common::line_of_sources(10, 1.0);
    sources.reverse();
    let collided = resolve_collisions(&sources, 1.5 * ARCSEC);
    // The survivor is the first row, now the source with the largest dec.
    assert_eq!(collided.iter().filter(|&&c| !c).count(), 1);
    assert!(!collided[0]);
    assert_eq!(sources[0].id, 9);
}

#[test]
fn test_separate_clusters() {
    // Two tight groups of five, 60" apart, shuffled in catalog order.
    let mut sources = common::line_of_sources(5, 1.0);
    let far: Vec<_> = common::line_of_sources(5, 1.0)
        .into_iter()
        .map(|mut s| {
            s.id += 10;
            s.dec += 60.0 * ARCSEC;
            s
        })
        .collect();
    sources.insert(1, far[2].clone());
    for (i, s) in far.into_iter().enumerate() {
        if i != 2 {
            sources.push(s);
        }
    }

    let collided = resolve_collisions(&sources, 1.5 * ARCSEC);
    let kept: Vec<i64> = sources
        .iter()
        .zip(&collided)
        .filter(|(_, &c)| !c)
        .map(|(s, _)| s.id)
        .collect();
    assert_eq!(kept, vec![0, 12]);
}

#[test]
fn test_isolated_sources_kept() {
    let sources = common::line_of_sources(10, 10.0);
    assert_eq!(resolve_collisions(&sources, 5.0 * ARCSEC), vec![false; 10]);
}
