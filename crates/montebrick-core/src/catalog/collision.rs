use tracing::debug;

use crate::geometry::angular_separation;

use super::InjectedSource;

/// Flag sources that must be deferred to a later pass.
///
/// Sources closer than `radius` (degrees) are linked, and every transitively
/// linked cluster keeps its first row in catalog order; all other members are
/// collided. A non-positive radius disables the check.
pub fn resolve_collisions(sources: &[InjectedSource], radius: f64) -> Vec<bool> {
    let n = sources.len();
    if radius <= 0.0 || n < 2 {
        return vec![false; n];
    }

    let mut parent: Vec<usize> = (0..n).collect();

    // Sweep in declination order: only pairs within `radius` in dec can link.
    let mut order: Vec<usize> = (0..n).collect();
    order.sort_by(|&a, &b| sources[a].dec.total_cmp(&sources[b].dec));

    let mut npairs = 0usize;
    for (k, &i) in order.iter().enumerate() {
        for &j in &order[k + 1..] {
            if sources[j].dec - sources[i].dec >= radius {
                break;
            }
            let sep = angular_separation(sources[i].ra, sources[i].dec, sources[j].ra, sources[j].dec);
            if sep < radius {
                union(&mut parent, i, j);
                npairs += 1;
            }
        }
    }

    let collided: Vec<bool> = (0..n).map(|i| find(&parent, i) != i).collect();
    debug!(
        nsources = n,
        npairs,
        ncollided = collided.iter().filter(|&&c| c).count(),
        "Resolved collisions"
    );
    collided
}

fn find(parent: &[usize], mut x: usize) -> usize {
    while parent[x] != x {
        x = parent[x];
    }
    x
}

fn union(parent: &mut [usize], a: usize, b: usize) {
    let ra = find(parent, a);
    let rb = find(parent, b);
    if ra != rb {
        // The root is always the smallest row index of its cluster.
        let (small, big) = if ra < rb { (ra, rb) } else { (rb, ra) };
        parent[big] = small;
    }
}
