use crate::geometry::angular_separation;

/// One-to-one match of `targets` to `candidates` within `radius` degrees.
///
/// Pairs are taken closest first, and each candidate is used at most once.
/// Ties go to the earlier target, then the earlier candidate. Returns the
/// matched candidate index of every target.
pub fn match_one_to_one(targets: &[(f64, f64)], candidates: &[(f64, f64)], radius: f64) -> Vec<Option<usize>> {
    let mut pairs: Vec<(f64, usize, usize)> = Vec::new();
    for (t, &(ra, dec)) in targets.iter().enumerate() {
        for (c, &(cra, cdec)) in candidates.iter().enumerate() {
            let sep = angular_separation(ra, dec, cra, cdec);
            if sep <= radius {
                pairs.push((sep, t, c));
            }
        }
    }
    pairs.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)).then(a.2.cmp(&b.2)));

    let mut matched = vec![None; targets.len()];
    let mut taken = vec![false; candidates.len()];
    for (_, t, c) in pairs {
        if matched[t].is_none() && !taken[c] {
            matched[t] = Some(c);
            taken[c] = true;
        }
    }
    matched
}
