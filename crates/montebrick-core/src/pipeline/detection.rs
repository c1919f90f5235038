use std::collections::HashMap;

use ndarray::Array2;

/// A connected group of pixels above the detection threshold.
#[derive(Clone, Debug, PartialEq)]
pub struct Blob {
    /// Number of pixels in the blob.
    pub area: usize,
    /// Bounding box: (min_row, max_row, min_col, max_col).
    pub bbox: (usize, usize, usize, usize),
    /// Brightest pixel (row, col).
    pub peak: (usize, usize),
    pub peak_value: f64,
}

impl Blob {
    pub fn contains(&self, row: usize, col: usize) -> bool {
        let (r0, r1, c0, c1) = self.bbox;
        row >= r0 && row <= r1 && col >= c0 && col <= c1
    }
}

/// Signal-to-noise map of the stacked exposures:
/// `sum(data * ivar) / sqrt(sum(ivar))`, zero where no exposure has weight.
pub fn chi_map<'a>(exposures: impl IntoIterator<Item = (&'a Array2<f32>, &'a Array2<f32>)>) -> Option<Array2<f64>> {
    let mut num: Option<Array2<f64>> = None;
    let mut den: Option<Array2<f64>> = None;
    for (data, invvar) in exposures {
        let n = num.get_or_insert_with(|| Array2::zeros(data.dim()));
        let d = den.get_or_insert_with(|| Array2::zeros(data.dim()));
        ndarray::Zip::from(n)
            .and(d)
            .and(data)
            .and(invvar)
            .for_each(|n, d, &v, &iv| {
                let iv = f64::from(iv);
                if iv.is_finite() && iv > 0.0 {
                    *n += f64::from(v) * iv;
                    *d += iv;
                }
            });
    }
    let (mut num, den) = (num?, den?);
    num.zip_mut_with(&den, |n, &d| *n = if d > 0.0 { *n / d.sqrt() } else { 0.0 });
    Some(num)
}

/// Blobs of 8-connected pixels of `chi` above `nsigma`, in raster order of
/// their first pixel. Two-pass labeling with union-find.
pub fn detect_blobs(chi: &Array2<f64>, nsigma: f64) -> Vec<Blob> {
    let (h, w) = chi.dim();
    if h == 0 || w == 0 {
        return Vec::new();
    }

    let mut labels = Array2::<u32>::zeros((h, w));
    // Index 0 unused; labels start at 1.
    let mut parent: Vec<u32> = vec![0];

    // Pass 1: provisional labels from the already visited neighbours.
    for row in 0..h {
        for col in 0..w {
            if chi[[row, col]] <= nsigma {
                continue;
            }
            let mut neighbours = [0u32; 4];
            if col > 0 {
                neighbours[0] = labels[[row, col - 1]];
            }
            if row > 0 {
                neighbours[1] = labels[[row - 1, col]];
                if col > 0 {
                    neighbours[2] = labels[[row - 1, col - 1]];
                }
                if col + 1 < w {
                    neighbours[3] = labels[[row - 1, col + 1]];
                }
            }
            let smallest = neighbours.iter().copied().filter(|&l| l > 0).min();
            match smallest {
                None => {
                    let label = parent.len() as u32;
                    parent.push(label);
                    labels[[row, col]] = label;
                }
                Some(smallest) => {
                    labels[[row, col]] = smallest;
                    for &other in neighbours.iter().filter(|&&l| l > 0 && l != smallest) {
                        union(&mut parent, smallest, other);
                    }
                }
            }
        }
    }

    // Flatten parent references.
    for i in 1..parent.len() {
        parent[i] = find(&parent, i as u32);
    }

    // Pass 2: resolve labels and collect stats.
    let mut blobs = HashMap::<u32, Blob>::new();
    for row in 0..h {
        for col in 0..w {
            let label = labels[[row, col]];
            if label == 0 {
                continue;
            }
            let root = parent[label as usize];
            let value = chi[[row, col]];
            let blob = blobs.entry(root).or_insert(Blob {
                area: 0,
                bbox: (row, row, col, col),
                peak: (row, col),
                peak_value: value,
            });
            blob.area += 1;
            blob.bbox.0 = blob.bbox.0.min(row);
            blob.bbox.1 = blob.bbox.1.max(row);
            blob.bbox.2 = blob.bbox.2.min(col);
            blob.bbox.3 = blob.bbox.3.max(col);
            if value > blob.peak_value {
                blob.peak = (row, col);
                blob.peak_value = value;
            }
        }
    }

    // Roots are the smallest label of each blob, i.e. raster order.
    let mut roots: Vec<(u32, Blob)> = blobs.into_iter().collect();
    roots.sort_unstable_by_key(|(root, _)| *root);
    roots.into_iter().map(|(_, blob)| blob).collect()
}

fn find(parent: &[u32], mut x: u32) -> u32 {
    while parent[x as usize] != x {
        x = parent[x as usize];
    }
    x
}

fn union(parent: &mut [u32], a: u32, b: u32) {
    let ra = find(parent, a);
    let rb = find(parent, b);
    if ra != rb {
        let (small, big) = if ra < rb { (ra, rb) } else { (rb, ra) };
        parent[big as usize] = small;
    }
}
