use crate::tracking::features::Descriptor;
use rayon::prelude::*;

/// Default Lowe ratio.
pub const DEFAULT_RATIO: f32 = 0.75;

/// A query descriptor paired with its nearest train descriptor.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DescriptorMatch {
    /// Index into the query set.
    pub query: usize,
    /// Index into the train set.
    pub train: usize,
    /// Euclidean distance to the nearest train descriptor.
    pub distance: f32,
}

/// Brute-force 2-NN matching with a ratio test.
///
/// A query is kept when `d1 < ratio * d2`, where `d1`/`d2` are the L2 distances to its nearest
/// and second-nearest train descriptors. Fewer than two train descriptors means no matches.
/// Output is ordered by query index.
pub fn ratio_matches(query: &[Descriptor], train: &[Descriptor], ratio: f32) -> Vec<DescriptorMatch> {
    if train.len() < 2 {
        return Vec::new();
    }
    let ratio_sq = ratio * ratio;
    query
        .par_iter()
        .enumerate()
        .filter_map(|(qi, q)| {
            let mut best = (f32::INFINITY, usize::MAX);
            let mut second = f32::INFINITY;
            for (ti, t) in train.iter().enumerate() {
                let d = squared_distance(q, t);
                if d < best.0 {
                    second = best.0;
                    best = (d, ti);
                } else if d < second {
                    second = d;
                }
            }
            (best.0 < ratio_sq * second).then(|| DescriptorMatch {
                query: qi,
                train: best.1,
                distance: best.0.sqrt(),
            })
        })
        .collect()
}

fn squared_distance(a: &Descriptor, b: &Descriptor) -> f32 {
    a.iter().zip(b).map(|(x, y)| (x - y) * (x - y)).sum()
}

#[cfg(test)]
#[path = "../../tests/unit/tracking/matcher.rs"]
mod tests;
