use rand::distributions::{Distribution, WeightedIndex};
use rand::Rng;

use super::squared_euclidean;

/// Chooses `k` initial centroids with k-means++ seeding.
///
/// The first centroid is a uniformly random data point. Each subsequent
/// centroid is a data point sampled with probability proportional to its
/// squared distance to the nearest centroid chosen so far, so points already
/// chosen are never picked again while any other point has positive weight.
/// When every remaining weight is zero (the data has fewer distinct points
/// than `k`), a uniform pick is used instead.
///
/// # Arguments
///
/// * `data` - Non-empty slice of equal-length points
/// * `k` - Number of centroids to choose
/// * `rng` - Random source; pass a seeded generator for reproducible output
///
/// # Returns
///
/// * `k` centroids, each a copy of a data point
pub fn kmeans_plus_plus<R: Rng + ?Sized>(data: &[Vec<f64>], k: usize, rng: &mut R) -> Vec<Vec<f64>> {
    let n = data.len();
    let mut centroids = Vec::with_capacity(k);
    if n == 0 || k == 0 {
        return centroids;
    }

    let first = data[rng.gen_range(0..n)].clone();
    let mut nearest_sq: Vec<f64> = data.iter().map(|p| squared_euclidean(p, &first)).collect();
    centroids.push(first);

    while centroids.len() < k {
        let next = match WeightedIndex::new(&nearest_sq) {
            Ok(weights) => weights.sample(rng),
            Err(_) => rng.gen_range(0..n),
        };
        let chosen = data[next].clone();
        for (best, point) in nearest_sq.iter_mut().zip(data) {
            let d = squared_euclidean(point, &chosen);
            if d < *best {
                *best = d;
            }
        }
        centroids.push(chosen);
    }

    centroids
}
