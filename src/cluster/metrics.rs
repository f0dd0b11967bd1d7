use super::euclidean;
use super::kmeans::Assignment;

/// Sum of squared distances of points to their assigned centroids.
pub fn inertia(assignments: &[Assignment]) -> f64 {
    assignments.iter().map(|a| a.distance * a.distance).sum()
}

/// Average distance of a point to its own centroid. Zero for no points.
pub fn mean_intra_cluster_distance(assignments: &[Assignment]) -> f64 {
    if assignments.is_empty() {
        return 0.0;
    }
    assignments.iter().map(|a| a.distance).sum::<f64>() / assignments.len() as f64
}

/// Mean silhouette coefficient over all points.
///
/// For a point `i`, `a(i)` is its mean distance to the other members of its
/// cluster and `b(i)` the smallest mean distance to the members of any other
/// cluster; `s(i) = (b - a) / max(a, b)`. Points alone in their cluster score
/// zero. Values near 1 mean compact, well separated clusters.
///
/// Returns 0.0 when fewer than two clusters are populated or the inputs do not
/// line up. Runs in O(n^2) distance evaluations.
pub fn silhouette_score(data: &[Vec<f64>], labels: &[usize]) -> f64 {
    let n = data.len();
    if n == 0 || n != labels.len() {
        return 0.0;
    }
    let k = labels.iter().max().map_or(0, |&m| m + 1);
    let mut sizes = vec![0_usize; k];
    for &l in labels {
        sizes[l] += 1;
    }
    if sizes.iter().filter(|&&s| s > 0).count() < 2 {
        return 0.0;
    }

    let mut total = 0.0;
    for i in 0..n {
        let own = labels[i];
        if sizes[own] < 2 {
            continue;
        }

        let mut sums = vec![0.0; k];
        for j in 0..n {
            if i != j {
                sums[labels[j]] += euclidean(&data[i], &data[j]);
            }
        }

        let a = sums[own] / (sizes[own] - 1) as f64;
        let b = (0..k)
            .filter(|&c| c != own && sizes[c] > 0)
            .map(|c| sums[c] / sizes[c] as f64)
            .fold(f64::INFINITY, f64::min);

        let denom = a.max(b);
        if denom > 0.0 {
            total += (b - a) / denom;
        }
    }

    total / n as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_inertia_and_mean_distance() {
        let assignments = vec![
            Assignment { cluster: 0, distance: 1.0 },
            Assignment { cluster: 1, distance: 2.0 },
            Assignment { cluster: 1, distance: 3.0 },
        ];
        assert_relative_eq!(inertia(&assignments), 14.0);
        assert_relative_eq!(mean_intra_cluster_distance(&assignments), 2.0);
        assert_eq!(mean_intra_cluster_distance(&[]), 0.0);
    }

    #[test]
    fn test_silhouette_well_separated() {
        let data = vec![vec![0.0], vec![1.0], vec![100.0], vec![101.0]];
        let score = silhouette_score(&data, &[0, 0, 1, 1]);
        assert!(score > 0.95, "score was {}", score);
    }

    #[test]
    fn test_silhouette_bad_partition_is_negative() {
        let data = vec![vec![0.0], vec![1.0], vec![100.0], vec![101.0]];
        let score = silhouette_score(&data, &[0, 1, 0, 1]);
        assert!(score < 0.0);
    }

    #[test]
    fn test_silhouette_degenerate_inputs() {
        let data = vec![vec![0.0], vec![1.0]];
        assert_eq!(silhouette_score(&data, &[0, 0]), 0.0);
        assert_eq!(silhouette_score(&data, &[0]), 0.0);
        assert_eq!(silhouette_score(&[], &[]), 0.0);
        // Two singletons: every point scores zero.
        assert_eq!(silhouette_score(&data, &[0, 1]), 0.0);
    }
}
