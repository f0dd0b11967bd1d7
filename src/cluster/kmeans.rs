use log::{debug, info, warn};
use rand::SeedableRng;
use rand_chacha::ChaCha20Rng;
#[cfg(feature = "parallel")]
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use super::cancel::{CancelSignal, NeverCancel};
use super::init::kmeans_plus_plus;
use super::metrics;
use super::{euclidean, squared_euclidean};
use crate::error::{Error, Result};

/// Below this many points the assignment step stays on the calling thread.
#[cfg(feature = "parallel")]
const PARALLEL_THRESHOLD: usize = 2048;

/// Configuration options for k-means clustering.
#[derive(Debug, Clone, PartialEq)]
pub struct KMeansConfig {
    /// Number of clusters to find.
    pub k: usize,
    /// Maximum number of iterations.
    pub max_iterations: usize,
    /// Convergence tolerance. If the summed movement of all centroids is below
    /// this, the algorithm stops early.
    pub tolerance: f64,
    /// Seed for k-means++ initialization. `None` draws a fresh seed, which is
    /// reported back in the result.
    pub seed: Option<u64>,
}

impl KMeansConfig {
    /// Create a new config with default values for max_iterations (100) and tolerance (1e-4).
    pub fn new(k: usize) -> Self {
        Self {
            k,
            max_iterations: 100,
            tolerance: 1e-4,
            seed: None,
        }
    }

    /// Customize the maximum number of iterations.
    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    /// Customize the convergence tolerance.
    pub fn with_tolerance(mut self, tolerance: f64) -> Self {
        self.tolerance = tolerance;
        self
    }

    /// Fix the initialization seed.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }
}

/// Final mean point of one cluster.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Centroid {
    pub index: usize,
    pub point: Vec<f64>,
}

/// Cluster membership of one data point, in input order.
///
/// `cluster` is the nearest centroid, lowest index on ties, except for a point
/// pinned by empty-cluster repair: it stays with the reseeded cluster even if
/// a lower-index centroid sits on the same coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Assignment {
    pub cluster: usize,
    /// Euclidean distance to `centroids[cluster]`.
    pub distance: f64,
}

/// How a run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    /// Summed centroid movement dropped below the tolerance.
    Converged,
    /// The iteration cap was hit first. Not an error.
    MaxIterationsReached,
    /// Stopped by a cancel signal; holds the last completed iteration.
    Cancelled,
}

impl RunStatus {
    pub fn is_converged(self) -> bool {
        self == RunStatus::Converged
    }

    pub fn is_partial(self) -> bool {
        self == RunStatus::Cancelled
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct KMeansResult {
    pub centroids: Vec<Centroid>,
    pub assignments: Vec<Assignment>,
    /// Number of completed update/assign iterations.
    pub iterations: usize,
    pub status: RunStatus,
    /// Seed actually used for initialization.
    pub seed: u64,
    /// Sum of squared distances of points to their centroids.
    pub inertia: f64,
}

impl KMeansResult {
    /// Cluster index of every point, in input order.
    pub fn labels(&self) -> Vec<usize> {
        self.assignments.iter().map(|a| a.cluster).collect()
    }

    /// Number of members per cluster.
    pub fn cluster_sizes(&self) -> Vec<usize> {
        cluster_counts(&self.assignments, self.centroids.len())
    }
}

/// Runs k-means clustering on the provided dataset.
///
/// Equivalent to [`kmeans_with_cancel`] with a signal that never fires.
///
/// # Errors
///
/// - `InvalidConfig` if `config.k < 2`, `config.k >= data.len()` or the tolerance is
///   negative or not finite.
/// - `InvalidInput` if points have zero dimensions or contain non-finite values.
/// - `DimensionMismatch` if points differ in length.
///
/// # Example
///
/// ```
/// use student_clustering::cluster::{kmeans, KMeansConfig};
///
/// let data = vec![
///     vec![1.0, 2.0],
///     vec![1.5, 1.8],
///     vec![5.0, 8.0],
///     vec![8.0, 8.0],
/// ];
///
/// let config = KMeansConfig::new(2).with_seed(42);
/// let result = kmeans(&data, &config).unwrap();
///
/// assert_eq!(result.assignments.len(), 4);
/// assert_eq!(result.centroids.len(), 2);
/// ```
pub fn kmeans(data: &[Vec<f64>], config: &KMeansConfig) -> Result<KMeansResult> {
    kmeans_with_cancel(data, config, &NeverCancel)
}

/// Runs k-means clustering, polling `cancel` before every iteration.
///
/// Each iteration recomputes centroids as the mean of their members and then
/// reassigns every point to its nearest centroid (ties go to the lowest
/// index), repairing any cluster left empty. A repaired cluster keeps the
/// point it was reseeded on, which can break the lowest-index tie rule when
/// the data holds duplicates. When `cancel` fires, the state
/// after the last completed iteration is returned with
/// [`RunStatus::Cancelled`]; it is identical to a run capped at that many
/// iterations.
pub fn kmeans_with_cancel<C>(data: &[Vec<f64>], config: &KMeansConfig, cancel: &C) -> Result<KMeansResult>
where
    C: CancelSignal + ?Sized,
{
    let dim = validate(data, config)?;
    let k = config.k;
    let seed = config.seed.unwrap_or_else(rand::random);
    let mut rng = ChaCha20Rng::seed_from_u64(seed);

    let mut centroids = kmeans_plus_plus(data, k, &mut rng);
    let mut assignments = assign_with_repair(data, &mut centroids);

    let mut iterations = 0;
    let mut status = RunStatus::MaxIterationsReached;
    while iterations < config.max_iterations {
        if cancel.should_stop(iterations) {
            status = RunStatus::Cancelled;
            break;
        }

        let mut next = update_centroids(data, &assignments, k, dim);
        let next_assignments = assign_with_repair(data, &mut next);
        let shift: f64 = centroids
            .iter()
            .zip(next.iter())
            .map(|(old, new)| euclidean(old, new))
            .sum();

        centroids = next;
        assignments = next_assignments;
        iterations += 1;
        debug!("k-means iteration {}: centroid shift {:.6}", iterations, shift);

        if shift < config.tolerance {
            status = RunStatus::Converged;
            break;
        }
    }

    match status {
        RunStatus::Converged => {}
        RunStatus::MaxIterationsReached => warn!(
            "k-means did not converge within {} iterations",
            config.max_iterations
        ),
        RunStatus::Cancelled => warn!("k-means cancelled after {} iterations", iterations),
    }

    let inertia = metrics::inertia(&assignments);
    info!(
        "k-means finished: k={}, n={}, iterations={}, status={:?}, inertia={:.4}",
        k,
        data.len(),
        iterations,
        status,
        inertia
    );

    Ok(KMeansResult {
        centroids: centroids
            .into_iter()
            .enumerate()
            .map(|(index, point)| Centroid { index, point })
            .collect(),
        assignments,
        iterations,
        status,
        seed,
        inertia,
    })
}

/// Checks parameters and data shape, returning the dimensionality.
fn validate(data: &[Vec<f64>], config: &KMeansConfig) -> Result<usize> {
    if config.k < 2 {
        return Err(Error::InvalidConfig(format!(
            "number of clusters must be at least 2, got {}",
            config.k
        )));
    }
    if config.k >= data.len() {
        return Err(Error::InvalidConfig(format!(
            "number of clusters k = {} must be smaller than the number of points ({})",
            config.k,
            data.len()
        )));
    }
    if !config.tolerance.is_finite() || config.tolerance < 0.0 {
        return Err(Error::InvalidConfig(format!(
            "tolerance must be a finite non-negative number, got {}",
            config.tolerance
        )));
    }

    let dim = data[0].len();
    if dim == 0 {
        return Err(Error::InvalidInput(
            "data points must have at least one dimension".to_string(),
        ));
    }
    for (i, point) in data.iter().enumerate() {
        if point.len() != dim {
            return Err(Error::DimensionMismatch {
                expected: dim,
                actual: point.len(),
            });
        }
        if point.iter().any(|v| !v.is_finite()) {
            return Err(Error::InvalidInput(format!(
                "point {} contains a non-finite value",
                i
            )));
        }
    }
    Ok(dim)
}

fn nearest(point: &[f64], centroids: &[Vec<f64>]) -> Assignment {
    let mut best_cluster = 0;
    let mut best_sq = squared_euclidean(point, &centroids[0]);
    for (idx, centroid) in centroids.iter().enumerate().skip(1) {
        let d = squared_euclidean(point, centroid);
        if d < best_sq {
            best_sq = d;
            best_cluster = idx;
        }
    }
    Assignment {
        cluster: best_cluster,
        distance: best_sq.sqrt(),
    }
}

fn assign_all(data: &[Vec<f64>], centroids: &[Vec<f64>]) -> Vec<Assignment> {
    #[cfg(feature = "parallel")]
    {
        if data.len() >= PARALLEL_THRESHOLD {
            return data.par_iter().map(|p| nearest(p, centroids)).collect();
        }
    }
    data.iter().map(|p| nearest(p, centroids)).collect()
}

fn cluster_counts(assignments: &[Assignment], k: usize) -> Vec<usize> {
    let mut counts = vec![0_usize; k];
    for a in assignments {
        counts[a.cluster] += 1;
    }
    counts
}

/// Assigns every point to its nearest centroid, then reseeds empty clusters.
///
/// An empty cluster's centroid moves onto the point farthest from its own
/// centroid, taken from a cluster that keeps at least one member. That point
/// is pinned to the reseeded cluster (its distance there is zero) and the
/// remaining points are reassigned. A pinned point ignores the lowest-index
/// tie rule, since handing it back would empty the cluster again. Every round pins a new point and pinned
/// clusters never empty again, so the loop ends within `data.len()` rounds.
fn assign_with_repair(data: &[Vec<f64>], centroids: &mut [Vec<f64>]) -> Vec<Assignment> {
    let k = centroids.len();
    let mut pinned = vec![false; data.len()];
    let mut assignments = assign_all(data, centroids);

    loop {
        let counts = cluster_counts(&assignments, k);
        let Some(empty) = counts.iter().position(|&c| c == 0) else {
            return assignments;
        };

        let mut donor: Option<usize> = None;
        for (i, a) in assignments.iter().enumerate() {
            if pinned[i] || counts[a.cluster] < 2 {
                continue;
            }
            match donor {
                Some(d) if assignments[d].distance >= a.distance => {}
                _ => donor = Some(i),
            }
        }
        // Only reachable with k >= n, which validation rules out.
        let Some(donor) = donor else {
            return assignments;
        };

        debug!(
            "cluster {} is empty; reseeding at point {} (distance {:.6})",
            empty, donor, assignments[donor].distance
        );
        centroids[empty] = data[donor].clone();
        pinned[donor] = true;
        assignments[donor] = Assignment {
            cluster: empty,
            distance: 0.0,
        };
        for (i, point) in data.iter().enumerate() {
            if !pinned[i] {
                assignments[i] = nearest(point, centroids);
            }
        }
    }
}

/// Recomputes each centroid as the componentwise mean of its members.
/// Sums run in input order so the result is reproducible.
fn update_centroids(data: &[Vec<f64>], assignments: &[Assignment], k: usize, dim: usize) -> Vec<Vec<f64>> {
    let mut sums = vec![vec![0.0; dim]; k];
    let mut counts = vec![0_usize; k];
    for (point, a) in data.iter().zip(assignments) {
        counts[a.cluster] += 1;
        for (s, &v) in sums[a.cluster].iter_mut().zip(point) {
            *s += v;
        }
    }
    for (sum, &count) in sums.iter_mut().zip(&counts) {
        if count > 0 {
            for s in sum.iter_mut() {
                *s /= count as f64;
            }
        }
    }
    sums
}
