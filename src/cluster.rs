//! K-means clustering over dense `f64` feature vectors.
//!
//! This module is the numerical core of the crate and has no knowledge of
//! students or scores:
//! - `init` - k-means++ seeding
//! - `kmeans` - Lloyd iterations with empty-cluster repair and cancellation
//! - `cancel` - cooperative cancellation signals checked between iterations
//! - `metrics` - quality measures for a finished partition
//!
//! # Examples
//!
//! ```rust
//! use student_clustering::cluster::{kmeans, KMeansConfig};
//!
//! let data = vec![vec![1.0], vec![1.5], vec![9.0], vec![9.5], vec![5.0]];
//! let result = kmeans(&data, &KMeansConfig::new(2).with_seed(7)).unwrap();
//! assert_eq!(result.assignments.len(), data.len());
//! ```

pub mod cancel;
pub mod init;
pub mod kmeans;
pub mod metrics;

pub use cancel::{CancelSignal, CancelToken, NeverCancel};
pub use init::kmeans_plus_plus;
pub use kmeans::{kmeans, kmeans_with_cancel, Assignment, Centroid, KMeansConfig, KMeansResult, RunStatus};
pub use metrics::{inertia, mean_intra_cluster_distance, silhouette_score};

/// Squared Euclidean distance between two points of the same dimension.
/// Used for comparisons where the square root is unnecessary.
pub fn squared_euclidean(a: &[f64], b: &[f64]) -> f64 {
    a.iter()
        .zip(b.iter())
        .fold(0.0, |acc, (&x, &y)| acc + (x - y).powi(2))
}

/// Euclidean distance between two points of the same dimension.
pub fn euclidean(a: &[f64], b: &[f64]) -> f64 {
    squared_euclidean(a, b).sqrt()
}
