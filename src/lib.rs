pub mod cluster;
pub mod error;
pub mod student;

pub use cluster::{kmeans, KMeansConfig};
pub use error::{Error, Result};
pub use student::{ClusterConfig, ClusteringOrchestrator};
