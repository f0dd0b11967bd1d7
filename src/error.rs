use thiserror::Error;

/// Result type for clustering operations
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    /// Malformed run configuration. Raised before any computation begins.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Too few complete student records for the requested number of clusters.
    #[error("insufficient data: {usable} usable students, at least {required} required")]
    InsufficientData { usable: usize, required: usize },

    #[error("dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("failed to parse configuration: {0}")]
    ConfigParse(#[from] serde_json::Error),

    /// The score collaborator failed; passed through untouched.
    #[error("score source failed: {0}")]
    ScoreSource(#[source] Box<dyn std::error::Error + Send + Sync>),
}
