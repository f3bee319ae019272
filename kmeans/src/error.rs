use thiserror::Error;

/// Errors returned by clustering operations.
#[derive(Debug, Error)]
pub enum KMeansError {
    #[error("kmeans: invalid input: {0}")]
    InvalidInput(String),

    #[error("kmeans: dimension mismatch: expected {expected}, got {got}")]
    DimensionMismatch { expected: usize, got: usize },

    /// The iteration cap was reached before labels settled.
    /// `labels` holds the last assignment.
    #[error("kmeans: no convergence after {iterations} iterations")]
    NonConvergence {
        iterations: usize,
        labels: Vec<usize>,
    },

    #[error("kmeans: run cancelled")]
    Cancelled,

    #[error("kmeans: a clustering run is already in progress")]
    Busy,

    #[error("kmeans: no tokio runtime available")]
    NoRuntime,

    #[error("kmeans: worker exited without a result")]
    Aborted,
}
