use thiserror::Error;

/// Errors returned by clustering engines in this crate.
#[derive(Debug, Error)]
pub enum Error {
    /// Training set has zero rows.
    #[error("empty training set")]
    EmptySet,

    /// Iteration cap is less than 1.
    #[error("number of iterations cannot be less than 1")]
    ZeroIterations,

    /// Requested fewer than two clusters.
    #[error("number of clusters cannot be less than 2")]
    OneCluster,

    /// Neighborhood radius is not positive.
    #[error("epsilon must be greater than 0")]
    ZeroEpsilon,

    /// Core-point threshold is less than 1.
    #[error("minpts cannot be less than 1")]
    ZeroMinpts,

    /// Steepness parameter lies outside `(0, 1)`.
    #[error("xi must lie in (0, 1)")]
    ZeroXi,

    /// Online learning rate lies outside `(0, 1)`.
    #[error("alpha must lie in (0, 1)")]
    ZeroAlpha,

    /// Vectors of differing length met in a distance computation.
    #[error("dimension mismatch: expected {expected}, found {found}")]
    DimensionMismatch {
        /// Expected dimensionality.
        expected: usize,
        /// Found dimensionality.
        found: usize,
    },

    /// A query was issued before a successful `learn`.
    #[error("engine has not been trained")]
    NotTrained,
}

/// Result type used by this crate.
pub type Result<T> = std::result::Result<T, Error>;
