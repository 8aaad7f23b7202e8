use std::sync::mpsc::Receiver;

use crate::error::Result;

/// Common interface for clustering engines.
pub trait Clusterer {
    /// Train on an `N x D` row-major dataset.
    ///
    /// The engine takes ownership of the rows and never mutates them. Fails
    /// with [`crate::Error::EmptySet`] on zero rows and
    /// [`crate::Error::DimensionMismatch`] on ragged input. Training twice
    /// replaces the previous model.
    fn learn(&self, data: Vec<Vec<f64>>) -> Result<()>;
}

/// Interface for engines assigning exactly one label per point.
///
/// Label conventions differ per algorithm: k-means labels are `0..K-1`,
/// DBSCAN uses `1..=K` with `-1` for noise, OPTICS uses `1..=K` with `0`
/// for unclustered points.
pub trait HardClusterer: Clusterer {
    /// Cluster sizes in cluster-id order. Noise points are not counted.
    fn sizes(&self) -> Result<Vec<usize>>;

    /// Per-point labels for the training set, in row order.
    fn guesses(&self) -> Result<Vec<i32>>;

    /// Label for a new observation of the training dimensionality.
    fn predict(&self, observation: &[f64]) -> Result<i32>;

    /// Whether the engine supports streamed training.
    fn is_online(&self) -> bool {
        false
    }

    /// Stream observations into the engine.
    ///
    /// Returns the event channel for the session; one [`OnlineEvent`] is
    /// emitted per accepted observation. Engines without online support
    /// return a channel that is already closed. Pending observations are
    /// drained before the `done` signal ends the session.
    fn online(&self, observations: Receiver<Vec<f64>>, done: Receiver<()>) -> Receiver<OnlineEvent>;
}

/// Interface reserved for engines emitting per-cluster membership
/// probabilities. No engine in this crate implements it yet.
pub trait SoftClusterer: Clusterer {
    /// Per-point probability rows, one column per cluster.
    fn memberships(&self) -> Result<Vec<Vec<f64>>>;
}

/// Parameters for streamed k-means training.
#[derive(Debug, Clone, Copy)]
pub struct OnlineConfig {
    /// Learning rate for the stochastic centroid update, in `(0, 1)`.
    pub alpha: f64,
    /// Dimensionality of incoming observations.
    pub dimension: usize,
}

/// Event emitted for each observation processed by an online session.
#[derive(Debug, Clone, PartialEq)]
pub struct OnlineEvent {
    /// Cluster the observation was assigned to.
    pub cluster: usize,
    /// The observation itself.
    pub observation: Vec<f64>,
}
