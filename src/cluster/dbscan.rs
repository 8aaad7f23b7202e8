//! DBSCAN: Density-Based Spatial Clustering of Applications with Noise.
//!
//! # The Algorithm (Ester et al., 1996)
//!
//! DBSCAN groups points by neighborhood density. Unlike k-means, it
//! discovers clusters of arbitrary shape, determines the number of clusters
//! automatically, and identifies noise points.
//!
//! ## Core Concepts
//!
//! - **Epsilon (ε)**: Maximum distance between two points to be neighbors
//!   (strict `< ε` here).
//! - **MinPts**: Minimum neighborhood size for a point to be "core"; the
//!   point counts itself.
//! - **Core point**: Has at least MinPts neighbors within ε.
//! - **Border point**: Within ε of a core point but not core itself.
//! - **Noise point**: Neither core nor border.
//!
//! ## Traversal
//!
//! For each unvisited point: find its ε-neighborhood with the parallel scan.
//! A non-core point is provisionally noise; a core point opens a cluster,
//! and its neighborhood is walked as a growing seed list, folding in the
//! neighborhoods of every core point it reaches. Each point is visited
//! exactly once. Points already labeled noise by the outer loop are not
//! pulled back into later clusters.
//!
//! ## Complexity
//!
//! O(n²) distance computations total; the scan divides each neighborhood
//! query across the worker pool.
//!
//! ## Limitations
//!
//! - Struggles with clusters of varying density (consider OPTICS)
//! - ε is sensitive and dataset-dependent

use std::sync::mpsc::{channel, Receiver};
use std::sync::Arc;

use parking_lot::RwLock;

use super::distance::{euclidean, DistanceFn};
use super::scan::NeighborScan;
use super::traits::{Clusterer, HardClusterer, OnlineEvent};
use super::{nearest_row, validate_dataset, Label};
use crate::error::{Error, Result};

/// DBSCAN clustering engine.
pub struct Dbscan {
    minpts: usize,
    eps: f64,
    workers: usize,
    distance: DistanceFn,
    state: Arc<RwLock<State>>,
}

#[derive(Default)]
struct State {
    dataset: Arc<Vec<Vec<f64>>>,
    labels: Vec<i32>,
    sizes: Vec<usize>,
    trained: bool,
}

impl Dbscan {
    /// Create a new DBSCAN engine.
    ///
    /// # Arguments
    ///
    /// * `minpts` - Minimum neighborhood size for a core point, at least 1.
    /// * `eps` - Neighborhood radius, strictly positive.
    /// * `workers` - Cap on the scan worker pool (0 = size by dataset).
    pub fn new(minpts: usize, eps: f64, workers: usize) -> Result<Self> {
        if minpts < 1 {
            return Err(Error::ZeroMinpts);
        }
        if eps <= 0.0 {
            return Err(Error::ZeroEpsilon);
        }

        Ok(Self {
            minpts,
            eps,
            workers,
            distance: euclidean,
            state: Arc::new(RwLock::new(State::default())),
        })
    }

    /// Override the pairwise distance (default: Euclidean).
    pub fn with_distance(mut self, distance: DistanceFn) -> Self {
        self.distance = distance;
        self
    }

    fn run(&self, data: &Arc<Vec<Vec<f64>>>) -> (Vec<Label>, Vec<usize>) {
        let n = data.len();
        let scan = NeighborScan::start(Arc::clone(data), self.eps, self.distance, self.workers);

        let mut visited = vec![false; n];
        let mut labels = vec![Label::Unassigned; n];
        let mut sizes: Vec<usize> = Vec::new();

        let mut seeds: Vec<usize> = Vec::new();
        let mut expansion: Vec<usize> = Vec::new();
        let mut cluster = 0u32;

        for i in 0..n {
            if visited[i] {
                continue;
            }
            visited[i] = true;

            scan.neighbors(i, &mut seeds);
            if seeds.len() < self.minpts {
                labels[i] = Label::Noise;
                continue;
            }

            cluster += 1;
            labels[i] = Label::Cluster(cluster);
            sizes.push(1);
            let slot = sizes.len() - 1;

            // The seed list grows while it is walked: every core point
            // reached folds its own neighborhood in.
            let mut j = 0;
            while j < seeds.len() {
                let q = seeds[j];
                j += 1;

                if !visited[q] {
                    visited[q] = true;
                    scan.neighbors(q, &mut expansion);
                    if expansion.len() >= self.minpts {
                        seeds.extend_from_slice(&expansion);
                    }
                }

                if labels[q] == Label::Unassigned {
                    labels[q] = Label::Cluster(cluster);
                    sizes[slot] += 1;
                }
            }
        }

        (labels, sizes)
    }
}

impl Clusterer for Dbscan {
    fn learn(&self, data: Vec<Vec<f64>>) -> Result<()> {
        validate_dataset(&data)?;
        tracing::debug!(
            rows = data.len(),
            eps = self.eps,
            minpts = self.minpts,
            "training dbscan"
        );

        let data = Arc::new(data);
        let (labels, sizes) = self.run(&data);
        tracing::debug!(clusters = sizes.len(), "dbscan finished");

        let mut state = self.state.write();
        state.dataset = data;
        state.labels = labels.into_iter().map(Label::collapse).collect();
        state.sizes = sizes;
        state.trained = true;
        Ok(())
    }
}

impl HardClusterer for Dbscan {
    fn sizes(&self) -> Result<Vec<usize>> {
        let state = self.state.read();
        if !state.trained {
            return Err(Error::NotTrained);
        }
        Ok(state.sizes.clone())
    }

    fn guesses(&self) -> Result<Vec<i32>> {
        let state = self.state.read();
        if !state.trained {
            return Err(Error::NotTrained);
        }
        Ok(state.labels.clone())
    }

    fn predict(&self, observation: &[f64]) -> Result<i32> {
        let state = self.state.read();
        if !state.trained {
            return Err(Error::NotTrained);
        }
        let nearest = nearest_row(&state.dataset, observation, self.distance)?;
        Ok(state.labels[nearest])
    }

    fn online(
        &self,
        _observations: Receiver<Vec<f64>>,
        _done: Receiver<()>,
    ) -> Receiver<OnlineEvent> {
        let (_tx, rx) = channel();
        rx
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// A dense square patch of `side * side` points around `center`,
    /// spaced 0.1 apart.
    fn patch(center: &[f64; 2], side: usize) -> Vec<Vec<f64>> {
        let half = (side as f64 - 1.0) * 0.05;
        (0..side * side)
            .map(|i| {
                vec![
                    center[0] + (i % side) as f64 * 0.1 - half,
                    center[1] + (i / side) as f64 * 0.1 - half,
                ]
            })
            .collect()
    }

    fn two_blobs() -> Vec<Vec<f64>> {
        let mut data = patch(&[0.0, 0.0], 10);
        data.extend(patch(&[10.0, 10.0], 10));
        data
    }

    #[test]
    fn rejects_invalid_parameters() {
        assert!(matches!(Dbscan::new(0, 1.0, 0), Err(Error::ZeroMinpts)));
        assert!(matches!(Dbscan::new(5, 0.0, 0), Err(Error::ZeroEpsilon)));
        assert!(matches!(Dbscan::new(5, -1.0, 0), Err(Error::ZeroEpsilon)));
    }

    #[test]
    fn rejects_empty_training_set() {
        let engine = Dbscan::new(5, 1.0, 0).unwrap();
        assert!(matches!(engine.learn(vec![]), Err(Error::EmptySet)));
    }

    #[test]
    fn queries_before_learn_fail() {
        let engine = Dbscan::new(5, 1.0, 0).unwrap();
        assert!(matches!(engine.sizes(), Err(Error::NotTrained)));
        assert!(matches!(engine.guesses(), Err(Error::NotTrained)));
        assert!(matches!(
            engine.predict(&[0.0, 0.0]),
            Err(Error::NotTrained)
        ));
    }

    #[test]
    fn two_blobs_two_clusters_no_noise() {
        let data = two_blobs();
        let n = data.len();

        let engine = Dbscan::new(5, 1.0, 0).unwrap();
        engine.learn(data).unwrap();

        let sizes = engine.sizes().unwrap();
        assert_eq!(sizes.len(), 2);
        assert_eq!(sizes.iter().sum::<usize>(), n);

        let guesses = engine.guesses().unwrap();
        assert_eq!(guesses.len(), n);
        assert!(guesses.iter().all(|&l| l == 1 || l == 2));
        // Each blob is one cluster.
        assert!(guesses[..100].iter().all(|&l| l == guesses[0]));
        assert!(guesses[100..].iter().all(|&l| l == guesses[100]));
        assert_ne!(guesses[0], guesses[100]);
    }

    #[test]
    fn isolated_point_is_noise_and_adds_no_cluster() {
        let mut data = two_blobs();
        data.push(vec![1000.0, 1000.0]);
        let n = data.len();

        let engine = Dbscan::new(5, 1.0, 0).unwrap();
        engine.learn(data).unwrap();

        let sizes = engine.sizes().unwrap();
        assert_eq!(sizes.len(), 2);
        assert_eq!(sizes.iter().sum::<usize>(), n - 1);

        let guesses = engine.guesses().unwrap();
        assert_eq!(guesses[n - 1], -1);
        assert_eq!(guesses.iter().filter(|&&l| l == -1).count(), 1);
        // The traversal sentinel never survives training.
        assert!(guesses.iter().all(|&l| l != 0));
    }

    #[test]
    fn all_points_apart_is_all_noise() {
        let data: Vec<Vec<f64>> = (0..6).map(|i| vec![i as f64 * 100.0, 0.0]).collect();

        let engine = Dbscan::new(3, 1.0, 0).unwrap();
        engine.learn(data).unwrap();

        assert!(engine.sizes().unwrap().is_empty());
        assert!(engine.guesses().unwrap().iter().all(|&l| l == -1));
    }

    #[test]
    fn chain_of_points_connects_into_one_cluster() {
        let data: Vec<Vec<f64>> = (0..12).map(|i| vec![i as f64 * 0.3, 0.0]).collect();

        let engine = Dbscan::new(2, 0.5, 0).unwrap();
        engine.learn(data).unwrap();

        let guesses = engine.guesses().unwrap();
        assert!(guesses.iter().all(|&l| l == 1));
        assert_eq!(engine.sizes().unwrap(), vec![12]);
    }

    #[test]
    fn predict_propagates_noise_labels() {
        let mut data = two_blobs();
        data.push(vec![1000.0, 1000.0]);

        let engine = Dbscan::new(5, 1.0, 0).unwrap();
        engine.learn(data).unwrap();

        // Close to the outlier: inherits its noise label.
        assert_eq!(engine.predict(&[999.0, 999.0]).unwrap(), -1);
        // Close to a blob: inherits that blob's cluster.
        let near_first = engine.predict(&[0.01, 0.01]).unwrap();
        assert!(near_first == 1 || near_first == 2);
    }

    #[test]
    fn predict_matches_guesses_on_training_rows() {
        let data = two_blobs();
        let engine = Dbscan::new(5, 1.0, 0).unwrap();
        engine.learn(data.clone()).unwrap();

        let guesses = engine.guesses().unwrap();
        for (i, row) in data.iter().enumerate() {
            assert_eq!(engine.predict(row).unwrap(), guesses[i]);
        }
    }

    #[test]
    fn double_training_is_idempotent() {
        let data = two_blobs();
        let engine = Dbscan::new(5, 1.0, 0).unwrap();

        engine.learn(data.clone()).unwrap();
        let first = engine.guesses().unwrap();
        engine.learn(data).unwrap();
        let second = engine.guesses().unwrap();

        assert_eq!(first, second);
    }

    #[test]
    fn worker_cap_does_not_change_the_result() {
        let data = two_blobs();

        let serial = Dbscan::new(5, 1.0, 1).unwrap();
        let pooled = Dbscan::new(5, 1.0, 0).unwrap();
        serial.learn(data.clone()).unwrap();
        pooled.learn(data).unwrap();

        assert_eq!(serial.guesses().unwrap(), pooled.guesses().unwrap());
    }

    #[test]
    fn is_not_online() {
        let engine = Dbscan::new(5, 1.0, 0).unwrap();
        assert!(!engine.is_online());

        let (_obs_tx, obs_rx) = channel();
        let (_done_tx, done_rx) = channel();
        assert!(engine.online(obs_rx, done_rx).recv().is_err());
    }
}
