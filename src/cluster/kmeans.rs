//! K-means: centroid clustering via Lloyd iteration.
//!
//! # The Algorithm
//!
//! K-means partitions data into `k` clusters by minimizing the within-cluster
//! sum of squares:
//!
//! ```text
//! J = Σ_k Σ_{x ∈ C_k} ||x - μ_k||²
//! ```
//!
//! Each pass recomputes every centroid as the mean of its members, then
//! reassigns every point to its nearest centroid. WCSS decreases
//! monotonically, so the iteration converges to a local optimum.
//!
//! ## Seeding (k-means++)
//!
//! Initial centroids are spread out by sampling each next centroid with
//! probability proportional to the squared distance from the nearest
//! already-chosen one (Arthur & Vassilvitskii, 2007). This gives a provable
//! O(log k) approximation to the optimal WCSS and removes most of Lloyd's
//! initialization sensitivity.
//!
//! ## Stopping
//!
//! The engine runs up to the configured iteration cap, stopping early once
//! the membership-change counter stays flat for two consecutive passes.
//!
//! ## Online mode
//!
//! Besides batch training, the engine supports a streamed mode: centroids
//! are seeded uniformly at random (no data has arrived yet) and nudged
//! toward each incoming observation by a fixed learning rate,
//!
//! ```text
//! μ_k ← α·x + (1 − α)·μ_k
//! ```
//!
//! with a throttled background task re-partitioning the accumulated
//! observations whenever a centroid has drifted appreciably.
//!
//! ## When to use
//!
//! - Clusters are roughly spherical and similarly sized
//! - `k` is known in advance
//! - Observations arrive as a stream (online mode)

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc::{channel, Receiver, RecvTimeoutError, TryRecvError};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use rand::prelude::*;

use super::distance::{euclidean, squared_euclidean, DistanceFn};
use super::traits::{Clusterer, HardClusterer, OnlineConfig, OnlineEvent};
use super::validate_dataset;
use crate::error::{Error, Result};

/// Number of consecutive passes with a flat change counter before the Lloyd
/// iteration stops early.
const CHANGES_THRESHOLD: usize = 2;

/// Componentwise tolerance under which a centroid counts as unmoved by an
/// online update.
const MEAN_THRESHOLD: f64 = 0.05;

/// Cap on concurrently running background re-partition tasks.
const MAX_INFLIGHT_REPARTITIONS: usize = 2;

/// Half-width of the uniform cube online centroids are seeded from.
const SEED_BOUND: f64 = 5.0;

/// K-means clustering engine.
pub struct Kmeans {
    iterations: usize,
    k: usize,
    distance: DistanceFn,
    seed: Option<u64>,
    online: Option<OnlineConfig>,
    inflight: Arc<AtomicUsize>,
    state: Arc<RwLock<State>>,
}

#[derive(Default)]
struct State {
    dataset: Vec<Vec<f64>>,
    centroids: Vec<Vec<f64>>,
    assignments: Vec<usize>,
    groups: Vec<Vec<Vec<f64>>>,
    trained: bool,
}

impl Kmeans {
    /// Create a new k-means engine.
    ///
    /// # Arguments
    ///
    /// * `iterations` - Cap on Lloyd passes, at least 1.
    /// * `k` - Number of clusters, at least 2.
    pub fn new(iterations: usize, k: usize) -> Result<Self> {
        if iterations < 1 {
            return Err(Error::ZeroIterations);
        }
        if k < 2 {
            return Err(Error::OneCluster);
        }

        Ok(Self {
            iterations,
            k,
            distance: euclidean,
            seed: None,
            online: None,
            inflight: Arc::new(AtomicUsize::new(0)),
            state: Arc::new(RwLock::new(State::default())),
        })
    }

    /// Override the pairwise distance (default: Euclidean).
    pub fn with_distance(mut self, distance: DistanceFn) -> Self {
        self.distance = distance;
        self
    }

    /// Fix the RNG seed for reproducible seeding.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Configure streamed training. Must be called before
    /// [`HardClusterer::online`] starts a session.
    ///
    /// `alpha` must lie in `(0, 1)` and `dimension` must be at least 1.
    pub fn with_online(mut self, config: OnlineConfig) -> Result<Self> {
        if !(config.alpha > 0.0 && config.alpha < 1.0) {
            return Err(Error::ZeroAlpha);
        }
        if config.dimension < 1 {
            return Err(Error::DimensionMismatch {
                expected: 1,
                found: 0,
            });
        }
        self.online = Some(config);
        Ok(self)
    }

    /// Trained centroids, one row per cluster.
    pub fn centroids(&self) -> Result<Vec<Vec<f64>>> {
        let state = self.state.read();
        if !state.trained {
            return Err(Error::NotTrained);
        }
        Ok(state.centroids.clone())
    }

    fn rng(&self) -> StdRng {
        match self.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        }
    }

    /// K-means++ seeding: first centroid uniform, each next one sampled with
    /// probability proportional to the squared distance from the nearest
    /// already-chosen centroid.
    fn seed_centroids(&self, data: &[Vec<f64>], rng: &mut StdRng) -> Vec<Vec<f64>> {
        let n = data.len();
        let mut centroids: Vec<Vec<f64>> = Vec::with_capacity(self.k);
        centroids.push(data[rng.random_range(0..n)].clone());

        let mut weights = vec![0.0f64; n];
        while centroids.len() < self.k {
            let mut total = 0.0;
            for (i, x) in data.iter().enumerate() {
                let mut nearest = f64::MAX;
                for c in &centroids {
                    let d = (self.distance)(c, x);
                    let d2 = d * d;
                    if d2 < nearest {
                        nearest = d2;
                    }
                }
                weights[i] = nearest;
                total += nearest;
            }

            // Weighted draw by subtraction; all-zero weights (every point
            // coincides with a centroid) fall back to a uniform draw.
            let choice = if total > 0.0 {
                let mut t = rng.random_range(0.0..total);
                let mut chosen = n - 1;
                for (i, w) in weights.iter().enumerate() {
                    if t < *w {
                        chosen = i;
                        break;
                    }
                    t -= *w;
                }
                chosen
            } else {
                rng.random_range(0..n)
            };
            centroids.push(data[choice].clone());
        }
        centroids
    }

    /// Lloyd passes over `data`, mutating `centroids` in place.
    ///
    /// Returns the final per-point assignment and the member indices per
    /// cluster.
    fn lloyd(
        &self,
        data: &[Vec<f64>],
        centroids: &mut [Vec<f64>],
    ) -> (Vec<usize>, Vec<Vec<usize>>) {
        let n = data.len();
        let dim = data[0].len();

        let mut assigned: Vec<Option<usize>> = vec![None; n];
        let mut members: Vec<Vec<usize>> = vec![Vec::new(); self.k];
        let mut changes = 0usize;
        let mut old_changes = 0usize;
        let mut plateau = 0usize;
        let mut passes = 0usize;

        for _ in 0..self.iterations {
            passes += 1;

            // Recompute each centroid as the mean of its members; clusters
            // that lost all members keep their previous centroid.
            for (j, centroid) in centroids.iter_mut().enumerate() {
                if members[j].is_empty() {
                    continue;
                }
                let mut mean = vec![0.0f64; dim];
                for &i in &members[j] {
                    for (m, v) in mean.iter_mut().zip(&data[i]) {
                        *m += v;
                    }
                }
                let inv = 1.0 / members[j].len() as f64;
                for m in &mut mean {
                    *m *= inv;
                }
                *centroid = mean;
                members[j].clear();
            }

            for (i, point) in data.iter().enumerate() {
                let mut best = 0usize;
                let mut min = f64::MAX;
                for (j, centroid) in centroids.iter().enumerate() {
                    let d = (self.distance)(point, centroid);
                    if d < min {
                        min = d;
                        best = j;
                    }
                }
                if let Some(prev) = assigned[i] {
                    if prev != best {
                        changes += 1;
                    }
                }
                assigned[i] = Some(best);
                members[best].push(i);
            }

            if changes == old_changes {
                plateau += 1;
                if plateau >= CHANGES_THRESHOLD {
                    break;
                }
            } else {
                plateau = 0;
            }
            old_changes = changes;
        }

        tracing::debug!(passes, changes, "lloyd iteration finished");
        let assignments = assigned.into_iter().map(|a| a.unwrap_or(0)).collect();
        (assignments, members)
    }
}

/// Copy cluster member rows into per-cluster groups, one task per cluster.
fn collect_groups(data: &[Vec<f64>], members: &[Vec<usize>]) -> Vec<Vec<Vec<f64>>> {
    std::thread::scope(|scope| {
        let handles: Vec<_> = members
            .iter()
            .map(|indices| {
                scope.spawn(move || {
                    indices
                        .iter()
                        .map(|&i| data[i].clone())
                        .collect::<Vec<Vec<f64>>>()
                })
            })
            .collect();
        handles
            .into_iter()
            .map(|h| h.join().expect("group copy task panicked"))
            .collect()
    })
}

/// Re-assign every accumulated observation to its nearest centroid.
fn repartition(state: &RwLock<State>) {
    let mut guard = state.write();
    let state = &mut *guard;

    let mut assignments = Vec::with_capacity(state.dataset.len());
    let mut groups: Vec<Vec<Vec<f64>>> = vec![Vec::new(); state.centroids.len()];
    for row in &state.dataset {
        let mut best = 0usize;
        let mut min = f64::MAX;
        for (j, centroid) in state.centroids.iter().enumerate() {
            let d = squared_euclidean(row, centroid);
            if d < min {
                min = d;
                best = j;
            }
        }
        assignments.push(best);
        groups[best].push(row.clone());
    }
    state.assignments = assignments;
    state.groups = groups;
}

fn approx_eq(a: &[f64], b: &[f64], tolerance: f64) -> bool {
    a.iter().zip(b.iter()).all(|(x, y)| (x - y).abs() <= tolerance)
}

impl Clusterer for Kmeans {
    fn learn(&self, data: Vec<Vec<f64>>) -> Result<()> {
        validate_dataset(&data)?;
        tracing::debug!(rows = data.len(), dim = data[0].len(), k = self.k, "training k-means");

        let mut rng = self.rng();
        let mut centroids = self.seed_centroids(&data, &mut rng);
        let (assignments, members) = self.lloyd(&data, &mut centroids);
        let groups = collect_groups(&data, &members);

        let mut state = self.state.write();
        state.dataset = data;
        state.centroids = centroids;
        state.assignments = assignments;
        state.groups = groups;
        state.trained = true;
        Ok(())
    }
}

impl HardClusterer for Kmeans {
    fn sizes(&self) -> Result<Vec<usize>> {
        let state = self.state.read();
        if !state.trained {
            return Err(Error::NotTrained);
        }
        Ok(state.groups.iter().map(Vec::len).collect())
    }

    fn guesses(&self) -> Result<Vec<i32>> {
        let state = self.state.read();
        if !state.trained {
            return Err(Error::NotTrained);
        }
        Ok(state.assignments.iter().map(|&a| a as i32).collect())
    }

    fn predict(&self, observation: &[f64]) -> Result<i32> {
        let state = self.state.read();
        if !state.trained {
            return Err(Error::NotTrained);
        }
        let dim = state.centroids[0].len();
        if observation.len() != dim {
            return Err(Error::DimensionMismatch {
                expected: dim,
                found: observation.len(),
            });
        }

        let mut best = 0usize;
        let mut min = f64::MAX;
        for (j, centroid) in state.centroids.iter().enumerate() {
            let d = (self.distance)(observation, centroid);
            if d < min {
                min = d;
                best = j;
            }
        }
        Ok(best as i32)
    }

    fn is_online(&self) -> bool {
        true
    }

    fn online(
        &self,
        observations: Receiver<Vec<f64>>,
        done: Receiver<()>,
    ) -> Receiver<OnlineEvent> {
        let (events, out) = channel();

        let Some(config) = self.online else {
            tracing::warn!("online session requested without online configuration");
            return out;
        };

        let state = Arc::clone(&self.state);
        let inflight = Arc::clone(&self.inflight);
        let k = self.k;
        let mut rng = self.rng();

        std::thread::spawn(move || {
            // No data has arrived yet, so seed centroids uniformly.
            {
                let mut st = state.write();
                st.dataset = Vec::new();
                st.centroids = (0..k)
                    .map(|_| {
                        (0..config.dimension)
                            .map(|_| rng.random_range(-SEED_BOUND..=SEED_BOUND))
                            .collect()
                    })
                    .collect();
                st.assignments = Vec::new();
                st.groups = vec![Vec::new(); k];
                st.trained = true;
            }

            loop {
                // Drain pending observations before honoring the done
                // signal, so a buffered stream is fully processed.
                let observation = match observations.try_recv() {
                    Ok(o) => o,
                    Err(TryRecvError::Empty) => {
                        if done.try_recv().is_ok() {
                            break;
                        }
                        match observations.recv_timeout(Duration::from_millis(10)) {
                            Ok(o) => o,
                            Err(RecvTimeoutError::Timeout) => continue,
                            Err(RecvTimeoutError::Disconnected) => break,
                        }
                    }
                    Err(TryRecvError::Disconnected) => break,
                };

                if observation.len() != config.dimension {
                    tracing::warn!(
                        expected = config.dimension,
                        found = observation.len(),
                        "dropping observation with mismatched dimension"
                    );
                    continue;
                }

                let (cluster, moved) = {
                    let mut st = state.write();
                    let mut best = 0usize;
                    let mut min = f64::MAX;
                    for (j, centroid) in st.centroids.iter().enumerate() {
                        let d = squared_euclidean(&observation, centroid);
                        if d < min {
                            min = d;
                            best = j;
                        }
                    }

                    let updated: Vec<f64> = st.centroids[best]
                        .iter()
                        .zip(&observation)
                        .map(|(c, x)| config.alpha * x + (1.0 - config.alpha) * c)
                        .collect();
                    let moved = !approx_eq(&st.centroids[best], &updated, MEAN_THRESHOLD);
                    st.centroids[best] = updated;
                    st.dataset.push(observation.clone());
                    (best, moved)
                };

                let _ = events.send(OnlineEvent {
                    cluster,
                    observation,
                });

                if moved && inflight.load(Ordering::SeqCst) < MAX_INFLIGHT_REPARTITIONS {
                    inflight.fetch_add(1, Ordering::SeqCst);
                    let state = Arc::clone(&state);
                    let inflight = Arc::clone(&inflight);
                    std::thread::spawn(move || {
                        repartition(&state);
                        inflight.fetch_sub(1, Ordering::SeqCst);
                    });
                    tracing::debug!(cluster, "scheduled background re-partition");
                }
            }
        });

        out
    }
}
