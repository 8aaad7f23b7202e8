//! OPTICS: Ordering Points To Identify the Clustering Structure.
//!
//! # The Algorithm (Ankerst et al., 1999)
//!
//! OPTICS generalizes DBSCAN to clusters of differing density. Instead of
//! producing a flat labeling directly, it walks the dataset in *reachability
//! order*: at every step the point with the smallest reachability distance
//! from the already-processed set is visited next, pulled out of a priority
//! queue that supports decrease-key as better paths are discovered.
//!
//! The resulting reachability profile is a one-dimensional silhouette of the
//! cluster structure: valleys are dense regions, peaks are the gaps between
//! them. A second pass extracts clusters from the profile with the ξ method,
//! pairing steeply falling areas with the steeply rising areas that close
//! them.
//!
//! ## Definitions
//!
//! - **Core distance**: distance to the `minpts`-th nearest neighbor within
//!   the ε-neighborhood (the point counts itself); undefined for non-core
//!   points.
//! - **Reachability distance** of `q` from `p`:
//!   `max(core_dist(p), dist(p, q))`.
//! - **Steep area (ξ)**: a run of the profile whose adjacent values change
//!   by at least the factor ξ.
//!
//! Points that never receive a reachability (the seed of each expansion,
//! and points in no core neighborhood) carry an infinite reachability; the
//! extraction pass treats such an entry as an arbitrarily steep drop, which
//! is what allows the profile's very first valley to become a cluster.
//!
//! ## When to use
//!
//! - Cluster densities vary enough that no single DBSCAN ε fits
//! - A reachability ordering of the data is itself of interest

use std::collections::HashSet;
use std::sync::mpsc::{channel, Receiver};
use std::sync::Arc;

use parking_lot::RwLock;

use super::distance::{euclidean, DistanceFn};
use super::queue::{ItemId, PriorityQueue};
use super::scan::NeighborScan;
use super::traits::{Clusterer, HardClusterer, OnlineEvent};
use super::{nearest_row, validate_dataset, Label};
use crate::error::{Error, Result};

/// OPTICS clustering engine.
pub struct Optics {
    minpts: usize,
    eps: f64,
    xi: f64,
    // 1 - xi, the steepness factor applied per comparison.
    x: f64,
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

/// A steeply falling area of the reachability profile, kept while the walk
/// looks for the rising area that closes it into a cluster.
struct SteepDownArea {
    start: usize,
    end: usize,
    // Largest reachability seen between this area and the walk cursor.
    mib: f64,
}

/// Reachability by order position, with a virtual infinite entry one past
/// the end of the profile.
fn profile<'a>(order: &'a [usize], reach: &'a [f64]) -> impl Fn(usize) -> f64 + 'a {
    let n = order.len();
    move |k: usize| {
        if k == n {
            f64::INFINITY
        } else {
            reach[order[k]]
        }
    }
}

impl Optics {
    /// Create a new OPTICS engine.
    ///
    /// # Arguments
    ///
    /// * `minpts` - Minimum neighborhood size for a core point, at least 1.
    /// * `eps` - Neighborhood radius, strictly positive (may be infinite).
    /// * `xi` - Steepness threshold for cluster extraction, in `(0, 1)`.
    /// * `workers` - Cap on the scan worker pool (0 = size by dataset).
    pub fn new(minpts: usize, eps: f64, xi: f64, workers: usize) -> Result<Self> {
        if minpts < 1 {
            return Err(Error::ZeroMinpts);
        }
        if eps <= 0.0 {
            return Err(Error::ZeroEpsilon);
        }
        if !(xi > 0.0 && xi < 1.0) {
            return Err(Error::ZeroXi);
        }

        Ok(Self {
            minpts,
            eps,
            xi,
            x: 1.0 - xi,
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

    /// Walk the dataset in reachability order.
    ///
    /// Returns the processing order and the final per-point reachability
    /// (infinite where undefined).
    fn order(&self, data: &Arc<Vec<Vec<f64>>>) -> (Vec<usize>, Vec<f64>) {
        let n = data.len();
        let scan = NeighborScan::start(Arc::clone(data), self.eps, self.distance, self.workers);

        let mut visited = vec![false; n];
        let mut order = Vec::with_capacity(n);
        let mut reach = vec![f64::INFINITY; n];
        // Queue handle per point. Handles of visited points are stale but
        // never touched: a drained queue has visited everything it held.
        let mut items: Vec<Option<ItemId>> = vec![None; n];

        let mut seed_hood = Vec::new();
        let mut hood = Vec::new();

        for i in 0..n {
            if visited[i] {
                continue;
            }
            scan.neighbors(i, &mut seed_hood);
            visited[i] = true;
            order.push(i);

            let Some(core) = self.core_distance(data, i, &seed_hood) else {
                continue;
            };

            let mut queue = PriorityQueue::with_capacity(seed_hood.len());
            self.pull(data, &visited, i, core, &seed_hood, &mut queue, &mut items, &mut reach);

            while queue.not_empty() {
                let Some((p, _)) = queue.pop() else {
                    break;
                };
                scan.neighbors(p, &mut hood);
                visited[p] = true;
                order.push(p);
                if let Some(core) = self.core_distance(data, p, &hood) {
                    self.pull(data, &visited, p, core, &hood, &mut queue, &mut items, &mut reach);
                }
            }
        }

        (order, reach)
    }

    /// Distance to the `minpts`-th nearest neighbor of `p` within its
    /// ε-neighborhood, or `None` when `p` is not a core point.
    fn core_distance(&self, data: &[Vec<f64>], p: usize, neighbors: &[usize]) -> Option<f64> {
        if neighbors.len() < self.minpts {
            return None;
        }
        let mut dists: Vec<f64> = neighbors
            .iter()
            .map(|&q| (self.distance)(&data[p], &data[q]))
            .collect();
        dists.sort_by(|a, b| a.total_cmp(b));
        Some(dists[self.minpts - 1])
    }

    /// Fold the neighborhood of `p` into the queue: push unseen candidates
    /// with reachability `max(core, dist)`, decrease-key where it improves.
    #[allow(clippy::too_many_arguments)]
    fn pull(
        &self,
        data: &[Vec<f64>],
        visited: &[bool],
        p: usize,
        core: f64,
        neighbors: &[usize],
        queue: &mut PriorityQueue,
        items: &mut [Option<ItemId>],
        reach: &mut [f64],
    ) {
        for &q in neighbors {
            if visited[q] {
                continue;
            }
            let m = core.max((self.distance)(&data[p], &data[q]));
            match items[q] {
                None => {
                    items[q] = Some(queue.push(q, m));
                    reach[q] = m;
                }
                Some(id) => {
                    if m < queue.priority(id) {
                        queue.update(id, q, m);
                        reach[q] = m;
                    }
                }
            }
        }
    }

    /// ξ-extraction over the ordered reachability profile.
    ///
    /// The profile is read with a virtual infinite entry past its end, so a
    /// valley running to the last point is closed like any other: the walk
    /// ends on an arbitrarily steep rise.
    fn extract(&self, order: &[usize], reach: &[f64]) -> (Vec<Label>, Vec<usize>) {
        let n = order.len();
        let r = profile(order, reach);

        let mut areas: Vec<SteepDownArea> = Vec::new();
        let mut spans: Vec<(usize, usize)> = Vec::new();
        let mut recorded: HashSet<(usize, usize)> = HashSet::new();
        let mut mib = 0.0f64;
        let mut i = 0usize;

        while i < n {
            if let Some(end) = self.steep_down_end(order, reach, i) {
                self.filter_areas(&mut areas, order, reach, mib);
                areas.push(SteepDownArea {
                    start: i,
                    end,
                    mib: 0.0,
                });
                i = end + 1;
                mib = r(i);
                continue;
            }

            if let Some(end) = self.steep_up_end(order, reach, i) {
                let us = i;
                let ue = end + 1;
                self.filter_areas(&mut areas, order, reach, mib);
                for area in &areas {
                    if r(ue) * self.x < area.mib {
                        continue;
                    }
                    if let Some(span) = self.cluster_span(order, reach, area, us, ue) {
                        if recorded.insert(span) {
                            spans.push(span);
                        }
                    }
                }
                i = end + 1;
                mib = r(i);
                continue;
            }

            mib = mib.max(r(i));
            i += 1;
        }

        // Label spans in discovery order; overlapping spans resolve to the
        // most recently discovered (innermost) one. Ids are then compacted
        // so every surviving cluster is non-empty.
        let mut by_span = vec![usize::MAX; reach.len()];
        for (index, &(start, end)) in spans.iter().enumerate() {
            for &p in &order[start..end] {
                by_span[p] = index;
            }
        }

        let mut counts = vec![0usize; spans.len()];
        for &s in &by_span {
            if s != usize::MAX {
                counts[s] += 1;
            }
        }
        let mut ids = vec![0u32; spans.len()];
        let mut sizes = Vec::new();
        for (s, &count) in counts.iter().enumerate() {
            if count > 0 {
                sizes.push(count);
                ids[s] = sizes.len() as u32;
            }
        }

        let labels = by_span
            .into_iter()
            .map(|s| {
                if s == usize::MAX {
                    Label::Unassigned
                } else {
                    Label::Cluster(ids[s])
                }
            })
            .collect();
        (labels, sizes)
    }

    /// Drop areas whose start no longer towers over the reachability seen
    /// since; fold `mib` into the survivors.
    fn filter_areas(
        &self,
        areas: &mut Vec<SteepDownArea>,
        order: &[usize],
        reach: &[f64],
        mib: f64,
    ) {
        areas.retain_mut(|area| {
            if reach[order[area.start]] * self.x >= mib {
                area.mib = area.mib.max(mib);
                true
            } else {
                false
            }
        });
    }

    /// Longest steep-down area starting at `i`, or `None`.
    ///
    /// The area extends while the profile is non-increasing, tolerating up
    /// to `minpts` consecutive non-steep steps; the returned index is the
    /// last steep one.
    fn steep_down_end(&self, order: &[usize], reach: &[f64], i: usize) -> Option<usize> {
        let n = order.len();
        let r = profile(order, reach);
        if r(i) * self.x < r(i + 1) {
            return None;
        }

        let mut end = i;
        let mut j = i + 1;
        let mut slack = 0usize;
        while j < n {
            if r(j) < r(j + 1) {
                break;
            }
            if r(j) * self.x >= r(j + 1) {
                end = j;
                slack = 0;
            } else {
                slack += 1;
                if slack > self.minpts {
                    break;
                }
            }
            j += 1;
        }
        Some(end)
    }

    /// Longest steep-up area starting at `i`, or `None`. Mirror of
    /// [`Self::steep_down_end`].
    fn steep_up_end(&self, order: &[usize], reach: &[f64], i: usize) -> Option<usize> {
        let n = order.len();
        let r = profile(order, reach);
        if r(i) > r(i + 1) * self.x {
            return None;
        }

        let mut end = i;
        let mut j = i + 1;
        let mut slack = 0usize;
        while j < n {
            if r(j) > r(j + 1) {
                break;
            }
            if r(j) <= r(j + 1) * self.x {
                end = j;
                slack = 0;
            } else {
                slack += 1;
                if slack > self.minpts {
                    break;
                }
            }
            j += 1;
        }
        Some(end)
    }

    /// Half-open order-index span of the cluster formed by `area` and the
    /// steep-up area `[us, ue)`, or `None` when it falls short of `minpts`.
    fn cluster_span(
        &self,
        order: &[usize],
        reach: &[f64],
        area: &SteepDownArea,
        us: usize,
        ue: usize,
    ) -> Option<(usize, usize)> {
        let r = profile(order, reach);
        let rs = r(area.start);
        let re = r(ue);

        // Relative drop across the candidate cluster. Infinite boundary
        // reachabilities push this out of range, selecting a trim branch
        // whose ratios stay finite.
        let d = (rs - re) / rs;

        let (start, end) = if d.abs() <= self.xi {
            (area.start, ue)
        } else if d > self.xi {
            // The area starts far above the closing side: trim its head to
            // the first index already level with the end.
            let mut k = area.end;
            for j in area.start..=area.end {
                let rj = r(j);
                if ((rj - re) / rj).abs() <= self.xi {
                    k = j;
                    break;
                }
            }
            (k, ue)
        } else {
            // The closing side overshoots the start: trim the tail to the
            // last index still level with the start of the rise.
            let rus = r(us);
            let mut k = us;
            for j in (us..ue).rev() {
                let rj = r(j);
                if ((rj - rus) / rj).abs() <= self.xi {
                    k = j;
                    break;
                }
            }
            (area.start, k + 1)
        };

        if end - start < self.minpts {
            return None;
        }
        Some((start, end))
    }
}

impl Clusterer for Optics {
    fn learn(&self, data: Vec<Vec<f64>>) -> Result<()> {
        validate_dataset(&data)?;
        tracing::debug!(
            rows = data.len(),
            eps = self.eps,
            minpts = self.minpts,
            xi = self.xi,
            "training optics"
        );

        let data = Arc::new(data);
        let (order, reach) = self.order(&data);
        debug_assert_eq!(order.len(), data.len());
        let (labels, sizes) = self.extract(&order, &reach);
        tracing::debug!(clusters = sizes.len(), "optics finished");

        let mut state = self.state.write();
        state.dataset = data;
        state.labels = labels.into_iter().map(Label::collapse).collect();
        state.sizes = sizes;
        state.trained = true;
        Ok(())
    }
}

impl HardClusterer for Optics {
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
