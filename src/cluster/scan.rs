//! Parallel ε-neighborhood scan shared by DBSCAN and OPTICS.
//!
//! Every neighborhood query is an exact linear scan of the dataset. The scan
//! is split across a pool of workers, each owning a fixed contiguous range of
//! row indices. A query dispatches the point index to every worker; workers
//! append matching indices to a shared buffer and signal a completion
//! channel, and the caller waits for all of them before reading the result.
//!
//! Neighbors of a point are usually a tiny fraction of the dataset, so
//! contention on the result buffer stays low while the scan itself
//! parallelizes well. Only one query is in flight per pool.

use std::sync::mpsc::{channel, Receiver, Sender};
use std::sync::Arc;
use std::thread::JoinHandle;

use parking_lot::Mutex;

use super::distance::DistanceFn;

pub(crate) struct NeighborScan {
    queries: Vec<Sender<usize>>,
    handles: Vec<JoinHandle<()>>,
    hits: Arc<Mutex<Vec<usize>>>,
    done: Receiver<()>,
}

impl NeighborScan {
    /// Spawn a worker pool over `data`, matching rows strictly closer than
    /// `eps` to the query point. `cap` bounds the pool size (0 = no cap).
    pub(crate) fn start(data: Arc<Vec<Vec<f64>>>, eps: f64, distance: DistanceFn, cap: usize) -> Self {
        let n = data.len();
        let cores = std::thread::available_parallelism().map_or(1, |c| c.get());
        let pool = pool_size(n, cap, cores);

        let hits = Arc::new(Mutex::new(Vec::new()));
        let (done_tx, done) = channel();

        let share = n / pool;
        let mut queries = Vec::with_capacity(pool);
        let mut handles = Vec::with_capacity(pool);
        for w in 0..pool {
            let lo = w * share;
            let hi = if w == pool - 1 { n } else { (w + 1) * share };

            let (tx, rx) = channel::<usize>();
            let data = Arc::clone(&data);
            let hits = Arc::clone(&hits);
            let done = done_tx.clone();
            handles.push(std::thread::spawn(move || {
                while let Ok(p) = rx.recv() {
                    let query = &data[p];
                    for i in lo..hi {
                        if distance(query, &data[i]) < eps {
                            hits.lock().push(i);
                        }
                    }
                    if done.send(()).is_err() {
                        break;
                    }
                }
            }));
            queries.push(tx);
        }

        Self {
            queries,
            handles,
            hits,
            done,
        }
    }

    /// Collect `{ j : dist(X[p], X[j]) < eps }` into `out` (cleared first).
    ///
    /// `p` counts itself whenever `dist(p, p) < eps`, which holds for any
    /// metric-like distance with a positive `eps`.
    pub(crate) fn neighbors(&self, p: usize, out: &mut Vec<usize>) {
        self.hits.lock().clear();

        let mut dispatched = 0;
        for worker in &self.queries {
            if worker.send(p).is_ok() {
                dispatched += 1;
            }
        }
        for _ in 0..dispatched {
            if self.done.recv().is_err() {
                break;
            }
        }

        out.clear();
        out.extend_from_slice(&self.hits.lock());
        // Workers race on the shared buffer; sort so callers see the same
        // neighborhood regardless of pool size or interleaving.
        out.sort_unstable();
    }
}

impl Drop for NeighborScan {
    fn drop(&mut self) {
        // Closing the query channels stops the worker loops.
        self.queries.clear();
        for handle in self.handles.drain(..) {
            let _ = handle.join();
        }
    }
}

/// Worker count for a dataset of `n` rows.
///
/// The size ladder follows dataset magnitude; a nonzero user `cap` wins when
/// smaller, and the result never exceeds the machine's core count nor `n`
/// itself.
pub(crate) fn pool_size(n: usize, cap: usize, cores: usize) -> usize {
    let ladder = if n < 1_000 {
        1
    } else if n < 10_000 {
        10
    } else if n < 100_000 {
        100
    } else if n < 1_000_000 {
        1_000
    } else {
        10_000
    };

    let mut size = ladder;
    if cap != 0 && cap < size {
        size = cap;
    }
    size.min(cores.max(1)).min(n).max(1)
}
