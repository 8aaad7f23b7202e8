//! Clustering engines for dense vectors.
//!
//! `huddle` is a small library of unsupervised clustering algorithms over
//! row-major `f64` datasets, sharing one trained-engine surface:
//! [`Clusterer::learn`] plus the [`HardClusterer`] queries `sizes`,
//! `guesses` and `predict`.
//!
//! The engines under [`cluster`]:
//! - k-means (k-means++ seeding, Lloyd iterations, streamed online mode)
//! - DBSCAN (density clustering with noise labeling)
//! - OPTICS (reachability ordering with ξ-steep cluster extraction)
//!
//! DBSCAN and OPTICS answer every neighborhood query with an exact linear
//! scan spread across a worker pool; no spatial index is involved, and any
//! user-supplied distance works.

#![forbid(unsafe_code)]

pub mod cluster;
pub mod error;

pub use cluster::{
    euclidean, squared_euclidean, Clusterer, Dbscan, DistanceFn, HardClusterer, Kmeans,
    OnlineConfig, OnlineEvent, Optics, SoftClusterer,
};
pub use error::{Error, Result};
