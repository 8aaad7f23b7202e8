//! Runs every engine over one batch of machine sensor readings.
//!
//! The readings are three bursts of (temperature, vibration) samples from
//! healthy operating modes, plus a single glitched sample far outside all of
//! them. Each engine summarizes what it found, then labels a few fresh
//! probe readings.

use huddle::{Clusterer, Dbscan, HardClusterer, Kmeans, Optics};

/// A 3x3 burst of readings spreading out from `origin`.
fn burst(origin: (f64, f64), step: f64) -> Vec<Vec<f64>> {
    (0..9)
        .map(|i| {
            vec![
                origin.0 + (i % 3) as f64 * step,
                origin.1 + (i / 3) as f64 * step,
            ]
        })
        .collect()
}

fn main() {
    let mut readings = burst((21.0, 0.4), 0.25);
    readings.extend(burst((35.5, 1.8), 0.25));
    readings.extend(burst((48.0, 0.9), 0.25));
    // One glitched sample, nowhere near any operating mode.
    readings.push(vec![90.0, 12.0]);

    println!("{} readings: three bursts and one glitch\n", readings.len());

    let kmeans = Kmeans::new(200, 3).unwrap().with_seed(9);
    kmeans.learn(readings.clone()).unwrap();
    println!("k-means (k=3): sizes {:?}", kmeans.sizes().unwrap());
    for centroid in kmeans.centroids().unwrap() {
        println!("  centroid at ({:.2}, {:.2})", centroid[0], centroid[1]);
    }

    let dbscan = Dbscan::new(3, 0.6, 0).unwrap();
    dbscan.learn(readings.clone()).unwrap();
    let noise = dbscan
        .guesses()
        .unwrap()
        .iter()
        .filter(|&&label| label == -1)
        .count();
    println!(
        "\ndbscan (eps=0.6, minpts=3): sizes {:?}, {} reading(s) flagged as noise",
        dbscan.sizes().unwrap(),
        noise
    );

    let optics = Optics::new(3, f64::INFINITY, 0.1, 0).unwrap();
    optics.learn(readings.clone()).unwrap();
    println!("optics (xi=0.1): sizes {:?}", optics.sizes().unwrap());

    let probes = [vec![21.3, 0.6], vec![48.1, 1.2], vec![88.0, 11.0]];
    println!("\nprobe readings:");
    for probe in &probes {
        println!(
            "  ({:>5.1}, {:>4.1}) -> k-means {}, dbscan {}, optics {}",
            probe[0],
            probe[1],
            kmeans.predict(probe).unwrap(),
            dbscan.predict(probe).unwrap(),
            optics.predict(probe).unwrap(),
        );
    }
}
