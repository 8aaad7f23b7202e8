//! Pairwise distance primitives.
//!
//! Engines accept any `DistanceFn`; the default is Euclidean. The squared
//! variant skips the square root and is used wherever only the ordering of
//! distances matters. No engine relies on the triangle inequality, so any
//! non-negative symmetric function works.

/// A pairwise distance over equal-length vectors.
pub type DistanceFn = fn(&[f64], &[f64]) -> f64;

/// Euclidean (L2) distance.
#[inline]
pub fn euclidean(a: &[f64], b: &[f64]) -> f64 {
    squared_euclidean(a, b).sqrt()
}

/// Squared Euclidean distance.
#[inline]
pub fn squared_euclidean(a: &[f64], b: &[f64]) -> f64 {
    debug_assert_eq!(a.len(), b.len());
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| {
            let d = x - y;
            d * d
        })
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn euclidean_of_identical_points_is_zero() {
        let p = vec![1.0, 2.0, 3.0];
        assert_eq!(euclidean(&p, &p), 0.0);
    }

    #[test]
    fn euclidean_matches_hand_computation() {
        let a = vec![0.0, 0.0];
        let b = vec![3.0, 4.0];
        assert!((euclidean(&a, &b) - 5.0).abs() < 1e-12);
        assert!((squared_euclidean(&a, &b) - 25.0).abs() < 1e-12);
    }
}
