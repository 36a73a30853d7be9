//! # mcikmeans - centroid clustering for novelty detection
//!
//! A Rust implementation of centroid-based clustering with support for:
//! - K-Means with uniform or K-Means++ (distance-weighted) seeding
//! - MCIKMeans, a semi-supervised variant that keeps clusters label-pure
//!   by penalizing impure assignments of labeled samples
//! - Reproducible runs: every random choice comes from a seeded generator
//!
//! Distances are Euclidean. The engines return clusters only; mapping them to
//! predictions (for example through [`ClusterOps::dominant_label`]) is left to
//! the caller.

use thiserror::Error;

pub mod cluster;
pub mod kmeans;
pub mod mci;
pub mod sample;
pub mod seeding;

pub use cluster::{Cluster, ClusterOps, ImpurityBasedCluster, Supervision};
pub use kmeans::{Init, KMeans};
pub use mci::MciKMeans;
pub use sample::Sample;

/// Errors that can occur during clustering
#[derive(Error, Debug)]
pub enum ClusteringError {
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),
    #[error("No {0} to cluster")]
    EmptyInput(&'static str),
    #[error("A cluster must contain at least one sample")]
    EmptyCluster,
    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },
    #[error("Labeled sample has no label")]
    MissingLabel,
}

pub type Result<T> = std::result::Result<T, ClusteringError>;

/// K-Means with uniformly drawn initial centroids.
pub fn kmeans(samples: &[Sample], k: usize, seed: u64) -> Result<Vec<Cluster>> {
    KMeans::new(k).with_seed(seed).fit(samples)
}

/// K-Means with distance-weighted initial centroids.
pub fn kmeans_plus_plus(samples: &[Sample], k: usize, seed: u64) -> Result<Vec<Cluster>> {
    KMeans::new(k)
        .with_seed(seed)
        .with_init(Init::KMeansPlusPlus)
        .fit(samples)
}

/// MCIKMeans with default iteration bounds, see [`MciKMeans`].
pub fn mci_kmeans(
    labeled: &[Sample],
    unlabeled: &[Sample],
    k: usize,
    seed: u64,
) -> Result<Vec<ImpurityBasedCluster>> {
    MciKMeans::new(k).with_seed(seed).fit(labeled, unlabeled)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entry_points() {
        let samples = vec![
            Sample::labeled(vec![1.0, 1.0], 0),
            Sample::labeled(vec![1.1, 1.1], 0),
            Sample::labeled(vec![9.0, 9.0], 1),
            Sample::labeled(vec![9.1, 9.1], 1),
        ];

        assert!(!kmeans(&samples, 2, 1).unwrap().is_empty());
        assert!(!kmeans_plus_plus(&samples, 2, 1).unwrap().is_empty());

        let clusters = mci_kmeans(&samples, &[], 2, 1).unwrap();
        assert_eq!(clusters.len(), 2);
        let mut labels: Vec<Option<i32>> = clusters.iter().map(|c| c.dominant_label()).collect();
        labels.sort();
        assert_eq!(labels, vec![Some(0), Some(1)]);
    }

    #[test]
    fn test_error_messages() {
        let err = kmeans(&[], 2, 0).unwrap_err();
        assert_eq!(err.to_string(), "No samples to cluster");

        let err = mci_kmeans(&[Sample::labeled(vec![0.0], 1)], &[], 1, 0).unwrap_err();
        assert!(err.to_string().starts_with("Invalid parameter"));
    }
}
