//! Minimal Cluster Impurity K-Means.
//!
//! A semi-supervised K-Means in which labeled samples are assigned by
//! Iterative Conditional Modes under an impurity-penalized distance, while
//! unlabeled samples simply go to the closest centroid. The outer loop
//! repeats ICM until the centroids stop moving.

use rand::prelude::*;
use rand_chacha::ChaCha8Rng;
use tracing::{debug, info, warn};

use crate::cluster::{ClusterOps, ImpurityBasedCluster, Supervision};
use crate::sample::{self, Sample};
use crate::seeding;
use crate::{ClusteringError, Result};

const DEFAULT_MAX_ITERATIONS: usize = 300;
const DEFAULT_MAX_SWEEPS: usize = 1000;
const DEFAULT_TOLERANCE: f64 = 1e-9;

/// Semi-supervised clustering that keeps clusters label-homogeneous.
///
/// # Examples
///
/// ```rust
/// use mcikmeans::{MciKMeans, Sample};
///
/// let labeled = vec![
///     Sample::labeled(vec![0.0, 0.0], 1),
///     Sample::labeled(vec![0.5, 0.0], 1),
///     Sample::labeled(vec![20.0, 20.0], 2),
///     Sample::labeled(vec![20.5, 20.0], 2),
/// ];
/// let unlabeled = vec![Sample::new(vec![0.2, 0.1]), Sample::new(vec![19.9, 20.1])];
///
/// let clusters = MciKMeans::new(2).with_seed(3).fit(&labeled, &unlabeled).unwrap();
/// assert!(clusters.iter().all(|c| c.entropy() == 0.0));
/// ```
#[derive(Debug, Clone)]
pub struct MciKMeans {
    n_clusters: usize,
    seed: u64,
    max_iterations: usize,
    max_sweeps: usize,
    tolerance: f64,
}

impl MciKMeans {
    /// Create a new MCIKMeans instance asking for `n_clusters` clusters.
    ///
    /// `n_clusters` is validated by [`MciKMeans::fit`].
    pub fn new(n_clusters: usize) -> Self {
        Self {
            n_clusters,
            seed: 0,
            max_iterations: DEFAULT_MAX_ITERATIONS,
            max_sweeps: DEFAULT_MAX_SWEEPS,
            tolerance: DEFAULT_TOLERANCE,
        }
    }

    /// Seed for seeding and the ICM visiting order (default: 0)
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Upper bound on outer centroid iterations (default: 300)
    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        if max_iterations == 0 {
            panic!("Number of iterations must be positive");
        }
        self.max_iterations = max_iterations;
        self
    }

    /// Upper bound on ICM sweeps per outer iteration (default: 1000)
    pub fn with_max_sweeps(mut self, max_sweeps: usize) -> Self {
        if max_sweeps == 0 {
            panic!("Number of sweeps must be positive");
        }
        self.max_sweeps = max_sweeps;
        self
    }

    /// Largest centroid movement still considered converged (default: 1e-9)
    pub fn with_tolerance(mut self, tolerance: f64) -> Self {
        if !(tolerance >= 0.0) {
            panic!("Tolerance must be non-negative");
        }
        self.tolerance = tolerance;
        self
    }

    pub fn n_clusters(&self) -> usize {
        self.n_clusters
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    pub fn max_iterations(&self) -> usize {
        self.max_iterations
    }

    pub fn max_sweeps(&self) -> usize {
        self.max_sweeps
    }

    pub fn tolerance(&self) -> f64 {
        self.tolerance
    }

    /// Cluster `labeled` and `unlabeled` samples together.
    ///
    /// Unlabeled samples may still carry a label (for later evaluation); it
    /// is ignored during clustering. Empty clusters are dropped from the
    /// result, and each member's cluster id matches its cluster's
    /// [`ImpurityBasedCluster::id`].
    ///
    /// # Errors
    ///
    /// * [`ClusteringError::InvalidParameter`] if `n_clusters < 2`
    /// * [`ClusteringError::EmptyInput`] if `labeled` is empty
    /// * [`ClusteringError::MissingLabel`] if a labeled sample has no label
    /// * [`ClusteringError::DimensionMismatch`] if sample lengths differ
    pub fn fit(
        &self,
        labeled: &[Sample],
        unlabeled: &[Sample],
    ) -> Result<Vec<ImpurityBasedCluster>> {
        if self.n_clusters < 2 {
            return Err(ClusteringError::InvalidParameter(format!(
                "number of clusters must be at least 2, got {}",
                self.n_clusters
            )));
        }
        if labeled.is_empty() {
            return Err(ClusteringError::EmptyInput("labeled samples"));
        }
        if labeled.iter().any(|s| !s.is_labeled()) {
            return Err(ClusteringError::MissingLabel);
        }
        sample::common_dim(labeled.iter().chain(unlabeled))?;

        let mut rng = ChaCha8Rng::seed_from_u64(self.seed);
        let seeds =
            seeding::farthest_first_per_label(labeled, unlabeled, self.n_clusters, &mut rng);

        info!(
            labeled = labeled.len(),
            unlabeled = unlabeled.len(),
            k = self.n_clusters,
            seeded = seeds.len(),
            dim = labeled[0].dim(),
            "starting mci-kmeans"
        );

        let mut clusters: Vec<ImpurityBasedCluster> = seeds
            .into_iter()
            .enumerate()
            .map(|(id, centroid)| ImpurityBasedCluster::seeded(id, centroid))
            .collect();

        let mut labeled: Vec<Sample> = labeled.iter().map(Sample::copy).collect();
        let mut unlabeled: Vec<Sample> = unlabeled.iter().map(Sample::copy).collect();

        let mut centroids = snapshot(&clusters);
        let mut converged = false;
        for iteration in 0..self.max_iterations {
            let reassigned = self.icm(&mut labeled, &mut unlabeled, &mut clusters, &mut rng);

            let next = snapshot(&clusters);
            let shift = sample::max_shift(&centroids, &next);
            centroids = next;

            debug!(
                iteration = iteration + 1,
                reassigned,
                shift,
                "mci-kmeans iteration"
            );

            if shift <= self.tolerance {
                info!(iterations = iteration + 1, "mci-kmeans converged");
                converged = true;
                break;
            }
        }

        if !converged {
            warn!(
                max_iterations = self.max_iterations,
                "mci-kmeans stopped before centroids settled"
            );
        }

        clusters.retain(|c| !c.is_empty());
        if clusters.len() < self.n_clusters {
            warn!(
                requested = self.n_clusters,
                clusters = clusters.len(),
                "empty clusters discarded"
            );
        }
        Ok(clusters)
    }

    /// Iterative Conditional Modes: sweep over every sample in random order,
    /// moving each to its cheapest cluster, until a sweep moves nothing.
    /// Returns the number of reassignments made.
    fn icm<R: Rng + ?Sized>(
        &self,
        labeled: &mut [Sample],
        unlabeled: &mut [Sample],
        clusters: &mut [ImpurityBasedCluster],
        rng: &mut R,
    ) -> usize {
        let mut labeled_order: Vec<usize> = (0..labeled.len()).collect();
        let mut unlabeled_order: Vec<usize> = (0..unlabeled.len()).collect();
        let mut total = 0;

        for sweep in 0..self.max_sweeps {
            labeled_order.shuffle(rng);
            unlabeled_order.shuffle(rng);

            let mut labeled_next = labeled_order.iter();
            let mut unlabeled_next = unlabeled_order.iter();
            let mut changed = 0;

            while labeled_next.len() + unlabeled_next.len() > 0 {
                let pick_labeled = unlabeled_next.len() == 0
                    || (labeled_next.len() > 0 && rng.gen_bool(0.5));

                let (sample, supervision) = if pick_labeled {
                    match labeled_next.next() {
                        Some(&idx) => (&mut labeled[idx], Supervision::Labeled),
                        None => break,
                    }
                } else {
                    match unlabeled_next.next() {
                        Some(&idx) => (&mut unlabeled[idx], Supervision::Unlabeled),
                        None => break,
                    }
                };

                if reassign(sample, supervision, clusters) {
                    changed += 1;
                }
            }

            total += changed;
            debug!(sweep = sweep + 1, changed, "icm sweep");
            if changed == 0 {
                return total;
            }
        }

        warn!(
            max_sweeps = self.max_sweeps,
            "icm stopped before assignments settled"
        );
        total
    }
}

/// Move `sample` to its cheapest cluster. Returns whether it changed cluster.
fn reassign(
    sample: &mut Sample,
    supervision: Supervision,
    clusters: &mut [ImpurityBasedCluster],
) -> bool {
    let mut chosen = 0;
    let mut best = f64::INFINITY;
    for (idx, cluster) in clusters.iter().enumerate() {
        let cost = cluster.cost(sample, supervision);
        if cost < best {
            chosen = idx;
            best = cost;
        }
    }

    if sample.cluster_id() == Some(chosen) {
        return false;
    }

    if let Some(previous) = sample.cluster_id() {
        clusters[previous].detach(sample, supervision);
    }
    sample.set_cluster_id(Some(chosen));
    clusters[chosen].attach(sample.clone(), supervision);
    true
}

fn snapshot(clusters: &[ImpurityBasedCluster]) -> Vec<Sample> {
    clusters.iter().map(|c| c.centroid().copy()).collect()
}
