//! Lloyd's K-Means with uniform or K-Means++ seeding.

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use tracing::{debug, info, warn};

use crate::cluster::{Cluster, ClusterOps};
use crate::sample::{self, Sample};
use crate::seeding;
use crate::{ClusteringError, Result};

const DEFAULT_MAX_ITERATIONS: usize = 300;
const DEFAULT_TOLERANCE: f64 = 1e-9;

/// How [`KMeans`] picks its initial centroids.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Init {
    /// Samples drawn uniformly without replacement.
    #[default]
    Uniform,
    /// Distance-weighted draws, see [`seeding::weighted`].
    KMeansPlusPlus,
}

/// Lloyd's K-Means over [`Sample`]s.
///
/// # Examples
///
/// ```rust
/// use mcikmeans::{ClusterOps, Init, KMeans, Sample};
///
/// let samples = vec![
///     Sample::new(vec![0.0, 0.0]),
///     Sample::new(vec![0.0, 1.0]),
///     Sample::new(vec![10.0, 0.0]),
///     Sample::new(vec![10.0, 1.0]),
/// ];
///
/// let kmeans = KMeans::new(2).with_seed(7).with_init(Init::KMeansPlusPlus);
/// let clusters = kmeans.fit(&samples).unwrap();
///
/// let total: usize = clusters.iter().map(|c| c.size()).sum();
/// assert_eq!(total, samples.len());
/// ```
#[derive(Debug, Clone)]
pub struct KMeans {
    n_clusters: usize,
    seed: u64,
    init: Init,
    max_iterations: usize,
    tolerance: f64,
}

impl KMeans {
    /// Create a new K-Means instance asking for `n_clusters` clusters.
    ///
    /// `n_clusters` is validated by [`KMeans::fit`].
    pub fn new(n_clusters: usize) -> Self {
        Self {
            n_clusters,
            seed: 0,
            init: Init::Uniform,
            max_iterations: DEFAULT_MAX_ITERATIONS,
            tolerance: DEFAULT_TOLERANCE,
        }
    }

    /// Seed for the random source used during initialization (default: 0)
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Initialization strategy (default: [`Init::Uniform`])
    pub fn with_init(mut self, init: Init) -> Self {
        self.init = init;
        self
    }

    /// Upper bound on Lloyd iterations (default: 300)
    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        if max_iterations == 0 {
            panic!("Number of iterations must be positive");
        }
        self.max_iterations = max_iterations;
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

    pub fn init(&self) -> Init {
        self.init
    }

    pub fn max_iterations(&self) -> usize {
        self.max_iterations
    }

    pub fn tolerance(&self) -> f64 {
        self.tolerance
    }

    /// Partition `samples` into at most `n_clusters` non-empty clusters.
    ///
    /// Fewer clusters come back when there are fewer distinct samples than
    /// requested or when a centroid ends up without samples.
    ///
    /// # Errors
    ///
    /// * [`ClusteringError::InvalidParameter`] if `n_clusters` is 0
    /// * [`ClusteringError::EmptyInput`] if `samples` is empty
    /// * [`ClusteringError::DimensionMismatch`] if sample lengths differ
    pub fn fit(&self, samples: &[Sample]) -> Result<Vec<Cluster>> {
        self.validate(samples)?;

        let mut rng = ChaCha8Rng::seed_from_u64(self.seed);
        let centroids = match self.init {
            Init::Uniform => seeding::uniform(samples, self.n_clusters, &mut rng),
            Init::KMeansPlusPlus => seeding::weighted(samples, self.n_clusters, &mut rng),
        };

        if centroids.len() < self.n_clusters {
            warn!(
                requested = self.n_clusters,
                seeded = centroids.len(),
                "fewer initial centroids than requested clusters"
            );
        }

        self.lloyd(samples, centroids)
    }

    /// Run Lloyd's iteration from caller-chosen centroids.
    ///
    /// # Errors
    ///
    /// As [`KMeans::fit`]; additionally [`ClusteringError::InvalidParameter`]
    /// when no centroids are given and [`ClusteringError::DimensionMismatch`]
    /// when a centroid's length differs from the samples'.
    pub fn fit_from(&self, samples: &[Sample], centroids: &[Sample]) -> Result<Vec<Cluster>> {
        self.validate(samples)?;
        if centroids.is_empty() {
            return Err(ClusteringError::InvalidParameter(
                "at least one initial centroid is required".to_string(),
            ));
        }
        sample::common_dim(samples.iter().chain(centroids))?;

        self.lloyd(samples, centroids.iter().map(Sample::copy).collect())
    }

    fn validate(&self, samples: &[Sample]) -> Result<()> {
        if self.n_clusters == 0 {
            return Err(ClusteringError::InvalidParameter(
                "number of clusters must be positive".to_string(),
            ));
        }
        if samples.is_empty() {
            return Err(ClusteringError::EmptyInput("samples"));
        }
        sample::common_dim(samples)?;
        Ok(())
    }

    fn lloyd(&self, samples: &[Sample], mut centroids: Vec<Sample>) -> Result<Vec<Cluster>> {
        info!(
            n = samples.len(),
            k = centroids.len(),
            dim = samples[0].dim(),
            init = ?self.init,
            "starting k-means"
        );

        let mut clusters = Vec::new();
        for iteration in 0..self.max_iterations {
            clusters = group_by_nearest(samples, &centroids)?;

            let next: Vec<Sample> = clusters.iter().map(|c| c.centroid().copy()).collect();
            let shift = sample::max_shift(&centroids, &next);
            centroids = next;

            debug!(
                iteration = iteration + 1,
                clusters = clusters.len(),
                shift,
                cost = compute_cost(&clusters),
                "lloyd iteration"
            );

            if shift <= self.tolerance {
                info!(
                    iterations = iteration + 1,
                    clusters = clusters.len(),
                    "k-means converged"
                );
                return Ok(finish(clusters));
            }
        }

        warn!(
            max_iterations = self.max_iterations,
            "k-means stopped before centroids settled"
        );
        Ok(finish(clusters))
    }
}

/// Assign every sample to its nearest centroid and build one cluster per
/// centroid that received samples, in centroid order.
fn group_by_nearest(samples: &[Sample], centroids: &[Sample]) -> Result<Vec<Cluster>> {
    let mut groups: Vec<Vec<Sample>> = vec![Vec::new(); centroids.len()];
    for sample in samples {
        if let Some((idx, _)) = sample.nearest(centroids) {
            groups[idx].push(sample.clone());
        }
    }

    groups
        .into_iter()
        .filter(|members| !members.is_empty())
        .map(Cluster::new)
        .collect()
}

/// Mean squared distance of every sample to its cluster's centroid.
fn compute_cost(clusters: &[Cluster]) -> f64 {
    let mut total = 0.0;
    let mut n = 0usize;
    for cluster in clusters {
        for member in cluster.members() {
            total += member.distance_unchecked(cluster.centroid()).powi(2);
            n += 1;
        }
    }
    if n == 0 {
        0.0
    } else {
        total / n as f64
    }
}

fn finish(mut clusters: Vec<Cluster>) -> Vec<Cluster> {
    for (id, cluster) in clusters.iter_mut().enumerate() {
        cluster.assign_id(id);
    }
    clusters
}
