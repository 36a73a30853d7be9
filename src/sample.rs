//! Feature vectors and the Euclidean operations the engines are built on.

use ndarray::{Array1, ArrayView1};

use crate::{ClusteringError, Result};

/// A feature vector with an optional label and timestamp.
///
/// The label doubles as the supervision marker: `None` means unlabeled.
/// Equality compares `(t, y, x)` by value; the cluster assignment is
/// bookkeeping written by the engines and is ignored.
#[derive(Debug, Clone)]
pub struct Sample {
    x: Array1<f64>,
    y: Option<i32>,
    t: Option<u64>,
    cluster_id: Option<usize>,
}

impl Sample {
    /// Create an unlabeled sample that owns `x`.
    pub fn new(x: Vec<f64>) -> Self {
        Self {
            x: Array1::from(x),
            y: None,
            t: None,
            cluster_id: None,
        }
    }

    /// Create a labeled sample that owns `x`.
    pub fn labeled(x: Vec<f64>, y: i32) -> Self {
        Self::new(x).with_label(y)
    }

    /// Create an unlabeled sample from a copy of `x`.
    pub fn from_slice(x: &[f64]) -> Self {
        Self::new(x.to_vec())
    }

    pub fn with_label(mut self, y: i32) -> Self {
        self.y = Some(y);
        self
    }

    pub fn with_timestamp(mut self, t: u64) -> Self {
        self.t = Some(t);
        self
    }

    pub fn x(&self) -> ArrayView1<'_, f64> {
        self.x.view()
    }

    pub fn label(&self) -> Option<i32> {
        self.y
    }

    pub fn is_labeled(&self) -> bool {
        self.y.is_some()
    }

    pub fn timestamp(&self) -> Option<u64> {
        self.t
    }

    /// Identifier of the cluster this sample was last assigned to.
    pub fn cluster_id(&self) -> Option<usize> {
        self.cluster_id
    }

    pub fn dim(&self) -> usize {
        self.x.len()
    }

    pub(crate) fn set_cluster_id(&mut self, id: Option<usize>) {
        self.cluster_id = id;
    }

    /// Euclidean distance to `other`.
    ///
    /// # Errors
    ///
    /// Returns [`ClusteringError::DimensionMismatch`] if the vectors differ in length.
    pub fn distance(&self, other: &Sample) -> Result<f64> {
        self.check_dim(other)?;
        Ok(euclidean(self.x.view(), other.x.view()))
    }

    /// Accumulate `other` into this sample's coordinates.
    pub fn sum(&mut self, other: &Sample) -> Result<()> {
        self.check_dim(other)?;
        self.x.scaled_add(1.0, &other.x);
        Ok(())
    }

    /// Divide every coordinate by `scalar`.
    pub fn divide(&mut self, scalar: f64) {
        self.x.mapv_inplace(|v| v / scalar);
    }

    /// Deep copy of the value `(t, y, x)`, detached from any cluster.
    pub fn copy(&self) -> Sample {
        Self {
            x: self.x.clone(),
            y: self.y,
            t: self.t,
            cluster_id: None,
        }
    }

    /// The candidate closest to this sample, or `None` if there are no candidates.
    ///
    /// Ties go to the candidate that comes first.
    pub fn closest_among<'a>(&self, candidates: &'a [Sample]) -> Result<Option<&'a Sample>> {
        let mut best: Option<(&Sample, f64)> = None;
        for candidate in candidates {
            let d = self.distance(candidate)?;
            if best.map_or(true, |(_, bd)| d < bd) {
                best = Some((candidate, d));
            }
        }
        Ok(best.map(|(s, _)| s))
    }

    /// Index of and distance to the nearest of `centroids`; dimensions must
    /// already be validated.
    pub(crate) fn nearest(&self, centroids: &[Sample]) -> Option<(usize, f64)> {
        let mut best: Option<(usize, f64)> = None;
        for (idx, centroid) in centroids.iter().enumerate() {
            let d = euclidean(self.x.view(), centroid.x.view());
            if best.map_or(true, |(_, bd)| d < bd) {
                best = Some((idx, d));
            }
        }
        best
    }

    /// Distance to an already dimension-checked sample.
    pub(crate) fn distance_unchecked(&self, other: &Sample) -> f64 {
        euclidean(self.x.view(), other.x.view())
    }

    pub(crate) fn check_dim(&self, other: &Sample) -> Result<()> {
        if self.dim() != other.dim() {
            return Err(ClusteringError::DimensionMismatch {
                expected: self.dim(),
                actual: other.dim(),
            });
        }
        Ok(())
    }
}

impl PartialEq for Sample {
    fn eq(&self, other: &Self) -> bool {
        self.t == other.t && self.y == other.y && self.x == other.x
    }
}

fn euclidean(a: ArrayView1<f64>, b: ArrayView1<f64>) -> f64 {
    let diff = &a - &b;
    diff.dot(&diff).sqrt()
}

/// Common dimensionality of `samples`, or `None` when there are none.
pub(crate) fn common_dim<'a, I>(samples: I) -> Result<Option<usize>>
where
    I: IntoIterator<Item = &'a Sample>,
{
    let mut expected = None;
    for sample in samples {
        match expected {
            None => expected = Some(sample.dim()),
            Some(dim) if dim != sample.dim() => {
                return Err(ClusteringError::DimensionMismatch {
                    expected: dim,
                    actual: sample.dim(),
                })
            }
            Some(_) => {}
        }
    }
    Ok(expected)
}

/// Coordinate-wise mean of `members`, or `None` for an empty iterator.
///
/// The result carries no label, timestamp or cluster id.
pub(crate) fn mean<'a, I>(members: I) -> Option<Sample>
where
    I: IntoIterator<Item = &'a Sample>,
{
    let mut members = members.into_iter();
    let first = members.next()?;
    let mut center = Sample::new(first.x.to_vec());
    let mut count = 1usize;
    for member in members {
        center.x.scaled_add(1.0, &member.x);
        count += 1;
    }
    center.divide(count as f64);
    Some(center)
}

/// Largest distance any centroid moved between two rounds.
///
/// Centroid lists of different length never count as converged.
pub(crate) fn max_shift(previous: &[Sample], current: &[Sample]) -> f64 {
    if previous.len() != current.len() {
        return f64::INFINITY;
    }
    previous
        .iter()
        .zip(current)
        .map(|(a, b)| a.distance_unchecked(b))
        .fold(0.0, f64::max)
}
