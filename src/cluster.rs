//! Cluster aggregates.
//!
//! [`Cluster`] is the plain unsupervised aggregate; [`ImpurityBasedCluster`]
//! adds the label bookkeeping MCIKMeans needs. Both keep their centroid in
//! sync with their members on every mutation, so a centroid is never stale
//! when read.

use std::collections::BTreeMap;

use crate::sample::{self, Sample};
use crate::{ClusteringError, Result};

/// Operations shared by every cluster kind.
pub trait ClusterOps {
    /// Mean of the current members.
    fn centroid(&self) -> &Sample;

    /// Number of members.
    fn size(&self) -> usize;

    /// Members in a stable order.
    fn members(&self) -> Vec<&Sample>;

    /// Add a member and recompute derived state.
    fn add_member(&mut self, sample: Sample) -> Result<()>;

    /// Remove one member equal to `sample`, returning it if present.
    fn remove_member(&mut self, sample: &Sample) -> Result<Option<Sample>>;

    fn is_empty(&self) -> bool {
        self.size() == 0
    }

    /// Root mean squared distance of the members to the centroid.
    fn standard_deviation(&self) -> f64 {
        let members = self.members();
        if members.is_empty() {
            return 0.0;
        }
        let centroid = self.centroid();
        let sum: f64 = members
            .iter()
            .map(|m| m.distance_unchecked(centroid).powi(2))
            .sum();
        (sum / members.len() as f64).sqrt()
    }

    /// Most frequent label among the labeled members; the smallest label wins ties.
    fn dominant_label(&self) -> Option<i32> {
        let mut counts: BTreeMap<i32, usize> = BTreeMap::new();
        for label in self.members().iter().filter_map(|m| m.label()) {
            *counts.entry(label).or_default() += 1;
        }
        let mut best: Option<(i32, usize)> = None;
        for (label, count) in counts {
            if best.map_or(true, |(_, c)| count > c) {
                best = Some((label, count));
            }
        }
        best.map(|(label, _)| label)
    }
}

/// A non-empty group of samples with a cached centroid.
#[derive(Debug, Clone, PartialEq)]
pub struct Cluster {
    members: Vec<Sample>,
    centroid: Sample,
}

impl Cluster {
    /// Build a cluster from its members.
    ///
    /// # Errors
    ///
    /// [`ClusteringError::EmptyCluster`] if `members` is empty and
    /// [`ClusteringError::DimensionMismatch`] if the members differ in length.
    pub fn new(members: Vec<Sample>) -> Result<Self> {
        sample::common_dim(&members)?;
        let centroid = sample::mean(&members).ok_or(ClusteringError::EmptyCluster)?;
        Ok(Self { members, centroid })
    }

    pub(crate) fn assign_id(&mut self, id: usize) {
        for member in &mut self.members {
            member.set_cluster_id(Some(id));
        }
    }

    fn update_centroid(&mut self) {
        if let Some(centroid) = sample::mean(&self.members) {
            self.centroid = centroid;
        }
    }
}

impl ClusterOps for Cluster {
    fn centroid(&self) -> &Sample {
        &self.centroid
    }

    fn size(&self) -> usize {
        self.members.len()
    }

    fn members(&self) -> Vec<&Sample> {
        self.members.iter().collect()
    }

    fn add_member(&mut self, sample: Sample) -> Result<()> {
        self.centroid.check_dim(&sample)?;
        self.members.push(sample);
        self.update_centroid();
        Ok(())
    }

    /// Fails with [`ClusteringError::EmptyCluster`] rather than removing the last member.
    fn remove_member(&mut self, sample: &Sample) -> Result<Option<Sample>> {
        let Some(pos) = self.members.iter().position(|m| m == sample) else {
            return Ok(None);
        };
        if self.members.len() == 1 {
            return Err(ClusteringError::EmptyCluster);
        }
        let removed = self.members.remove(pos);
        self.update_centroid();
        Ok(Some(removed))
    }
}

/// Whether a sample takes part in a clustering run with or without its label.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Supervision {
    Labeled,
    Unlabeled,
}

/// A cluster that tracks the label distribution of its labeled members.
///
/// Entropy and centroid are recomputed after every add or remove. During
/// MCIKMeans a cluster may be empty; it then keeps the last centroid it had.
#[derive(Debug, Clone, PartialEq)]
pub struct ImpurityBasedCluster {
    id: usize,
    centroid: Sample,
    by_label: BTreeMap<i32, Vec<Sample>>,
    unlabeled: Vec<Sample>,
    labeled_count: usize,
    entropy: f64,
}

impl ImpurityBasedCluster {
    /// Build a cluster from labeled and unlabeled members.
    ///
    /// # Errors
    ///
    /// [`ClusteringError::EmptyCluster`] if both lists are empty,
    /// [`ClusteringError::MissingLabel`] if a labeled member has no label and
    /// [`ClusteringError::DimensionMismatch`] if the members differ in length.
    pub fn new(labeled: Vec<Sample>, unlabeled: Vec<Sample>) -> Result<Self> {
        sample::common_dim(labeled.iter().chain(&unlabeled))?;
        let first = labeled
            .first()
            .or_else(|| unlabeled.first())
            .ok_or(ClusteringError::EmptyCluster)?;

        let mut cluster = Self::seeded(0, first.copy());
        for sample in labeled {
            cluster.insert_labeled(sample)?;
        }
        cluster.unlabeled = unlabeled;
        cluster.refresh();
        Ok(cluster)
    }

    /// An empty cluster positioned at `centroid`.
    pub(crate) fn seeded(id: usize, centroid: Sample) -> Self {
        Self {
            id,
            centroid,
            by_label: BTreeMap::new(),
            unlabeled: Vec::new(),
            labeled_count: 0,
            entropy: 0.0,
        }
    }

    pub fn id(&self) -> usize {
        self.id
    }

    /// Shannon entropy (natural log) of the labeled members' label distribution.
    pub fn entropy(&self) -> f64 {
        self.entropy
    }

    pub fn labeled_count(&self) -> usize {
        self.labeled_count
    }

    pub fn labeled_members(&self) -> impl Iterator<Item = &Sample> {
        self.by_label.values().flatten()
    }

    pub fn unlabeled_members(&self) -> &[Sample] {
        &self.unlabeled
    }

    /// Labels present among the labeled members, ascending.
    pub fn labels(&self) -> impl Iterator<Item = i32> + '_ {
        self.by_label.keys().copied()
    }

    /// Fraction of labeled members carrying `label`.
    pub fn label_probability(&self, label: i32) -> f64 {
        match self.by_label.get(&label) {
            Some(members) if self.labeled_count > 0 => {
                members.len() as f64 / self.labeled_count as f64
            }
            _ => 0.0,
        }
    }

    /// Number of labeled members whose label differs from `sample`'s.
    pub fn dissimilarity_count(&self, sample: &Sample) -> usize {
        let same = sample
            .label()
            .and_then(|label| self.by_label.get(&label))
            .map_or(0, Vec::len);
        self.labeled_count - same
    }

    /// Cost of placing `sample` in this cluster.
    ///
    /// Unlabeled samples pay the plain distance to the centroid. Labeled
    /// samples pay it scaled by `1 + entropy * dissimilarity_count`, so an
    /// impure cluster dominated by other labels resists absorbing them.
    pub fn cost(&self, sample: &Sample, supervision: Supervision) -> f64 {
        let distance = sample.distance_unchecked(&self.centroid);
        match supervision {
            Supervision::Labeled => {
                distance * (1.0 + self.entropy * self.dissimilarity_count(sample) as f64)
            }
            Supervision::Unlabeled => distance,
        }
    }

    pub fn add_labeled(&mut self, sample: Sample) -> Result<()> {
        self.centroid.check_dim(&sample)?;
        self.insert_labeled(sample)?;
        self.refresh();
        Ok(())
    }

    pub fn add_unlabeled(&mut self, sample: Sample) -> Result<()> {
        self.centroid.check_dim(&sample)?;
        self.unlabeled.push(sample);
        self.refresh();
        Ok(())
    }

    pub fn remove_labeled(&mut self, sample: &Sample) -> Option<Sample> {
        let label = sample.label()?;
        let members = self.by_label.get_mut(&label)?;
        let pos = members.iter().position(|m| m == sample)?;
        let removed = members.remove(pos);
        if members.is_empty() {
            self.by_label.remove(&label);
        }
        self.labeled_count -= 1;
        self.refresh();
        Some(removed)
    }

    pub fn remove_unlabeled(&mut self, sample: &Sample) -> Option<Sample> {
        let pos = self.unlabeled.iter().position(|m| m == sample)?;
        let removed = self.unlabeled.remove(pos);
        self.refresh();
        Some(removed)
    }

    /// Add a member that is already dimension-checked.
    pub(crate) fn attach(&mut self, sample: Sample, supervision: Supervision) {
        match supervision {
            Supervision::Labeled => {
                debug_assert!(sample.is_labeled(), "labeled member without a label");
                if let Some(label) = sample.label() {
                    self.by_label.entry(label).or_default().push(sample);
                    self.labeled_count += 1;
                }
            }
            Supervision::Unlabeled => self.unlabeled.push(sample),
        }
        self.refresh();
    }

    pub(crate) fn detach(&mut self, sample: &Sample, supervision: Supervision) -> Option<Sample> {
        match supervision {
            Supervision::Labeled => self.remove_labeled(sample),
            Supervision::Unlabeled => self.remove_unlabeled(sample),
        }
    }

    fn insert_labeled(&mut self, sample: Sample) -> Result<()> {
        let label = sample.label().ok_or(ClusteringError::MissingLabel)?;
        self.by_label.entry(label).or_default().push(sample);
        self.labeled_count += 1;
        Ok(())
    }

    fn refresh(&mut self) {
        self.update_entropy();
        self.update_centroid();
    }

    fn update_entropy(&mut self) {
        let total = self.labeled_count as f64;
        self.entropy = self
            .by_label
            .values()
            .map(|members| members.len() as f64 / total)
            .map(|p| -p * p.ln())
            .sum::<f64>()
            // -0.0 for a single label
            .abs();
    }

    fn update_centroid(&mut self) {
        let members = self.by_label.values().flatten().chain(&self.unlabeled);
        if let Some(centroid) = sample::mean(members) {
            self.centroid = centroid;
        }
    }
}

impl ClusterOps for ImpurityBasedCluster {
    fn centroid(&self) -> &Sample {
        &self.centroid
    }

    fn size(&self) -> usize {
        self.labeled_count + self.unlabeled.len()
    }

    fn members(&self) -> Vec<&Sample> {
        self.labeled_members().chain(&self.unlabeled).collect()
    }

    /// Samples carrying a label join the labeled members, the rest the unlabeled ones.
    fn add_member(&mut self, sample: Sample) -> Result<()> {
        if sample.is_labeled() {
            self.add_labeled(sample)
        } else {
            self.add_unlabeled(sample)
        }
    }

    fn remove_member(&mut self, sample: &Sample) -> Result<Option<Sample>> {
        Ok(self
            .remove_labeled(sample)
            .or_else(|| self.remove_unlabeled(sample)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn assert_centroid_is_mean(cluster: &impl ClusterOps) {
        let members = cluster.members();
        let dim = cluster.centroid().dim();
        for j in 0..dim {
            let mean = members.iter().map(|m| m.x()[j]).sum::<f64>() / members.len() as f64;
            assert_relative_eq!(cluster.centroid().x()[j], mean, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_cluster_rejects_empty() {
        match Cluster::new(Vec::new()) {
            Err(ClusteringError::EmptyCluster) => {}
            other => panic!("Expected EmptyCluster, got {other:?}"),
        }
    }

    #[test]
    fn test_cluster_centroid_tracks_membership() {
        let mut cluster =
            Cluster::new(vec![Sample::new(vec![0.0, 0.0]), Sample::new(vec![2.0, 0.0])]).unwrap();
        assert_eq!(cluster.centroid().x().to_vec(), vec![1.0, 0.0]);

        cluster.add_member(Sample::new(vec![4.0, 3.0])).unwrap();
        assert_eq!(cluster.size(), 3);
        assert_centroid_is_mean(&cluster);

        let removed = cluster.remove_member(&Sample::new(vec![0.0, 0.0])).unwrap();
        assert!(removed.is_some());
        assert_eq!(cluster.centroid().x().to_vec(), vec![3.0, 1.5]);

        assert!(cluster.remove_member(&Sample::new(vec![9.0, 9.0])).unwrap().is_none());
    }

    #[test]
    fn test_cluster_keeps_last_member() {
        let mut cluster = Cluster::new(vec![Sample::new(vec![1.0])]).unwrap();
        assert!(matches!(
            cluster.remove_member(&Sample::new(vec![1.0])),
            Err(ClusteringError::EmptyCluster)
        ));
        assert_eq!(cluster.size(), 1);
    }

    #[test]
    fn test_cluster_rejects_mismatched_member() {
        let mut cluster = Cluster::new(vec![Sample::new(vec![1.0, 1.0])]).unwrap();
        assert!(matches!(
            cluster.add_member(Sample::new(vec![1.0])),
            Err(ClusteringError::DimensionMismatch {
                expected: 2,
                actual: 1
            })
        ));
        assert_eq!(cluster.size(), 1);

        let mut impure = ImpurityBasedCluster::seeded(0, Sample::new(vec![0.0, 0.0]));
        assert!(impure.add_labeled(Sample::labeled(vec![1.0], 1)).is_err());
        assert!(impure.add_unlabeled(Sample::new(vec![1.0, 2.0, 3.0])).is_err());
        assert!(impure.is_empty());
        assert!(Cluster::new(vec![Sample::new(vec![1.0]), Sample::new(vec![1.0, 2.0])]).is_err());
    }

    #[test]
    fn test_standard_deviation() {
        let cluster =
            Cluster::new(vec![Sample::new(vec![-1.0, 0.0]), Sample::new(vec![1.0, 0.0])]).unwrap();
        assert_relative_eq!(cluster.standard_deviation(), 1.0);
    }

    #[test]
    fn test_dominant_label() {
        let cluster = Cluster::new(vec![
            Sample::labeled(vec![0.0], 3),
            Sample::labeled(vec![0.0], 1),
            Sample::labeled(vec![0.0], 3),
            Sample::new(vec![0.0]),
        ])
        .unwrap();
        assert_eq!(cluster.dominant_label(), Some(3));

        let tied =
            Cluster::new(vec![Sample::labeled(vec![0.0], 5), Sample::labeled(vec![0.0], 2)])
                .unwrap();
        assert_eq!(tied.dominant_label(), Some(2));

        let unlabeled = Cluster::new(vec![Sample::new(vec![0.0])]).unwrap();
        assert_eq!(unlabeled.dominant_label(), None);
    }

    #[test]
    fn test_impurity_cluster_rejects_empty() {
        assert!(matches!(
            ImpurityBasedCluster::new(Vec::new(), Vec::new()),
            Err(ClusteringError::EmptyCluster)
        ));
        assert!(matches!(
            ImpurityBasedCluster::new(vec![Sample::new(vec![0.0])], Vec::new()),
            Err(ClusteringError::MissingLabel)
        ));
    }

    #[test]
    fn test_entropy() {
        let pure = ImpurityBasedCluster::new(
            vec![Sample::labeled(vec![0.0], 1), Sample::labeled(vec![1.0], 1)],
            vec![Sample::new(vec![2.0])],
        )
        .unwrap();
        assert_eq!(pure.entropy(), 0.0);
        assert_eq!(pure.size(), 3);
        assert_centroid_is_mean(&pure);

        let mixed = ImpurityBasedCluster::new(
            vec![Sample::labeled(vec![0.0], 1), Sample::labeled(vec![1.0], 2)],
            Vec::new(),
        )
        .unwrap();
        assert_relative_eq!(mixed.entropy(), std::f64::consts::LN_2, epsilon = 1e-12);
        assert_relative_eq!(mixed.label_probability(1), 0.5);
        assert_eq!(mixed.label_probability(9), 0.0);
    }

    #[test]
    fn test_entropy_tracks_mutations() {
        let mut cluster =
            ImpurityBasedCluster::new(vec![Sample::labeled(vec![0.0, 0.0], 1)], Vec::new())
                .unwrap();
        cluster.add_labeled(Sample::labeled(vec![2.0, 2.0], 2)).unwrap();
        assert_relative_eq!(cluster.entropy(), std::f64::consts::LN_2, epsilon = 1e-12);
        assert_eq!(cluster.centroid().x().to_vec(), vec![1.0, 1.0]);

        cluster.remove_labeled(&Sample::labeled(vec![2.0, 2.0], 2)).unwrap();
        assert_eq!(cluster.entropy(), 0.0);
        assert_eq!(cluster.labels().collect::<Vec<_>>(), vec![1]);
        assert_eq!(cluster.centroid().x().to_vec(), vec![0.0, 0.0]);
    }

    #[test]
    fn test_dissimilarity_and_cost() {
        let cluster = ImpurityBasedCluster::new(
            vec![
                Sample::labeled(vec![0.0, 0.0], 1),
                Sample::labeled(vec![0.0, 0.0], 1),
                Sample::labeled(vec![0.0, 0.0], 2),
            ],
            vec![Sample::new(vec![0.0, 0.0])],
        )
        .unwrap();

        let one = Sample::labeled(vec![3.0, 4.0], 1);
        let two = Sample::labeled(vec![3.0, 4.0], 2);
        let novel = Sample::labeled(vec![3.0, 4.0], 9);
        assert_eq!(cluster.dissimilarity_count(&one), 1);
        assert_eq!(cluster.dissimilarity_count(&two), 2);
        assert_eq!(cluster.dissimilarity_count(&novel), 3);

        let entropy = cluster.entropy();
        assert_relative_eq!(cluster.cost(&one, Supervision::Labeled), 5.0 * (1.0 + entropy));
        assert_relative_eq!(cluster.cost(&novel, Supervision::Labeled), 5.0 * (1.0 + 3.0 * entropy));
        assert_relative_eq!(cluster.cost(&novel, Supervision::Unlabeled), 5.0);
    }

    #[test]
    fn test_empty_seeded_cluster_keeps_centroid() {
        let mut cluster = ImpurityBasedCluster::seeded(4, Sample::new(vec![5.0, 5.0]));
        assert!(cluster.is_empty());

        let sample = Sample::new(vec![1.0, 1.0]);
        cluster.attach(sample.clone(), Supervision::Unlabeled);
        assert_eq!(cluster.centroid().x().to_vec(), vec![1.0, 1.0]);

        cluster.detach(&sample, Supervision::Unlabeled).unwrap();
        assert!(cluster.is_empty());
        assert_eq!(cluster.centroid().x().to_vec(), vec![1.0, 1.0]);
        assert_eq!(cluster.id(), 4);
    }

    #[test]
    #[cfg(debug_assertions)]
    #[should_panic(expected = "labeled member without a label")]
    fn test_attach_rejects_unlabeled_as_labeled() {
        let mut cluster = ImpurityBasedCluster::seeded(0, Sample::new(vec![0.0]));
        cluster.attach(Sample::new(vec![1.0]), Supervision::Labeled);
    }

    #[test]
    fn test_add_member_dispatches_on_label() {
        let mut cluster = ImpurityBasedCluster::seeded(0, Sample::new(vec![0.0]));
        cluster.add_member(Sample::labeled(vec![1.0], 1)).unwrap();
        cluster.add_member(Sample::new(vec![3.0])).unwrap();

        assert_eq!(cluster.labeled_count(), 1);
        assert_eq!(cluster.unlabeled_members().len(), 1);
        assert_eq!(cluster.centroid().x().to_vec(), vec![2.0]);

        assert!(cluster.remove_member(&Sample::new(vec![3.0])).unwrap().is_some());
        assert_eq!(cluster.size(), 1);
    }
}
