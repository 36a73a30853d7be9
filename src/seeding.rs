//! Initial centroid selection.
//!
//! Every strategy takes the random source as an explicit argument, so a run
//! is reproducible from its seed and input order alone. Samples are assumed
//! to share one dimensionality; the engines validate that before seeding.

use std::collections::BTreeMap;

use rand::prelude::*;
use rand_distr::Uniform;
use tracing::debug;

use crate::sample::Sample;

/// Pick up to `k` samples uniformly at random, without replacement.
pub fn uniform<R: Rng + ?Sized>(samples: &[Sample], k: usize, rng: &mut R) -> Vec<Sample> {
    let mut candidates: Vec<&Sample> = samples.iter().collect();
    let mut centroids = Vec::with_capacity(k.min(samples.len()));

    while centroids.len() < k && !candidates.is_empty() {
        let idx = rng.gen_range(0..candidates.len());
        centroids.push(candidates.remove(idx).copy());
    }

    centroids
}

/// K-Means++ style seeding.
///
/// The first centroid is uniform. Each following one is drawn with
/// probability proportional to the distance (not squared) from a sample to
/// its nearest chosen centroid. Seeding stops early once every sample
/// coincides with a chosen centroid, so fewer than `k` centroids come back
/// when there are fewer than `k` distinct samples.
pub fn weighted<R: Rng + ?Sized>(samples: &[Sample], k: usize, rng: &mut R) -> Vec<Sample> {
    let mut centroids: Vec<Sample> = Vec::with_capacity(k);
    if samples.is_empty() || k == 0 {
        return centroids;
    }

    let first = rng.gen_range(0..samples.len());
    centroids.push(samples[first].copy());

    let uniform = Uniform::new(0.0, 1.0);
    while centroids.len() < k {
        let distances: Vec<f64> = samples
            .iter()
            .map(|s| s.nearest(&centroids).map_or(0.0, |(_, d)| d))
            .collect();
        let total: f64 = distances.iter().sum();
        if total <= 0.0 {
            debug!(
                requested = k,
                chosen = centroids.len(),
                "no distinct candidates left for weighted seeding"
            );
            break;
        }

        let draw: f64 = rng.sample(uniform);
        let selected = roulette(&distances, total, draw);
        centroids.push(samples[selected].copy());
    }

    centroids
}

/// Walk the weights in order and return the first index whose cumulative
/// probability reaches `draw`. The last index absorbs rounding slack.
fn roulette(weights: &[f64], total: f64, draw: f64) -> usize {
    let last = weights.len() - 1;
    let mut cumulative = 0.0;
    for (idx, weight) in weights.iter().enumerate() {
        cumulative += weight / total;
        if draw <= cumulative || idx == last {
            return idx;
        }
    }
    last
}

/// Farthest-first traversal over `group`.
///
/// Returns the whole group when it has no more than `count` samples.
/// Otherwise repeatedly takes the candidate farthest from its nearest chosen
/// centroid; the earliest candidate wins ties, which makes the very first
/// pick the first sample of the group.
pub fn farthest_first(group: &[Sample], count: usize) -> Vec<Sample> {
    if group.len() <= count {
        return group.iter().map(Sample::copy).collect();
    }

    let mut candidates: Vec<&Sample> = group.iter().collect();
    let mut centroids: Vec<Sample> = Vec::with_capacity(count);

    for _ in 0..count {
        let mut farthest = 0;
        let mut farthest_distance = f64::NEG_INFINITY;
        for (idx, candidate) in candidates.iter().enumerate() {
            let d = candidate.nearest(&centroids).map_or(0.0, |(_, d)| d);
            if d > farthest_distance {
                farthest = idx;
                farthest_distance = d;
            }
        }
        centroids.push(candidates.remove(farthest).copy());
    }

    centroids
}

/// Seeding used by MCIKMeans.
///
/// Each label group receives `round(k * |group| / |labeled|)` centroids
/// picked by [`farthest_first`]. Groups too small to fill their quota are
/// topped up from one shuffled pool of unlabeled samples, shared by all
/// groups and drawn without replacement. Quotas are capped so that no more
/// than `k` centroids come back in total. If every quota rounds to zero a
/// single farthest-first centroid is taken from the whole labeled set.
pub fn farthest_first_per_label<R: Rng + ?Sized>(
    labeled: &[Sample],
    unlabeled: &[Sample],
    k: usize,
    rng: &mut R,
) -> Vec<Sample> {
    let mut groups: BTreeMap<i32, Vec<Sample>> = BTreeMap::new();
    for sample in labeled {
        if let Some(label) = sample.label() {
            groups.entry(label).or_default().push(sample.clone());
        }
    }

    let mut filling: Vec<&Sample> = unlabeled.iter().collect();
    filling.shuffle(rng);
    let mut filling = filling.into_iter();

    let mut centroids = Vec::new();
    for (label, group) in &groups {
        let quota = (k as f64 * group.len() as f64 / labeled.len() as f64).round() as usize;
        let quota = quota.min(k.saturating_sub(centroids.len()));
        let mut seeds = farthest_first(group, quota);

        let shortfall = quota - seeds.len();
        seeds.extend(filling.by_ref().take(shortfall).map(Sample::copy));

        debug!(
            label,
            group = group.len(),
            quota,
            seeds = seeds.len(),
            "seeded label group"
        );
        centroids.extend(seeds);
    }

    if centroids.is_empty() {
        centroids = farthest_first(labeled, 1);
    }

    centroids
}
