use mcikmeans::{kmeans_plus_plus, mci_kmeans, ClusterOps, Sample};

fn main() {
    let mut labeled = Vec::new();
    let mut unlabeled = Vec::new();
    for i in 0..30 {
        let jitter = (i % 5) as f64 * 0.2;
        labeled.push(Sample::labeled(vec![1.0 + jitter, 1.0 - jitter], 0));
        labeled.push(Sample::labeled(vec![8.0 - jitter, 8.0 + jitter], 1));
        unlabeled.push(Sample::new(vec![1.5 + jitter, 8.0 - jitter]).with_timestamp(i));
    }

    let all: Vec<Sample> = labeled.iter().chain(&unlabeled).cloned().collect();
    let clusters = kmeans_plus_plus(&all, 3, 42).unwrap();
    println!("K-Means++ found {} clusters", clusters.len());
    for (i, cluster) in clusters.iter().enumerate() {
        println!(
            "  cluster {i}: size {} centroid {:?} std {:.3}",
            cluster.size(),
            cluster.centroid().x().to_vec(),
            cluster.standard_deviation()
        );
    }

    let clusters = mci_kmeans(&labeled, &unlabeled, 3, 42).unwrap();
    println!("MCIKMeans found {} clusters", clusters.len());
    for cluster in &clusters {
        println!(
            "  cluster {}: labeled {} unlabeled {} entropy {:.3} label {:?}",
            cluster.id(),
            cluster.labeled_count(),
            cluster.unlabeled_members().len(),
            cluster.entropy(),
            cluster.dominant_label()
        );
    }
}
