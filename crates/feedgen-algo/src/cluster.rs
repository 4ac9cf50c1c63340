//! Spatial clustering of load coordinates for transformer siting.
//!
//! Lloyd k-means under Euclidean distance with k-means++ seeding. The RNG is
//! a seeded [`StdRng`], so the same points, `k` and seed always produce the
//! same labels.
//!
//! Empty clusters are repaired deterministically: the point farthest from its
//! centroid, taken from a cluster that still has more than one member, moves
//! into the empty cluster. Every cluster therefore owns at least one point.
//!
//! ```
//! use feedgen_algo::cluster::{kmeans, KMeansOptions};
//!
//! let points = vec![[0.0, 0.0], [0.0, 1.0], [100.0, 0.0], [100.0, 1.0]];
//! let clustering = kmeans(&points, 2, &KMeansOptions::default()).unwrap();
//!
//! assert_eq!(clustering.labels[0], clustering.labels[1]);
//! assert_ne!(clustering.labels[0], clustering.labels[2]);
//! ```

use feedgen_core::{planar_distance, FeederError, FeederResult, PlanarPoint};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// How many clusters (transformers) to form.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClusterCount {
    Fixed(usize),
    /// Scan k = 2.. by silhouette score and keep the k before the first decrease
    Optimal { max_clusters: usize },
    /// ceil(loads / customers), clamped to `1..=loads`
    CustomersPerTransformer(usize),
}

impl Default for ClusterCount {
    fn default() -> Self {
        ClusterCount::CustomersPerTransformer(100)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KMeansOptions {
    pub seed: u64,
    pub max_iterations: usize,
    /// Stop once no centroid moves farther than this (planar units)
    pub tolerance: f64,
}

impl Default for KMeansOptions {
    fn default() -> Self {
        Self {
            seed: 0,
            max_iterations: 300,
            tolerance: 1e-6,
        }
    }
}

/// Result of partitioning `n` points into `k` clusters.
#[derive(Debug, Clone, PartialEq)]
pub struct Clustering {
    /// Cluster index of every input point
    pub labels: Vec<usize>,
    pub centroids: Vec<PlanarPoint>,
    /// Sum of squared distances to the assigned centroid
    pub inertia: f64,
    pub iterations: usize,
}

impl Clustering {
    pub fn k(&self) -> usize {
        self.centroids.len()
    }

    /// Point indices per cluster, each list ascending.
    pub fn members(&self) -> Vec<Vec<usize>> {
        let mut members = vec![Vec::new(); self.centroids.len()];
        for (point, &label) in self.labels.iter().enumerate() {
            members[label].push(point);
        }
        members
    }
}

/// Partition `points` into `k` clusters.
pub fn kmeans(points: &[PlanarPoint], k: usize, options: &KMeansOptions) -> FeederResult<Clustering> {
    let n = points.len();
    if k < 1 || k > n {
        return Err(FeederError::InvalidClusterCount {
            requested: k,
            points: n,
        });
    }

    let mut rng = StdRng::seed_from_u64(options.seed);
    let mut centroids = seed_plus_plus(points, k, &mut rng);
    let mut labels = vec![0usize; n];
    let mut iterations = 0;

    while iterations < options.max_iterations.max(1) {
        iterations += 1;
        assign(points, &centroids, &mut labels);
        repair_empty_clusters(points, &mut centroids, &mut labels);

        let updated = recompute_centroids(points, &labels, k);
        let shift = centroids
            .iter()
            .zip(&updated)
            .map(|(old, new)| planar_distance(old, new))
            .fold(0.0, f64::max);
        centroids = updated;
        if shift <= options.tolerance {
            break;
        }
    }

    let inertia: f64 = points
        .iter()
        .zip(&labels)
        .map(|(p, &label)| planar_distance(p, &centroids[label]).powi(2))
        .sum();

    debug!(k, iterations, inertia, "k-means converged");
    Ok(Clustering {
        labels,
        centroids,
        inertia,
        iterations,
    })
}

/// Resolve a [`ClusterCount`] and cluster with the resulting `k`.
pub fn cluster_points(
    points: &[PlanarPoint],
    count: ClusterCount,
    options: &KMeansOptions,
) -> FeederResult<Clustering> {
    match count {
        ClusterCount::Fixed(k) => kmeans(points, k, options),
        ClusterCount::CustomersPerTransformer(customers) => {
            if customers == 0 {
                return Err(FeederError::InvalidConfiguration(
                    "customers per transformer must be positive".to_string(),
                ));
            }
            let k = points.len().div_ceil(customers).clamp(1, points.len().max(1));
            kmeans(points, k, options)
        }
        ClusterCount::Optimal { max_clusters } => optimal_clustering(points, max_clusters, options),
    }
}

/// Scan k = 2..=max by silhouette score, stopping at the first decrease and
/// keeping the previous k. Returns the best-scoring k if no decrease is seen.
pub fn optimal_clustering(
    points: &[PlanarPoint],
    max_clusters: usize,
    options: &KMeansOptions,
) -> FeederResult<Clustering> {
    let n = points.len();
    if n < 3 {
        return kmeans(points, n, options);
    }
    let upper = max_clusters.min(n - 1);
    if upper < 2 {
        return Err(FeederError::InvalidClusterCount {
            requested: max_clusters,
            points: n,
        });
    }

    let mut best: Option<(f64, Clustering)> = None;
    let mut previous: Option<(f64, Clustering)> = None;
    for k in 2..=upper {
        let clustering = kmeans(points, k, options)?;
        let score = silhouette_score(points, &clustering.labels, k);
        debug!(k, score, "silhouette");

        if let Some((prev_score, prev)) = previous.take() {
            if score < prev_score {
                return Ok(prev);
            }
        }
        if best.as_ref().map_or(true, |(s, _)| score > *s) {
            best = Some((score, clustering.clone()));
        }
        previous = Some((score, clustering));
    }
    match best {
        Some((_, clustering)) => Ok(clustering),
        None => kmeans(points, 2, options),
    }
}

/// Mean silhouette coefficient; singleton clusters contribute 0.
pub fn silhouette_score(points: &[PlanarPoint], labels: &[usize], k: usize) -> f64 {
    let n = points.len();
    if n == 0 || k < 2 {
        return 0.0;
    }
    let mut sizes = vec![0usize; k];
    for &label in labels {
        sizes[label] += 1;
    }

    let mut total = 0.0;
    for i in 0..n {
        let own = labels[i];
        if sizes[own] <= 1 {
            continue;
        }
        let mut sums = vec![0.0; k];
        for j in 0..n {
            if i != j {
                sums[labels[j]] += planar_distance(&points[i], &points[j]);
            }
        }
        let a = sums[own] / (sizes[own] - 1) as f64;
        let b = (0..k)
            .filter(|&c| c != own && sizes[c] > 0)
            .map(|c| sums[c] / sizes[c] as f64)
            .fold(f64::INFINITY, f64::min);
        let denom = a.max(b);
        if denom > 0.0 && b.is_finite() {
            total += (b - a) / denom;
        }
    }
    total / n as f64
}

fn seed_plus_plus(points: &[PlanarPoint], k: usize, rng: &mut StdRng) -> Vec<PlanarPoint> {
    let n = points.len();
    let mut chosen = vec![rng.gen_range(0..n)];
    let mut nearest_sq: Vec<f64> = points
        .iter()
        .map(|p| planar_distance(p, &points[chosen[0]]).powi(2))
        .collect();

    while chosen.len() < k {
        let total: f64 = nearest_sq.iter().sum();
        let next = if total > 0.0 {
            let mut target = rng.gen::<f64>() * total;
            let mut pick = n - 1;
            for (i, d) in nearest_sq.iter().enumerate() {
                if *d <= 0.0 {
                    continue;
                }
                if target < *d {
                    pick = i;
                    break;
                }
                target -= d;
            }
            pick
        } else {
            // All remaining points coincide with a chosen centre
            (0..n).find(|i| !chosen.contains(i)).unwrap_or(0)
        };
        chosen.push(next);
        for (i, p) in points.iter().enumerate() {
            let d = planar_distance(p, &points[next]).powi(2);
            if d < nearest_sq[i] {
                nearest_sq[i] = d;
            }
        }
    }
    chosen.into_iter().map(|i| points[i]).collect()
}

fn assign(points: &[PlanarPoint], centroids: &[PlanarPoint], labels: &mut [usize]) {
    for (i, p) in points.iter().enumerate() {
        let mut best = 0;
        let mut best_d = f64::INFINITY;
        for (c, centroid) in centroids.iter().enumerate() {
            let d = planar_distance(p, centroid);
            if d < best_d {
                best = c;
                best_d = d;
            }
        }
        labels[i] = best;
    }
}

fn repair_empty_clusters(points: &[PlanarPoint], centroids: &mut [PlanarPoint], labels: &mut [usize]) {
    let k = centroids.len();
    let mut sizes = vec![0usize; k];
    for &label in labels.iter() {
        sizes[label] += 1;
    }

    for empty in 0..k {
        if sizes[empty] > 0 {
            continue;
        }
        let donor = labels
            .iter()
            .enumerate()
            .filter(|&(_, &label)| sizes[label] > 1)
            .map(|(i, &label)| (i, planar_distance(&points[i], &centroids[label])))
            .fold(None::<(usize, f64)>, |acc, (i, d)| match acc {
                Some((_, best)) if best >= d => acc,
                _ => Some((i, d)),
            });
        if let Some((point, _)) = donor {
            sizes[labels[point]] -= 1;
            labels[point] = empty;
            sizes[empty] = 1;
            centroids[empty] = points[point];
        }
    }
}

fn recompute_centroids(points: &[PlanarPoint], labels: &[usize], k: usize) -> Vec<PlanarPoint> {
    let mut sums = vec![[0.0, 0.0]; k];
    let mut counts = vec![0usize; k];
    for (p, &label) in points.iter().zip(labels) {
        sums[label][0] += p[0];
        sums[label][1] += p[1];
        counts[label] += 1;
    }
    sums.iter()
        .zip(&counts)
        .map(|(s, &c)| {
            let c = c.max(1) as f64;
            [s[0] / c, s[1] / c]
        })
        .collect()
}
