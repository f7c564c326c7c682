//! k-means clustering over standardized numeric features.
//!
//! Rows missing any numeric feature are left out. Features are standardized
//! over the retained rows, centroids are seeded with k-means++ and refined
//! with Lloyd iterations until the assignment stops changing or the
//! iteration cap is reached. Several seeded restarts run and the lowest
//! inertia wins, so results depend only on the input and the seed.

use super::complete_rows;
use crate::config::{AnalysisConfig, ClusterCount};
use crate::profiler::NumericColumn;
use crate::types::{ClusterAssignment, Degeneracy, ElbowPoint};
use crate::utils::{is_constant, mean, sample_std};
use rand::prelude::*;
use std::collections::BTreeMap;
use tracing::{debug, info, warn};

/// Minimum inertia drop, as a share of the k = 1 inertia, for the elbow
/// rule to keep adding clusters.
const ELBOW_MIN_DROP: f64 = 0.10;

/// Result of one k-means run from a single initialization.
#[derive(Debug, Clone)]
struct KMeansRun {
    assignments: Vec<usize>,
    centroids: Vec<Vec<f64>>,
    inertia: f64,
    iterations: usize,
    converged: bool,
}

/// Partitions complete rows into k clusters.
pub struct ClusteringEngine;

impl ClusteringEngine {
    pub fn cluster(columns: &[NumericColumn], config: &AnalysisConfig) -> ClusterAssignment {
        let features: Vec<String> = columns.iter().map(|c| c.name.clone()).collect();
        if columns.is_empty() {
            debug!("Skipping clustering: no numeric columns");
            return ClusterAssignment::empty(features, 0, Degeneracy::NoNumericColumns);
        }

        let row_count = columns[0].cells.len();
        let retained = complete_rows(columns);
        let excluded_rows = row_count - retained.len();

        if retained.len() < 2 {
            debug!(retained = retained.len(), "Skipping clustering: too few complete rows");
            return ClusterAssignment::empty(
                features,
                excluded_rows,
                Degeneracy::TooFewRows {
                    required: 2,
                    actual: retained.len(),
                },
            );
        }

        let points = standardize(columns, &retained);

        let (mut k, k_selection) = match config.cluster_count {
            ClusterCount::Fixed(k) => (k, None),
            ClusterCount::Elbow { max_k } => {
                let curve = elbow_curve(&points, max_k.min(points.len()), config);
                (choose_elbow_k(&curve), Some(curve))
            }
        };

        if k > points.len() {
            warn!(
                requested = k,
                retained = points.len(),
                "Fewer complete rows than clusters, reducing k"
            );
            k = points.len();
        }

        let run = best_of_restarts(&points, k, config);

        let mut cluster_sizes = vec![0usize; k];
        for &cluster in &run.assignments {
            cluster_sizes[cluster] += 1;
        }

        info!(
            k,
            rows = points.len(),
            excluded_rows,
            inertia = run.inertia,
            iterations = run.iterations,
            converged = run.converged,
            "Clustering complete"
        );

        ClusterAssignment {
            k,
            features,
            assignments: retained.into_iter().zip(run.assignments).collect::<BTreeMap<_, _>>(),
            centroids: run.centroids,
            cluster_sizes,
            inertia: run.inertia,
            iterations: run.iterations,
            converged: run.converged,
            excluded_rows,
            k_selection,
            degenerate: None,
        }
    }
}

/// Row-major feature matrix of the retained rows, each feature scaled to
/// zero mean and unit sample standard deviation. A zero-variance feature
/// becomes all zeros.
fn standardize(columns: &[NumericColumn], retained: &[usize]) -> Vec<Vec<f64>> {
    let mut points = vec![Vec::with_capacity(columns.len()); retained.len()];

    for column in columns {
        let values: Vec<f64> = retained.iter().filter_map(|&row| column.cells[row]).collect();
        let centre = mean(&values).unwrap_or(0.0);
        let std = sample_std(&values).unwrap_or(0.0);
        let flat = is_constant(&values) || std <= 0.0;

        for (point, value) in points.iter_mut().zip(&values) {
            point.push(if flat { 0.0 } else { (value - centre) / std });
        }
    }

    points
}

/// Best-of-restarts inertia for every k in `1..=max_k`.
fn elbow_curve(points: &[Vec<f64>], max_k: usize, config: &AnalysisConfig) -> Vec<ElbowPoint> {
    (1..=max_k.max(1))
        .map(|k| ElbowPoint {
            k,
            inertia: best_of_restarts(points, k, config).inertia,
        })
        .collect()
}

/// Smallest k whose next step lowers inertia by less than a tenth of the
/// k = 1 inertia. The last k when every step is worth taking.
fn choose_elbow_k(curve: &[ElbowPoint]) -> usize {
    let Some(first) = curve.first() else {
        return 1;
    };
    if first.inertia <= 0.0 {
        return 1;
    }

    let min_drop = ELBOW_MIN_DROP * first.inertia;
    curve
        .windows(2)
        .find(|pair| pair[0].inertia - pair[1].inertia < min_drop)
        .map(|pair| pair[0].k)
        .or_else(|| curve.last().map(|p| p.k))
        .unwrap_or(1)
}

/// Run k-means once per restart with seeds `seed, seed + 1, ...` and keep
/// the lowest inertia. Ties keep the earliest restart.
fn best_of_restarts(points: &[Vec<f64>], k: usize, config: &AnalysisConfig) -> KMeansRun {
    let mut best: Option<KMeansRun> = None;

    for restart in 0..config.restarts.max(1) {
        let seed = config.seed.wrapping_add(restart as u64);
        let run = kmeans(points, k, seed, config.max_iterations);
        debug!(k, restart, inertia = run.inertia, "k-means restart");

        if best.as_ref().is_none_or(|b| run.inertia < b.inertia) {
            best = Some(run);
        }
    }

    best.unwrap_or_else(|| kmeans(points, k, config.seed, config.max_iterations))
}

fn kmeans(points: &[Vec<f64>], k: usize, seed: u64, max_iterations: usize) -> KMeansRun {
    let mut centroids = kmeans_plus_plus(points, k, seed);
    let mut assignments = assign(points, &centroids);
    let mut iterations = 0;
    let mut converged = false;

    while iterations < max_iterations {
        iterations += 1;
        update_centroids(points, &assignments, &mut centroids);

        let next = assign(points, &centroids);
        if next == assignments {
            converged = true;
            break;
        }
        assignments = next;
    }

    let inertia = points
        .iter()
        .zip(&assignments)
        .map(|(point, &cluster)| squared_distance(point, &centroids[cluster]))
        .sum();

    KMeansRun {
        assignments,
        centroids,
        inertia,
        iterations,
        converged,
    }
}

/// k-means++ seeding: the first centroid is drawn uniformly, each next one
/// with probability proportional to its squared distance to the nearest
/// centroid chosen so far.
fn kmeans_plus_plus(points: &[Vec<f64>], k: usize, seed: u64) -> Vec<Vec<f64>> {
    let mut rng = StdRng::seed_from_u64(seed);
    let n = points.len();
    let mut chosen = vec![false; n];
    let mut centroids = Vec::with_capacity(k);

    let first = rng.gen_range(0..n);
    chosen[first] = true;
    centroids.push(points[first].clone());

    let mut min_distances: Vec<f64> = points
        .iter()
        .map(|p| squared_distance(p, &points[first]))
        .collect();

    while centroids.len() < k {
        let total: f64 = min_distances.iter().sum();

        let next = if total > 0.0 {
            let target = rng.gen_range(0.0..total);
            let mut cumulative = 0.0;
            let mut pick = None;
            for (i, &d) in min_distances.iter().enumerate() {
                if d <= 0.0 {
                    continue;
                }
                cumulative += d;
                pick = Some(i);
                if cumulative > target {
                    break;
                }
            }
            pick
        } else {
            // Every point sits on a centroid already.
            chosen.iter().position(|c| !c)
        };

        let Some(next) = next else {
            break;
        };
        chosen[next] = true;
        centroids.push(points[next].clone());

        for (d, point) in min_distances.iter_mut().zip(points) {
            *d = d.min(squared_distance(point, &points[next]));
        }
    }

    centroids
}

/// Nearest centroid for every point.
fn assign(points: &[Vec<f64>], centroids: &[Vec<f64>]) -> Vec<usize> {
    #[cfg(feature = "parallel")]
    {
        use rayon::prelude::*;
        points.par_iter().map(|p| nearest(p, centroids)).collect()
    }

    #[cfg(not(feature = "parallel"))]
    {
        points.iter().map(|p| nearest(p, centroids)).collect()
    }
}

/// Index of the closest centroid. Equidistant centroids resolve to the
/// lower index.
fn nearest(point: &[f64], centroids: &[Vec<f64>]) -> usize {
    let mut best = 0;
    let mut best_distance = f64::INFINITY;
    for (index, centroid) in centroids.iter().enumerate() {
        let distance = squared_distance(point, centroid);
        if distance < best_distance {
            best = index;
            best_distance = distance;
        }
    }
    best
}

/// Move each centroid to the mean of its members. Empty clusters keep
/// their previous centroid.
fn update_centroids(points: &[Vec<f64>], assignments: &[usize], centroids: &mut [Vec<f64>]) {
    let dims = centroids.first().map(Vec::len).unwrap_or(0);
    let mut sums = vec![vec![0.0; dims]; centroids.len()];
    let mut counts = vec![0usize; centroids.len()];

    for (point, &cluster) in points.iter().zip(assignments) {
        counts[cluster] += 1;
        for (sum, value) in sums[cluster].iter_mut().zip(point) {
            *sum += value;
        }
    }

    for ((centroid, sum), count) in centroids.iter_mut().zip(sums).zip(counts) {
        if count > 0 {
            *centroid = sum.into_iter().map(|s| s / count as f64).collect();
        }
    }
}

#[inline]
fn squared_distance(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| (x - y) * (x - y)).sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn full(name: &str, values: &[f64]) -> NumericColumn {
        NumericColumn {
            name: name.to_string(),
            cells: values.iter().copied().map(Some).collect(),
        }
    }

    /// Three tight groups around 0, 10 and 20 on both features.
    fn three_blobs() -> Vec<NumericColumn> {
        let x = [0.0, 0.1, 0.2, 10.0, 10.1, 10.2, 20.0, 20.1, 20.2];
        let y = [0.2, 0.0, 0.1, 10.1, 10.2, 10.0, 20.2, 20.0, 20.1];
        vec![full("x", &x), full("y", &y)]
    }

    #[test]
    fn test_separated_groups_share_clusters() {
        let config = AnalysisConfig::builder().cluster_count(3).build().unwrap();
        let result = ClusteringEngine::cluster(&three_blobs(), &config);

        assert_eq!(result.k, 3);
        assert!(result.degenerate.is_none());
        assert_eq!(result.assignments.len(), 9);
        for group in [[0, 1, 2], [3, 4, 5], [6, 7, 8]] {
            let id = result.cluster_of(group[0]).unwrap();
            assert!(group.iter().all(|&row| result.cluster_of(row) == Some(id)));
        }
        assert_ne!(result.cluster_of(0), result.cluster_of(3));
        assert_ne!(result.cluster_of(3), result.cluster_of(6));
        assert_eq!(result.cluster_sizes.iter().sum::<usize>(), 9);
        assert!(result.converged);
    }

    #[test]
    fn test_identical_input_is_deterministic() {
        let config = AnalysisConfig::default();
        let first = ClusteringEngine::cluster(&three_blobs(), &config);
        let second = ClusteringEngine::cluster(&three_blobs(), &config);
        assert_eq!(first, second);
    }

    #[test]
    fn test_assignments_in_range() {
        let columns = vec![
            full("a", &[1.0, 5.0, 2.0, 8.0, 3.0, 9.0, 4.0, 7.0]),
            full("b", &[2.0, 1.0, 7.0, 3.0, 8.0, 2.0, 6.0, 5.0]),
        ];
        let result = ClusteringEngine::cluster(&columns, &AnalysisConfig::default());
        assert!(result.assignments.values().all(|&c| c < result.k));
        assert_eq!(result.centroids.len(), result.k);
        assert!(result.centroids.iter().all(|c| c.len() == 2));
    }

    #[test]
    fn test_incomplete_rows_are_excluded() {
        let columns = vec![
            NumericColumn {
                name: "a".into(),
                cells: vec![Some(1.0), None, Some(3.0), Some(4.0), Some(5.0)],
            },
            NumericColumn {
                name: "b".into(),
                cells: vec![Some(1.0), Some(2.0), Some(3.0), None, Some(5.0)],
            },
        ];
        let config = AnalysisConfig::builder().cluster_count(2).build().unwrap();
        let result = ClusteringEngine::cluster(&columns, &config);

        assert_eq!(result.excluded_rows, 2);
        assert_eq!(result.assignments.keys().copied().collect::<Vec<_>>(), vec![0, 2, 4]);
        assert_eq!(result.cluster_of(1), None);
    }

    #[test]
    fn test_k_reduced_to_retained_rows() {
        let columns = vec![NumericColumn {
            name: "a".into(),
            cells: vec![Some(1.0), Some(2.0), None, None],
        }];
        let config = AnalysisConfig::builder().cluster_count(3).build().unwrap();
        let result = ClusteringEngine::cluster(&columns, &config);

        assert_eq!(result.k, 2);
        assert_ne!(result.cluster_of(0), result.cluster_of(1));
        assert!(result.inertia.abs() < 1e-12);
    }

    #[test]
    fn test_zero_variance_feature_does_not_fail() {
        let columns = vec![
            full("constant", &[4.0, 4.0, 4.0, 4.0]),
            full("x", &[1.0, 2.0, 10.0, 11.0]),
        ];
        let config = AnalysisConfig::builder().cluster_count(2).build().unwrap();
        let result = ClusteringEngine::cluster(&columns, &config);

        assert!(result.centroids.iter().all(|c| c[0] == 0.0));
        assert_eq!(result.cluster_of(0), result.cluster_of(1));
        assert_eq!(result.cluster_of(2), result.cluster_of(3));
        assert_ne!(result.cluster_of(0), result.cluster_of(2));
    }

    #[test]
    fn test_inexact_constant_feature_standardizes_to_zero() {
        let columns = vec![
            full("c", &[0.1; 10]),
            full("x", &[1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0, 9.0, 10.0]),
        ];
        let retained: Vec<usize> = (0..10).collect();
        let points = standardize(&columns, &retained);

        assert!(points.iter().all(|p| p[0] == 0.0));
        assert!(points.iter().any(|p| p[1] != 0.0));
    }

    #[test]
    fn test_identical_points_cluster_without_failure() {
        let columns = vec![full("a", &[3.0, 3.0, 3.0, 3.0])];
        let result = ClusteringEngine::cluster(&columns, &AnalysisConfig::default());
        assert_eq!(result.k, 3);
        assert_eq!(result.inertia, 0.0);
        assert!(result.assignments.values().all(|&c| c == 0));
    }

    #[test]
    fn test_elbow_picks_three_groups() {
        let config = AnalysisConfig::builder().elbow(5).build().unwrap();
        let result = ClusteringEngine::cluster(&three_blobs(), &config);

        let curve = result.k_selection.as_ref().unwrap();
        assert_eq!(curve.len(), 5);
        assert_eq!(curve[0].k, 1);
        assert_eq!(result.k, 3);
    }

    #[test]
    fn test_elbow_rule() {
        let curve = |inertias: &[f64]| -> Vec<ElbowPoint> {
            inertias
                .iter()
                .enumerate()
                .map(|(i, &inertia)| ElbowPoint { k: i + 1, inertia })
                .collect()
        };
        assert_eq!(choose_elbow_k(&curve(&[100.0, 40.0, 35.0, 34.0])), 2);
        assert_eq!(choose_elbow_k(&curve(&[100.0, 60.0, 30.0, 5.0])), 4);
        assert_eq!(choose_elbow_k(&curve(&[0.0, 0.0, 0.0])), 1);
        assert_eq!(choose_elbow_k(&[]), 1);
    }

    #[test]
    fn test_no_numeric_columns_is_degenerate() {
        let result = ClusteringEngine::cluster(&[], &AnalysisConfig::default());
        assert_eq!(result.degenerate, Some(Degeneracy::NoNumericColumns));
        assert_eq!(result.k, 0);
    }

    #[test]
    fn test_single_complete_row_is_degenerate() {
        let columns = vec![NumericColumn {
            name: "a".into(),
            cells: vec![Some(1.0), None],
        }];
        let result = ClusteringEngine::cluster(&columns, &AnalysisConfig::default());
        assert_eq!(
            result.degenerate,
            Some(Degeneracy::TooFewRows {
                required: 2,
                actual: 1
            })
        );
        assert_eq!(result.excluded_rows, 1);
    }
}
