//! Isolation forest anomaly scores.
//!
//! Each tree recursively splits a random subsample on a random feature at a
//! uniform cut between that feature's bounds. Points that are easy to
//! isolate end up on short paths. With `E(h)` the mean path length over all
//! trees and `c(n)` the expected path length of an unsuccessful binary
//! search among `n` points, the score is `2^(-E(h) / c(n))`: close to 1 for
//! anomalies, around 0.5 or below for ordinary points.

use rand::prelude::*;
use rand::seq::index;

const TREES: usize = 100;
const MAX_SAMPLES: usize = 256;
const EULER_GAMMA: f64 = 0.577_215_664_9;

enum Node {
    Split {
        feature: usize,
        cut: f64,
        left: Box<Node>,
        right: Box<Node>,
    },
    Leaf {
        size: usize,
    },
}

/// Anomaly score of every point. All points must have the same length.
///
/// Scores depend only on the points and the seed.
pub(super) fn anomaly_scores(points: &[Vec<f64>], seed: u64) -> Vec<f64> {
    let n = points.len();
    if n < 2 {
        return vec![0.5; n];
    }

    let sample_size = n.min(MAX_SAMPLES);
    let depth_limit = (sample_size as f64).log2().ceil() as usize;
    let mut rng = StdRng::seed_from_u64(seed);

    let trees: Vec<Node> = (0..TREES)
        .map(|_| {
            let sample: Vec<&[f64]> = index::sample(&mut rng, n, sample_size)
                .into_iter()
                .map(|i| points[i].as_slice())
                .collect();
            grow(&sample, depth_limit, &mut rng)
        })
        .collect();

    let normalizer = average_path_length(sample_size);
    points
        .iter()
        .map(|point| {
            let mean_path =
                trees.iter().map(|tree| path_length(point, tree, 0)).sum::<f64>() / TREES as f64;
            2f64.powf(-mean_path / normalizer)
        })
        .collect()
}

fn grow(sample: &[&[f64]], depth_limit: usize, rng: &mut StdRng) -> Node {
    let size = sample.len();
    if size <= 1 || depth_limit == 0 {
        return Node::Leaf { size };
    }

    // Only features that still vary within this node can split it.
    let dims = sample[0].len();
    let splittable: Vec<(usize, f64, f64)> = (0..dims)
        .filter_map(|feature| {
            let (lo, hi) = sample.iter().fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), p| {
                (lo.min(p[feature]), hi.max(p[feature]))
            });
            (lo < hi).then_some((feature, lo, hi))
        })
        .collect();

    let Some(&(feature, lo, hi)) = splittable.choose(rng) else {
        return Node::Leaf { size };
    };
    let cut = rng.gen_range(lo..hi);

    let (left, right): (Vec<&[f64]>, Vec<&[f64]>) =
        sample.iter().copied().partition(|p| p[feature] < cut);
    if left.is_empty() || right.is_empty() {
        return Node::Leaf { size };
    }

    Node::Split {
        feature,
        cut,
        left: Box::new(grow(&left, depth_limit - 1, rng)),
        right: Box::new(grow(&right, depth_limit - 1, rng)),
    }
}

fn path_length(point: &[f64], node: &Node, depth: usize) -> f64 {
    match node {
        Node::Leaf { size } => depth as f64 + average_path_length(*size),
        Node::Split {
            feature,
            cut,
            left,
            right,
        } => {
            let next = if point[*feature] < *cut { left } else { right };
            path_length(point, next, depth + 1)
        }
    }
}

/// c(n) = 2·H(n − 1) − 2(n − 1)/n, with H(i) ≈ ln(i) + γ.
fn average_path_length(n: usize) -> f64 {
    match n {
        0 | 1 => 0.0,
        2 => 1.0,
        _ => {
            let n = n as f64;
            2.0 * ((n - 1.0).ln() + EULER_GAMMA) - 2.0 * (n - 1.0) / n
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cluster_with_far_points() -> Vec<Vec<f64>> {
        let mut points: Vec<Vec<f64>> = (0..40)
            .map(|i| {
                vec![
                    5.0 + (i % 7) as f64 * 0.2 - 0.6,
                    5.0 + (i % 5) as f64 * 0.3 - 0.6,
                ]
            })
            .collect();
        points.push(vec![50.0, 50.0]);
        points.push(vec![-40.0, -40.0]);
        points
    }

    #[test]
    fn test_far_points_score_highest() {
        let points = cluster_with_far_points();
        let scores = anomaly_scores(&points, 42);

        let max_normal = scores[..40].iter().copied().fold(f64::MIN, f64::max);
        assert!(scores[40] > max_normal);
        assert!(scores[41] > max_normal);
        assert!(scores[40] > 0.5);
    }

    #[test]
    fn test_same_seed_same_scores() {
        let points = cluster_with_far_points();
        assert_eq!(anomaly_scores(&points, 7), anomaly_scores(&points, 7));
    }

    #[test]
    fn test_identical_points_score_equally() {
        let points = vec![vec![0.1, 3.0]; 8];
        let scores = anomaly_scores(&points, 42);
        assert!(scores.iter().all(|&s| s == scores[0]));
    }

    #[test]
    fn test_average_path_length() {
        assert_eq!(average_path_length(1), 0.0);
        assert_eq!(average_path_length(2), 1.0);
        // 2 * (ln 255 + γ) - 2 * 255 / 256
        assert!((average_path_length(256) - 10.244_770).abs() < 1e-4);
    }
}
