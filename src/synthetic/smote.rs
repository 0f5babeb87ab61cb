//! SMOTE (Synthetic Minority Over-sampling Technique)

use crate::error::{Result, ScreeningError};
use crate::synthetic::{class_counts, class_indices, ResampleResult, Sampler};
use ndarray::{Array1, Array2};
use rand::prelude::*;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::{BTreeMap, BinaryHeap};
use tracing::debug;

/// Ordered (distance, index) pair for BinaryHeap-based partial sort
#[derive(Debug, Clone, Copy)]
struct DistIdx(f64, usize);

impl PartialEq for DistIdx {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}
impl Eq for DistIdx {}
impl PartialOrd for DistIdx {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
impl Ord for DistIdx {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.total_cmp(&other.0).then(self.1.cmp(&other.1))
    }
}

/// SMOTE with the "not majority" strategy.
///
/// Every class except the largest is oversampled up to the largest class's
/// count. Synthetic points lie on the segment between a sample and one of its
/// `k` nearest same-class neighbours, in unscaled feature space.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SMOTE {
    /// Number of nearest neighbors
    k_neighbors: usize,
    /// Random seed
    seed: Option<u64>,
    /// Target samples per class id
    target_counts: Option<BTreeMap<usize, usize>>,
}

impl SMOTE {
    /// Create new SMOTE sampler
    pub fn new() -> Self {
        Self {
            k_neighbors: 5,
            seed: None,
            target_counts: None,
        }
    }

    /// Set number of neighbors
    pub fn with_k_neighbors(mut self, k: usize) -> Self {
        self.k_neighbors = k.max(1);
        self
    }

    /// Set random seed
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Euclidean distance
    fn distance(a: &[f64], b: &[f64]) -> f64 {
        a.iter()
            .zip(b.iter())
            .map(|(ai, bi)| (ai - bi).powi(2))
            .sum::<f64>()
            .sqrt()
    }

    /// k nearest neighbours of `data[point]` within `data`, excluding the point itself
    fn find_neighbors(point: usize, data: &[Vec<f64>], k: usize) -> Vec<usize> {
        let mut heap: BinaryHeap<DistIdx> = BinaryHeap::with_capacity(k + 1);

        for (i, d) in data.iter().enumerate() {
            if i == point {
                continue;
            }
            let candidate = DistIdx(Self::distance(&data[point], d), i);
            if heap.len() < k {
                heap.push(candidate);
            } else if let Some(worst) = heap.peek() {
                if candidate < *worst {
                    heap.pop();
                    heap.push(candidate);
                }
            }
        }

        heap.into_sorted_vec().into_iter().map(|DistIdx(_, i)| i).collect()
    }

    /// Generate synthetic sample between two points
    fn generate_sample(point: &[f64], neighbor: &[f64], rng: &mut StdRng) -> Vec<f64> {
        let gap: f64 = rng.gen();
        point
            .iter()
            .zip(neighbor.iter())
            .map(|(&p, &n)| p + gap * (n - p))
            .collect()
    }
}

impl Default for SMOTE {
    fn default() -> Self {
        Self::new()
    }
}

impl Sampler for SMOTE {
    fn fit(&mut self, _x: &Array2<f64>, y: &Array1<usize>) -> Result<()> {
        let counts = class_counts(y);

        if counts.len() < 2 {
            return Err(ScreeningError::InsufficientClasses { found: counts.len() });
        }

        let max_count = counts.values().copied().max().unwrap_or(0);
        let targets = counts.keys().map(|&class| (class, max_count)).collect();

        self.target_counts = Some(targets);
        Ok(())
    }

    fn resample(&self, x: &Array2<f64>, y: &Array1<usize>) -> Result<ResampleResult> {
        let targets = self.target_counts.as_ref().ok_or(ScreeningError::ModelNotFitted)?;

        if x.nrows() != y.len() {
            return Err(ScreeningError::ShapeError {
                expected: format!("{} labels", x.nrows()),
                actual: format!("{} labels", y.len()),
            });
        }

        let mut rng = match self.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        let indices = class_indices(y);
        let counts = class_counts(y);
        let n_features = x.ncols();

        // Only synthetic rows are collected; originals are copied from x below
        let mut synthetic_x: Vec<Vec<f64>> = Vec::new();
        let mut synthetic_y: Vec<usize> = Vec::new();
        let mut n_synthetic = BTreeMap::new();

        for (&class, &target_count) in targets {
            let current_count = counts.get(&class).copied().unwrap_or(0);
            let n_to_generate = target_count.saturating_sub(current_count);
            n_synthetic.insert(class, n_to_generate);

            if n_to_generate == 0 {
                continue;
            }

            let Some(class_idx) = indices.get(&class) else {
                continue;
            };
            let class_samples: Vec<Vec<f64>> = class_idx
                .iter()
                .map(|&i| x.row(i).to_vec())
                .collect();

            let k = self.k_neighbors.min(class_samples.len().saturating_sub(1));
            let neighbors: Vec<Vec<usize>> = (0..class_samples.len())
                .map(|i| Self::find_neighbors(i, &class_samples, k))
                .collect();

            for _ in 0..n_to_generate {
                let idx = rng.gen_range(0..class_samples.len());
                let sample = &class_samples[idx];

                // A lone sample has no neighbour to interpolate towards
                let synthetic = match neighbors[idx].choose(&mut rng) {
                    Some(&n) => Self::generate_sample(sample, &class_samples[n], &mut rng),
                    None => sample.clone(),
                };

                synthetic_x.push(synthetic);
                synthetic_y.push(class);
            }

            debug!(class, current_count, generated = n_to_generate, k, "SMOTE oversampled class");
        }

        let n_original = x.nrows();
        let n_total = n_original + synthetic_x.len();
        let result_x = Array2::from_shape_fn((n_total, n_features), |(i, j)| {
            if i < n_original {
                x[[i, j]]
            } else {
                synthetic_x[i - n_original][j]
            }
        });

        let mut all_y: Vec<usize> = y.to_vec();
        all_y.extend_from_slice(&synthetic_y);

        Ok(ResampleResult {
            x: result_x,
            y: Array1::from_vec(all_y),
            n_synthetic,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_imbalanced_data() -> (Array2<f64>, Array1<usize>) {
        // 20 majority (class 0), 5 minority (class 1), 2 rare (class 2)
        let mut data = Vec::new();
        let mut labels = Vec::new();

        for i in 0..20 {
            data.push((i % 2) as f64);
            data.push(20.0 + i as f64);
            labels.push(0);
        }
        for i in 0..5 {
            data.push(1.0);
            data.push(60.0 + i as f64);
            labels.push(1);
        }
        for i in 0..2 {
            data.push(0.0);
            data.push(30.0 + i as f64);
            labels.push(2);
        }

        let x = Array2::from_shape_vec((27, 2), data).unwrap();
        (x, Array1::from_vec(labels))
    }

    #[test]
    fn test_smote_balances_to_majority() {
        let (x, y) = create_imbalanced_data();
        let result = SMOTE::new().with_k_neighbors(3).with_seed(42).fit_resample(&x, &y).unwrap();

        let counts = class_counts(&result.y);
        assert_eq!(counts[&0], 20);
        assert_eq!(counts[&1], 20);
        assert_eq!(counts[&2], 20);
        assert_eq!(result.n_synthetic[&0], 0);
        assert_eq!(result.total_synthetic(), 33);
        assert_eq!(result.x.nrows(), result.y.len());
    }

    #[test]
    fn test_smote_preserves_original_rows() {
        let (x, y) = create_imbalanced_data();
        let result = SMOTE::new().with_seed(42).fit_resample(&x, &y).unwrap();

        for i in 0..x.nrows() {
            assert_eq!(result.x.row(i), x.row(i));
            assert_eq!(result.y[i], y[i]);
        }
    }

    #[test]
    fn test_synthetic_points_stay_within_class_hull() {
        let (x, y) = create_imbalanced_data();
        let result = SMOTE::new().with_seed(7).fit_resample(&x, &y).unwrap();

        for i in x.nrows()..result.x.nrows() {
            if result.y[i] == 1 {
                let age = result.x[[i, 1]];
                assert!((60.0..=64.0).contains(&age), "synthetic age {age} outside class range");
                assert_eq!(result.x[[i, 0]], 1.0);
            }
        }
    }

    #[test]
    fn test_smote_is_deterministic_with_seed() {
        let (x, y) = create_imbalanced_data();
        let a = SMOTE::new().with_seed(42).fit_resample(&x, &y).unwrap();
        let b = SMOTE::new().with_seed(42).fit_resample(&x, &y).unwrap();
        assert_eq!(a.x, b.x);
        assert_eq!(a.y, b.y);
    }

    #[test]
    fn test_single_class_is_insufficient() {
        let x = Array2::zeros((3, 2));
        let y = Array1::from_vec(vec![4, 4, 4]);
        let err = SMOTE::new().fit_resample(&x, &y).unwrap_err();
        assert!(matches!(err, ScreeningError::InsufficientClasses { found: 1 }));
    }

    #[test]
    fn test_lone_minority_sample_is_replicated() {
        let x = Array2::from_shape_vec((4, 1), vec![0.0, 1.0, 2.0, 9.0]).unwrap();
        let y = Array1::from_vec(vec![0, 0, 0, 1]);
        let result = SMOTE::new().with_seed(1).fit_resample(&x, &y).unwrap();

        assert_eq!(class_counts(&result.y)[&1], 3);
        for i in 4..result.x.nrows() {
            assert_eq!(result.x[[i, 0]], 9.0);
        }
    }
}
